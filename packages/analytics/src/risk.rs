//! Person risk scoring.
//!
//! The raw score is a weighted sum of four factors over the person's
//! distinct suspect-linked cases. It is mapped onto `[0, max_score)` by
//! `max_score * (1 - e^(-raw / saturation))`, which is monotone in every
//! factor and never reaches the cap.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use crime_intel_analytics_models::{
    RiskContributions, RiskFactors, RiskLevel, RiskParams, RiskScore,
};
use crime_intel_crime_models::PersonRole;
use crime_intel_database_models::{CaseRecord, IncidentRecord};
use crime_intel_spatial::{CancelToken, IncidentFilter, SpatialQuery};

use crate::config::RiskConfig;
use crate::{AnalysisContext, AnalyticsError, check_cancel, count_u32, tag_names_of};

const SECONDS_PER_DAY: f64 = 86_400.0;
const PROXIMITY_DIVISOR: f64 = 5.0;
const PROXIMITY_CAP: f64 = 2.0;

/// `0.5^(age / half_life)`, with future timestamps treated as age 0.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn recency_weight(occurred_at: DateTime<Utc>, as_of: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = ((as_of - occurred_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
    0.5_f64.powf(age_days / half_life_days)
}

/// `min(nearby_active_cases / 5, 2)`.
#[must_use]
pub fn active_proximity(nearby_active_cases: u32) -> f64 {
    (f64::from(nearby_active_cases) / PROXIMITY_DIVISOR).min(PROXIMITY_CAP)
}

/// Weighted contributions of `factors` under `config`.
#[must_use]
pub fn contributions(factors: &RiskFactors, config: &RiskConfig) -> RiskContributions {
    RiskContributions {
        case_count: config.case_weight * f64::from(factors.case_count),
        severity_exposure: config.severity_weight * factors.severity_exposure,
        recency: config.recency_weight * factors.recency,
        active_proximity: config.proximity_weight * factors.active_proximity,
    }
}

/// Saturates a raw score onto `[0, max_score)`.
#[must_use]
pub fn saturate(raw: f64, config: &RiskConfig) -> f64 {
    config.max_score * (1.0 - (-raw / config.saturation).exp())
}

fn suspect_cases(
    ctx: &AnalysisContext<'_>,
    person_id: i64,
) -> Result<Vec<(CaseRecord, IncidentRecord)>, AnalyticsError> {
    let case_ids: BTreeSet<i64> = ctx
        .provider
        .cases_for_person(person_id)?
        .into_iter()
        .filter(|l| l.role == PersonRole::Suspect)
        .map(|l| l.case_id)
        .collect();

    let mut cases = Vec::with_capacity(case_ids.len());
    for case_id in case_ids {
        let case = ctx.provider.case_by_id(case_id)?.ok_or_else(|| {
            AnalyticsError::integrity(format!("Person {person_id} links unknown case {case_id}"))
        })?;
        let incident = ctx
            .provider
            .incident_by_id(case.primary_incident_id)?
            .ok_or_else(|| {
                AnalyticsError::integrity(format!(
                    "Case {case_id} has no primary incident {}",
                    case.primary_incident_id
                ))
            })?;
        cases.push((case, incident));
    }
    Ok(cases)
}

/// Largest number of distinct active cases within `radius_km` of any of
/// `incidents`.
fn nearby_active_cases(
    ctx: &AnalysisContext<'_>,
    incidents: &[&IncidentRecord],
    radius_km: f64,
    cancel: &CancelToken,
) -> Result<u32, AnalyticsError> {
    let adapter = ctx.adapter();
    let mut best = 0;
    for incident in incidents {
        let center = incident.location();
        if !center.is_valid() {
            continue;
        }
        let query = SpatialQuery::Radius {
            center,
            radius_meters: radius_km * 1000.0,
        };
        let mut active = BTreeSet::new();
        for nearby in &adapter.candidates(&query, &IncidentFilter::default(), cancel)? {
            match ctx.provider.case_by_incident_id(nearby.id)? {
                Some(case) if case.status.is_active() => {
                    active.insert(case.id);
                }
                _ => {}
            }
        }
        best = best.max(count_u32(active.len()));
    }
    Ok(best)
}

/// Scores `params.person_id` as of `params.as_of`.
///
/// # Errors
///
/// * If the person does not exist or has no suspect-linked cases
/// * If the provider fails
/// * If `cancel` fires
pub fn score_person(
    ctx: &AnalysisContext<'_>,
    params: &RiskParams,
    cancel: &CancelToken,
) -> Result<RiskScore, AnalyticsError> {
    let config = &ctx.config.risk;
    let person = ctx.provider.person_by_id(params.person_id)?.ok_or_else(|| {
        AnalyticsError::not_found(format!("Person {} not found", params.person_id))
    })?;

    let cases = suspect_cases(ctx, person.id)?;
    if cases.is_empty() {
        return Err(AnalyticsError::not_found(format!(
            "Person {} has no suspect-linked cases",
            person.id
        )));
    }
    check_cancel(cancel)?;

    let tag_names = ctx.tag_names()?;
    let mut severity_exposure = 0.0;
    let mut recency = 0.0;
    let mut signatures: BTreeMap<BTreeSet<&str>, u32> = BTreeMap::new();
    for (_, incident) in &cases {
        let tags = tag_names_of(incident, &tag_names);
        severity_exposure += tags
            .iter()
            .map(|name| ctx.config.severity_for(name).weight())
            .sum::<f64>();
        recency += recency_weight(incident.occurred_at, params.as_of, config.half_life_days);
        *signatures.entry(tags).or_default() += 1;
    }

    let incidents: Vec<&IncidentRecord> = cases.iter().map(|(_, i)| i).collect();
    let nearby = nearby_active_cases(ctx, &incidents, config.proximity_radius_km, cancel)?;

    let case_count = count_u32(cases.len());
    let most_common = signatures.values().copied().max().unwrap_or(0);
    let factors = RiskFactors {
        case_count,
        severity_exposure,
        recency,
        active_proximity: active_proximity(nearby),
        nearby_active_cases: nearby,
        pattern_consistency: f64::from(most_common) / f64::from(case_count),
    };
    let contributions = contributions(&factors, config);
    let raw = contributions.total();
    let score = saturate(raw, config);

    log::debug!(
        "Person {}: {case_count} cases, raw {raw:.3}, score {score:.1}",
        person.id
    );

    Ok(RiskScore {
        person_id: person.id,
        name: person.name,
        as_of: params.as_of,
        score,
        level: RiskLevel::from_score(score),
        raw,
        factors,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureBuilder, TestEngine, ts};
    use crime_intel_crime_models::CaseStatus;

    fn scenario() -> TestEngine {
        let mut builder = FixtureBuilder::new()
            .tag(1, "burglary")
            .tag(2, "armed robbery")
            .person(100, "One Case")
            .person(200, "Many Cases")
            .person(300, "Only A Witness");
        for id in 1..=6_i64 {
            #[allow(clippy::cast_precision_loss)]
            let lat = (id as f64).mul_add(0.001, 40.0);
            builder = builder
                .incident(id * 10, lat, -75.0, ts(2024, 6, 1, 12), &[1])
                .case(id, id * 10, CaseStatus::Open)
                .suspect(id, 200);
        }
        builder
            .incident(70, 45.0, -70.0, ts(2024, 6, 1, 12), &[1])
            .case(7, 70, CaseStatus::Closed)
            .suspect(7, 100)
            .link(1, 300, PersonRole::Witness)
            .build()
    }

    fn params(person_id: i64) -> RiskParams {
        RiskParams {
            person_id,
            as_of: ts(2024, 6, 1, 12),
        }
    }

    #[test]
    fn single_closed_case_breakdown() {
        let engine = scenario();
        let score = score_person(&engine.ctx(), &params(100), &CancelToken::new()).unwrap();

        assert_eq!(score.factors.case_count, 1);
        assert!((score.factors.severity_exposure - 0.6).abs() < 1e-12);
        assert!((score.factors.recency - 1.0).abs() < 1e-12);
        assert_eq!(score.factors.nearby_active_cases, 0);
        assert!((score.factors.pattern_consistency - 1.0).abs() < 1e-12);
        // 3 * 1 + 4 * 0.6 + 2 * 1 + 2 * 0
        assert!((score.raw - 7.4).abs() < 1e-9);
        let expected = 100.0 * (1.0 - (-7.4_f64 / 25.0).exp());
        assert!((score.score - expected).abs() < 1e-9);
        assert_eq!(score.level, RiskLevel::Low);
        assert!((score.contributions.total() - score.raw).abs() < 1e-12);
    }

    #[test]
    fn nearby_active_cases_raise_proximity() {
        let engine = scenario();
        let score = score_person(&engine.ctx(), &params(200), &CancelToken::new()).unwrap();
        assert_eq!(score.factors.case_count, 6);
        assert_eq!(score.factors.nearby_active_cases, 6);
        assert!((score.factors.active_proximity - 1.2).abs() < 1e-12);
    }

    #[test]
    fn score_is_monotone_in_case_count() {
        let config = RiskConfig::default();
        let mut previous = -1.0;
        for case_count in 0..50 {
            let factors = RiskFactors {
                case_count,
                severity_exposure: 0.6 * f64::from(case_count),
                recency: f64::from(case_count),
                active_proximity: 0.0,
                nearby_active_cases: 0,
                pattern_consistency: 1.0,
            };
            let score = saturate(contributions(&factors, &config).total(), &config);
            assert!(score >= previous);
            assert!(score < config.max_score);
            previous = score;
        }

        let engine = scenario();
        let ctx = engine.ctx();
        let cancel = CancelToken::new();
        let one = score_person(&ctx, &params(100), &cancel).unwrap();
        let many = score_person(&ctx, &params(200), &cancel).unwrap();
        assert!(many.score > one.score);
    }

    #[test]
    fn recency_halves_per_half_life() {
        let as_of = ts(2024, 7, 1, 0);
        let half = recency_weight(as_of - chrono::Duration::days(180), as_of, 180.0);
        assert!((half - 0.5).abs() < 1e-12);
        let future = recency_weight(as_of + chrono::Duration::days(3), as_of, 180.0);
        assert!((future - 1.0).abs() < 1e-12);
        assert!((active_proximity(20) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_person_or_no_suspect_cases_is_not_found() {
        let engine = scenario();
        let ctx = engine.ctx();
        let cancel = CancelToken::new();
        assert_eq!(
            score_person(&ctx, &params(999), &cancel).unwrap_err().kind(),
            "not_found"
        );
        assert_eq!(
            score_person(&ctx, &params(300), &cancel).unwrap_err().kind(),
            "not_found"
        );
    }
}
