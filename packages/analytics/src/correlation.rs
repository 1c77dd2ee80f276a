//! Multi-signal related-case scoring.
//!
//! Every candidate case is compared with a reference case on four
//! signals in `[0, 1]`: tag Jaccard, suspect Jaccard, spatial proximity,
//! and temporal proximity. The composite is their weighted sum.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use crime_intel_analytics_models::{
    CorrelationParams, CorrelationScore, CorrelationWeights, RelatedCasesResult, SubScores,
};
use crime_intel_crime_models::PersonRole;
use crime_intel_database_models::{CaseRecord, DateRange, GeoPoint, IncidentRecord};
use crime_intel_spatial::{CancelToken, IncidentFilter, SpatialQuery};
use rayon::prelude::*;

use crate::{AnalysisContext, AnalyticsError, check_cancel, jaccard, tag_names_of};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// The values the scorer needs from one case.
#[derive(Debug, Clone)]
pub struct CaseProfile {
    /// Case id.
    pub case_id: i64,
    /// Primary incident id.
    pub incident_id: i64,
    /// Primary incident time.
    pub occurred_at: DateTime<Utc>,
    /// Primary incident location, if valid.
    pub location: Option<GeoPoint>,
    /// Tag names of the primary incident.
    pub tags: BTreeSet<String>,
    /// Suspect person ids.
    pub suspects: BTreeSet<i64>,
}

/// Checks weights, radius, day range, and limit.
///
/// # Errors
///
/// * If any weight is negative or non-finite, or the weights do not sum
///   to 1
/// * If `radius_km` or `days_range` is not positive
/// * If `limit` is zero
pub fn validate_params(params: &CorrelationParams) -> Result<(), AnalyticsError> {
    validate_weights(&params.weights)?;
    if !params.radius_km.is_finite() || params.radius_km <= 0.0 {
        return Err(AnalyticsError::invalid(format!(
            "radius_km must be positive, got {}",
            params.radius_km
        )));
    }
    if !params.days_range.is_finite() || params.days_range <= 0.0 {
        return Err(AnalyticsError::invalid(format!(
            "days_range must be positive, got {}",
            params.days_range
        )));
    }
    if params.limit == Some(0) {
        return Err(AnalyticsError::invalid("limit must be at least 1"));
    }
    Ok(())
}

fn validate_weights(weights: &CorrelationWeights) -> Result<(), AnalyticsError> {
    if weights
        .as_array()
        .iter()
        .any(|w| !w.is_finite() || *w < 0.0)
    {
        return Err(AnalyticsError::invalid(
            "correlation weights must be finite and non-negative",
        ));
    }
    let sum = weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(AnalyticsError::invalid(format!(
            "correlation weights must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

/// Scores `candidate` against `reference`.
///
/// Spatial proximity is 0 when either location is missing.
#[must_use]
pub fn score_pair(
    reference: &CaseProfile,
    candidate: &CaseProfile,
    weights: &CorrelationWeights,
    radius_km: f64,
    days_range: f64,
) -> CorrelationScore {
    let distance_km = reference
        .location
        .zip(candidate.location)
        .map(|(a, b)| a.haversine_distance(&b) / 1000.0);

    #[allow(clippy::cast_precision_loss)]
    let days_apart = (reference.occurred_at - candidate.occurred_at)
        .num_seconds()
        .abs() as f64
        / SECONDS_PER_DAY;

    let sub_scores = SubScores {
        tag: jaccard(&reference.tags, &candidate.tags),
        suspect: jaccard(&reference.suspects, &candidate.suspects),
        spatial: distance_km.map_or(0.0, |d| (1.0 - d / radius_km).max(0.0)),
        temporal: (1.0 - days_apart / days_range).max(0.0),
    };

    CorrelationScore {
        case_id: candidate.case_id,
        incident_id: candidate.incident_id,
        occurred_at: candidate.occurred_at,
        composite: sub_scores.composite(weights),
        sub_scores,
        distance_km,
        days_apart,
        shared_tag_count: reference.tags.intersection(&candidate.tags).count(),
        shared_suspect_count: reference
            .suspects
            .intersection(&candidate.suspects)
            .count(),
    }
}

/// Orders scores by composite (desc), occurrence (desc), case id (asc).
pub fn sort_scores(scores: &mut [CorrelationScore]) {
    scores.sort_by(|a, b| {
        b.composite
            .total_cmp(&a.composite)
            .then_with(|| b.occurred_at.cmp(&a.occurred_at))
            .then_with(|| a.case_id.cmp(&b.case_id))
    });
}

fn profile(
    ctx: &AnalysisContext<'_>,
    case: &CaseRecord,
    incident: &IncidentRecord,
    tag_names: &BTreeMap<i64, String>,
) -> Result<CaseProfile, AnalyticsError> {
    let location = incident.location();
    Ok(CaseProfile {
        case_id: case.id,
        incident_id: incident.id,
        occurred_at: incident.occurred_at,
        location: location.is_valid().then_some(location),
        tags: tag_names_of(incident, tag_names)
            .into_iter()
            .map(str::to_string)
            .collect(),
        suspects: ctx.persons_with_role(case.id, PersonRole::Suspect)?,
    })
}

fn window_candidates(
    ctx: &AnalysisContext<'_>,
    reference: &CaseProfile,
    center: GeoPoint,
    params: &CorrelationParams,
    cancel: &CancelToken,
) -> Result<Vec<(CaseRecord, IncidentRecord)>, AnalyticsError> {
    // A span past chrono's range leaves that side of the window open.
    #[allow(clippy::cast_possible_truncation)]
    let span = Duration::try_seconds((params.days_range * SECONDS_PER_DAY) as i64);
    let filter = IncidentFilter::default().with_date_range(DateRange::new(
        span.and_then(|s| reference.occurred_at.checked_sub_signed(s)),
        span.and_then(|s| reference.occurred_at.checked_add_signed(s)),
    ));
    let query = SpatialQuery::Radius {
        center,
        radius_meters: params.radius_km * 1000.0,
    };

    let candidates = ctx.adapter().candidates(&query, &filter, cancel)?;
    let mut pairs = Vec::with_capacity(candidates.len());
    for incident in candidates.into_vec() {
        if let Some(case) = ctx.provider.case_by_incident_id(incident.id)? {
            pairs.push((case, incident));
        }
    }
    Ok(pairs)
}

fn all_case_pairs(
    ctx: &AnalysisContext<'_>,
    cancel: &CancelToken,
) -> Result<Vec<(CaseRecord, IncidentRecord)>, AnalyticsError> {
    let mut pairs = Vec::new();
    for case in ctx.provider.all_cases()? {
        check_cancel(cancel)?;
        let incident = ctx
            .provider
            .incident_by_id(case.primary_incident_id)?
            .ok_or_else(|| {
                AnalyticsError::integrity(format!(
                    "Case {} has no primary incident {}",
                    case.id, case.primary_incident_id
                ))
            })?;
        pairs.push((case, incident));
    }
    Ok(pairs)
}

/// Loads a case and its primary incident, or fails with `NotFound`.
pub(crate) fn load_reference(
    ctx: &AnalysisContext<'_>,
    case_id: i64,
) -> Result<(CaseRecord, IncidentRecord), AnalyticsError> {
    let case = ctx
        .provider
        .case_by_id(case_id)?
        .ok_or_else(|| AnalyticsError::not_found(format!("Case {case_id} not found")))?;
    let incident = ctx
        .provider
        .incident_by_id(case.primary_incident_id)?
        .ok_or_else(|| {
            AnalyticsError::not_found(format!(
                "Primary incident {} of case {case_id} not found",
                case.primary_incident_id
            ))
        })?;
    Ok((case, incident))
}

/// Finds and ranks cases related to `params.case_id`.
///
/// # Errors
///
/// * If the parameters are invalid
/// * If the case or its primary incident is missing, or the incident has
///   no valid location
/// * If the provider fails
/// * If `cancel` fires
pub fn find_related_cases(
    ctx: &AnalysisContext<'_>,
    params: &CorrelationParams,
    cancel: &CancelToken,
) -> Result<RelatedCasesResult, AnalyticsError> {
    validate_params(params)?;

    let (case, incident) = load_reference(ctx, params.case_id)?;
    let center = incident.location();
    if !center.is_valid() {
        return Err(AnalyticsError::not_found(format!(
            "Primary incident {} of case {} has no valid location",
            incident.id, case.id
        )));
    }

    let tag_names = ctx.tag_names()?;
    let reference = profile(ctx, &case, &incident, &tag_names)?;

    let pairs = if params.restrict_to_window {
        window_candidates(ctx, &reference, center, params, cancel)?
    } else {
        all_case_pairs(ctx, cancel)?
    };

    let mut profiles = Vec::with_capacity(pairs.len());
    for (case, incident) in pairs.iter().filter(|(c, _)| c.id != reference.case_id) {
        check_cancel(cancel)?;
        profiles.push(profile(ctx, case, incident, &tag_names)?);
    }

    let scored: Vec<Option<CorrelationScore>> = ctx.pool.install(|| {
        profiles
            .par_iter()
            .map(|candidate| {
                check_cancel(cancel)?;
                let score = score_pair(
                    &reference,
                    candidate,
                    &params.weights,
                    params.radius_km,
                    params.days_range,
                );
                let s = &score.sub_scores;
                let all_zero =
                    s.tag == 0.0 && s.suspect == 0.0 && s.spatial == 0.0 && s.temporal == 0.0;
                Ok((!all_zero).then_some(score))
            })
            .collect::<Result<Vec<_>, AnalyticsError>>()
    })?;

    let mut results: Vec<CorrelationScore> = scored.into_iter().flatten().collect();
    sort_scores(&mut results);
    if let Some(limit) = params.limit {
        results.truncate(limit);
    }

    log::debug!(
        "Case {}: scored {} candidates, {} related",
        params.case_id,
        profiles.len(),
        results.len()
    );

    Ok(RelatedCasesResult {
        reference_case_id: params.case_id,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Call, FaultyProvider, FixtureBuilder, TestEngine, lat_offset, ts};
    use crime_intel_crime_models::CaseStatus;
    use crime_intel_database::ProviderError;

    const BASE_LAT: f64 = 12.9716;
    const BASE_LNG: f64 = 77.5946;

    /// Reference case 1 and a candidate case 2 sharing 3/3 tags and 1 of 2
    /// suspects, 0.5 km and 2 days apart.
    fn scenario() -> TestEngine {
        FixtureBuilder::new()
            .tag(1, "burglary")
            .tag(2, "night")
            .tag(3, "forced-entry")
            .tag(4, "graffiti")
            .person(100, "A. Suspect")
            .person(200, "B. Suspect")
            .incident(10, BASE_LAT, BASE_LNG, ts(2024, 3, 10, 22), &[1, 2, 3])
            .incident(
                20,
                BASE_LAT + lat_offset(500.0),
                BASE_LNG,
                ts(2024, 3, 8, 22),
                &[1, 2, 3],
            )
            .incident(30, 13.5, 78.5, ts(2023, 1, 1, 12), &[4])
            .case(1, 10, CaseStatus::Open)
            .case(2, 20, CaseStatus::Open)
            .case(3, 30, CaseStatus::Closed)
            .suspect(1, 100)
            .suspect(1, 200)
            .suspect(2, 100)
            .build()
    }

    #[test]
    fn worked_example_composite() {
        let engine = scenario();
        let result =
            find_related_cases(&engine.ctx(), &CorrelationParams::new(1), &CancelToken::new())
                .unwrap();

        assert_eq!(result.results.len(), 1, "all-zero candidate must be excluded");
        let score = &result.results[0];
        assert_eq!(score.case_id, 2);
        assert!((score.sub_scores.tag - 1.0).abs() < 1e-9);
        assert!((score.sub_scores.suspect - 0.5).abs() < 1e-9);
        assert!((score.sub_scores.spatial - 0.9).abs() < 1e-6);
        assert!((score.sub_scores.temporal - (1.0 - 2.0 / 90.0)).abs() < 1e-9);
        assert!((score.composite - 0.844_444).abs() < 1e-3);
        assert_eq!(score.shared_tag_count, 3);
        assert_eq!(score.shared_suspect_count, 1);
        assert!((score.days_apart - 2.0).abs() < 1e-9);
        assert!((score.distance_km.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn identical_case_scores_one_on_every_signal() {
        let engine = scenario();
        let (case, incident) = load_reference(&engine.ctx(), 1).unwrap();
        let names = engine.ctx().tag_names().unwrap();
        let reference = profile(&engine.ctx(), &case, &incident, &names).unwrap();
        let score = score_pair(
            &reference,
            &reference,
            &CorrelationWeights::default(),
            5.0,
            90.0,
        );
        let s = score.sub_scores;
        for value in [s.tag, s.suspect, s.spatial, s.temporal] {
            assert!((value - 1.0).abs() < 1e-12);
        }
        assert!((score.composite - 1.0).abs() < 1e-12);
    }

    #[test]
    fn composite_stays_in_unit_interval() {
        let engine = scenario();
        let mut params = CorrelationParams::new(1);
        params.weights = CorrelationWeights {
            tag: 0.1,
            suspect: 0.2,
            spatial: 0.3,
            temporal: 0.4,
        };
        let result = find_related_cases(&engine.ctx(), &params, &CancelToken::new()).unwrap();
        for score in &result.results {
            assert!((0.0..=1.0).contains(&score.composite));
            let expected = score.sub_scores.composite(&params.weights);
            assert!((score.composite - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn window_restriction_uses_radius_and_days() {
        let engine = scenario();
        let mut params = CorrelationParams::new(1);
        params.restrict_to_window = true;
        params.radius_km = 1.0;
        params.days_range = 1.0;
        let result = find_related_cases(&engine.ctx(), &params, &CancelToken::new()).unwrap();
        assert!(result.results.is_empty());

        params.days_range = 3.0;
        let result = find_related_cases(&engine.ctx(), &params, &CancelToken::new()).unwrap();
        assert_eq!(result.results.len(), 1);
    }

    #[test]
    fn window_beyond_the_calendar_is_open_ended() {
        let engine = scenario();
        for days_range in [1.0e8, f64::MAX] {
            let mut params = CorrelationParams::new(1);
            params.restrict_to_window = true;
            params.radius_km = 1.0;
            params.days_range = days_range;
            let result = find_related_cases(&engine.ctx(), &params, &CancelToken::new()).unwrap();
            let ids: Vec<i64> = result.results.iter().map(|s| s.case_id).collect();
            assert_eq!(ids, vec![2], "days_range {days_range}");
        }
    }

    #[test]
    fn cancelled_while_profiling_candidates() {
        let engine = scenario();
        let cancel = CancelToken::new();
        let provider =
            FaultyProvider::new(&engine.snapshot).cancel_on(Call::PersonsForCase, 2, &cancel);
        let result = find_related_cases(
            &engine.ctx_with(&provider),
            &CorrelationParams::new(1),
            &cancel,
        );
        assert!(matches!(result, Err(AnalyticsError::Cancelled)));
    }

    #[test]
    fn case_without_primary_incident_is_an_integrity_error() {
        let engine = scenario();
        let provider = FaultyProvider::new(&engine.snapshot).hide_incident(30);
        let err = find_related_cases(
            &engine.ctx_with(&provider),
            &CorrelationParams::new(1),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::DataProvider(ProviderError::Integrity { .. })
        ));
    }

    #[test]
    fn ties_break_by_recency_then_id() {
        let mut scores = vec![
            CorrelationScore {
                case_id: 9,
                incident_id: 90,
                occurred_at: ts(2024, 1, 1, 0),
                composite: 0.5,
                sub_scores: SubScores {
                    tag: 0.5,
                    suspect: 0.5,
                    spatial: 0.5,
                    temporal: 0.5,
                },
                distance_km: None,
                days_apart: 0.0,
                shared_tag_count: 0,
                shared_suspect_count: 0,
            };
            3
        ];
        scores[1].case_id = 4;
        scores[2].case_id = 7;
        scores[2].occurred_at = ts(2024, 2, 1, 0);
        sort_scores(&mut scores);
        let ids: Vec<i64> = scores.iter().map(|s| s.case_id).collect();
        assert_eq!(ids, vec![7, 4, 9]);
    }

    #[test]
    fn rejects_bad_weights_and_missing_case() {
        let engine = scenario();
        let ctx = engine.ctx();
        let cancel = CancelToken::new();

        let mut params = CorrelationParams::new(1);
        params.weights.tag = 0.5;
        assert_eq!(
            find_related_cases(&ctx, &params, &cancel).unwrap_err().kind(),
            "invalid_query"
        );

        let mut params = CorrelationParams::new(1);
        params.weights = CorrelationWeights {
            tag: -0.25,
            suspect: 0.75,
            spatial: 0.25,
            temporal: 0.25,
        };
        assert!(find_related_cases(&ctx, &params, &cancel).is_err());

        assert_eq!(
            find_related_cases(&ctx, &CorrelationParams::new(404), &cancel)
                .unwrap_err()
                .kind(),
            "not_found"
        );
    }
}
