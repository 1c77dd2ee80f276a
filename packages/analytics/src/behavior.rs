//! Behavioral similarity between cases.
//!
//! Two cases behave alike when their primary incidents share tags and
//! happen at similar times. Time is reduced to a [`TimePattern`]: whether
//! weekend incidents dominate, and the most active hours of day.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike as _, Timelike as _, Utc, Weekday};
use crime_intel_analytics_models::{BehaviorMatch, BehaviorParams, BehaviorResult};
use crime_intel_spatial::CancelToken;

use crate::correlation::load_reference;
use crate::{AnalysisContext, AnalyticsError, check_cancel, jaccard, tag_names_of};

const TAG_WEIGHT: f64 = 0.6;
const TIME_WEIGHT: f64 = 0.4;
const WEEKEND_WEIGHT: f64 = 0.4;
const HOUR_WEIGHT: f64 = 0.6;
const TOP_HOURS: usize = 3;

/// When a set of incidents tends to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePattern {
    /// More incidents fell on Saturday or Sunday than on weekdays.
    pub weekend_heavy: bool,
    /// Up to three busiest hours of day.
    pub top_hours: BTreeSet<u32>,
}

impl TimePattern {
    /// Extracts the pattern of `timestamps`.
    ///
    /// Hours are ranked by count, ties broken by the earlier hour.
    #[must_use]
    pub fn extract(timestamps: &[DateTime<Utc>]) -> Self {
        let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
        let mut weekend = 0_usize;
        for at in timestamps {
            *hours.entry(at.hour()).or_default() += 1;
            if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
                weekend += 1;
            }
        }

        let mut ranked: Vec<(u32, usize)> = hours.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            weekend_heavy: weekend > timestamps.len() - weekend,
            top_hours: ranked.into_iter().take(TOP_HOURS).map(|(h, _)| h).collect(),
        }
    }

    /// `0.4 * [weekend flags equal] + 0.6 * Jaccard(top hours)`.
    #[must_use]
    pub fn similarity(&self, other: &Self) -> f64 {
        let weekend = if self.weekend_heavy == other.weekend_heavy {
            1.0
        } else {
            0.0
        };
        WEEKEND_WEIGHT.mul_add(weekend, HOUR_WEIGHT * jaccard(&self.top_hours, &other.top_hours))
    }
}

/// Shared tags over the size of the larger set, 0 when both are empty.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn tag_similarity<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        0.0
    } else {
        a.intersection(b).count() as f64 / larger as f64
    }
}

/// Ranks every other case by behavioral similarity to `params.case_id`.
///
/// # Errors
///
/// * If `limit` is zero
/// * If the case or its primary incident is missing
/// * If the provider fails
/// * If `cancel` fires
pub fn find_similar_behavior(
    ctx: &AnalysisContext<'_>,
    params: &BehaviorParams,
    cancel: &CancelToken,
) -> Result<BehaviorResult, AnalyticsError> {
    if params.limit == 0 {
        return Err(AnalyticsError::invalid("limit must be at least 1"));
    }

    let (_, reference) = load_reference(ctx, params.case_id)?;
    let tag_names = ctx.tag_names()?;
    let reference_tags = tag_names_of(&reference, &tag_names);
    let reference_pattern = TimePattern::extract(&[reference.occurred_at]);

    let mut results = Vec::new();
    for case in ctx.provider.all_cases()? {
        if case.id == params.case_id {
            continue;
        }
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

        let tags = tag_names_of(&incident, &tag_names);
        let tag_similarity = tag_similarity(&reference_tags, &tags);
        let time_similarity =
            reference_pattern.similarity(&TimePattern::extract(&[incident.occurred_at]));

        results.push(BehaviorMatch {
            case_id: case.id,
            behavior_score: TAG_WEIGHT.mul_add(tag_similarity, TIME_WEIGHT * time_similarity),
            tag_similarity,
            time_similarity,
        });
    }

    results.sort_by(|a, b| {
        b.behavior_score
            .total_cmp(&a.behavior_score)
            .then_with(|| a.case_id.cmp(&b.case_id))
    });
    results.truncate(params.limit);

    log::debug!(
        "Case {}: {} behavioral matches",
        params.case_id,
        results.len()
    );

    Ok(BehaviorResult {
        reference_case_id: params.case_id,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureBuilder, TestEngine, ts};
    use crime_intel_crime_models::CaseStatus;

    // 2024-03-09 is a Saturday, 2024-03-12 a Tuesday.
    fn scenario() -> TestEngine {
        FixtureBuilder::new()
            .tag(1, "burglary")
            .tag(2, "night")
            .tag(3, "forced-entry")
            .incident(10, 40.0, -75.0, ts(2024, 3, 9, 23), &[1, 2])
            .incident(20, 40.1, -75.0, ts(2024, 3, 16, 23), &[1, 2])
            .incident(30, 40.2, -75.0, ts(2024, 3, 12, 9), &[1, 3])
            .incident(40, 40.3, -75.0, ts(2024, 3, 13, 14), &[3])
            .case(1, 10, CaseStatus::Open)
            .case(2, 20, CaseStatus::Open)
            .case(3, 30, CaseStatus::Open)
            .case(4, 40, CaseStatus::Closed)
            .build()
    }

    #[test]
    fn extracts_weekend_flag_and_top_hours() {
        let pattern = TimePattern::extract(&[
            ts(2024, 3, 9, 23),
            ts(2024, 3, 10, 23),
            ts(2024, 3, 11, 2),
            ts(2024, 3, 12, 5),
            ts(2024, 3, 16, 5),
        ]);
        assert!(pattern.weekend_heavy);
        assert_eq!(pattern.top_hours, [2, 5, 23].into_iter().collect());

        let empty = TimePattern::extract(&[]);
        assert!(!empty.weekend_heavy);
        assert!(empty.top_hours.is_empty());
    }

    #[test]
    fn identical_behavior_ranks_first() {
        let engine = scenario();
        let result =
            find_similar_behavior(&engine.ctx(), &BehaviorParams::new(1), &CancelToken::new())
                .unwrap();

        let ids: Vec<i64> = result.results.iter().map(|m| m.case_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        let best = &result.results[0];
        assert!((best.tag_similarity - 1.0).abs() < 1e-12);
        assert!((best.time_similarity - 1.0).abs() < 1e-12);
        assert!((best.behavior_score - 1.0).abs() < 1e-12);

        let partial = &result.results[1];
        assert!((partial.tag_similarity - 0.5).abs() < 1e-12);
        assert!(partial.time_similarity.abs() < 1e-12);
        assert!((partial.behavior_score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn limit_truncates_and_zero_is_rejected() {
        let engine = scenario();
        let ctx = engine.ctx();
        let cancel = CancelToken::new();

        let mut params = BehaviorParams::new(1);
        params.limit = 1;
        assert_eq!(
            find_similar_behavior(&ctx, &params, &cancel)
                .unwrap()
                .results
                .len(),
            1
        );

        params.limit = 0;
        assert_eq!(
            find_similar_behavior(&ctx, &params, &cancel)
                .unwrap_err()
                .kind(),
            "invalid_query"
        );
    }

    #[test]
    fn missing_reference_is_not_found() {
        let engine = scenario();
        let err = find_similar_behavior(
            &engine.ctx(),
            &BehaviorParams::new(99),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
