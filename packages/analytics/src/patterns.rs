//! Tag co-occurrence and repeat-offender analysis.
//!
//! Every analysis here runs over an [`AnalysisSnapshot`]: the incidents in
//! scope of one request, with their cases, tag names, and person links
//! materialized up front.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use crime_intel_analytics_models::{
    AnalysisFilter, PatternParams, PatternReport, RepeatOffender, RepeatOffenderParams,
    SuspectPattern, TagCombination, TagPairCount,
};
use crime_intel_crime_models::PersonRole;
use crime_intel_database_models::{CasePersonLink, CaseRecord, IncidentRecord, PersonRecord};
use crime_intel_spatial::{CancelToken, IncidentFilter, SpatialQuery};

use crate::{AnalysisContext, AnalyticsError, check_cancel, count_u32, tag_names_of};

/// Incidents in scope of one request, with everything attached to them.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSnapshot {
    /// In-scope incidents, ascending by id.
    pub incidents: Vec<IncidentRecord>,
    /// Tag id to name.
    pub tag_names: BTreeMap<i64, String>,
    /// Case anchored to each in-scope incident.
    pub case_by_incident: BTreeMap<i64, CaseRecord>,
    /// Person links of each in-scope case.
    pub links_by_case: BTreeMap<i64, Vec<CasePersonLink>>,
    /// Every person linked to an in-scope case.
    pub persons: BTreeMap<i64, PersonRecord>,
}

fn spatial_query(filter: &AnalysisFilter) -> Result<Option<SpatialQuery>, AnalyticsError> {
    Ok(SpatialQuery::from_parts(
        filter.bbox,
        filter.center.map(|c| c.latitude),
        filter.center.map(|c| c.longitude),
        filter.radius_meters,
    )?)
}

impl AnalysisSnapshot {
    /// Collects the incidents matching `filter` and their relations.
    ///
    /// # Errors
    ///
    /// * If the filter is invalid
    /// * If `filter.case_id` names a missing case
    /// * If the provider fails
    /// * If `cancel` fires
    pub fn collect(
        ctx: &AnalysisContext<'_>,
        filter: &AnalysisFilter,
        cancel: &CancelToken,
    ) -> Result<Self, AnalyticsError> {
        let query = spatial_query(filter)?;
        let incident_filter = IncidentFilter::default()
            .with_date_range(filter.date_range)
            .with_tag_names(filter.tags.iter().cloned());

        let only_incident = match filter.case_id {
            Some(case_id) => Some(
                ctx.provider
                    .case_by_id(case_id)?
                    .ok_or_else(|| AnalyticsError::not_found(format!("Case {case_id} not found")))?
                    .primary_incident_id,
            ),
            None => None,
        };

        let mut incidents = ctx
            .adapter()
            .select(query.as_ref(), &incident_filter, cancel)?
            .into_vec();
        if let Some(incident_id) = only_incident {
            incidents.retain(|i| i.id == incident_id);
        }

        let mut snapshot = Self {
            tag_names: ctx.tag_names()?,
            ..Self::default()
        };

        for incident in &incidents {
            check_cancel(cancel)?;
            let Some(case) = ctx.provider.case_by_incident_id(incident.id)? else {
                continue;
            };
            let links = ctx.provider.persons_for_case(case.id)?;
            for link in &links {
                if snapshot.persons.contains_key(&link.person_id) {
                    continue;
                }
                let person = ctx.provider.person_by_id(link.person_id)?.ok_or_else(|| {
                    AnalyticsError::integrity(format!(
                        "Case {} links unknown person {}",
                        case.id, link.person_id
                    ))
                })?;
                snapshot.persons.insert(person.id, person);
            }
            snapshot.links_by_case.insert(case.id, links);
            snapshot.case_by_incident.insert(incident.id, case);
        }
        snapshot.incidents = incidents;

        log::debug!(
            "Analysis scope: {} incidents, {} cases, {} persons",
            snapshot.incidents.len(),
            snapshot.case_by_incident.len(),
            snapshot.persons.len()
        );

        Ok(snapshot)
    }

    /// Sorted tag names of an incident.
    #[must_use]
    pub fn tags_of(&self, incident: &IncidentRecord) -> BTreeSet<&str> {
        tag_names_of(incident, &self.tag_names)
    }

    /// In-scope cases with their primary incident, ascending by case id.
    pub fn cases(&self) -> impl Iterator<Item = (&CaseRecord, &IncidentRecord)> {
        let mut pairs: Vec<(&CaseRecord, &IncidentRecord)> = self
            .incidents
            .iter()
            .filter_map(|i| self.case_by_incident.get(&i.id).map(|c| (c, i)))
            .collect();
        pairs.sort_by_key(|(c, _)| c.id);
        pairs.into_iter()
    }

    /// Ids of persons linked to `case_id` with `role`.
    #[must_use]
    pub fn persons_with_role(&self, case_id: i64, role: PersonRole) -> BTreeSet<i64> {
        self.links_by_case
            .get(&case_id)
            .into_iter()
            .flatten()
            .filter(|l| l.role == role)
            .map(|l| l.person_id)
            .collect()
    }
}

fn validate_min(name: &str, value: u32) -> Result<(), AnalyticsError> {
    if value < 1 {
        return Err(AnalyticsError::invalid(format!("{name} must be at least 1")));
    }
    Ok(())
}

/// Incidents carrying both tags of each unordered pair.
///
/// Pairs seen fewer than `min_occurrence` times are dropped. Ordered by
/// count (desc), then pair.
#[must_use]
pub fn tag_pair_correlations(snapshot: &AnalysisSnapshot, min_occurrence: u32) -> Vec<TagPairCount> {
    let mut counts: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for incident in &snapshot.incidents {
        let tags: Vec<&str> = snapshot.tags_of(incident).into_iter().collect();
        for (i, &first) in tags.iter().enumerate() {
            for &second in &tags[i + 1..] {
                *counts.entry((first, second)).or_default() += 1;
            }
        }
    }

    let mut pairs: Vec<TagPairCount> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_occurrence)
        .map(|((first, second), count)| TagPairCount {
            first: first.to_string(),
            second: second.to_string(),
            count,
        })
        .collect();
    pairs.sort_by(|a, b| b.count.cmp(&a.count));
    pairs
}

/// Incidents carrying exactly each full tag set of two or more tags.
///
/// Same threshold and ordering as [`tag_pair_correlations`].
#[must_use]
pub fn tag_combinations(snapshot: &AnalysisSnapshot, min_occurrence: u32) -> Vec<TagCombination> {
    let mut counts: BTreeMap<Vec<&str>, u32> = BTreeMap::new();
    for incident in &snapshot.incidents {
        let tags: Vec<&str> = snapshot.tags_of(incident).into_iter().collect();
        if tags.len() >= 2 {
            *counts.entry(tags).or_default() += 1;
        }
    }

    let mut combinations: Vec<TagCombination> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_occurrence)
        .map(|(tags, count)| TagCombination {
            tags: tags.into_iter().map(str::to_string).collect(),
            count,
        })
        .collect();
    combinations.sort_by(|a, b| b.count.cmp(&a.count));
    combinations
}

fn cases_per_person(snapshot: &AnalysisSnapshot, role: PersonRole) -> BTreeMap<i64, BTreeSet<i64>> {
    let mut by_person: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (case, _) in snapshot.cases() {
        for person_id in snapshot.persons_with_role(case.id, role) {
            by_person.entry(person_id).or_default().insert(case.id);
        }
    }
    by_person
}

/// Suspects linked to at least `min_occurrence` in-scope cases, by case
/// count (desc), then person id.
#[must_use]
pub fn suspect_patterns(snapshot: &AnalysisSnapshot, min_occurrence: u32) -> Vec<SuspectPattern> {
    let mut patterns: Vec<SuspectPattern> = cases_per_person(snapshot, PersonRole::Suspect)
        .into_iter()
        .map(|(person_id, cases)| SuspectPattern {
            person_id,
            case_count: count_u32(cases.len()),
        })
        .filter(|p| p.case_count >= min_occurrence)
        .collect();
    patterns.sort_by(|a, b| b.case_count.cmp(&a.case_count));
    patterns
}

/// Tag pairs, tag combinations, and suspect patterns for one scope.
///
/// # Errors
///
/// * If `min_occurrence` is zero or the filter is invalid
/// * If the provider fails
/// * If `cancel` fires
pub fn analyze_patterns(
    ctx: &AnalysisContext<'_>,
    params: &PatternParams,
    cancel: &CancelToken,
) -> Result<PatternReport, AnalyticsError> {
    validate_min("min_occurrence", params.min_occurrence)?;
    let snapshot = AnalysisSnapshot::collect(ctx, &params.filter, cancel)?;

    Ok(PatternReport {
        tag_pairs: tag_pair_correlations(&snapshot, params.min_occurrence),
        tag_combinations: tag_combinations(&snapshot, params.min_occurrence),
        suspect_patterns: suspect_patterns(&snapshot, params.min_occurrence),
    })
}

/// Persons linked with `params.role` to at least `params.min_cases`
/// in-scope cases, by case count (desc), then person id.
///
/// # Errors
///
/// * If a qualifying person is missing from `snapshot.persons`
pub fn repeat_offenders(
    snapshot: &AnalysisSnapshot,
    params: &RepeatOffenderParams,
) -> Result<Vec<RepeatOffender>, AnalyticsError> {
    let incident_of: BTreeMap<i64, &IncidentRecord> =
        snapshot.cases().map(|(c, i)| (c.id, i)).collect();

    let mut offenders: Vec<RepeatOffender> = cases_per_person(snapshot, params.role)
        .into_iter()
        .filter(|(_, cases)| count_u32(cases.len()) >= params.min_cases)
        .map(|(person_id, cases)| {
            let person = snapshot.persons.get(&person_id).ok_or_else(|| {
                AnalyticsError::integrity(format!("Person {person_id} is linked but missing"))
            })?;

            let mut signatures: BTreeMap<BTreeSet<&str>, u32> = BTreeMap::new();
            let mut last_seen: Option<DateTime<Utc>> = None;
            for incident in cases.iter().filter_map(|id| incident_of.get(id)) {
                *signatures.entry(snapshot.tags_of(incident)).or_default() += 1;
                last_seen = last_seen.max(Some(incident.occurred_at));
            }

            Ok(RepeatOffender {
                person_id,
                name: person.name.clone(),
                case_count: count_u32(cases.len()),
                pattern_match_count: count_u32(signatures.values().filter(|n| **n > 1).count()),
                last_seen,
            })
        })
        .collect::<Result<_, AnalyticsError>>()?;
    offenders.sort_by(|a, b| b.case_count.cmp(&a.case_count));
    Ok(offenders)
}

/// Collects the scope of `params.filter` and finds repeat offenders in it.
///
/// # Errors
///
/// * If `min_cases` is zero or the filter is invalid
/// * If the provider fails
/// * If `cancel` fires
pub fn find_repeat_offenders(
    ctx: &AnalysisContext<'_>,
    params: &RepeatOffenderParams,
    cancel: &CancelToken,
) -> Result<Vec<RepeatOffender>, AnalyticsError> {
    validate_min("min_cases", params.min_cases)?;
    let snapshot = AnalysisSnapshot::collect(ctx, &params.filter, cancel)?;
    let offenders = repeat_offenders(&snapshot, params)?;
    log::debug!("Found {} repeat offenders", offenders.len());
    Ok(offenders)
}
