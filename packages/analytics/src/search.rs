//! Multi-stage case search.
//!
//! A [`SearchQuery`] holds at most one predicate per [`SearchStage`].
//! Predicates may be added in any order; [`run_search`] always applies
//! them in stage order and records how many cases survive each stage.
//! With a spatial predicate the rows start from the spatial candidates;
//! otherwise from every case joined to its primary incident.

use std::collections::{BTreeMap, BTreeSet};

use crime_intel_analytics_models::{
    SearchHit, SearchParams, SearchResponse, SearchStage, StageCount,
};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use crime_intel_database_models::{CaseRecord, DateRange, IncidentRecord};
use crime_intel_spatial::{CancelToken, IncidentFilter, SpatialQuery};

use crate::{AnalysisContext, AnalyticsError, check_cancel, tag_names_of};

/// One search condition.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPredicate {
    /// Primary incident inside a box or radius.
    Spatial(SpatialQuery),
    /// Primary incident inside an occurrence window.
    DateRange(DateRange),
    /// Case status is one of these.
    Status(BTreeSet<CaseStatus>),
    /// Primary incident carries any of these tag names.
    Tags(BTreeSet<String>),
    /// Some suspect's name contains this text, ignoring case.
    SuspectName(String),
    /// Case is assigned to this officer.
    AssignedOfficer(i64),
}

impl SearchPredicate {
    /// The stage this predicate runs in.
    #[must_use]
    pub const fn stage(&self) -> SearchStage {
        match self {
            Self::Spatial(_) => SearchStage::Spatial,
            Self::DateRange(_) => SearchStage::DateRange,
            Self::Status(_) => SearchStage::Status,
            Self::Tags(_) => SearchStage::Tags,
            Self::SuspectName(_) => SearchStage::SuspectName,
            Self::AssignedOfficer(_) => SearchStage::AssignedOfficer,
        }
    }

    fn validate(&self) -> Result<(), AnalyticsError> {
        match self {
            Self::Spatial(query) => Ok(query.validate()?),
            Self::DateRange(range) if range.is_inverted() => Err(AnalyticsError::invalid(
                "date range start must not be after its end",
            )),
            _ => Ok(()),
        }
    }
}

/// A set of predicates keyed by stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    predicates: BTreeMap<SearchStage, SearchPredicate>,
}

impl SearchQuery {
    /// An empty query, which matches every case.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `predicate`, replacing any earlier one for the same stage.
    pub fn add(&mut self, predicate: SearchPredicate) -> &mut Self {
        self.predicates.insert(predicate.stage(), predicate);
        self
    }

    /// Builder form of [`SearchQuery::add`].
    #[must_use]
    pub fn with(mut self, predicate: SearchPredicate) -> Self {
        self.add(predicate);
        self
    }

    /// Predicates in evaluation order.
    pub fn predicates(&self) -> impl Iterator<Item = &SearchPredicate> {
        self.predicates.values()
    }

    /// Whether no predicate has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Validates every predicate.
    ///
    /// # Errors
    ///
    /// * If a spatial predicate is out of range
    /// * If a date range is inverted
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        self.predicates().try_for_each(SearchPredicate::validate)
    }
}

/// Conversion of raw request parameters into a [`SearchQuery`].
pub trait IntoSearchQuery {
    /// Validates and converts.
    ///
    /// # Errors
    ///
    /// * If both a box and a radius are given, or a radius lacks its
    ///   centre
    /// * If any predicate is invalid
    fn into_query(self) -> Result<SearchQuery, AnalyticsError>;
}

impl IntoSearchQuery for SearchParams {
    fn into_query(self) -> Result<SearchQuery, AnalyticsError> {
        let mut query = SearchQuery::new();

        let spatial = SpatialQuery::from_parts(
            self.bbox,
            self.lat,
            self.lng,
            self.radius_km.map(|km| km * 1000.0),
        )?;
        if let Some(spatial) = spatial {
            query.add(SearchPredicate::Spatial(spatial));
        }
        if !self.date_range.is_unbounded() {
            query.add(SearchPredicate::DateRange(self.date_range));
        }
        if !self.statuses.is_empty() {
            query.add(SearchPredicate::Status(self.statuses.into_iter().collect()));
        }
        if !self.tags.is_empty() {
            query.add(SearchPredicate::Tags(self.tags.into_iter().collect()));
        }
        if let Some(name) = self.suspect_name.filter(|n| !n.trim().is_empty()) {
            query.add(SearchPredicate::SuspectName(name.trim().to_string()));
        }
        if let Some(officer) = self.assigned_officer {
            query.add(SearchPredicate::AssignedOfficer(officer));
        }

        query.validate()?;
        Ok(query)
    }
}

struct Row {
    case: CaseRecord,
    incident: IncidentRecord,
}

fn suspect_names(ctx: &AnalysisContext<'_>, case_id: i64) -> Result<Vec<String>, AnalyticsError> {
    let mut names = Vec::new();
    for person_id in ctx.persons_with_role(case_id, PersonRole::Suspect)? {
        if let Some(person) = ctx.provider.person_by_id(person_id)? {
            names.push(person.name);
        }
    }
    names.sort();
    Ok(names)
}

fn apply(
    ctx: &AnalysisContext<'_>,
    predicate: &SearchPredicate,
    rows: Vec<Row>,
    tag_names: &BTreeMap<i64, String>,
    cancel: &CancelToken,
) -> Result<Vec<Row>, AnalyticsError> {
    Ok(match predicate {
        // Applied by `seed_rows`.
        SearchPredicate::Spatial(_) => rows,
        SearchPredicate::DateRange(range) => rows
            .into_iter()
            .filter(|r| range.contains(&r.incident.occurred_at))
            .collect(),
        SearchPredicate::Status(statuses) => rows
            .into_iter()
            .filter(|r| statuses.contains(&r.case.status))
            .collect(),
        SearchPredicate::Tags(tags) => rows
            .into_iter()
            .filter(|r| {
                tag_names_of(&r.incident, tag_names)
                    .iter()
                    .any(|name| tags.contains(*name))
            })
            .collect(),
        SearchPredicate::SuspectName(needle) => {
            let needle = needle.to_lowercase();
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                check_cancel(cancel)?;
                if suspect_names(ctx, row.case.id)?
                    .iter()
                    .any(|name| name.to_lowercase().contains(&needle))
                {
                    kept.push(row);
                }
            }
            kept
        }
        SearchPredicate::AssignedOfficer(officer) => rows
            .into_iter()
            .filter(|r| r.case.assigned_officer_id == Some(*officer))
            .collect(),
    })
}

/// Starting rows: the cases anchored to the spatial candidates, or every
/// case when there is no spatial predicate.
fn seed_rows(
    ctx: &AnalysisContext<'_>,
    spatial: Option<&SpatialQuery>,
    cancel: &CancelToken,
) -> Result<Vec<Row>, AnalyticsError> {
    let mut rows = Vec::new();
    if let Some(spatial) = spatial {
        let candidates = ctx
            .adapter()
            .candidates(spatial, &IncidentFilter::default(), cancel)?;
        for incident in candidates.into_vec() {
            check_cancel(cancel)?;
            if let Some(case) = ctx.provider.case_by_incident_id(incident.id)? {
                rows.push(Row { case, incident });
            }
        }
        return Ok(rows);
    }

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
        rows.push(Row { case, incident });
    }
    Ok(rows)
}

fn page_size(ctx: &AnalysisContext<'_>, limit: Option<usize>) -> Result<usize, AnalyticsError> {
    let search = &ctx.config.search;
    match limit {
        None => Ok(search.default_limit),
        Some(0) => Err(AnalyticsError::invalid("limit must be at least 1")),
        Some(n) => Ok(n.min(search.max_limit)),
    }
}

/// Runs `query` and returns one page of hits, newest first.
///
/// `limit` defaults to the configured page size and is capped at the
/// configured maximum.
///
/// # Errors
///
/// * If the query or `limit` is invalid
/// * If the provider fails
/// * If `cancel` fires
pub fn run_search(
    ctx: &AnalysisContext<'_>,
    query: &SearchQuery,
    limit: Option<usize>,
    cancel: &CancelToken,
) -> Result<SearchResponse, AnalyticsError> {
    query.validate()?;
    let limit = page_size(ctx, limit)?;
    let tag_names = ctx.tag_names()?;

    let spatial = match query.predicates.get(&SearchStage::Spatial) {
        Some(SearchPredicate::Spatial(spatial)) => Some(spatial),
        _ => None,
    };
    let mut rows = seed_rows(ctx, spatial, cancel)?;

    let mut stages = Vec::new();
    for predicate in query.predicates() {
        check_cancel(cancel)?;
        rows = apply(ctx, predicate, rows, &tag_names, cancel)?;
        log::debug!("Search stage {}: {} cases remain", predicate.stage(), rows.len());
        stages.push(StageCount {
            stage: predicate.stage(),
            remaining: rows.len(),
        });
    }

    rows.sort_by(|a, b| {
        b.incident
            .occurred_at
            .cmp(&a.incident.occurred_at)
            .then_with(|| a.case.id.cmp(&b.case.id))
    });
    let total = rows.len();

    let mut results = Vec::with_capacity(limit.min(total));
    for Row { case, incident } in rows.into_iter().take(limit) {
        check_cancel(cancel)?;
        let location = incident.location();
        results.push(SearchHit {
            tags: tag_names_of(&incident, &tag_names)
                .into_iter()
                .map(str::to_string)
                .collect(),
            suspects: suspect_names(ctx, case.id)?,
            case_id: case.id,
            title: case.title,
            status: case.status,
            incident_id: incident.id,
            incident_type: incident.incident_type,
            occurred_at: incident.occurred_at,
            location,
            assigned_officer_id: case.assigned_officer_id,
        });
    }

    Ok(SearchResponse {
        total,
        results,
        stages,
    })
}

/// Converts `params` and runs the search.
///
/// # Errors
///
/// See [`IntoSearchQuery::into_query`] and [`run_search`].
pub fn search(
    ctx: &AnalysisContext<'_>,
    params: SearchParams,
    cancel: &CancelToken,
) -> Result<SearchResponse, AnalyticsError> {
    let limit = params.limit;
    let query = params.into_query()?;
    run_search(ctx, &query, limit, cancel)
}
