//! Candidate selection against a [`DataProvider`].

use std::collections::{BTreeMap, BTreeSet};

use crime_intel_database::DataProvider;
use crime_intel_database_models::IncidentRecord;

use crate::{CancelToken, IncidentFilter, SpatialError, SpatialQuery};

/// Incidents that passed the spatial and auxiliary prefilter for one
/// query, ordered by incident id with no duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    incidents: Vec<IncidentRecord>,
}

impl CandidateSet {
    /// Sorts by id and drops repeated ids (first occurrence wins).
    #[must_use]
    pub fn from_unsorted(mut incidents: Vec<IncidentRecord>) -> Self {
        incidents.sort_by_key(|i| i.id);
        incidents.dedup_by_key(|i| i.id);
        Self { incidents }
    }

    /// Number of incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// The incidents, ordered by id.
    #[must_use]
    pub fn as_slice(&self) -> &[IncidentRecord] {
        &self.incidents
    }

    /// Iterates incidents in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, IncidentRecord> {
        self.incidents.iter()
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_vec(self) -> Vec<IncidentRecord> {
        self.incidents
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a IncidentRecord;
    type IntoIter = std::slice::Iter<'a, IncidentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.incidents.iter()
    }
}

/// Turns a spatial query plus auxiliary filters into a [`CandidateSet`].
///
/// Spatial narrowing always happens first through the provider's indexed
/// lookups; the date, status, and tag filters then run in that order.
pub struct SpatialIndexAdapter<'a> {
    provider: &'a dyn DataProvider,
}

impl<'a> SpatialIndexAdapter<'a> {
    /// Creates an adapter over `provider`.
    #[must_use]
    pub const fn new(provider: &'a dyn DataProvider) -> Self {
        Self { provider }
    }

    /// Incidents matching `query` and `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// * If the query or filter is invalid
    /// * If the provider fails
    /// * If `cancel` fires
    pub fn candidates(
        &self,
        query: &SpatialQuery,
        filter: &IncidentFilter,
        cancel: &CancelToken,
    ) -> Result<CandidateSet, SpatialError> {
        query.validate()?;
        filter.validate()?;
        cancel.check()?;

        let raw = match query {
            SpatialQuery::BoundingBox(bbox) => self.provider.incidents_in_bounding_box(bbox)?,
            SpatialQuery::Radius {
                center,
                radius_meters,
            } => self.provider.incidents_in_radius(*center, *radius_meters)?,
        };
        let fetched = raw.len();

        let refined: Vec<IncidentRecord> = raw
            .into_iter()
            .filter(|i| {
                let location = i.location();
                location.is_valid() && query.contains(&location)
            })
            .collect();

        log::debug!(
            "Spatial stage: {fetched} fetched, {} after exact refinement",
            refined.len()
        );

        self.apply_filters(CandidateSet::from_unsorted(refined), filter, cancel)
    }

    /// Incidents matching `filter` with no spatial restriction, ordered
    /// by id.
    ///
    /// # Errors
    ///
    /// * If the filter is invalid
    /// * If the provider fails
    /// * If `cancel` fires
    pub fn all_candidates(
        &self,
        filter: &IncidentFilter,
        cancel: &CancelToken,
    ) -> Result<CandidateSet, SpatialError> {
        filter.validate()?;
        cancel.check()?;
        let all = CandidateSet::from_unsorted(self.provider.all_incidents()?);
        self.apply_filters(all, filter, cancel)
    }

    /// Dispatches to [`Self::candidates`] or [`Self::all_candidates`].
    ///
    /// # Errors
    ///
    /// See [`Self::candidates`].
    pub fn select(
        &self,
        query: Option<&SpatialQuery>,
        filter: &IncidentFilter,
        cancel: &CancelToken,
    ) -> Result<CandidateSet, SpatialError> {
        match query {
            Some(query) => self.candidates(query, filter, cancel),
            None => self.all_candidates(filter, cancel),
        }
    }

    fn apply_filters(
        &self,
        candidates: CandidateSet,
        filter: &IncidentFilter,
        cancel: &CancelToken,
    ) -> Result<CandidateSet, SpatialError> {
        if filter.is_empty() {
            return Ok(candidates);
        }

        let mut incidents = candidates.into_vec();

        if !filter.date_range.is_unbounded() {
            incidents.retain(|i| filter.date_range.contains(&i.occurred_at));
            log::debug!("Date stage: {} remaining", incidents.len());
        }
        cancel.check()?;

        if !filter.statuses.is_empty() {
            let mut kept = Vec::with_capacity(incidents.len());
            for incident in incidents {
                cancel.check()?;
                let matches = self
                    .provider
                    .case_by_incident_id(incident.id)?
                    .is_some_and(|case| filter.statuses.contains(&case.status));
                if matches {
                    kept.push(incident);
                }
            }
            incidents = kept;
            log::debug!("Status stage: {} remaining", incidents.len());
        }

        if !filter.tag_names.is_empty() {
            let wanted: BTreeSet<i64> = self
                .tag_ids_by_name()?
                .into_iter()
                .filter(|(name, _)| filter.tag_names.contains(name))
                .map(|(_, id)| id)
                .collect();
            incidents.retain(|i| !i.tag_ids.is_disjoint(&wanted));
            log::debug!("Tag stage: {} remaining", incidents.len());
        }
        cancel.check()?;

        Ok(CandidateSet { incidents })
    }

    fn tag_ids_by_name(&self) -> Result<BTreeMap<String, i64>, SpatialError> {
        Ok(self
            .provider
            .all_tags()?
            .into_iter()
            .map(|t| (t.name, t.id))
            .collect())
    }
}
