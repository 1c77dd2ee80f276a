//! In-memory, validated snapshot of the incident/case/tag/person store.
//!
//! A [`Snapshot`] is immutable once built. Incident locations are indexed
//! in an R-tree so bounding-box and radius lookups never scan every
//! incident.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crime_intel_database_models::{
    BoundingBox, CasePersonLink, CaseRecord, GeoPoint, IncidentRecord, PersonRecord, TagRecord,
};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::{DataProvider, ProviderError};

/// Raw, unvalidated snapshot contents as exported by the persistence layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    /// All incidents.
    #[serde(default)]
    pub incidents: Vec<IncidentRecord>,
    /// All cases.
    #[serde(default)]
    pub cases: Vec<CaseRecord>,
    /// All persons.
    #[serde(default)]
    pub persons: Vec<PersonRecord>,
    /// All tags.
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    /// Case-person relation rows.
    #[serde(default)]
    pub case_persons: Vec<CasePersonLink>,
}

/// An incident location stored in the R-tree.
struct IncidentPoint {
    id: i64,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IncidentPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Validated, indexed, read-only store.
pub struct Snapshot {
    incidents: BTreeMap<i64, IncidentRecord>,
    cases: BTreeMap<i64, CaseRecord>,
    case_by_incident: BTreeMap<i64, i64>,
    persons: BTreeMap<i64, PersonRecord>,
    tags: BTreeMap<i64, TagRecord>,
    links_by_case: BTreeMap<i64, BTreeSet<CasePersonLink>>,
    links_by_person: BTreeMap<i64, BTreeSet<CasePersonLink>>,
    locations: RTree<IncidentPoint>,
}

fn integrity(message: String) -> ProviderError {
    ProviderError::Integrity { message }
}

impl Snapshot {
    /// Validates `data` and builds the lookup indexes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Integrity`] if ids repeat, a case's primary
    /// incident is missing or shared with another case, or a relation
    /// references an unknown record.
    pub fn from_data(data: SnapshotData) -> Result<Self, ProviderError> {
        let mut tags = BTreeMap::new();
        for tag in data.tags {
            if tags.insert(tag.id, tag.clone()).is_some() {
                return Err(integrity(format!("Duplicate tag id {}", tag.id)));
            }
        }

        let mut incidents = BTreeMap::new();
        let mut points = Vec::new();
        for incident in data.incidents {
            if let Some(unknown) = incident.tag_ids.iter().find(|id| !tags.contains_key(id)) {
                return Err(integrity(format!(
                    "Incident {} references unknown tag {unknown}",
                    incident.id
                )));
            }

            if incident.location().is_valid() {
                points.push(IncidentPoint {
                    id: incident.id,
                    lng: incident.longitude,
                    lat: incident.latitude,
                });
            } else {
                log::warn!(
                    "Incident {} has an invalid location ({}, {}); excluding it from spatial lookups",
                    incident.id,
                    incident.latitude,
                    incident.longitude
                );
            }

            let id = incident.id;
            if incidents.insert(id, incident).is_some() {
                return Err(integrity(format!("Duplicate incident id {id}")));
            }
        }

        let mut cases = BTreeMap::new();
        let mut case_by_incident = BTreeMap::new();
        for case in data.cases {
            if !incidents.contains_key(&case.primary_incident_id) {
                return Err(integrity(format!(
                    "Case {} references missing primary incident {}",
                    case.id, case.primary_incident_id
                )));
            }
            if let Some(other) = case_by_incident.insert(case.primary_incident_id, case.id) {
                return Err(integrity(format!(
                    "Incident {} is the primary incident of both case {other} and case {}",
                    case.primary_incident_id, case.id
                )));
            }
            let id = case.id;
            if cases.insert(id, case).is_some() {
                return Err(integrity(format!("Duplicate case id {id}")));
            }
        }

        let mut persons = BTreeMap::new();
        for person in data.persons {
            let id = person.id;
            if persons.insert(id, person).is_some() {
                return Err(integrity(format!("Duplicate person id {id}")));
            }
        }

        let mut links_by_case: BTreeMap<i64, BTreeSet<CasePersonLink>> = BTreeMap::new();
        let mut links_by_person: BTreeMap<i64, BTreeSet<CasePersonLink>> = BTreeMap::new();
        for link in data.case_persons {
            if !cases.contains_key(&link.case_id) {
                return Err(integrity(format!(
                    "Case-person link references unknown case {}",
                    link.case_id
                )));
            }
            if !persons.contains_key(&link.person_id) {
                return Err(integrity(format!(
                    "Case-person link references unknown person {}",
                    link.person_id
                )));
            }
            links_by_case.entry(link.case_id).or_default().insert(link);
            links_by_person.entry(link.person_id).or_default().insert(link);
        }

        log::info!(
            "Loaded snapshot: {} incidents, {} cases, {} persons, {} tags",
            incidents.len(),
            cases.len(),
            persons.len(),
            tags.len()
        );

        Ok(Self {
            incidents,
            cases,
            case_by_incident,
            persons,
            tags,
            links_by_case,
            links_by_person,
            locations: RTree::bulk_load(points),
        })
    }

    /// Parses and validates a JSON snapshot export.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the JSON is malformed or fails
    /// validation.
    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        let data: SnapshotData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    /// Reads, parses, and validates a JSON snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the file cannot be read, is malformed,
    /// or fails validation.
    pub fn load_json(path: &Path) -> Result<Self, ProviderError> {
        log::info!("Loading snapshot from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn incidents_for_ids(&self, ids: impl Iterator<Item = i64>) -> Vec<IncidentRecord> {
        let ids: BTreeSet<i64> = ids.collect();
        ids.iter()
            .filter_map(|id| self.incidents.get(id))
            .cloned()
            .collect()
    }

    fn tags_for_ids(&self, ids: &BTreeSet<i64>) -> Vec<TagRecord> {
        ids.iter().filter_map(|id| self.tags.get(id)).cloned().collect()
    }
}

impl DataProvider for Snapshot {
    fn incidents_in_bounding_box(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<IncidentRecord>, ProviderError> {
        let envelope = AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north]);
        Ok(self.incidents_for_ids(
            self.locations
                .locate_in_envelope_intersecting(&envelope)
                .map(|p| p.id),
        ))
    }

    fn incidents_in_radius(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<IncidentRecord>, ProviderError> {
        let bbox = BoundingBox::around(center, radius_meters);
        let mut incidents = self.incidents_in_bounding_box(&bbox)?;
        incidents.retain(|i| center.haversine_distance(&i.location()) <= radius_meters);
        Ok(incidents)
    }

    fn all_incidents(&self) -> Result<Vec<IncidentRecord>, ProviderError> {
        Ok(self.incidents.values().cloned().collect())
    }

    fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, ProviderError> {
        Ok(self.incidents.get(&id).cloned())
    }

    fn case_by_id(&self, id: i64) -> Result<Option<CaseRecord>, ProviderError> {
        Ok(self.cases.get(&id).cloned())
    }

    fn case_by_incident_id(&self, incident_id: i64) -> Result<Option<CaseRecord>, ProviderError> {
        Ok(self
            .case_by_incident
            .get(&incident_id)
            .and_then(|case_id| self.cases.get(case_id))
            .cloned())
    }

    fn all_cases(&self) -> Result<Vec<CaseRecord>, ProviderError> {
        Ok(self.cases.values().cloned().collect())
    }

    fn tags_for_incident(&self, incident_id: i64) -> Result<Vec<TagRecord>, ProviderError> {
        Ok(self
            .incidents
            .get(&incident_id)
            .map(|i| self.tags_for_ids(&i.tag_ids))
            .unwrap_or_default())
    }

    fn tags_for_case(&self, case_id: i64) -> Result<Vec<TagRecord>, ProviderError> {
        match self.cases.get(&case_id) {
            Some(case) => self.tags_for_incident(case.primary_incident_id),
            None => Ok(Vec::new()),
        }
    }

    fn all_tags(&self) -> Result<Vec<TagRecord>, ProviderError> {
        Ok(self.tags.values().cloned().collect())
    }

    fn persons_for_case(&self, case_id: i64) -> Result<Vec<CasePersonLink>, ProviderError> {
        Ok(self
            .links_by_case
            .get(&case_id)
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default())
    }

    fn cases_for_person(&self, person_id: i64) -> Result<Vec<CasePersonLink>, ProviderError> {
        Ok(self
            .links_by_person
            .get(&person_id)
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default())
    }

    fn person_by_id(&self, id: i64) -> Result<Option<PersonRecord>, ProviderError> {
        Ok(self.persons.get(&id).cloned())
    }
}
