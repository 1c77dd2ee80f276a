//! Snapshot builders shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone as _, Utc};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use crime_intel_database::{DataProvider, ProviderError, Snapshot, SnapshotData};
use crime_intel_database_models::{
    BoundingBox, CasePersonLink, CaseRecord, GeoPoint, IncidentRecord, METERS_PER_DEGREE,
    PersonRecord, TagRecord,
};
use crime_intel_spatial::CancelToken;

use crate::{AnalysisContext, EngineConfig};

pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// Degrees of latitude spanning `meters`.
pub fn lat_offset(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

#[derive(Default)]
pub struct FixtureBuilder {
    data: SnapshotData,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, id: i64, name: &str) -> Self {
        self.data.tags.push(TagRecord {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn incident(
        mut self,
        id: i64,
        lat: f64,
        lng: f64,
        occurred_at: DateTime<Utc>,
        tag_ids: &[i64],
    ) -> Self {
        self.data.incidents.push(IncidentRecord {
            id,
            incident_type: "theft".to_string(),
            description: None,
            occurred_at,
            latitude: lat,
            longitude: lng,
            district: None,
            tag_ids: tag_ids.iter().copied().collect(),
        });
        self
    }

    pub fn district(mut self, incident_id: i64, district: &str) -> Self {
        if let Some(incident) = self
            .data
            .incidents
            .iter_mut()
            .find(|i| i.id == incident_id)
        {
            incident.district = Some(district.to_string());
        }
        self
    }

    pub fn case(mut self, id: i64, primary_incident_id: i64, status: CaseStatus) -> Self {
        self.data.cases.push(CaseRecord {
            id,
            title: format!("Case {id}"),
            status,
            primary_incident_id,
            assigned_officer_id: None,
            created_at: ts(2024, 1, 1, 0),
            notes: None,
        });
        self
    }

    pub fn officer(mut self, case_id: i64, officer_id: i64) -> Self {
        if let Some(case) = self.data.cases.iter_mut().find(|c| c.id == case_id) {
            case.assigned_officer_id = Some(officer_id);
        }
        self
    }

    pub fn person(mut self, id: i64, name: &str) -> Self {
        self.data.persons.push(PersonRecord {
            id,
            name: name.to_string(),
            date_of_birth: None,
            phone: None,
            address: None,
        });
        self
    }

    pub fn link(mut self, case_id: i64, person_id: i64, role: PersonRole) -> Self {
        self.data.case_persons.push(CasePersonLink {
            case_id,
            person_id,
            role,
        });
        self
    }

    pub fn suspect(self, case_id: i64, person_id: i64) -> Self {
        self.link(case_id, person_id, PersonRole::Suspect)
    }

    pub fn build(self) -> TestEngine {
        TestEngine::new(Snapshot::from_data(self.data).unwrap())
    }
}

pub struct TestEngine {
    pub snapshot: Snapshot,
    pub config: EngineConfig,
    pub pool: rayon::ThreadPool,
}

impl TestEngine {
    pub fn new(snapshot: Snapshot) -> Self {
        let config = EngineConfig {
            parallelism: 2,
            ..EngineConfig::default()
        };
        let pool = config.build_pool().unwrap();
        Self {
            snapshot,
            config,
            pool,
        }
    }

    pub fn snapshot_incidents(&self) -> Vec<IncidentRecord> {
        self.snapshot.all_incidents().unwrap()
    }

    pub fn ctx(&self) -> AnalysisContext<'_> {
        AnalysisContext::new(&self.snapshot, &self.config, &self.pool)
    }

    pub fn ctx_with<'a>(&'a self, provider: &'a dyn DataProvider) -> AnalysisContext<'a> {
        AnalysisContext::new(provider, &self.config, &self.pool)
    }
}

/// Provider calls that can trip a [`FaultyProvider`]'s cancel token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Scan,
    AllCases,
    PersonsForCase,
}

/// Wraps a snapshot to hide records or cancel a token partway through a
/// run, which a validated snapshot never does on its own.
pub struct FaultyProvider<'a> {
    inner: &'a Snapshot,
    hidden_incidents: BTreeSet<i64>,
    hidden_persons: BTreeSet<i64>,
    trip: Option<(Call, usize, CancelToken)>,
    calls: AtomicUsize,
}

impl<'a> FaultyProvider<'a> {
    pub fn new(inner: &'a Snapshot) -> Self {
        Self {
            inner,
            hidden_incidents: BTreeSet::new(),
            hidden_persons: BTreeSet::new(),
            trip: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn hide_incident(mut self, id: i64) -> Self {
        self.hidden_incidents.insert(id);
        self
    }

    pub fn hide_person(mut self, id: i64) -> Self {
        self.hidden_persons.insert(id);
        self
    }

    /// Cancels `token` on the `nth` (1-based) call of kind `call`.
    pub fn cancel_on(mut self, call: Call, nth: usize, token: &CancelToken) -> Self {
        self.trip = Some((call, nth, token.clone()));
        self
    }

    fn record(&self, call: Call) {
        let Some((kind, nth, token)) = &self.trip else {
            return;
        };
        if *kind == call && self.calls.fetch_add(1, Ordering::SeqCst) + 1 == *nth {
            token.cancel();
        }
    }
}

impl DataProvider for FaultyProvider<'_> {
    fn incidents_in_bounding_box(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<IncidentRecord>, ProviderError> {
        self.record(Call::Scan);
        self.inner.incidents_in_bounding_box(bbox)
    }

    fn incidents_in_radius(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<IncidentRecord>, ProviderError> {
        self.record(Call::Scan);
        self.inner.incidents_in_radius(center, radius_meters)
    }

    fn all_incidents(&self) -> Result<Vec<IncidentRecord>, ProviderError> {
        self.record(Call::Scan);
        self.inner.all_incidents()
    }

    fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, ProviderError> {
        if self.hidden_incidents.contains(&id) {
            return Ok(None);
        }
        self.inner.incident_by_id(id)
    }

    fn case_by_id(&self, id: i64) -> Result<Option<CaseRecord>, ProviderError> {
        self.inner.case_by_id(id)
    }

    fn case_by_incident_id(&self, incident_id: i64) -> Result<Option<CaseRecord>, ProviderError> {
        self.inner.case_by_incident_id(incident_id)
    }

    fn all_cases(&self) -> Result<Vec<CaseRecord>, ProviderError> {
        self.record(Call::AllCases);
        self.inner.all_cases()
    }

    fn tags_for_incident(&self, incident_id: i64) -> Result<Vec<TagRecord>, ProviderError> {
        self.inner.tags_for_incident(incident_id)
    }

    fn tags_for_case(&self, case_id: i64) -> Result<Vec<TagRecord>, ProviderError> {
        self.inner.tags_for_case(case_id)
    }

    fn all_tags(&self) -> Result<Vec<TagRecord>, ProviderError> {
        self.inner.all_tags()
    }

    fn persons_for_case(&self, case_id: i64) -> Result<Vec<CasePersonLink>, ProviderError> {
        self.record(Call::PersonsForCase);
        self.inner.persons_for_case(case_id)
    }

    fn cases_for_person(&self, person_id: i64) -> Result<Vec<CasePersonLink>, ProviderError> {
        self.inner.cases_for_person(person_id)
    }

    fn person_by_id(&self, id: i64) -> Result<Option<PersonRecord>, ProviderError> {
        if self.hidden_persons.contains(&id) {
            return Ok(None);
        }
        self.inner.person_by_id(id)
    }
}
