#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Read-only data access for the intelligence engine.
//!
//! The engine never talks to a database directly. It consumes the
//! [`DataProvider`] trait, which hands out plain record values and never
//! mutates anything. [`Snapshot`] is the in-memory implementation: it is
//! built once from a JSON export (or, with the `duckdb` feature, from a
//! `DuckDB` file), validated, indexed, and then shared read-only across
//! requests.

pub mod db;
#[cfg(feature = "duckdb")]
pub mod duckdb_loader;
pub mod snapshot;

use crime_intel_database_models::{
    BoundingBox, CaseRecord, CasePersonLink, GeoPoint, IncidentRecord, PersonRecord, TagRecord,
};

pub use snapshot::{Snapshot, SnapshotData};

/// Errors that can occur while loading or reading provider data.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Snapshot file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `DuckDB` query failed.
    #[cfg(feature = "duckdb")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Relations in the data violate a model invariant.
    #[error("Integrity error: {message}")]
    Integrity {
        /// Description of the violated invariant.
        message: String,
    },

    /// A stored value could not be converted to its model type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read-only access to incidents, cases, tags, and persons.
///
/// Every method returns fully materialized values and is
/// snapshot-consistent within one call. Implementations must be safe to
/// share across threads.
pub trait DataProvider: Send + Sync {
    /// Incidents whose location lies inside `bbox` (inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn incidents_in_bounding_box(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<IncidentRecord>, ProviderError>;

    /// Incidents within `radius_meters` (great-circle) of `center`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn incidents_in_radius(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<IncidentRecord>, ProviderError>;

    /// Every incident in the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn all_incidents(&self) -> Result<Vec<IncidentRecord>, ProviderError>;

    /// Looks up one incident.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, ProviderError>;

    /// Looks up one case.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn case_by_id(&self, id: i64) -> Result<Option<CaseRecord>, ProviderError>;

    /// Looks up the case anchored to an incident.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn case_by_incident_id(&self, incident_id: i64) -> Result<Option<CaseRecord>, ProviderError>;

    /// Every case in the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn all_cases(&self) -> Result<Vec<CaseRecord>, ProviderError>;

    /// Tags attached to an incident.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn tags_for_incident(&self, incident_id: i64) -> Result<Vec<TagRecord>, ProviderError>;

    /// Tags attached to a case (the tags of its primary incident).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn tags_for_case(&self, case_id: i64) -> Result<Vec<TagRecord>, ProviderError>;

    /// Every tag in the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn all_tags(&self) -> Result<Vec<TagRecord>, ProviderError>;

    /// Person links of a case.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn persons_for_case(&self, case_id: i64) -> Result<Vec<CasePersonLink>, ProviderError>;

    /// Case links of a person.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn cases_for_person(&self, person_id: i64) -> Result<Vec<CasePersonLink>, ProviderError>;

    /// Looks up one person.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the underlying store fails.
    fn person_by_id(&self, id: i64) -> Result<Option<PersonRecord>, ProviderError>;
}
