#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial intelligence and correlation engine.
//!
//! Each public operation is a stateless function over an
//! [`AnalysisContext`]: it validates its typed parameters, pulls a
//! candidate set through the spatial adapter, computes on the context's
//! thread pool, and returns a typed result from
//! `crime_intel_analytics_models`. [`Engine`] bundles a provider, a
//! configuration, and a pool behind one façade for the server and CLI.

pub mod behavior;
pub mod cluster;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod heatmap;
pub mod patterns;
pub mod risk;
pub mod search;
pub mod stats;

#[cfg(test)]
mod fixtures;

use std::collections::{BTreeMap, BTreeSet};

use crime_intel_analytics_models::CandidateFilter;
use crime_intel_crime_models::PersonRole;
use crime_intel_database::{DataProvider, ProviderError};
use crime_intel_database_models::IncidentRecord;
use crime_intel_spatial::{CancelToken, IncidentFilter, SpatialError, SpatialIndexAdapter};
use thiserror::Error;

pub use config::EngineConfig;
pub use engine::Engine;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Parameters failed validation.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of what was wrong.
        message: String,
    },

    /// A referenced case, incident, or person does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// The operation was cancelled or timed out.
    #[error("Operation cancelled")]
    Cancelled,

    /// The data provider failed.
    #[error("Data provider error: {0}")]
    DataProvider(#[from] ProviderError),

    /// Engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl AnalyticsError {
    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "invalid_query",
            Self::NotFound { .. } => "not_found",
            Self::Cancelled => "cancelled",
            Self::DataProvider(_) => "data_provider",
            Self::Config { .. } => "config",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// A dangling reference in provider data.
    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        Self::DataProvider(ProviderError::Integrity {
            message: message.into(),
        })
    }
}

impl From<SpatialError> for AnalyticsError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::InvalidQuery { message } => Self::InvalidQuery { message },
            SpatialError::Cancelled => Self::Cancelled,
            SpatialError::Provider(e) => Self::DataProvider(e),
        }
    }
}

/// Collaborators every operation needs.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// Read-only data source.
    pub provider: &'a dyn DataProvider,
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Pool for data-parallel stages.
    pub pool: &'a rayon::ThreadPool,
}

impl<'a> AnalysisContext<'a> {
    /// Bundles the collaborators.
    #[must_use]
    pub const fn new(
        provider: &'a dyn DataProvider,
        config: &'a EngineConfig,
        pool: &'a rayon::ThreadPool,
    ) -> Self {
        Self {
            provider,
            config,
            pool,
        }
    }

    /// Spatial adapter over this context's provider.
    #[must_use]
    pub const fn adapter(&self) -> SpatialIndexAdapter<'a> {
        SpatialIndexAdapter::new(self.provider)
    }

    /// Tag id to tag name.
    pub(crate) fn tag_names(&self) -> Result<BTreeMap<i64, String>, AnalyticsError> {
        Ok(self
            .provider
            .all_tags()?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect())
    }

    /// Ids of the persons linked to `case_id` with `role`.
    pub(crate) fn persons_with_role(
        &self,
        case_id: i64,
        role: PersonRole,
    ) -> Result<BTreeSet<i64>, AnalyticsError> {
        Ok(self
            .provider
            .persons_for_case(case_id)?
            .into_iter()
            .filter(|l| l.role == role)
            .map(|l| l.person_id)
            .collect())
    }
}

/// Polls `cancel`, mapping cancellation into [`AnalyticsError::Cancelled`].
pub(crate) fn check_cancel(cancel: &CancelToken) -> Result<(), AnalyticsError> {
    cancel.check().map_err(AnalyticsError::from)
}

/// Converts request-level filters into the adapter's filter type.
pub(crate) fn incident_filter(filter: &CandidateFilter) -> IncidentFilter {
    IncidentFilter::default()
        .with_date_range(filter.date_range)
        .with_statuses(filter.statuses.iter().copied())
        .with_tag_names(filter.tags.iter().cloned())
}

/// Tag names of an incident, sorted and deduplicated. Unknown tag ids are
/// skipped.
pub(crate) fn tag_names_of<'t>(
    incident: &IncidentRecord,
    names: &'t BTreeMap<i64, String>,
) -> BTreeSet<&'t str> {
    incident
        .tag_ids
        .iter()
        .filter_map(|id| names.get(id).map(String::as_str))
        .collect()
}

/// `n` as `u32`, saturating.
pub(crate) fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when both sets are empty.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_empty_sets_is_zero() {
        let empty: BTreeSet<i64> = BTreeSet::new();
        assert!(jaccard(&empty, &empty).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_of_partial_overlap() {
        let a: BTreeSet<i64> = [1, 2].into_iter().collect();
        let b: BTreeSet<i64> = [1].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < f64::EPSILON);
        assert!((jaccard(&a, &a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spatial_errors_keep_their_kind() {
        let err: AnalyticsError = SpatialError::invalid("bad").into();
        assert_eq!(err.kind(), "invalid_query");
        let err: AnalyticsError = SpatialError::Cancelled.into();
        assert_eq!(err.kind(), "cancelled");
        let err: AnalyticsError = SpatialError::Provider(ProviderError::Integrity {
            message: "x".to_string(),
        })
        .into();
        assert_eq!(err.kind(), "data_provider");
    }
}
