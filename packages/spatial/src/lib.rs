#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial candidate selection for the intelligence engine.
//!
//! Every analytical operation starts from a [`CandidateSet`]: the incidents
//! inside a bounding box or radius that also pass the auxiliary date,
//! status, and tag filters. [`SpatialIndexAdapter`] builds those sets from
//! a [`DataProvider`](crime_intel_database::DataProvider), and
//! [`PointIndex`] answers radius-neighbour lookups over one.

pub mod adapter;
pub mod cancel;
pub mod index;
pub mod query;

pub use adapter::{CandidateSet, SpatialIndexAdapter};
pub use cancel::CancelToken;
pub use index::PointIndex;
pub use query::{IncidentFilter, SpatialQuery};

use crime_intel_database::ProviderError;

/// Errors produced while selecting spatial candidates.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The query parameters are malformed.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// What was wrong with the query.
        message: String,
    },

    /// The caller cancelled the operation or its deadline passed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The data provider failed.
    #[error("Data provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl SpatialError {
    /// Shorthand for [`SpatialError::InvalidQuery`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}
