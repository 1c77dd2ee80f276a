#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP query and response types for the crime intelligence server.
//!
//! Query structs mirror the raw query string: bounding boxes and lists
//! arrive as comma-separated strings and are parsed here into the typed
//! parameter structs of `crime_intel_analytics_models`. They are separate
//! from the engine types so the HTTP contract can evolve on its own.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use crime_intel_analytics_models::{
    AnalysisFilter, BehaviorParams, CandidateFilter, ClusterParams, CorrelationParams,
    CorrelationWeights, HeatmapParams, PatternParams, RepeatOffenderParams, SearchParams,
};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use crime_intel_database_models::{BoundingBox, DateRange, GeoPoint};
use serde::{Deserialize, Serialize};

/// A query string that could not be turned into engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    /// What was wrong.
    pub message: String,
}

impl QueryError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error kind (`invalid_query`, `not_found`, ...).
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// Parses a bounding box string `"south,west,north,east"`.
///
/// # Errors
///
/// * If the string does not hold exactly four numbers
pub fn parse_bbox(s: &str) -> Result<BoundingBox, QueryError> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| QueryError::new(format!("Invalid bbox '{s}': {e}")))?;
    match parts.as_slice() {
        [south, west, north, east] => Ok(BoundingBox::new(*west, *south, *east, *north)),
        _ => Err(QueryError::new(format!(
            "Invalid bbox '{s}': expected south,west,north,east"
        ))),
    }
}

/// Parses a comma-separated list, skipping empty entries.
///
/// # Errors
///
/// * If any entry fails to parse
pub fn parse_list<T: FromStr>(s: Option<&str>, what: &str) -> Result<Vec<T>, QueryError>
where
    T::Err: std::fmt::Display,
{
    s.into_iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse()
                .map_err(|e| QueryError::new(format!("Invalid {what} '{p}': {e}")))
        })
        .collect()
}

fn parse_bbox_opt(s: Option<&str>) -> Result<Option<BoundingBox>, QueryError> {
    s.map(parse_bbox).transpose()
}

fn center(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, QueryError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Some(GeoPoint::new(lat, lng))),
        (None, None) => Ok(None),
        _ => Err(QueryError::new("lat and lng must be given together")),
    }
}

/// Query parameters for `GET /api/heatmap`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapQuery {
    /// Bounding box as `south,west,north,east`.
    pub bbox: String,
    /// Cell edge length in meters.
    pub cell_size: Option<f64>,
    /// Start of the occurrence window (ISO 8601).
    pub from: Option<DateTime<Utc>>,
    /// End of the occurrence window (ISO 8601).
    pub to: Option<DateTime<Utc>>,
    /// Comma-separated case statuses.
    pub statuses: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
}

impl HeatmapQuery {
    /// Converts into engine parameters.
    ///
    /// # Errors
    ///
    /// * If the bbox or a list entry is malformed
    pub fn into_params(self) -> Result<HeatmapParams, QueryError> {
        let mut params = HeatmapParams::new(parse_bbox(&self.bbox)?);
        if let Some(cell_size) = self.cell_size {
            params.cell_size_meters = cell_size;
        }
        params.filter = CandidateFilter {
            date_range: DateRange::new(self.from, self.to),
            statuses: parse_list(self.statuses.as_deref(), "status")?,
            tags: parse_list(self.tags.as_deref(), "tag")?,
        };
        Ok(params)
    }
}

/// Query parameters for `GET /api/clusters`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQuery {
    /// Optional bounding box as `south,west,north,east`.
    pub bbox: Option<String>,
    /// Neighbourhood radius in meters.
    pub radius: Option<f64>,
    /// Neighbours required for a core point.
    pub min_points: Option<usize>,
    /// Start of the occurrence window.
    pub from: Option<DateTime<Utc>>,
    /// End of the occurrence window.
    pub to: Option<DateTime<Utc>>,
    /// Comma-separated case statuses.
    pub statuses: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
}

impl ClusterQuery {
    /// Converts into engine parameters.
    ///
    /// # Errors
    ///
    /// * If the bbox or a list entry is malformed
    pub fn into_params(self) -> Result<ClusterParams, QueryError> {
        let defaults = ClusterParams::default();
        Ok(ClusterParams {
            bbox: parse_bbox_opt(self.bbox.as_deref())?,
            radius_meters: self.radius.unwrap_or(defaults.radius_meters),
            min_points: self.min_points.unwrap_or(defaults.min_points),
            filter: CandidateFilter {
                date_range: DateRange::new(self.from, self.to),
                statuses: parse_list(self.statuses.as_deref(), "status")?,
                tags: parse_list(self.tags.as_deref(), "tag")?,
            },
        })
    }
}

/// Query parameters for `GET /api/cases/{id}/related`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedQuery {
    /// Tag signal weight.
    pub tag_weight: Option<f64>,
    /// Suspect signal weight.
    pub suspect_weight: Option<f64>,
    /// Spatial signal weight.
    pub spatial_weight: Option<f64>,
    /// Temporal signal weight.
    pub temporal_weight: Option<f64>,
    /// Spatial cut-off in kilometers.
    pub radius_km: Option<f64>,
    /// Temporal cut-off in days.
    pub days_range: Option<f64>,
    /// Only score cases inside the radius and day window.
    pub restrict: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl RelatedQuery {
    /// Converts into engine parameters for `case_id`. Unset weights keep
    /// their defaults.
    #[must_use]
    pub fn into_params(self, case_id: i64) -> CorrelationParams {
        let mut params = CorrelationParams::new(case_id);
        let defaults = CorrelationWeights::default();
        params.weights = CorrelationWeights {
            tag: self.tag_weight.unwrap_or(defaults.tag),
            suspect: self.suspect_weight.unwrap_or(defaults.suspect),
            spatial: self.spatial_weight.unwrap_or(defaults.spatial),
            temporal: self.temporal_weight.unwrap_or(defaults.temporal),
        };
        if let Some(radius_km) = self.radius_km {
            params.radius_km = radius_km;
        }
        if let Some(days_range) = self.days_range {
            params.days_range = days_range;
        }
        params.restrict_to_window = self.restrict.unwrap_or(false);
        params.limit = self.limit;
        params
    }
}

/// Query parameters for `GET /api/cases/{id}/similar`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SimilarQuery {
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl SimilarQuery {
    #[must_use]
    pub const fn into_params(self, case_id: i64) -> BehaviorParams {
        let mut params = BehaviorParams::new(case_id);
        if let Some(limit) = self.limit {
            params.limit = limit;
        }
        params
    }
}

/// Scope shared by the pattern, repeat-offender, and statistics
/// endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    /// Bounding box as `south,west,north,east`.
    pub bbox: Option<String>,
    /// Radius centre latitude.
    pub lat: Option<f64>,
    /// Radius centre longitude.
    pub lng: Option<f64>,
    /// Radius in kilometers.
    pub radius_km: Option<f64>,
    /// Start of the occurrence window.
    pub from: Option<DateTime<Utc>>,
    /// End of the occurrence window.
    pub to: Option<DateTime<Utc>>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
    /// Restrict to one case.
    pub case_id: Option<i64>,
}

impl ScopeQuery {
    /// Converts into an analysis filter.
    ///
    /// # Errors
    ///
    /// * If the bbox or a list entry is malformed
    /// * If only one of `lat`/`lng` is given
    pub fn to_filter(&self) -> Result<AnalysisFilter, QueryError> {
        Ok(AnalysisFilter {
            bbox: parse_bbox_opt(self.bbox.as_deref())?,
            center: center(self.lat, self.lng)?,
            radius_meters: self.radius_km.map(|km| km * 1000.0),
            date_range: DateRange::new(self.from, self.to),
            tags: parse_list(self.tags.as_deref(), "tag")?,
            case_id: self.case_id,
        })
    }
}

/// Extra query parameters for `GET /api/patterns`, read alongside a
/// [`ScopeQuery`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternQuery {
    /// Minimum count for a pattern.
    pub min_occurrence: Option<u32>,
}

impl PatternQuery {
    /// Converts into engine parameters.
    ///
    /// # Errors
    ///
    /// * If the scope is malformed
    pub fn into_params(self, scope: &ScopeQuery) -> Result<PatternParams, QueryError> {
        let defaults = PatternParams::default();
        Ok(PatternParams {
            filter: scope.to_filter()?,
            min_occurrence: self.min_occurrence.unwrap_or(defaults.min_occurrence),
        })
    }
}

/// Extra query parameters for `GET /api/repeat-offenders`, read alongside
/// a [`ScopeQuery`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatOffenderQuery {
    /// Role counted (`suspect`, `victim`, `witness`).
    pub role: Option<String>,
    /// Minimum distinct cases.
    pub min_cases: Option<u32>,
}

impl RepeatOffenderQuery {
    /// Converts into engine parameters.
    ///
    /// # Errors
    ///
    /// * If the scope or role is malformed
    pub fn into_params(self, scope: &ScopeQuery) -> Result<RepeatOffenderParams, QueryError> {
        let defaults = RepeatOffenderParams::default();
        let role = match self.role.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<PersonRole>()
                .map_err(|e| QueryError::new(format!("Invalid role '{raw}': {e}")))?,
            None => defaults.role,
        };
        Ok(RepeatOffenderParams {
            filter: scope.to_filter()?,
            role,
            min_cases: self.min_cases.unwrap_or(defaults.min_cases),
        })
    }
}

/// Query parameters for `GET /api/persons/{id}/risk`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskQuery {
    /// Reference time; the server's clock when absent.
    pub as_of: Option<DateTime<Utc>>,
}

/// Extra query parameters for `GET /api/stats/monthly`, read alongside a
/// [`ScopeQuery`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MonthlyQuery {
    /// Calendar year; the current year when absent.
    pub year: Option<i32>,
}

/// Query parameters for `GET /api/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQueryParams {
    /// Bounding box as `south,west,north,east`.
    pub bbox: Option<String>,
    /// Radius centre latitude.
    pub lat: Option<f64>,
    /// Radius centre longitude.
    pub lng: Option<f64>,
    /// Radius in kilometers.
    pub radius_km: Option<f64>,
    /// Start of the occurrence window.
    pub from: Option<DateTime<Utc>>,
    /// End of the occurrence window.
    pub to: Option<DateTime<Utc>>,
    /// Comma-separated case statuses.
    pub status: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
    /// Case-insensitive suspect name fragment.
    pub suspect: Option<String>,
    /// Assigned officer id.
    pub officer: Option<i64>,
    /// Page size.
    pub limit: Option<usize>,
}

impl SearchQueryParams {
    /// Converts into raw search parameters. Spatial consistency is checked
    /// by the engine.
    ///
    /// # Errors
    ///
    /// * If the bbox or a list entry is malformed
    pub fn into_params(self) -> Result<SearchParams, QueryError> {
        Ok(SearchParams {
            bbox: parse_bbox_opt(self.bbox.as_deref())?,
            lat: self.lat,
            lng: self.lng,
            radius_km: self.radius_km,
            date_range: DateRange::new(self.from, self.to),
            statuses: parse_list::<CaseStatus>(self.status.as_deref(), "status")?,
            tags: parse_list(self.tags.as_deref(), "tag")?,
            suspect_name: self.suspect,
            assigned_officer: self.officer,
            limit: self.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_is_south_west_north_east() {
        let bbox = parse_bbox("12.95, 77.55, 12.98, 77.60").unwrap();
        assert_eq!(bbox, BoundingBox::new(77.55, 12.95, 77.60, 12.98));
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn lists_skip_blanks_and_reject_unknown_values() {
        let statuses: Vec<CaseStatus> =
            parse_list(Some("open, CLOSED,,under_investigation"), "status").unwrap();
        assert_eq!(
            statuses,
            vec![
                CaseStatus::Open,
                CaseStatus::Closed,
                CaseStatus::UnderInvestigation
            ]
        );
        assert!(parse_list::<CaseStatus>(Some("open,sleeping"), "status").is_err());
        assert!(parse_list::<String>(None, "tag").unwrap().is_empty());
    }

    #[test]
    fn scope_requires_both_coordinates() {
        let scope = ScopeQuery {
            lat: Some(1.0),
            ..ScopeQuery::default()
        };
        assert!(scope.to_filter().is_err());

        let scope = ScopeQuery {
            lat: Some(1.0),
            lng: Some(2.0),
            radius_km: Some(1.5),
            ..ScopeQuery::default()
        };
        let filter = scope.to_filter().unwrap();
        assert_eq!(filter.center, Some(GeoPoint::new(1.0, 2.0)));
        assert_eq!(filter.radius_meters, Some(1500.0));
    }

    #[test]
    fn related_query_keeps_default_weights() {
        let params = RelatedQuery {
            tag_weight: Some(0.4),
            suspect_weight: Some(0.1),
            ..RelatedQuery::default()
        }
        .into_params(9);
        assert_eq!(params.case_id, 9);
        assert!((params.weights.tag - 0.4).abs() < f64::EPSILON);
        assert!((params.weights.spatial - 0.25).abs() < f64::EPSILON);
        assert!((params.radius_km - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn repeat_offender_role_parses_case_insensitively() {
        let params = RepeatOffenderQuery {
            role: Some("Witness".to_string()),
            ..RepeatOffenderQuery::default()
        }
        .into_params(&ScopeQuery::default())
        .unwrap();
        assert_eq!(params.role, PersonRole::Witness);
        assert_eq!(params.min_cases, 2);
    }

    #[test]
    fn heatmap_query_deserializes_camel_case() {
        let query: HeatmapQuery =
            serde_json::from_str(r#"{"bbox": "12.95,77.55,12.98,77.60", "cellSize": 100.0}"#)
                .unwrap();
        let params = query.into_params().unwrap();
        assert!((params.cell_size_meters - 100.0).abs() < f64::EPSILON);
    }
}
