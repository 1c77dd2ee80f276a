#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parameter and result types for every analytical operation.
//!
//! Parameter structs are typed and carry their documented defaults; the
//! analytics crate validates them before any data is touched. Result
//! structs serialize with camelCase field names for the HTTP layer and
//! the CLI.

use chrono::{DateTime, Utc};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use crime_intel_database_models::{BoundingBox, DateRange, GeoPoint};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ---------------------------------------------------------------------------
// Shared filters
// ---------------------------------------------------------------------------

/// Auxiliary incident filters shared by the heatmap and cluster requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateFilter {
    /// Inclusive occurrence window.
    pub date_range: DateRange,
    /// Accepted case statuses (empty means any).
    pub statuses: Vec<CaseStatus>,
    /// Tag names; an incident matches if it carries any of them.
    pub tags: Vec<String>,
}

/// Scope of a pattern, repeat-offender, or statistics request.
///
/// Either `bbox` or the `center`/`radiusMeters` pair may be set, not both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisFilter {
    /// Restrict to a bounding box.
    pub bbox: Option<BoundingBox>,
    /// Centre of a radius restriction.
    pub center: Option<GeoPoint>,
    /// Radius of a radius restriction, in meters.
    pub radius_meters: Option<f64>,
    /// Inclusive occurrence window.
    pub date_range: DateRange,
    /// Tag names; an incident matches if it carries any of them.
    pub tags: Vec<String>,
    /// Restrict to the primary incident of one case.
    pub case_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Heatmap
// ---------------------------------------------------------------------------

/// Density class of a heatmap cell.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DensityLevel {
    /// Fewer than [`DensityThresholds::medium_min`] incidents.
    Low,
    /// At least `medium_min` but fewer than `high_min` incidents.
    Medium,
    /// At least [`DensityThresholds::high_min`] incidents.
    High,
}

/// Lower bounds of the `MEDIUM` and `HIGH` density classes.
///
/// Defaults: `LOW` = 0-4, `MEDIUM` = 5-14, `HIGH` >= 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityThresholds {
    /// Smallest count classified `MEDIUM`.
    pub medium_min: u32,
    /// Smallest count classified `HIGH`.
    pub high_min: u32,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self {
            medium_min: 5,
            high_min: 15,
        }
    }
}

impl DensityThresholds {
    /// Classifies a cell count.
    #[must_use]
    pub const fn classify(&self, count: u32) -> DensityLevel {
        if count >= self.high_min {
            DensityLevel::High
        } else if count >= self.medium_min {
            DensityLevel::Medium
        } else {
            DensityLevel::Low
        }
    }
}

const fn default_cell_size_meters() -> f64 {
    250.0
}

/// Parameters for a density heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapParams {
    /// Area to grid.
    pub bbox: BoundingBox,
    /// Cell edge length in meters (default 250).
    #[serde(default = "default_cell_size_meters")]
    pub cell_size_meters: f64,
    /// Auxiliary filters.
    #[serde(default)]
    pub filter: CandidateFilter,
}

impl HeatmapParams {
    /// Heatmap of `bbox` with the default cell size and no filters.
    #[must_use]
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            cell_size_meters: default_cell_size_meters(),
            filter: CandidateFilter::default(),
        }
    }
}

/// One non-empty heatmap cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    /// Zero-based row, counted northward from the box's south edge.
    pub row: u32,
    /// Zero-based column, counted eastward from the box's west edge.
    pub col: u32,
    /// Cell centre, clamped to the box.
    pub center: GeoPoint,
    /// Incidents in the cell.
    pub count: u32,
    /// Density class of `count`.
    pub density: DensityLevel,
}

/// A computed heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResult {
    /// Cell edge length in meters.
    pub cell_size_meters: f64,
    /// Number of grid rows.
    pub rows: u32,
    /// Number of grid columns.
    pub cols: u32,
    /// Incidents assigned to a cell (the candidate count).
    pub total_incidents: u64,
    /// Largest cell count (0 when empty).
    pub max_cell_count: u32,
    /// Non-empty cells ordered by (row, col).
    pub cells: Vec<HeatmapCell>,
}

// ---------------------------------------------------------------------------
// Clusters
// ---------------------------------------------------------------------------

const fn default_cluster_radius_meters() -> f64 {
    500.0
}

const fn default_min_points() -> usize {
    3
}

/// Parameters for density-based clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterParams {
    /// Optional area restriction.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Neighbourhood radius in meters (default 500).
    #[serde(default = "default_cluster_radius_meters")]
    pub radius_meters: f64,
    /// Other points required within the radius for a core point
    /// (default 3).
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    /// Auxiliary filters.
    #[serde(default)]
    pub filter: CandidateFilter,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            bbox: None,
            radius_meters: default_cluster_radius_meters(),
            min_points: default_min_points(),
            filter: CandidateFilter::default(),
        }
    }
}

/// One detected cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Label in discovery order, starting at 0.
    pub label: usize,
    /// Member incident ids, ascending.
    pub incident_ids: Vec<i64>,
    /// Number of members.
    pub incident_count: usize,
    /// Arithmetic mean of member coordinates.
    pub centroid: GeoPoint,
}

/// Result of cluster detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResult {
    /// Radius used.
    pub radius_meters: f64,
    /// Minimum neighbour count used.
    pub min_points: usize,
    /// Incidents considered.
    pub total_incidents: usize,
    /// Incidents that joined no cluster.
    pub noise_count: usize,
    /// Clusters ordered by label.
    pub clusters: Vec<Cluster>,
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Relative weights of the four correlation signals. Must be
/// non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrelationWeights {
    /// Weight of tag Jaccard similarity.
    pub tag: f64,
    /// Weight of suspect Jaccard similarity.
    pub suspect: f64,
    /// Weight of spatial proximity.
    pub spatial: f64,
    /// Weight of temporal proximity.
    pub temporal: f64,
}

impl Default for CorrelationWeights {
    fn default() -> Self {
        Self {
            tag: 0.25,
            suspect: 0.25,
            spatial: 0.25,
            temporal: 0.25,
        }
    }
}

impl CorrelationWeights {
    /// Sum of all four weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.tag + self.suspect + self.spatial + self.temporal
    }

    /// Weights in `[tag, suspect, spatial, temporal]` order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 4] {
        [self.tag, self.suspect, self.spatial, self.temporal]
    }
}

const fn default_radius_km() -> f64 {
    5.0
}

const fn default_days_range() -> f64 {
    90.0
}

/// Parameters for related-case scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationParams {
    /// Reference case.
    pub case_id: i64,
    /// Signal weights.
    #[serde(default)]
    pub weights: CorrelationWeights,
    /// Distance at which spatial proximity reaches 0 (default 5 km).
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// Time gap at which temporal proximity reaches 0 (default 90 days).
    #[serde(default = "default_days_range")]
    pub days_range: f64,
    /// Only score cases inside the radius and day window.
    #[serde(default)]
    pub restrict_to_window: bool,
    /// Maximum number of results.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CorrelationParams {
    /// Default parameters for `case_id`.
    #[must_use]
    pub fn new(case_id: i64) -> Self {
        Self {
            case_id,
            weights: CorrelationWeights::default(),
            radius_km: default_radius_km(),
            days_range: default_days_range(),
            restrict_to_window: false,
            limit: None,
        }
    }
}

/// The four correlation signals, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubScores {
    /// Jaccard similarity of tag-name sets.
    pub tag: f64,
    /// Jaccard similarity of suspect-id sets.
    pub suspect: f64,
    /// `max(0, 1 - d / radius)`.
    pub spatial: f64,
    /// `max(0, 1 - |dt| / days_range)`.
    pub temporal: f64,
}

impl SubScores {
    /// Weighted sum of the signals.
    #[must_use]
    pub fn composite(&self, weights: &CorrelationWeights) -> f64 {
        weights.tag.mul_add(
            self.tag,
            weights.suspect.mul_add(
                self.suspect,
                weights
                    .spatial
                    .mul_add(self.spatial, weights.temporal * self.temporal),
            ),
        )
    }
}

/// A case scored against a reference case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationScore {
    /// Candidate case.
    pub case_id: i64,
    /// The candidate's primary incident.
    pub incident_id: i64,
    /// When the candidate's primary incident occurred.
    pub occurred_at: DateTime<Utc>,
    /// Weighted sum of `sub_scores`.
    pub composite: f64,
    /// Per-signal scores.
    pub sub_scores: SubScores,
    /// Great-circle distance between primary incidents, km. `None` when
    /// the candidate has no valid location.
    pub distance_km: Option<f64>,
    /// Absolute time gap between primary incidents, fractional days.
    pub days_apart: f64,
    /// Tags both cases carry.
    pub shared_tag_count: usize,
    /// Suspects both cases share.
    pub shared_suspect_count: usize,
}

/// Related cases for a reference case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedCasesResult {
    /// Reference case.
    pub reference_case_id: i64,
    /// Scored cases, best first.
    pub results: Vec<CorrelationScore>,
}

// ---------------------------------------------------------------------------
// Behavioral similarity
// ---------------------------------------------------------------------------

const fn default_behavior_limit() -> usize {
    10
}

/// Parameters for behavioral similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorParams {
    /// Reference case.
    pub case_id: i64,
    /// Maximum number of results (default 10).
    #[serde(default = "default_behavior_limit")]
    pub limit: usize,
}

impl BehaviorParams {
    /// Default parameters for `case_id`.
    #[must_use]
    pub const fn new(case_id: i64) -> Self {
        Self {
            case_id,
            limit: default_behavior_limit(),
        }
    }
}

/// A case compared behaviorally with a reference case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorMatch {
    /// Candidate case.
    pub case_id: i64,
    /// `0.6 * tag_similarity + 0.4 * time_similarity`.
    pub behavior_score: f64,
    /// Shared tags over the larger tag set.
    pub tag_similarity: f64,
    /// Weekend flag and active-hour similarity.
    pub time_similarity: f64,
}

/// Behaviorally similar cases for a reference case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorResult {
    /// Reference case.
    pub reference_case_id: i64,
    /// Matches, best first.
    pub results: Vec<BehaviorMatch>,
}

// ---------------------------------------------------------------------------
// Patterns and repeat offenders
// ---------------------------------------------------------------------------

const fn default_min_occurrence() -> u32 {
    2
}

/// Parameters for tag co-occurrence analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternParams {
    /// Scope of the analysis.
    #[serde(default)]
    pub filter: AnalysisFilter,
    /// Minimum count for a pattern to be reported (default 2).
    #[serde(default = "default_min_occurrence")]
    pub min_occurrence: u32,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            filter: AnalysisFilter::default(),
            min_occurrence: default_min_occurrence(),
        }
    }
}

/// Incidents carrying both tags of an unordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPairCount {
    /// Lexicographically smaller tag name.
    pub first: String,
    /// Lexicographically larger tag name.
    pub second: String,
    /// Number of incidents carrying both.
    pub count: u32,
}

/// Incidents carrying exactly this full tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCombination {
    /// Sorted tag names (at least two).
    pub tags: Vec<String>,
    /// Number of incidents with exactly this set.
    pub count: u32,
}

/// A suspect linked to at least `min_occurrence` cases in scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectPattern {
    /// Person id.
    pub person_id: i64,
    /// Distinct in-scope cases the person is a suspect in.
    pub case_count: u32,
}

/// Output of tag co-occurrence analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    /// Unordered tag pairs, most frequent first.
    pub tag_pairs: Vec<TagPairCount>,
    /// Full tag combinations, most frequent first.
    pub tag_combinations: Vec<TagCombination>,
    /// Suspects by case count, highest first.
    pub suspect_patterns: Vec<SuspectPattern>,
}

const fn default_role() -> PersonRole {
    PersonRole::Suspect
}

/// Parameters for repeat-offender detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatOffenderParams {
    /// Scope of the analysis.
    #[serde(default)]
    pub filter: AnalysisFilter,
    /// Role counted (default suspect).
    #[serde(default = "default_role")]
    pub role: PersonRole,
    /// Minimum distinct cases (default 2).
    #[serde(default = "default_min_occurrence")]
    pub min_cases: u32,
}

impl Default for RepeatOffenderParams {
    fn default() -> Self {
        Self {
            filter: AnalysisFilter::default(),
            role: default_role(),
            min_cases: default_min_occurrence(),
        }
    }
}

/// A person linked to several in-scope cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatOffender {
    /// Person id.
    pub person_id: i64,
    /// Person name.
    pub name: String,
    /// Distinct in-scope cases.
    pub case_count: u32,
    /// Distinct full tag sets shared by more than one of the person's
    /// cases.
    pub pattern_match_count: u32,
    /// Latest primary-incident timestamp among those cases.
    pub last_seen: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Incidents carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFrequency {
    /// Tag name.
    pub tag: String,
    /// Number of incidents.
    pub count: u32,
}

/// Incidents in one district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictCount {
    /// District label.
    pub district: String,
    /// Number of incidents.
    pub count: u32,
}

/// Incidents in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCount {
    /// Month number, 1-12.
    pub month: u32,
    /// English month name.
    pub name: String,
    /// Number of incidents.
    pub count: u32,
}

/// Incident counts for every month of a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    /// Calendar year.
    pub year: i32,
    /// Twelve entries, January first.
    pub months: Vec<MonthlyCount>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Stages of the search pipeline, in evaluation order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStage {
    /// Bounding box or radius.
    Spatial,
    /// Occurrence window.
    DateRange,
    /// Case status.
    Status,
    /// Tag membership.
    Tags,
    /// Suspect name substring.
    SuspectName,
    /// Assigned officer.
    AssignedOfficer,
}

/// Raw search request parameters, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    /// Bounding box restriction.
    pub bbox: Option<BoundingBox>,
    /// Radius centre latitude.
    pub lat: Option<f64>,
    /// Radius centre longitude.
    pub lng: Option<f64>,
    /// Radius in kilometers.
    pub radius_km: Option<f64>,
    /// Inclusive occurrence window.
    pub date_range: DateRange,
    /// Accepted case statuses.
    pub statuses: Vec<CaseStatus>,
    /// Tag names; a case matches if its incident carries any of them.
    pub tags: Vec<String>,
    /// Case-insensitive substring of a suspect's name.
    pub suspect_name: Option<String>,
    /// Assigned officer id.
    pub assigned_officer: Option<i64>,
    /// Page size (default 20, at most 100).
    pub limit: Option<usize>,
}

/// One matching case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Case id.
    pub case_id: i64,
    /// Case title.
    pub title: String,
    /// Case status.
    pub status: CaseStatus,
    /// Primary incident id.
    pub incident_id: i64,
    /// Primary incident type.
    pub incident_type: String,
    /// When the primary incident occurred.
    pub occurred_at: DateTime<Utc>,
    /// Primary incident location.
    pub location: GeoPoint,
    /// Tag names, sorted.
    pub tags: Vec<String>,
    /// Suspect names, sorted.
    pub suspects: Vec<String>,
    /// Assigned officer.
    pub assigned_officer_id: Option<i64>,
}

/// Cases remaining after a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCount {
    /// The stage.
    pub stage: SearchStage,
    /// Cases remaining after it ran.
    pub remaining: usize,
}

/// Search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Total matching cases before paging.
    pub total: usize,
    /// At most `limit` hits, newest first.
    pub results: Vec<SearchHit>,
    /// Remaining counts per executed stage, in evaluation order.
    pub stages: Vec<StageCount>,
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Parameters for person risk scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParams {
    /// Person to score.
    pub person_id: i64,
    /// Reference time for recency decay.
    pub as_of: DateTime<Utc>,
}

/// Risk band on the 0-100 scale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Score below 34.
    Low,
    /// Score from 34 up to 67.
    Medium,
    /// Score of 67 or more.
    High,
}

impl RiskLevel {
    /// Bands a score on the 0-100 scale.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 34.0 {
            Self::Low
        } else if score < 67.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Raw risk factor values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    /// Distinct suspect-linked cases.
    pub case_count: u32,
    /// Sum over cases of the severity weights of their distinct tags.
    pub severity_exposure: f64,
    /// Sum over cases of `0.5^(age_days / half_life_days)`.
    pub recency: f64,
    /// `min(nearby_active_cases / 5, 2)`.
    pub active_proximity: f64,
    /// Largest number of active cases near any of the person's incidents.
    pub nearby_active_cases: u32,
    /// Share of cases with the most common tag set (informational).
    pub pattern_consistency: f64,
}

/// Weighted contribution of each factor to the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskContributions {
    /// Case count contribution.
    pub case_count: f64,
    /// Severity exposure contribution.
    pub severity_exposure: f64,
    /// Recency contribution.
    pub recency: f64,
    /// Active proximity contribution.
    pub active_proximity: f64,
}

impl RiskContributions {
    /// Sum of all contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.case_count + self.severity_exposure + self.recency + self.active_proximity
    }
}

/// A person's risk score with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    /// Person id.
    pub person_id: i64,
    /// Person name.
    pub name: String,
    /// Reference time used for recency.
    pub as_of: DateTime<Utc>,
    /// Saturated score in `[0, max_score)`.
    pub score: f64,
    /// Band of `score`.
    pub level: RiskLevel,
    /// Unsaturated weighted sum.
    pub raw: f64,
    /// Factor values.
    pub factors: RiskFactors,
    /// Weighted contributions.
    pub contributions: RiskContributions,
}
