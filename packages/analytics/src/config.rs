//! Engine configuration.
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file (or no file at all) yields a working engine. Invalid
//! values are rejected by [`EngineConfig::validate`] before any request
//! is served.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crime_intel_analytics_models::DensityThresholds;
use crime_intel_crime_models::TagSeverity;
use crime_intel_spatial::CancelToken;
use serde::Deserialize;

use crate::AnalyticsError;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV: &str = "CRIME_INTEL_CONFIG";

/// Environment variable overriding [`EngineConfig::parallelism`].
pub const PARALLELISM_ENV: &str = "CRIME_INTEL_PARALLELISM";

/// Search page size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the caller gives none.
    pub default_limit: usize,
    /// Largest page size a caller may request.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Risk scorer weights and shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Weight per suspect-linked case.
    pub case_weight: f64,
    /// Weight of the severity exposure sum.
    pub severity_weight: f64,
    /// Weight of the recency sum.
    pub recency_weight: f64,
    /// Weight of the active-case proximity factor.
    pub proximity_weight: f64,
    /// Age at which a case's recency contribution halves.
    pub half_life_days: f64,
    /// Raw score at which the saturated score reaches `1 - 1/e` of
    /// `max_score`.
    pub saturation: f64,
    /// Upper bound of the score scale.
    pub max_score: f64,
    /// Radius for counting nearby active cases.
    pub proximity_radius_km: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            case_weight: 3.0,
            severity_weight: 4.0,
            recency_weight: 2.0,
            proximity_weight: 2.0,
            half_life_days: 180.0,
            saturation: 25.0,
            max_score: 100.0,
            proximity_radius_km: 10.0,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads in the compute pool.
    pub parallelism: usize,
    /// Heatmap density class bounds.
    pub density: DensityThresholds,
    /// Search page size limits.
    pub search: SearchConfig,
    /// Risk scorer parameters.
    pub risk: RiskConfig,
    /// Severity overrides by exact tag name. Tags not listed here are
    /// classified by [`TagSeverity::classify`].
    pub severity: BTreeMap<String, TagSeverity>,
    /// Per-request deadline for the HTTP layer, in milliseconds.
    pub request_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            density: DensityThresholds::default(),
            search: SearchConfig::default(),
            risk: RiskConfig::default(),
            severity: BTreeMap::new(),
            request_timeout_ms: None,
        }
    }
}

fn config_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::Config {
        message: message.into(),
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), AnalyticsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(config_error(format!("{name} must be a non-negative number, got {value}")))
    }
}

fn positive(name: &str, value: f64) -> Result<(), AnalyticsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_error(format!("{name} must be a positive number, got {value}")))
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * If the TOML is malformed
    /// * If a value fails [`EngineConfig::validate`]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, AnalyticsError> {
        let config: Self = toml::de::from_str(toml_str)
            .map_err(|e| config_error(format!("Failed to parse engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If parsing or validation fails
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&toml_str)
    }

    /// Loads the file named by `explicit`, else by `CRIME_INTEL_CONFIG`,
    /// else the defaults; then applies `CRIME_INTEL_PARALLELISM`.
    ///
    /// # Errors
    ///
    /// * If a named file cannot be loaded
    /// * If `CRIME_INTEL_PARALLELISM` is not a positive integer
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, AnalyticsError> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(std::path::PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Loading engine config from {}", path.display());
                Self::load(&path)?
            }
            None => Self::default(),
        };

        if let Ok(raw) = std::env::var(PARALLELISM_ENV) {
            config.parallelism = raw.trim().parse().map_err(|e| {
                config_error(format!("{PARALLELISM_ENV} must be a positive integer: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its documented range.
    ///
    /// # Errors
    ///
    /// * If any value is out of range
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.parallelism == 0 {
            return Err(config_error("parallelism must be at least 1"));
        }

        if self.density.medium_min == 0 || self.density.medium_min > self.density.high_min {
            return Err(config_error(format!(
                "density thresholds must satisfy 1 <= medium_min <= high_min \
                 (medium_min={}, high_min={})",
                self.density.medium_min, self.density.high_min
            )));
        }

        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(config_error(format!(
                "search limits must satisfy 1 <= default_limit <= max_limit \
                 (default_limit={}, max_limit={})",
                self.search.default_limit, self.search.max_limit
            )));
        }

        let risk = &self.risk;
        non_negative("risk.case_weight", risk.case_weight)?;
        non_negative("risk.severity_weight", risk.severity_weight)?;
        non_negative("risk.recency_weight", risk.recency_weight)?;
        non_negative("risk.proximity_weight", risk.proximity_weight)?;
        positive("risk.half_life_days", risk.half_life_days)?;
        positive("risk.saturation", risk.saturation)?;
        positive("risk.max_score", risk.max_score)?;
        positive("risk.proximity_radius_km", risk.proximity_radius_km)?;

        if self.request_timeout_ms == Some(0) {
            return Err(config_error("request_timeout_ms must be positive when set"));
        }

        Ok(())
    }

    /// Severity of a tag: the configured override, else the built-in
    /// keyword classification.
    #[must_use]
    pub fn severity_for(&self, tag_name: &str) -> TagSeverity {
        self.severity
            .get(tag_name)
            .copied()
            .unwrap_or_else(|| TagSeverity::classify(tag_name))
    }

    /// A fresh cancellation token carrying the request deadline, if one is
    /// configured.
    #[must_use]
    pub fn request_token(&self) -> CancelToken {
        self.request_timeout_ms.map_or_else(CancelToken::new, |ms| {
            CancelToken::with_timeout(Duration::from_millis(ms))
        })
    }

    /// Builds the compute pool.
    ///
    /// # Errors
    ///
    /// * If the pool cannot be created
    pub fn build_pool(&self) -> Result<rayon::ThreadPool, AnalyticsError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("crime-intel-{i}"))
            .build()
            .map_err(|e| config_error(format!("Failed to build thread pool: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.density, DensityThresholds::default());
        assert_eq!(config.search.default_limit, 20);
        assert_eq!(config.search.max_limit, 100);
        assert!(config.parallelism >= 1);
    }

    #[test]
    fn parses_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            parallelism = 2
            request_timeout_ms = 5000

            [density]
            medium_min = 3
            high_min = 10

            [risk]
            half_life_days = 30.0

            [severity]
            graffiti = "MODERATE"
            "#,
        )
        .unwrap();
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.density.medium_min, 3);
        assert!((config.risk.half_life_days - 30.0).abs() < f64::EPSILON);
        assert!((config.risk.saturation - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.severity_for("graffiti"), TagSeverity::Moderate);
        assert_eq!(config.severity_for("armed"), TagSeverity::High);
        assert_eq!(config.request_timeout_ms, Some(5000));
    }

    #[test]
    fn rejects_inverted_density_thresholds() {
        let err = EngineConfig::from_toml_str("[density]\nmedium_min = 20\nhigh_min = 10\n")
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("parallelism = \"many\""),
            Err(AnalyticsError::Config { .. })
        ));
    }

    #[test]
    fn rejects_negative_risk_weight() {
        assert!(EngineConfig::from_toml_str("[risk]\ncase_weight = -1.0\n").is_err());
    }

    #[test]
    fn builds_pool_with_requested_size() {
        let config = EngineConfig {
            parallelism: 2,
            ..EngineConfig::default()
        };
        let pool = config.build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
