#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Case status, person role, and tag severity taxonomy types.
//!
//! These enums are shared by every layer of the intelligence engine: the
//! record types in `crime_intel_database_models`, the analytics result
//! types, and the HTTP query parameters all use the same spellings.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lifecycle status of an investigation case.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CaseStatus {
    /// Reported but not yet triaged.
    Pending,
    /// Accepted and open.
    Open,
    /// Actively being investigated.
    UnderInvestigation,
    /// Resolved (suspect identified, outcome recorded).
    Resolved,
    /// Closed without further action.
    Closed,
    /// Rejected as unfounded.
    Rejected,
    /// Archived for record keeping.
    Archived,
}

impl CaseStatus {
    /// Whether the case still counts as active work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::UnderInvestigation)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pending,
            Self::Open,
            Self::UnderInvestigation,
            Self::Resolved,
            Self::Closed,
            Self::Rejected,
            Self::Archived,
        ]
    }
}

/// Role a person plays in a case.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PersonRole {
    /// Suspected offender.
    Suspect,
    /// Victim of the incident.
    Victim,
    /// Witness to the incident.
    Witness,
}

/// Severity of a tag, from 1 (minimal) to 5 (critical).
///
/// Used by the risk scorer to weight a person's exposure to the kinds of
/// incidents they are linked to.
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
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TagSeverity {
    /// Level 1: Informational tags (lighting, weather, etc.)
    Minimal = 1,
    /// Level 2: Low-level offenses (trespassing, vandalism)
    Low = 2,
    /// Level 3: Moderate offenses (burglary, drug activity)
    Moderate = 3,
    /// Level 4: Serious offenses (robbery, armed, assault)
    High = 4,
    /// Level 5: Most severe offenses (homicide, sexual assault)
    Critical = 5,
}

/// Keyword fragments checked against lowercase tag names, most severe
/// first. The first table containing a fragment of the tag name wins.
const CRITICAL_KEYWORDS: &[&str] = &["homicide", "murder", "sexual assault", "rape", "manslaughter"];
const HIGH_KEYWORDS: &[&str] = &[
    "assault", "armed", "weapon", "robbery", "battery", "violent", "arson", "shooting", "stabbing",
];
const MODERATE_KEYWORDS: &[&str] = &[
    "burglary",
    "drug",
    "narcotic",
    "vehicle theft",
    "kidnap",
    "extortion",
    "break-in",
];
const MINIMAL_KEYWORDS: &[&str] = &["night", "daytime", "weekend", "lighting", "weather"];

impl TagSeverity {
    /// Returns the numeric value of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Weight in `(0, 1]` used when summing severity exposure.
    #[must_use]
    pub fn weight(self) -> f64 {
        f64::from(self.value()) / 5.0
    }

    /// Creates a severity level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-5.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            1 => Ok(Self::Minimal),
            2 => Ok(Self::Low),
            3 => Ok(Self::Moderate),
            4 => Ok(Self::High),
            5 => Ok(Self::Critical),
            _ => Err(InvalidSeverityError { value }),
        }
    }

    /// Classifies a free-form tag name using the built-in keyword table.
    ///
    /// Names matching no keyword are [`TagSeverity::Low`].
    #[must_use]
    pub fn classify(tag_name: &str) -> Self {
        let name = tag_name.trim().to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

        if matches(CRITICAL_KEYWORDS) {
            Self::Critical
        } else if matches(HIGH_KEYWORDS) {
            Self::High
        } else if matches(MODERATE_KEYWORDS) {
            Self::Moderate
        } else if matches(MINIMAL_KEYWORDS) {
            Self::Minimal
        } else {
            Self::Low
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Minimal,
            Self::Low,
            Self::Moderate,
            Self::High,
            Self::Critical,
        ]
    }
}

/// Error returned when attempting to create a [`TagSeverity`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}
