#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Record types and query primitives for the intelligence engine.
//!
//! These types represent the shapes of data as handed over by a data
//! provider: incidents, cases, persons, tags, and the case-person link
//! relation. They are distinct from the analytics result types in
//! `crime_intel_analytics_models` and the HTTP types in
//! `crime_intel_server_models`.
//!
//! Coordinates are WGS84 `(latitude, longitude)` end to end. Nothing in
//! the engine reprojects.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Meters spanned by one degree of latitude (and of longitude at the
/// equator) on the mean-radius sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point from a `(latitude, longitude)` pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and inside their valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn haversine_distance(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlng = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_METERS * c
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates a bounding box from its south-west and north-east corners.
    #[must_use]
    pub const fn from_corners(min: GeoPoint, max: GeoPoint) -> Self {
        Self::new(min.longitude, min.latitude, max.longitude, max.latitude)
    }

    /// Whether `min <= max` on both axes and every edge is a valid
    /// coordinate.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        GeoPoint::new(self.south, self.west).is_valid()
            && GeoPoint::new(self.north, self.east).is_valid()
            && self.south <= self.north
            && self.west <= self.east
    }

    /// Whether the box spans zero latitude or zero longitude.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.north - self.south <= 0.0 || self.east - self.west <= 0.0
    }

    /// Inclusive point containment.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Smallest box containing every point within `radius_meters` of
    /// `center`, clamped to valid coordinates.
    ///
    /// The longitude span is widened with the cosine of the most poleward
    /// latitude in the box so that the great-circle disc always fits.
    #[must_use]
    pub fn around(center: GeoPoint, radius_meters: f64) -> Self {
        let dlat = radius_meters / METERS_PER_DEGREE;
        let south = (center.latitude - dlat).max(-90.0);
        let north = (center.latitude + dlat).min(90.0);

        let poleward = south.abs().max(north.abs()).to_radians().cos();
        let (west, east) = if poleward <= 1e-9 {
            (-180.0, 180.0)
        } else {
            // Small margin for the great circle bulging past the parallel.
            let dlng = (radius_meters / (METERS_PER_DEGREE * poleward)) * 1.01;
            (
                (center.longitude - dlng).max(-180.0),
                (center.longitude + dlng).min(180.0),
            )
        };

        Self::new(west, south, east, north)
    }
}

/// Inclusive occurrence window. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Minimum occurrence date.
    pub from: Option<DateTime<Utc>>,
    /// Maximum occurrence date.
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a date range.
    #[must_use]
    pub const fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// Whether neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether `from` is after `to`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }

    /// Inclusive containment.
    #[must_use]
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| *at >= from) && self.to.is_none_or(|to| *at <= to)
    }
}

/// An incident as handed over by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Primary key.
    pub id: i64,
    /// Incident type (e.g. "burglary").
    pub incident_type: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// When the incident occurred.
    pub occurred_at: DateTime<Utc>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Police district label.
    #[serde(default)]
    pub district: Option<String>,
    /// Tags attached to this incident.
    #[serde(default)]
    pub tag_ids: BTreeSet<i64>,
}

impl IncidentRecord {
    /// The incident location.
    #[must_use]
    pub const fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// An investigation case, anchored by exactly one primary incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Primary key.
    pub id: i64,
    /// Case title.
    pub title: String,
    /// Current status.
    pub status: CaseStatus,
    /// The incident this case is anchored to (unique across cases).
    pub primary_incident_id: i64,
    /// Officer the case is assigned to.
    #[serde(default)]
    pub assigned_officer_id: Option<i64>,
    /// When the case was opened.
    pub created_at: DateTime<Utc>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// A person known to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Primary key.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
}

/// A tag that can be attached to incidents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagRecord {
    /// Primary key.
    pub id: i64,
    /// Unique tag name.
    pub name: String,
}

/// One row of the case-person relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CasePersonLink {
    /// Linked case.
    pub case_id: i64,
    /// Linked person.
    pub person_id: i64,
    /// Role the person plays in the case.
    pub role: PersonRole,
}
