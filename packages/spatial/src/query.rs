//! Spatial query shapes and auxiliary incident filters.

use std::collections::BTreeSet;

use crime_intel_crime_models::CaseStatus;
use crime_intel_database_models::{BoundingBox, DateRange, GeoPoint};

use crate::SpatialError;

/// The spatial part of a candidate query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialQuery {
    /// Incidents inside a box (inclusive edges).
    BoundingBox(BoundingBox),
    /// Incidents within a great-circle distance of a point.
    Radius {
        /// Centre of the search disc.
        center: GeoPoint,
        /// Radius in meters.
        radius_meters: f64,
    },
}

impl SpatialQuery {
    /// Builds a query from optional raw request parameters.
    ///
    /// Returns `Ok(None)` when no spatial parameter is present.
    ///
    /// # Errors
    ///
    /// * If both a box and a radius are given
    /// * If a radius query is missing its centre or radius
    /// * If the resulting query fails [`SpatialQuery::validate`]
    pub fn from_parts(
        bbox: Option<BoundingBox>,
        center_lat: Option<f64>,
        center_lng: Option<f64>,
        radius_meters: Option<f64>,
    ) -> Result<Option<Self>, SpatialError> {
        let wants_radius = center_lat.is_some() || center_lng.is_some() || radius_meters.is_some();

        let query = match (bbox, wants_radius) {
            (Some(_), true) => {
                return Err(SpatialError::invalid(
                    "bounding box and radius cannot be combined",
                ));
            }
            (Some(bbox), false) => Self::BoundingBox(bbox),
            (None, true) => {
                let (Some(lat), Some(lng)) = (center_lat, center_lng) else {
                    return Err(SpatialError::invalid(
                        "radius queries need both center latitude and longitude",
                    ));
                };
                let Some(radius_meters) = radius_meters else {
                    return Err(SpatialError::invalid("center given without a radius"));
                };
                Self::Radius {
                    center: GeoPoint::new(lat, lng),
                    radius_meters,
                }
            }
            (None, false) => return Ok(None),
        };

        query.validate()?;
        Ok(Some(query))
    }

    /// Checks coordinate ranges, box ordering, and radius sign.
    ///
    /// # Errors
    ///
    /// * If the box is out of range or has `min > max` on an axis
    /// * If the centre is out of range or the radius is not positive
    pub fn validate(&self) -> Result<(), SpatialError> {
        match self {
            Self::BoundingBox(bbox) => {
                if bbox.is_ordered() {
                    Ok(())
                } else {
                    Err(SpatialError::invalid(format!(
                        "bounding box must have valid coordinates with min <= max \
                         (south={}, west={}, north={}, east={})",
                        bbox.south, bbox.west, bbox.north, bbox.east
                    )))
                }
            }
            Self::Radius {
                center,
                radius_meters,
            } => {
                if !center.is_valid() {
                    return Err(SpatialError::invalid(format!(
                        "center ({}, {}) is not a valid coordinate",
                        center.latitude, center.longitude
                    )));
                }
                if !radius_meters.is_finite() || *radius_meters <= 0.0 {
                    return Err(SpatialError::invalid(format!(
                        "radius must be positive, got {radius_meters}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Box that contains every point the query can match.
    #[must_use]
    pub fn envelope(&self) -> BoundingBox {
        match self {
            Self::BoundingBox(bbox) => *bbox,
            Self::Radius {
                center,
                radius_meters,
            } => BoundingBox::around(*center, *radius_meters),
        }
    }

    /// Exact membership test.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            Self::BoundingBox(bbox) => bbox.contains(point),
            Self::Radius {
                center,
                radius_meters,
            } => center.haversine_distance(point) <= *radius_meters,
        }
    }
}

/// Auxiliary filters applied after spatial narrowing.
///
/// Empty collections and unbounded ranges are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    /// Inclusive occurrence window.
    pub date_range: DateRange,
    /// Accepted statuses of the incident's case. Incidents without a case
    /// never match a non-empty status filter.
    pub statuses: BTreeSet<CaseStatus>,
    /// Tag names; an incident matches if it carries any of them.
    pub tag_names: BTreeSet<String>,
}

impl IncidentFilter {
    /// Restricts to an occurrence window.
    #[must_use]
    pub const fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    /// Restricts to incidents whose case has one of `statuses`.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = CaseStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Restricts to incidents carrying any of `tag_names`.
    #[must_use]
    pub fn with_tag_names<S: Into<String>>(mut self, tag_names: impl IntoIterator<Item = S>) -> Self {
        self.tag_names = tag_names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether no auxiliary filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date_range.is_unbounded() && self.statuses.is_empty() && self.tag_names.is_empty()
    }

    /// Checks the date window.
    ///
    /// # Errors
    ///
    /// * If `from` is after `to`
    pub fn validate(&self) -> Result<(), SpatialError> {
        if self.date_range.is_inverted() {
            return Err(SpatialError::invalid("date range start is after its end"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_parameters_means_no_spatial_query() {
        assert!(
            SpatialQuery::from_parts(None, None, None, None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn radius_without_full_center_is_rejected() {
        let err = SpatialQuery::from_parts(None, Some(12.9), None, Some(500.0)).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidQuery { .. }));
        let err = SpatialQuery::from_parts(None, Some(12.9), Some(77.5), None).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidQuery { .. }));
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        assert!(SpatialQuery::from_parts(None, Some(12.9), Some(77.5), Some(0.0)).is_err());
        assert!(SpatialQuery::from_parts(None, Some(12.9), Some(77.5), Some(f64::NAN)).is_err());
    }

    #[test]
    fn inverted_box_is_rejected() {
        let bbox = BoundingBox::new(77.60, 12.95, 77.55, 12.98);
        assert!(SpatialQuery::from_parts(Some(bbox), None, None, None).is_err());
    }

    #[test]
    fn box_and_radius_cannot_be_combined() {
        let bbox = BoundingBox::new(77.55, 12.95, 77.60, 12.98);
        assert!(SpatialQuery::from_parts(Some(bbox), Some(12.9), Some(77.5), Some(10.0)).is_err());
    }

    #[test]
    fn radius_contains_uses_great_circle_distance() {
        let query = SpatialQuery::Radius {
            center: GeoPoint::new(12.96, 77.56),
            radius_meters: 500.0,
        };
        assert!(query.contains(&GeoPoint::new(12.963, 77.56)));
        assert!(!query.contains(&GeoPoint::new(12.97, 77.56)));
        assert!(query.envelope().contains(&GeoPoint::new(12.963, 77.56)));
    }
}
