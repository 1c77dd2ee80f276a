//! R-tree over a slice of incidents for radius-neighbour lookups.

use crime_intel_database_models::{BoundingBox, GeoPoint, IncidentRecord};
use rstar::{AABB, RTree, RTreeObject};

/// An incident position stored in the R-tree, pointing back into the
/// indexed slice.
struct IndexedPoint {
    slot: usize,
    location: GeoPoint,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.longitude, self.location.latitude])
    }
}

/// Point index over a borrowed slice of incidents.
///
/// Lookups return slot numbers (positions in the slice) in ascending
/// order, so an id-sorted slice yields id-sorted neighbours. Incidents
/// with invalid coordinates are never returned.
pub struct PointIndex<'a> {
    incidents: &'a [IncidentRecord],
    tree: RTree<IndexedPoint>,
}

impl<'a> PointIndex<'a> {
    /// Bulk-loads an R-tree over `incidents`.
    #[must_use]
    pub fn build(incidents: &'a [IncidentRecord]) -> Self {
        let points = incidents
            .iter()
            .enumerate()
            .filter(|(_, i)| i.location().is_valid())
            .map(|(slot, i)| IndexedPoint {
                slot,
                location: i.location(),
            })
            .collect();

        Self {
            incidents,
            tree: RTree::bulk_load(points),
        }
    }

    /// The indexed incidents.
    #[must_use]
    pub const fn incidents(&self) -> &'a [IncidentRecord] {
        self.incidents
    }

    /// Slots of every incident within `radius_meters` of `center`
    /// (inclusive), ascending.
    #[must_use]
    pub fn within_radius(&self, center: GeoPoint, radius_meters: f64) -> Vec<usize> {
        let bbox = BoundingBox::around(center, radius_meters);
        let envelope = AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north]);

        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|p| center.haversine_distance(&p.location) <= radius_meters)
            .map(|p| p.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Slots of the *other* incidents within `radius_meters` of the
    /// incident at `slot`, ascending.
    #[must_use]
    pub fn neighbours(&self, slot: usize, radius_meters: f64) -> Vec<usize> {
        let Some(incident) = self.incidents.get(slot) else {
            return Vec::new();
        };
        let location = incident.location();
        if !location.is_valid() {
            return Vec::new();
        }

        let mut slots = self.within_radius(location, radius_meters);
        slots.retain(|s| *s != slot);
        slots
    }
}
