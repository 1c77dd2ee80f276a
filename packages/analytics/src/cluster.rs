//! Density-based spatial clustering (DBSCAN).
//!
//! A point is a core point when at least `min_points` *other* points lie
//! within `radius_meters` of it. Core points that reach each other form
//! one cluster; a non-core point within reach of a core point joins the
//! first (lowest-label) cluster that reaches it; anything else is noise.
//!
//! Input is sorted by incident id first and clusters are labelled in
//! discovery order, so the output never depends on input order.

use std::collections::{BTreeMap, VecDeque};

use crime_intel_analytics_models::{Cluster, ClusterParams, ClusterResult};
use crime_intel_database_models::{GeoPoint, IncidentRecord};
use crime_intel_spatial::{CancelToken, PointIndex, SpatialError, SpatialQuery};
use geo::{Centroid as _, MultiPoint, Point};
use rayon::prelude::*;

use crate::{AnalysisContext, AnalyticsError, check_cancel, incident_filter};

fn validate(radius_meters: f64, min_points: usize) -> Result<(), AnalyticsError> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(AnalyticsError::invalid(format!(
            "cluster radius must be a positive number of meters, got {radius_meters}"
        )));
    }
    if min_points < 1 {
        return Err(AnalyticsError::invalid("min_points must be at least 1"));
    }
    Ok(())
}

fn centroid(members: &[&IncidentRecord]) -> Option<GeoPoint> {
    let points: MultiPoint<f64> = members
        .iter()
        .map(|i| Point::new(i.longitude, i.latitude))
        .collect::<Vec<_>>()
        .into();
    points.centroid().map(|c| GeoPoint::new(c.y(), c.x()))
}

/// Runs DBSCAN over `incidents`.
///
/// Neighbour lists are computed in parallel on `pool` through an R-tree;
/// label expansion is sequential. Incidents without a valid location are
/// always noise.
///
/// # Errors
///
/// * If `radius_meters` is not positive or `min_points` is zero
/// * If `cancel` fires
pub fn detect_clusters(
    incidents: &[IncidentRecord],
    radius_meters: f64,
    min_points: usize,
    pool: &rayon::ThreadPool,
    cancel: &CancelToken,
) -> Result<ClusterResult, AnalyticsError> {
    validate(radius_meters, min_points)?;

    let mut sorted = incidents.to_vec();
    sorted.sort_by_key(|i| i.id);
    sorted.dedup_by_key(|i| i.id);

    let index = PointIndex::build(&sorted);
    let neighbours: Vec<Vec<usize>> = pool.install(|| {
        (0..sorted.len())
            .into_par_iter()
            .map(|slot| {
                cancel.check()?;
                Ok(index.neighbours(slot, radius_meters))
            })
            .collect::<Result<Vec<_>, SpatialError>>()
    })?;

    let is_core: Vec<bool> = neighbours.iter().map(|n| n.len() >= min_points).collect();
    let mut labels: Vec<Option<usize>> = vec![None; sorted.len()];
    let mut next_label = 0;

    for seed in 0..sorted.len() {
        if !is_core[seed] || labels[seed].is_some() {
            continue;
        }
        check_cancel(cancel)?;

        let label = next_label;
        next_label += 1;
        labels[seed] = Some(label);

        let mut queue = VecDeque::from([seed]);
        while let Some(slot) = queue.pop_front() {
            for &other in &neighbours[slot] {
                if labels[other].is_none() {
                    labels[other] = Some(label);
                    if is_core[other] {
                        queue.push_back(other);
                    }
                }
            }
        }
    }

    let mut members: BTreeMap<usize, Vec<&IncidentRecord>> = BTreeMap::new();
    let mut noise_count = 0;
    for (slot, label) in labels.iter().enumerate() {
        match label {
            Some(label) => members.entry(*label).or_default().push(&sorted[slot]),
            None => noise_count += 1,
        }
    }

    let clusters: Vec<Cluster> = members
        .into_iter()
        .filter_map(|(label, members)| {
            Some(Cluster {
                label,
                incident_ids: members.iter().map(|i| i.id).collect(),
                incident_count: members.len(),
                centroid: centroid(&members)?,
            })
        })
        .collect();

    log::debug!(
        "DBSCAN over {} incidents: {} clusters, {noise_count} noise",
        sorted.len(),
        clusters.len()
    );

    Ok(ClusterResult {
        radius_meters,
        min_points,
        total_incidents: sorted.len(),
        noise_count,
        clusters,
    })
}

/// Selects candidates for `params` and clusters them.
///
/// # Errors
///
/// * If the parameters are invalid
/// * If the provider fails
/// * If `cancel` fires
pub fn find_clusters(
    ctx: &AnalysisContext<'_>,
    params: &ClusterParams,
    cancel: &CancelToken,
) -> Result<ClusterResult, AnalyticsError> {
    validate(params.radius_meters, params.min_points)?;

    let query = params.bbox.map(SpatialQuery::BoundingBox);
    let candidates =
        ctx.adapter()
            .select(query.as_ref(), &incident_filter(&params.filter), cancel)?;

    detect_clusters(
        candidates.as_slice(),
        params.radius_meters,
        params.min_points,
        ctx.pool,
        cancel,
    )
}
