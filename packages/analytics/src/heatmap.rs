//! Grid-based density aggregation.
//!
//! The bounding box is cut into square-ish cells of a requested edge
//! length. One degree of latitude spans [`METERS_PER_DEGREE`]; a degree of
//! longitude spans that times the cosine of the box's middle latitude.
//! Cells are half-open `[lower, lower + step)`, except that incidents on
//! the box's north or east edge land in the last row or column.

use std::collections::BTreeMap;

use crime_intel_analytics_models::{
    DensityThresholds, HeatmapCell, HeatmapParams, HeatmapResult,
};
use crime_intel_database_models::{BoundingBox, GeoPoint, IncidentRecord, METERS_PER_DEGREE};
use crime_intel_spatial::{CancelToken, CandidateSet, SpatialQuery};
use rayon::prelude::*;

use crate::{AnalysisContext, AnalyticsError, check_cancel, incident_filter};

const CHUNK_SIZE: usize = 1024;

/// Grid geometry derived from a box and a cell size.
#[derive(Debug, Clone, Copy)]
struct Grid {
    bbox: BoundingBox,
    lat_step: f64,
    lng_step: f64,
    rows: u32,
    cols: u32,
}

impl Grid {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(bbox: &BoundingBox, cell_size_meters: f64) -> Result<Self, AnalyticsError> {
        if !cell_size_meters.is_finite() || cell_size_meters <= 0.0 {
            return Err(AnalyticsError::invalid(format!(
                "cell size must be a positive number of meters, got {cell_size_meters}"
            )));
        }
        if !bbox.is_ordered() {
            return Err(AnalyticsError::invalid(
                "bounding box must have valid coordinates with min <= max",
            ));
        }
        if bbox.is_degenerate() {
            return Err(AnalyticsError::invalid("bounding box has zero area"));
        }

        let lat_step = cell_size_meters / METERS_PER_DEGREE;
        let mid_cos = ((bbox.south + bbox.north) / 2.0).to_radians().cos();
        let width = bbox.east - bbox.west;
        let lng_step = if mid_cos <= 1e-12 {
            width
        } else {
            cell_size_meters / (METERS_PER_DEGREE * mid_cos)
        };

        let rows = ((bbox.north - bbox.south) / lat_step).ceil().max(1.0);
        let cols = (width / lng_step).ceil().max(1.0);
        if rows > f64::from(u32::MAX) || cols > f64::from(u32::MAX) {
            return Err(AnalyticsError::invalid(format!(
                "cell size {cell_size_meters} m is too small for this bounding box"
            )));
        }

        Ok(Self {
            bbox: *bbox,
            lat_step,
            lng_step,
            rows: rows as u32,
            cols: cols as u32,
        })
    }

    /// `(row, col)` of a point inside the box.
    fn cell_of(&self, point: &GeoPoint) -> (u32, u32) {
        (
            cell_index(point.latitude, self.bbox.south, self.lat_step, self.rows),
            cell_index(point.longitude, self.bbox.west, self.lng_step, self.cols),
        )
    }

    fn center_of(&self, row: u32, col: u32) -> GeoPoint {
        let lat = (f64::from(row) + 0.5).mul_add(self.lat_step, self.bbox.south);
        let lng = (f64::from(col) + 0.5).mul_add(self.lng_step, self.bbox.west);
        GeoPoint::new(lat.min(self.bbox.north), lng.min(self.bbox.east))
    }
}

/// Index of the half-open cell `[origin + k * step, origin + (k + 1) * step)`
/// holding `value`, clamped to `0..count`.
///
/// The division can land one cell low or high when `value` sits on a cell
/// line, so the floor is checked against the same lower-bound formula
/// [`Grid::center_of`] uses.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_index(value: f64, origin: f64, step: f64, count: u32) -> u32 {
    let last = f64::from(count.saturating_sub(1));
    let mut k = ((value - origin) / step).floor().clamp(0.0, last);
    if k < last && (k + 1.0).mul_add(step, origin) <= value {
        k += 1.0;
    } else if k > 0.0 && k.mul_add(step, origin) > value {
        k -= 1.0;
    }
    k as u32
}

fn count_chunk(
    grid: &Grid,
    chunk: &[IncidentRecord],
    cancel: &CancelToken,
) -> Result<BTreeMap<(u32, u32), u32>, AnalyticsError> {
    check_cancel(cancel)?;
    let mut counts = BTreeMap::new();
    for incident in chunk {
        let location = incident.location();
        if !grid.bbox.contains(&location) {
            continue;
        }
        *counts.entry(grid.cell_of(&location)).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Buckets `candidates` into a grid over `bbox`.
///
/// Candidates outside the box are ignored. Chunks are counted in parallel
/// on `pool` and merged in chunk order.
///
/// # Errors
///
/// * If the cell size is not positive or the box is invalid or has zero
///   area
/// * If `cancel` fires
pub fn aggregate_grid(
    bbox: &BoundingBox,
    cell_size_meters: f64,
    candidates: &CandidateSet,
    thresholds: &DensityThresholds,
    pool: &rayon::ThreadPool,
    cancel: &CancelToken,
) -> Result<HeatmapResult, AnalyticsError> {
    let grid = Grid::new(bbox, cell_size_meters)?;

    let partials: Vec<BTreeMap<(u32, u32), u32>> = pool.install(|| {
        candidates
            .as_slice()
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| count_chunk(&grid, chunk, cancel))
            .collect::<Result<Vec<_>, _>>()
    })?;
    check_cancel(cancel)?;

    let mut counts: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    for partial in partials {
        for (cell, n) in partial {
            *counts.entry(cell).or_insert(0) += n;
        }
    }

    let total_incidents: u64 = counts.values().map(|n| u64::from(*n)).sum();
    let max_cell_count = counts.values().copied().max().unwrap_or(0);
    let cells: Vec<HeatmapCell> = counts
        .into_iter()
        .map(|((row, col), count)| HeatmapCell {
            row,
            col,
            center: grid.center_of(row, col),
            count,
            density: thresholds.classify(count),
        })
        .collect();

    log::debug!(
        "Heatmap {}x{} grid: {} incidents in {} non-empty cells",
        grid.rows,
        grid.cols,
        total_incidents,
        cells.len()
    );

    Ok(HeatmapResult {
        cell_size_meters,
        rows: grid.rows,
        cols: grid.cols,
        total_incidents,
        max_cell_count,
        cells,
    })
}

/// Builds a density heatmap for `params.bbox`.
///
/// # Errors
///
/// * If the parameters are invalid
/// * If the provider fails
/// * If `cancel` fires
pub fn generate_heatmap(
    ctx: &AnalysisContext<'_>,
    params: &HeatmapParams,
    cancel: &CancelToken,
) -> Result<HeatmapResult, AnalyticsError> {
    // Validate the grid before touching the provider.
    Grid::new(&params.bbox, params.cell_size_meters)?;

    let candidates = ctx.adapter().candidates(
        &SpatialQuery::BoundingBox(params.bbox),
        &incident_filter(&params.filter),
        cancel,
    )?;

    aggregate_grid(
        &params.bbox,
        params.cell_size_meters,
        &candidates,
        &ctx.config.density,
        ctx.pool,
        cancel,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureBuilder, lat_offset, ts};
    use crime_intel_analytics_models::{CandidateFilter, DensityLevel};

    fn scenario_bbox() -> BoundingBox {
        BoundingBox::new(77.55, 12.95, 77.60, 12.98)
    }

    #[test]
    fn eighteen_incidents_at_one_point_form_one_high_cell() {
        let mut builder = FixtureBuilder::new();
        for id in 1..=18 {
            builder = builder.incident(id, 12.9650, 77.5750, ts(2024, 5, 1, 10), &[]);
        }
        let engine = builder.build();

        let result = generate_heatmap(
            &engine.ctx(),
            &HeatmapParams::new(scenario_bbox()),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(result.cells.len(), 1);
        assert_eq!(result.cells[0].count, 18);
        assert_eq!(result.cells[0].density, DensityLevel::High);
        assert_eq!(result.total_incidents, 18);
        assert_eq!(result.max_cell_count, 18);
    }

    #[test]
    fn cell_counts_sum_to_candidate_count() {
        let mut builder = FixtureBuilder::new();
        for id in 0..200_i64 {
            #[allow(clippy::cast_precision_loss)]
            let step = id as f64;
            builder = builder.incident(
                id,
                12.95 + (step * 0.000_15) % 0.03,
                77.55 + (step * 0.000_37) % 0.05,
                ts(2024, 5, 1, 10),
                &[],
            );
        }
        let engine = builder.build();
        let result = generate_heatmap(
            &engine.ctx(),
            &HeatmapParams::new(scenario_bbox()),
            &CancelToken::new(),
        )
        .unwrap();

        let sum: u64 = result.cells.iter().map(|c| u64::from(c.count)).sum();
        assert_eq!(sum, 200);
        assert_eq!(result.total_incidents, 200);
        assert!(
            result
                .cells
                .windows(2)
                .all(|w| (w[0].row, w[0].col) < (w[1].row, w[1].col))
        );
    }

    #[test]
    fn north_east_corner_lands_in_last_cell() {
        let engine = FixtureBuilder::new()
            .incident(1, 12.98, 77.60, ts(2024, 5, 1, 10), &[])
            .incident(2, 12.95, 77.55, ts(2024, 5, 1, 10), &[])
            .build();
        let result = generate_heatmap(
            &engine.ctx(),
            &HeatmapParams::new(scenario_bbox()),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(result.cells.len(), 2);
        assert_eq!((result.cells[0].row, result.cells[0].col), (0, 0));
        let last = &result.cells[1];
        assert_eq!((last.row, last.col), (result.rows - 1, result.cols - 1));
        assert!(last.center.latitude <= 12.98);
        assert!(last.center.longitude <= 77.60);
    }

    #[test]
    fn half_open_cells_split_on_boundary() {
        let bbox = BoundingBox::new(0.0, 0.0, 0.1, 0.1);
        let engine = FixtureBuilder::new()
            .incident(1, lat_offset(99.0), 0.000_1, ts(2024, 5, 1, 10), &[])
            .incident(2, lat_offset(100.0), 0.000_1, ts(2024, 5, 1, 10), &[])
            .build();
        let params = HeatmapParams {
            bbox,
            cell_size_meters: 100.0,
            filter: CandidateFilter::default(),
        };
        let result = generate_heatmap(&engine.ctx(), &params, &CancelToken::new()).unwrap();
        let rows: Vec<u32> = result.cells.iter().map(|c| c.row).collect();
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn points_on_interior_lines_open_the_upper_cell() {
        let bbox = scenario_bbox();
        let grid = Grid::new(&bbox, 250.0).unwrap();
        for row in 0..grid.rows {
            let lat = f64::from(row).mul_add(grid.lat_step, bbox.south);
            if lat > bbox.north {
                continue;
            }
            assert_eq!(grid.cell_of(&GeoPoint::new(lat, 77.56)).0, row, "row {row}");
        }
        for col in 0..grid.cols {
            let lng = f64::from(col).mul_add(grid.lng_step, bbox.west);
            if lng > bbox.east {
                continue;
            }
            assert_eq!(grid.cell_of(&GeoPoint::new(12.96, lng)).1, col, "col {col}");
        }
    }

    #[test]
    fn incident_on_an_interior_line_is_counted_in_the_upper_row() {
        let bbox = scenario_bbox();
        let grid = Grid::new(&bbox, 250.0).unwrap();
        let line = 6.0_f64.mul_add(grid.lat_step, bbox.south);
        let engine = FixtureBuilder::new()
            .incident(1, line, 77.56, ts(2024, 5, 1, 10), &[])
            .build();
        let result = generate_heatmap(
            &engine.ctx(),
            &HeatmapParams::new(bbox),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.cells.len(), 1);
        assert_eq!(result.cells[0].row, 6);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let engine = FixtureBuilder::new().build();
        let ctx = engine.ctx();
        let cancel = CancelToken::new();

        let mut params = HeatmapParams::new(scenario_bbox());
        params.cell_size_meters = 0.0;
        assert_eq!(
            generate_heatmap(&ctx, &params, &cancel).unwrap_err().kind(),
            "invalid_query"
        );

        let params = HeatmapParams::new(BoundingBox::new(77.55, 12.95, 77.55, 12.98));
        assert_eq!(
            generate_heatmap(&ctx, &params, &cancel).unwrap_err().kind(),
            "invalid_query"
        );
    }

    #[test]
    fn cancellation_returns_no_partial_result() {
        let engine = FixtureBuilder::new()
            .incident(1, 12.96, 77.56, ts(2024, 5, 1, 10), &[])
            .build();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = generate_heatmap(&engine.ctx(), &HeatmapParams::new(scenario_bbox()), &cancel)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Cancelled));
    }
}
