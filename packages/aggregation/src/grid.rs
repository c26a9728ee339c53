//! Fixed-grid binning.
//!
//! Cells are anchored at latitude/longitude `(0, 0)`, so a point lands in
//! the same cell whatever viewport it was queried from.

use std::collections::BTreeMap;

use canopy_map_aggregation_models::{ClusterSummary, SpatialPoint};

use crate::summarize;

/// Integer address of a grid cell: `(row, column)`.
pub type CellKey = (i64, i64);

/// Returns the cell containing the point.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cell_key(lat: f64, lng: f64, cell_size: f64) -> CellKey {
    (
        (lat / cell_size).floor() as i64,
        (lng / cell_size).floor() as i64,
    )
}

/// Bins `points` into square cells of `cell_size` degrees and summarizes
/// each non-empty cell.
///
/// Clusters are returned in cell order (south to north, then west to
/// east).
#[must_use]
pub fn grid_bin(points: &[SpatialPoint], cell_size: f64) -> Vec<ClusterSummary> {
    let mut cells: BTreeMap<CellKey, Vec<&SpatialPoint>> = BTreeMap::new();
    for point in points {
        cells
            .entry(cell_key(point.lat, point.lng, cell_size))
            .or_default()
            .push(point);
    }

    cells
        .values()
        .map(|members| summarize(members))
        .collect()
}
