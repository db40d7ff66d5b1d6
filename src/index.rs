//! Constant-time scenic lookups over a built heatmap.
//!
//! The heatmap is a regular grid, so the nearest candidate cell for a query
//! is found by index arithmetic instead of a neighbour search.

use crate::haversine::haversine_m;
use crate::heatmap::Heatmap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapMatch {
    pub scenic_score: f64,
    pub coverage: f64,
    /// Distance from the query to the matched cell's center.
    pub distance_m: f64,
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct HeatmapIndex<'a> {
    heatmap: &'a Heatmap,
}

impl<'a> HeatmapIndex<'a> {
    pub fn new(heatmap: &'a Heatmap) -> Self {
        Self { heatmap }
    }

    pub fn heatmap(&self) -> &'a Heatmap {
        self.heatmap
    }

    /// Score and coverage of the cell containing (`lat`, `lon`).
    ///
    /// No match when the point is outside the grid, the cell is unscored, or
    /// the cell center is farther than `max_distance_m`.
    pub fn lookup(&self, lat: f64, lon: f64, max_distance_m: f64) -> Option<HeatmapMatch> {
        let point = (lat, lon);
        let (row, col) = self.heatmap.cell_index(point)?;
        let cell = self.heatmap.cell(row, col)?;
        let scenic_score = cell.scenic_score?;

        let distance_m = haversine_m(point, cell.center());
        if distance_m > max_distance_m {
            return None;
        }

        Some(HeatmapMatch {
            scenic_score,
            coverage: cell.coverage,
            distance_m,
            row,
            col,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeatmapParams;
    use crate::haversine::LocalProjection;
    use crate::heatmap::{BoundingBox, ScoredSample};

    const SW: (f64, f64) = (47.60, -122.35);

    fn build(samples: &[(f64, f64, f64)]) -> Heatmap {
        let projection = LocalProjection::new(SW);
        let samples: Vec<ScoredSample> = samples
            .iter()
            .map(|&(x, y, score)| {
                let (lat, lon) = projection.unproject(x, y);
                ScoredSample {
                    lat,
                    lon,
                    scenic_score: score,
                }
            })
            .collect();
        let params = HeatmapParams {
            step_m: 200.0,
            expected_samples_per_cell: 1.0,
        };
        Heatmap::build(BoundingBox::from_extent(SW, 1000.0, 1000.0), &params, &samples)
            .unwrap()
            .0
    }

    #[test]
    fn test_cell_edges_are_half_open() {
        let heatmap = build(&[(199.0, 10.0, 0.2), (201.0, 10.0, 0.8)]);
        let index = HeatmapIndex::new(&heatmap);
        let left = heatmap.cell(0, 0).unwrap();
        let right = heatmap.cell(0, 1).unwrap();
        let left_hit = index.lookup(left.center_lat, left.center_lon, 1.0).unwrap();
        let right_hit = index.lookup(right.center_lat, right.center_lon, 1.0).unwrap();
        assert_eq!(left_hit.scenic_score, 0.2);
        assert_eq!(right_hit.scenic_score, 0.8);

        let on_edge = LocalProjection::new(SW).unproject(200.5, 100.0);
        assert_eq!(index.lookup(on_edge.0, on_edge.1, 500.0).unwrap().col, 1);
    }

    #[test]
    fn test_lookup_at_center_matches() {
        let heatmap = build(&[(300.0, 500.0, 0.7)]);
        let index = HeatmapIndex::new(&heatmap);
        let cell = heatmap.cell(2, 1).unwrap();
        let hit = index.lookup(cell.center_lat, cell.center_lon, 0.0).unwrap();
        assert_eq!(hit.scenic_score, 0.7);
        assert_eq!(hit.coverage, 1.0);
        assert_eq!((hit.row, hit.col), (2, 1));
        assert!(hit.distance_m < 1e-6);
    }

    #[test]
    fn test_lookup_respects_distance_cutoff() {
        let heatmap = build(&[(100.0, 100.0, 0.5)]);
        let index = HeatmapIndex::new(&heatmap);
        // corner of the cell, ~141 m from its center
        let corner = LocalProjection::new(SW).unproject(1.0, 1.0);
        assert!(index.lookup(corner.0, corner.1, 100.0).is_none());
        assert!(index.lookup(corner.0, corner.1, 150.0).is_some());
    }

    #[test]
    fn test_unscored_or_outside_is_no_match() {
        let heatmap = build(&[(100.0, 100.0, 0.5)]);
        let index = HeatmapIndex::new(&heatmap);
        let empty = heatmap.cell(3, 3).unwrap();
        assert!(index.lookup(empty.center_lat, empty.center_lon, 1000.0).is_none());

        let outside = LocalProjection::new(SW).unproject(-50.0, 100.0);
        assert!(index.lookup(outside.0, outside.1, 10_000.0).is_none());
        assert!(index.lookup(f64::NAN, SW.1, 10_000.0).is_none());
    }
}
