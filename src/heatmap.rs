//! Uniform-grid scenic heatmap.
//!
//! Sparse scored samples are binned into square cells laid out on a local
//! equirectangular plane anchored at the bounding box's south-west corner.
//! Row 0 is the southernmost row; cells are stored row-major and every cell
//! of the box is emitted, scored or not.
//!
//! Cells are half-open (`[k * step, (k + 1) * step)`). A sample lying exactly
//! on the north or east edge of the box is still inside it and lands in the
//! last row or column.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HeatmapParams;
use crate::error::{Result, ScenicError};
use crate::haversine::{LocalProjection, haversine_m};

/// Tolerance absorbing projection round-off at exact cell multiples.
const GRID_EPSILON: f64 = 1e-9;

/// Upper bound on the number of cells in one grid.
pub const MAX_CELLS: usize = 50_000_000;

/// A scored street-level sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    pub lat: f64,
    pub lon: f64,
    pub scenic_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Box extending `width_m` east and `height_m` north of `south_west`.
    pub fn from_extent(south_west: (f64, f64), width_m: f64, height_m: f64) -> Self {
        let projection = LocalProjection::new(south_west);
        let (max_lat, max_lon) = projection.unproject(width_m, height_m);
        Self::new(south_west.0, south_west.1, max_lat, max_lon)
    }

    /// Square box circumscribing a search radius around `center`.
    pub fn around(center: (f64, f64), radius_m: f64) -> Self {
        let projection = LocalProjection::new(center);
        let (min_lat, min_lon) = projection.unproject(-radius_m, -radius_m);
        let (max_lat, max_lon) = projection.unproject(radius_m, radius_m);
        Self::new(min_lat, min_lon, max_lat, max_lon)
    }

    pub fn south_west(&self) -> (f64, f64) {
        (self.min_lat, self.min_lon)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: (f64, f64)) -> bool {
        point.0 >= self.min_lat
            && point.0 <= self.max_lat
            && point.1 >= self.min_lon
            && point.1 <= self.max_lon
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_lat, self.min_lon, self.max_lat, self.max_lon]
            .iter()
            .all(|value| value.is_finite());
        if !finite || self.min_lat >= self.max_lat || self.min_lon >= self.max_lon {
            return Err(ScenicError::config(format!(
                "invalid bounding box {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// One grid cell. `scenic_score` is `None` exactly when `n_samples == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    pub center_lat: f64,
    pub center_lon: f64,
    pub scenic_score: Option<f64>,
    pub n_samples: u32,
    pub coverage: f64,
}

impl GridCell {
    pub fn center(&self) -> (f64, f64) {
        (self.center_lat, self.center_lon)
    }
}

/// Counts describing what happened to the input samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub accepted: usize,
    pub dropped_outside: usize,
    /// Non-finite scores or coordinates.
    pub dropped_invalid: usize,
}

/// Aggregate statistics over a built heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_cells: usize,
    pub scored_cells: usize,
    pub coverage_ratio: f64,
    pub total_samples: u64,
    pub scored_bounds: Option<BoundingBox>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    origin: (f64, f64),
    step_m: f64,
    bounding_box: BoundingBox,
    rows: u32,
    cols: u32,
    cells: Vec<GridCell>,
}

impl Heatmap {
    /// Bins `samples` into a grid covering `bounding_box`.
    ///
    /// Samples outside the box or with non-finite values are dropped and
    /// counted; scores are clamped into `0.0..=1.0`.
    pub fn build(
        bounding_box: BoundingBox,
        params: &HeatmapParams,
        samples: &[ScoredSample],
    ) -> Result<(Self, BuildReport)> {
        params.validate()?;
        bounding_box.validate()?;

        let origin = bounding_box.south_west();
        let projection = LocalProjection::new(origin);
        let step_m = params.step_m;
        let (width_m, height_m) = projection.project((bounding_box.max_lat, bounding_box.max_lon));
        let rows = grid_extent(height_m, step_m)?;
        let cols = grid_extent(width_m, step_m)?;

        let cell_count = rows as usize * cols as usize;
        if cell_count > MAX_CELLS {
            return Err(ScenicError::config(format!(
                "grid of {} x {} cells exceeds the limit of {} for step {}",
                rows, cols, MAX_CELLS, step_m
            )));
        }
        let mut sums = vec![0.0f64; cell_count];
        let mut counts = vec![0u32; cell_count];
        let mut report = BuildReport::default();

        for sample in samples {
            let point = (sample.lat, sample.lon);
            if !sample.scenic_score.is_finite() || !point.0.is_finite() || !point.1.is_finite() {
                report.dropped_invalid += 1;
                continue;
            }
            if !bounding_box.contains(point) {
                report.dropped_outside += 1;
                continue;
            }

            let (row, col) = clamp_index(projection.project(point), step_m, rows, cols);
            let idx = row as usize * cols as usize + col as usize;
            sums[idx] += sample.scenic_score.clamp(0.0, 1.0);
            counts[idx] += 1;
            report.accepted += 1;
        }

        let mut cells = Vec::with_capacity(cell_count);
        for row in 0..rows {
            for col in 0..cols {
                let idx = row as usize * cols as usize + col as usize;
                let n_samples = counts[idx];
                let (center_lat, center_lon) = projection.unproject(
                    (col as f64 + 0.5) * step_m,
                    (row as f64 + 0.5) * step_m,
                );
                let scenic_score = (n_samples > 0).then(|| sums[idx] / n_samples as f64);
                cells.push(GridCell {
                    row,
                    col,
                    center_lat,
                    center_lon,
                    scenic_score,
                    n_samples,
                    coverage: coverage_for(n_samples, params.expected_samples_per_cell),
                });
            }
        }

        info!(
            rows,
            cols,
            accepted = report.accepted,
            dropped_outside = report.dropped_outside,
            dropped_invalid = report.dropped_invalid,
            "built scenic heatmap"
        );

        Ok((
            Self {
                origin,
                step_m,
                bounding_box,
                rows,
                cols,
                cells,
            },
            report,
        ))
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn step_m(&self) -> f64 {
        self.step_m
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&GridCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row as usize * self.cols as usize + col as usize)
    }

    /// Grid index of `point`, using the same projection and boundary rule as
    /// [`Heatmap::build`].
    ///
    /// The grid may extend past the bounding box's north and east edges when
    /// the box is not a whole number of steps; points in that margin still
    /// resolve to the last row or column. `None` outside the grid.
    pub fn cell_index(&self, point: (f64, f64)) -> Option<(u32, u32)> {
        if !point.0.is_finite() || !point.1.is_finite() {
            return None;
        }
        let projection = LocalProjection::new(self.origin);
        let (x, y) = projection.project(point);
        let width_m = self.cols as f64 * self.step_m;
        let height_m = self.rows as f64 * self.step_m;
        if !(0.0..=width_m).contains(&x) || !(0.0..=height_m).contains(&y) {
            return None;
        }
        Some(clamp_index((x, y), self.step_m, self.rows, self.cols))
    }

    /// Scored cells, best first; ties keep row-major order.
    pub fn scenic_cells(&self) -> Vec<&GridCell> {
        let mut scored: Vec<&GridCell> = self
            .cells
            .iter()
            .filter(|cell| cell.scenic_score.is_some())
            .collect();
        scored.sort_by(|a, b| {
            let a = a.scenic_score.unwrap_or(0.0);
            let b = b.scenic_score.unwrap_or(0.0);
            b.total_cmp(&a)
        });
        scored
    }

    pub fn coverage_summary(&self) -> CoverageSummary {
        let total_cells = self.cells.len();
        let mut scored_cells = 0usize;
        let mut total_samples = 0u64;
        let mut score_sum = 0.0;
        let mut min_score: Option<f64> = None;
        let mut max_score: Option<f64> = None;
        let mut bounds: Option<BoundingBox> = None;

        for cell in &self.cells {
            total_samples += cell.n_samples as u64;
            let Some(score) = cell.scenic_score else {
                continue;
            };
            scored_cells += 1;
            score_sum += score;
            min_score = Some(min_score.map_or(score, |current| current.min(score)));
            max_score = Some(max_score.map_or(score, |current| current.max(score)));
            bounds = Some(match bounds {
                None => BoundingBox::new(
                    cell.center_lat,
                    cell.center_lon,
                    cell.center_lat,
                    cell.center_lon,
                ),
                Some(b) => BoundingBox::new(
                    b.min_lat.min(cell.center_lat),
                    b.min_lon.min(cell.center_lon),
                    b.max_lat.max(cell.center_lat),
                    b.max_lon.max(cell.center_lon),
                ),
            });
        }

        CoverageSummary {
            total_cells,
            scored_cells,
            coverage_ratio: if total_cells > 0 {
                scored_cells as f64 / total_cells as f64
            } else {
                0.0
            },
            total_samples,
            scored_bounds: bounds,
            min_score,
            max_score,
            mean_score: (scored_cells > 0).then(|| score_sum / scored_cells as f64),
        }
    }

    /// Distance from `point` to the center of cell (`row`, `col`).
    pub fn distance_to_center(&self, point: (f64, f64), row: u32, col: u32) -> Option<f64> {
        self.cell(row, col).map(|cell| haversine_m(point, cell.center()))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.display(), cells = self.cells.len(), "wrote heatmap");
        Ok(())
    }

    /// Reloads a persisted heatmap without recomputing anything. The cell
    /// sequence is checked against the header.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let heatmap: Heatmap = serde_json::from_reader(BufReader::new(file))?;
        heatmap.check_layout()?;
        Ok(heatmap)
    }

    fn check_layout(&self) -> Result<()> {
        if !(self.step_m > 0.0) {
            return Err(ScenicError::data("heatmap step_m must be > 0"));
        }
        if self.cells.len() != self.rows as usize * self.cols as usize {
            return Err(ScenicError::data(format!(
                "heatmap declares {}x{} cells but holds {}",
                self.rows,
                self.cols,
                self.cells.len()
            )));
        }
        for (idx, cell) in self.cells.iter().enumerate() {
            let expected = (
                (idx / self.cols as usize) as u32,
                (idx % self.cols as usize) as u32,
            );
            if (cell.row, cell.col) != expected {
                return Err(ScenicError::data(format!(
                    "heatmap cell {} out of row-major order",
                    idx
                )));
            }
            if cell.scenic_score.is_some() != (cell.n_samples > 0) {
                return Err(ScenicError::data(format!(
                    "heatmap cell ({}, {}) score disagrees with sample count",
                    cell.row, cell.col
                )));
            }
        }
        Ok(())
    }
}

/// Coverage saturates once a cell holds `expected` samples.
pub fn coverage_for(n_samples: u32, expected: f64) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    (n_samples as f64 / expected).min(1.0)
}

fn grid_extent(length_m: f64, step_m: f64) -> Result<u32> {
    let cells = (length_m / step_m - GRID_EPSILON).ceil().max(1.0);
    if cells > u32::MAX as f64 {
        return Err(ScenicError::config(format!(
            "grid of {} cells per side is too large for step {}",
            cells, step_m
        )));
    }
    Ok(cells as u32)
}

fn clamp_index((x, y): (f64, f64), step_m: f64, rows: u32, cols: u32) -> (u32, u32) {
    let row = (y / step_m).floor().clamp(0.0, (rows - 1) as f64) as u32;
    let col = (x / step_m).floor().clamp(0.0, (cols - 1) as f64) as u32;
    (row, col)
}
