//! Polyline representation for route geometries.
//!
//! Stores decoded (latitude, longitude) points. Wire formats (GeoJSON
//! coordinate arrays from the router) are converted at the boundary.

use std::hash::Hasher;

use fxhash::FxHasher64;
use serde::{Deserialize, Serialize};

use crate::haversine::{haversine_m, interpolate};

/// Rounding applied before hashing geometries (~11 m at the equator).
const SIGNATURE_PRECISION: f64 = 1e4;

/// Leftover below which the final vertex counts as already sampled.
const END_EPSILON_M: f64 = 1e-6;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    ///
    /// Each point is a (latitude, longitude) tuple.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Builds a polyline from GeoJSON-ordered `[lon, lat]` pairs.
    pub fn from_lon_lat(coordinates: &[[f64; 2]]) -> Self {
        Self {
            points: coordinates.iter().map(|[lon, lat]| (*lat, *lon)).collect(),
        }
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total great-circle length in metres.
    pub fn length_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_m(pair[0], pair[1]))
            .sum()
    }

    /// Positions every `step_m` metres along the line, starting at the first
    /// point. Distance left over at the end of a segment carries into the
    /// next one, so spacing stays uniform across vertices. The final vertex is
    /// appended unless a step landed on it.
    pub fn resample(&self, step_m: f64) -> Vec<(f64, f64)> {
        let Some(&first) = self.points.first() else {
            return Vec::new();
        };
        let mut samples = vec![first];
        if step_m <= 0.0 {
            return samples;
        }

        // distance travelled since the last emitted sample
        let mut carried = 0.0;
        for pair in self.points.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let segment = haversine_m(from, to);
            if segment <= 0.0 {
                continue;
            }

            let mut offset = step_m - carried;
            while offset <= segment {
                samples.push(interpolate(from, to, offset / segment));
                offset += step_m;
            }
            carried = segment - (offset - step_m);
        }

        if carried > END_EPSILON_M {
            if let Some(&last) = self.points.last() {
                samples.push(last);
            }
        }
        samples
    }

    /// Stable hash of the rounded geometry.
    ///
    /// Routes that follow the same roads produce the same signature even when
    /// their coordinates differ by floating point noise.
    pub fn signature(&self) -> u64 {
        let mut hasher = FxHasher64::default();
        let mut previous: Option<(i64, i64)> = None;
        let mut count = 0u64;
        for &(lat, lon) in &self.points {
            let key = (
                (lat * SIGNATURE_PRECISION).round() as i64,
                (lon * SIGNATURE_PRECISION).round() as i64,
            );
            if previous == Some(key) {
                continue;
            }
            hasher.write_i64(key.0);
            hasher.write_i64(key.1);
            previous = Some(key);
            count += 1;
        }
        hasher.write_u64(count);
        hasher.finish()
    }
}
