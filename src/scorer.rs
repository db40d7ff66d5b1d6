//! Coverage-weighted scenic scoring of route geometries.
//!
//! A route is resampled at a fixed step and every position is looked up in
//! the heatmap. The mean over matched positions alone would reward a route
//! crossing a single well-scored cell, so the effective score discounts it by
//! the fraction of positions that matched at all.

use serde::{Deserialize, Serialize};

use crate::config::ScoringParams;
use crate::generator::RouteCandidate;
use crate::index::HeatmapIndex;
use crate::polyline::Polyline;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenicScore {
    pub scenic_score: Option<f64>,
    pub scenic_coverage: f64,
    pub scenic_effective_score: f64,
    pub matched: usize,
    pub sampled: usize,
    pub avg_lookup_distance_m: Option<f64>,
}

/// `score × coverage`, or 0 when nothing matched.
pub fn effective_score(scenic_score: Option<f64>, coverage: f64) -> f64 {
    scenic_score.map_or(0.0, |score| score * coverage)
}

#[derive(Debug, Clone, Copy)]
pub struct RouteScorer<'a> {
    index: HeatmapIndex<'a>,
    sample_step_m: f64,
    max_heatmap_distance_m: f64,
}

impl<'a> RouteScorer<'a> {
    pub fn new(index: HeatmapIndex<'a>, params: &ScoringParams) -> Self {
        Self {
            index,
            sample_step_m: params.sample_step_m,
            max_heatmap_distance_m: params.max_heatmap_distance_m,
        }
    }

    pub fn score_geometry(&self, geometry: &Polyline) -> ScenicScore {
        let positions = geometry.resample(self.sample_step_m);

        let mut matched = 0usize;
        let mut score_sum = 0.0;
        let mut distance_sum = 0.0;
        for &(lat, lon) in &positions {
            if let Some(hit) = self.index.lookup(lat, lon, self.max_heatmap_distance_m) {
                matched += 1;
                score_sum += hit.scenic_score;
                distance_sum += hit.distance_m;
            }
        }

        let sampled = positions.len();
        let scenic_score = (matched > 0).then(|| score_sum / matched as f64);
        let scenic_coverage = if sampled > 0 {
            matched as f64 / sampled as f64
        } else {
            0.0
        };

        ScenicScore {
            scenic_score,
            scenic_coverage,
            scenic_effective_score: effective_score(scenic_score, scenic_coverage),
            matched,
            sampled,
            avg_lookup_distance_m: (matched > 0).then(|| distance_sum / matched as f64),
        }
    }

    /// Fills the scenic fields of `candidate` in place.
    pub fn score_candidate(&self, candidate: &mut RouteCandidate) -> ScenicScore {
        let score = self.score_geometry(&candidate.geometry);
        candidate.scenic_score = score.scenic_score;
        candidate.scenic_coverage = score.scenic_coverage;
        candidate.scenic_effective_score = score.scenic_effective_score;
        candidate.scenic_matched = score.matched;
        candidate.scenic_sampled = score.sampled;
        score
    }
}
