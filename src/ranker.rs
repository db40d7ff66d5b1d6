//! Duration-budget filtering and composite scenic/speed ranking.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RankingParams;
use crate::error::{Result, ScenicError};
use crate::generator::RouteCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    DurationRatioExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRoute {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub duration_ratio: f64,
    pub composite_score: f64,
    pub normalized_scenic: f64,
    pub normalized_speed: f64,
    #[serde(flatten)]
    pub candidate: RouteCandidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRoute {
    pub rejected_reason: RejectionReason,
    pub duration_ratio: f64,
    #[serde(flatten)]
    pub candidate: RouteCandidate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub ranked: Vec<RankedRoute>,
    pub rejected: Vec<RejectedRoute>,
}

impl Ranking {
    pub fn best(&self) -> Option<&RankedRoute> {
        self.ranked.first()
    }
}

/// Inverse duration; faster routes score higher.
pub fn speed_score(duration_s: f64) -> f64 {
    if duration_s > 0.0 { 1.0 / duration_s } else { 0.0 }
}

/// Ranks `candidates` against the fastest route's duration.
///
/// Candidates slower than `max_duration_ratio × base_duration_s` are moved to
/// the rejected set, except the base route itself which always survives.
pub fn rank(
    candidates: Vec<RouteCandidate>,
    base_duration_s: f64,
    params: &RankingParams,
) -> Result<Ranking> {
    if !(base_duration_s.is_finite() && base_duration_s > 0.0) {
        return Err(ScenicError::data(format!(
            "base route duration must be positive, got {}",
            base_duration_s
        )));
    }

    let mut survivors = Vec::with_capacity(candidates.len());
    let mut rejected = Vec::new();
    for candidate in candidates {
        let duration_ratio = candidate.duration_s / base_duration_s;
        if !candidate.is_base() && duration_ratio > params.max_duration_ratio {
            debug!(
                duration_ratio,
                max = params.max_duration_ratio,
                "rejecting candidate over duration budget"
            );
            rejected.push(RejectedRoute {
                rejected_reason: RejectionReason::DurationRatioExceeded,
                duration_ratio,
                candidate,
            });
        } else {
            survivors.push((candidate, duration_ratio));
        }
    }

    let scenic = normalize(survivors.iter().map(|(c, _)| c.scenic_effective_score));
    let speed = normalize(survivors.iter().map(|(c, _)| speed_score(c.duration_s)));

    let weight = params.scenic_weight;
    let mut ranked: Vec<RankedRoute> = survivors
        .into_iter()
        .zip(scenic.into_iter().zip(speed))
        .map(|((candidate, duration_ratio), (normalized_scenic, normalized_speed))| RankedRoute {
            rank: 0,
            duration_ratio,
            composite_score: weight * normalized_scenic + (1.0 - weight) * normalized_speed,
            normalized_scenic,
            normalized_speed,
            candidate,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then(a.duration_ratio.total_cmp(&b.duration_ratio))
            .then(a.candidate.distance_m.total_cmp(&b.candidate.distance_m))
    });
    for (position, route) in ranked.iter_mut().enumerate() {
        route.rank = position + 1;
    }

    info!(
        ranked = ranked.len(),
        rejected = rejected.len(),
        "ranked candidates"
    );

    Ok(Ranking { ranked, rejected })
}

/// Min-max normalisation; a zero range maps every value to 1.0.
fn normalize(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let values: Vec<f64> = values.collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}
