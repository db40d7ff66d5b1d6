//! Runs the per-sample scoring collaborator ahead of heatmap construction.

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::heatmap::ScoredSample;
use crate::retry::with_retry;
use crate::traits::{SampleRef, SampleScorer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingReport {
    pub scored: usize,
    pub no_image: usize,
    /// Non-finite scores returned by the scorer.
    pub invalid: usize,
    /// Errors after retries were exhausted.
    pub failed: usize,
}

enum Outcome {
    Scored(ScoredSample),
    NoImage,
    Invalid,
    Failed,
}

/// Scores every sample on `pool`. A failing sample is logged and counted,
/// never fatal. Output keeps the input order.
pub fn collect_scored_samples<S>(
    samples: &[SampleRef],
    scorer: &S,
    retry: &RetryPolicy,
    pool: &ThreadPool,
) -> (Vec<ScoredSample>, SamplingReport)
where
    S: SampleScorer,
{
    let outcomes: Vec<Outcome> = pool.install(|| {
        samples
            .par_iter()
            .map(|sample| score_one(sample, scorer, retry))
            .collect()
    });

    let mut report = SamplingReport::default();
    let mut scored = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Outcome::Scored(sample) => {
                report.scored += 1;
                scored.push(sample);
            }
            Outcome::NoImage => report.no_image += 1,
            Outcome::Invalid => report.invalid += 1,
            Outcome::Failed => report.failed += 1,
        }
    }

    info!(
        total = samples.len(),
        scored = report.scored,
        no_image = report.no_image,
        invalid = report.invalid,
        failed = report.failed,
        "scored samples"
    );

    (scored, report)
}

fn score_one<S: SampleScorer>(sample: &SampleRef, scorer: &S, retry: &RetryPolicy) -> Outcome {
    match with_retry(retry, "sample score", || scorer.score(sample)) {
        Ok(Some(score)) if score.is_finite() => Outcome::Scored(ScoredSample {
            lat: sample.lat,
            lon: sample.lon,
            scenic_score: score.clamp(0.0, 1.0),
        }),
        Ok(Some(score)) => {
            warn!(id = %sample.id, score, "scorer returned a non-finite score");
            Outcome::Invalid
        }
        Ok(None) => {
            debug!(id = %sample.id, "no image found for sample");
            Outcome::NoImage
        }
        Err(err) => {
            warn!(id = %sample.id, error = %err, "skipping sample");
            Outcome::Failed
        }
    }
}
