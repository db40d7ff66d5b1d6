//! End-to-end pipeline: samples -> heatmap -> candidates -> scores -> ranking.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::RequestCache;
use crate::config::PlannerConfig;
use crate::error::{Result, ScenicError};
use crate::generator::{GenerationReport, generate_candidates, heatmap_waypoints};
use crate::heatmap::{BoundingBox, BuildReport, CoverageSummary, Heatmap, ScoredSample};
use crate::index::HeatmapIndex;
use crate::osrm::OsrmClient;
use crate::ranker::{RankedRoute, RejectedRoute, rank};
use crate::sampling::{SamplingReport, collect_scored_samples};
use crate::scorer::RouteScorer;
use crate::traits::{RoutingProvider, SampleRef, SampleScorer};

/// Bounded pool for network-bound work.
pub fn worker_pool(workers: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("scenic-worker-{}", i))
        .build()
        .map_err(|err| ScenicError::config(format!("failed to build worker pool: {}", err)))
}

/// Result of one planning run, including counts of everything skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub ranked: Vec<RankedRoute>,
    pub rejected: Vec<RejectedRoute>,
    pub base_duration_s: f64,
    pub candidates_scored: usize,
    pub generation: GenerationReport,
    pub heatmap_coverage: CoverageSummary,
}

impl PlanOutcome {
    pub fn best(&self) -> Option<&RankedRoute> {
        self.ranked.first()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), routes = self.ranked.len(), "wrote ranked routes");
        Ok(())
    }
}

pub struct ScenicPlanner<R> {
    config: PlannerConfig,
    router: R,
    pool: ThreadPool,
}

impl ScenicPlanner<OsrmClient> {
    /// Planner backed by OSRM, optionally caching route responses.
    pub fn osrm(config: PlannerConfig, cache: Option<RequestCache>) -> Result<Self> {
        let mut client = OsrmClient::new(config.osrm.clone())?;
        if let Some(cache) = cache {
            client = client.with_cache(cache);
        }
        Self::new(config, client)
    }

    /// Like [`ScenicPlanner::osrm`], with the cache described by `config.cache`.
    pub fn osrm_from_config(config: PlannerConfig) -> Result<Self> {
        let cache = if config.cache.enabled {
            Some(RequestCache::from_config(&config.cache)?)
        } else {
            None
        };
        Self::osrm(config, cache)
    }
}

impl<R: RoutingProvider> ScenicPlanner<R> {
    /// Validates `config` up front; configuration errors are fatal here and
    /// nowhere later.
    pub fn new(config: PlannerConfig, router: R) -> Result<Self> {
        config.validate()?;
        let pool = worker_pool(config.workers)?;
        Ok(Self {
            config,
            router,
            pool,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    /// Runs the scoring collaborator over `samples` on the worker pool.
    pub fn score_samples<S: SampleScorer>(
        &self,
        samples: &[SampleRef],
        scorer: &S,
    ) -> (Vec<ScoredSample>, SamplingReport) {
        collect_scored_samples(samples, scorer, &self.config.retry, &self.pool)
    }

    pub fn build_heatmap(
        &self,
        bounding_box: BoundingBox,
        samples: &[ScoredSample],
    ) -> Result<(Heatmap, BuildReport)> {
        Heatmap::build(bounding_box, &self.config.heatmap, samples)
    }

    /// Generates, scores and ranks routes from `origin` to `destination`.
    ///
    /// Only a failed base route (or invalid input) aborts; every other
    /// failure shows up in the outcome's counts.
    pub fn plan(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        heatmap: &Heatmap,
    ) -> Result<PlanOutcome> {
        let waypoints = heatmap_waypoints(heatmap);
        debug!(pool = waypoints.len(), "waypoint candidates from heatmap");

        let generated = generate_candidates(
            origin,
            destination,
            &self.router,
            &waypoints,
            &self.config.generator,
            &self.config.retry,
            &self.pool,
        )?;
        let base_duration_s = generated.base.duration_s;
        let generation = generated.report;
        let mut candidates = generated.into_candidates();

        let scorer = RouteScorer::new(HeatmapIndex::new(heatmap), &self.config.scoring);
        self.pool.install(|| {
            candidates.par_iter_mut().for_each(|candidate| {
                scorer.score_candidate(candidate);
            })
        });
        let candidates_scored = candidates.len();

        let ranking = rank(candidates, base_duration_s, &self.config.ranking)?;

        info!(
            ranked = ranking.ranked.len(),
            rejected = ranking.rejected.len(),
            failed_requests = generation.failed_requests,
            "planning finished"
        );

        Ok(PlanOutcome {
            ranked: ranking.ranked,
            rejected: ranking.rejected,
            base_duration_s,
            candidates_scored,
            generation,
            heatmap_coverage: heatmap.coverage_summary(),
        })
    }
}
