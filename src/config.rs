//! Planner configuration.
//!
//! Every stage takes its own parameter struct; `PlannerConfig` bundles them
//! so a whole run can be described by one JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScenicError};
use crate::osrm::OsrmConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapParams {
    /// Grid cell edge length in metres.
    pub step_m: f64,
    /// Sample count at which a cell's coverage saturates at 1.0.
    pub expected_samples_per_cell: f64,
}

impl Default for HeatmapParams {
    fn default() -> Self {
        Self {
            step_m: 200.0,
            expected_samples_per_cell: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    /// Maximum number of alternatives next to the base route.
    pub waypoint_count: usize,
    /// Waypoints must lie within this distance of the origin-destination corridor.
    pub waypoint_radius_m: f64,
    /// Minimum distance between a waypoint and either endpoint.
    pub waypoint_min_distance_m: f64,
    /// Minimum distance between two accepted waypoints.
    pub waypoint_min_separation_m: f64,
    /// Offer the router's own alternatives from the base request.
    pub router_alternatives: bool,
    /// Upper bound on waypoint route requests, failures included.
    pub generation_budget: usize,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            waypoint_count: 6,
            waypoint_radius_m: 8000.0,
            waypoint_min_distance_m: 2000.0,
            waypoint_min_separation_m: 1500.0,
            router_alternatives: true,
            generation_budget: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Spacing of lookup positions along a route.
    pub sample_step_m: f64,
    /// Lookups farther than this from a cell center do not match.
    pub max_heatmap_distance_m: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            sample_step_m: 120.0,
            max_heatmap_distance_m: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingParams {
    /// Weight for scenic score vs travel time (0-1).
    pub scenic_weight: f64,
    /// Max allowed duration ratio vs the base route.
    pub max_duration_ratio: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            scenic_weight: 0.7,
            max_duration_ratio: 1.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Base delay used after a rate-limit response.
    pub rate_limit_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            rate_limit_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub root: PathBuf,
    pub namespace: String,
    /// Entry lifetime in seconds; 0 or less never expires.
    pub default_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("data/cache"),
            namespace: "osrm".to_string(),
            default_ttl_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub heatmap: HeatmapParams,
    pub generator: GeneratorParams,
    pub scoring: ScoringParams,
    pub ranking: RankingParams,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub osrm: OsrmConfig,
    /// Requests in flight at once.
    pub workers: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            heatmap: HeatmapParams::default(),
            generator: GeneratorParams::default(),
            scoring: ScoringParams::default(),
            ranking: RankingParams::default(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            osrm: OsrmConfig::default(),
            workers: 4,
        }
    }
}

impl PlannerConfig {
    /// Loads a JSON config; missing fields fall back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.heatmap.validate()?;
        self.generator.validate()?;
        self.scoring.validate()?;
        self.ranking.validate()?;
        self.retry.validate()?;
        if self.workers == 0 {
            return Err(ScenicError::config("workers must be >= 1"));
        }
        Ok(())
    }
}

impl HeatmapParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_m > 0.0) {
            return Err(ScenicError::config(format!(
                "step_m must be > 0, got {}",
                self.step_m
            )));
        }
        if !(self.expected_samples_per_cell > 0.0) {
            return Err(ScenicError::config(
                "expected_samples_per_cell must be > 0",
            ));
        }
        Ok(())
    }
}

impl GeneratorParams {
    pub fn validate(&self) -> Result<()> {
        if self.waypoint_count == 0 {
            return Ok(());
        }
        if self.waypoint_radius_m < 0.0
            || self.waypoint_min_distance_m < 0.0
            || self.waypoint_min_separation_m < 0.0
        {
            return Err(ScenicError::config("waypoint distances must be >= 0"));
        }
        if self.waypoint_min_distance_m > self.waypoint_radius_m {
            return Err(ScenicError::config(format!(
                "waypoint_min_distance_m ({}) exceeds waypoint_radius_m ({})",
                self.waypoint_min_distance_m, self.waypoint_radius_m
            )));
        }
        Ok(())
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_step_m > 0.0) {
            return Err(ScenicError::config("sample_step_m must be > 0"));
        }
        if self.max_heatmap_distance_m < 0.0 {
            return Err(ScenicError::config("max_heatmap_distance_m must be >= 0"));
        }
        Ok(())
    }
}

impl RankingParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.scenic_weight) {
            return Err(ScenicError::config(format!(
                "scenic_weight must be within 0..=1, got {}",
                self.scenic_weight
            )));
        }
        if !(self.max_duration_ratio >= 1.0) {
            return Err(ScenicError::config(format!(
                "max_duration_ratio must be >= 1, got {}",
                self.max_duration_ratio
            )));
        }
        Ok(())
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ScenicError::config("max_attempts must be >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        PlannerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let mut config = PlannerConfig::default();
        config.heatmap.step_m = 0.0;
        assert!(matches!(config.validate(), Err(ScenicError::Config(_))));
    }

    #[test]
    fn test_rejects_impossible_waypoint_geometry() {
        let mut config = PlannerConfig::default();
        config.generator.waypoint_min_distance_m = 9000.0;
        config.generator.waypoint_radius_m = 8000.0;
        assert!(matches!(config.validate(), Err(ScenicError::Config(_))));

        // irrelevant when no waypoints are requested
        config.generator.waypoint_count = 0;
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_ranking() {
        let mut config = PlannerConfig::default();
        config.ranking.scenic_weight = 1.2;
        assert!(config.validate().is_err());

        let mut config = PlannerConfig::default();
        config.ranking.max_duration_ratio = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{ "workers": 8, "heatmap": { "step_m": 100.0 } }"#).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.heatmap.step_m, 100.0);
        assert_eq!(config.heatmap.expected_samples_per_cell, 1.0);
        assert_eq!(config.ranking, RankingParams::default());
    }
}
