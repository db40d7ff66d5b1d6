//! Test fixtures for scenic-planner.
//!
//! Provides:
//! - Metric helpers for placing points on a local plane
//! - A scripted routing provider with per-waypoint behaviour
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use scenic_planner::config::RetryPolicy;
use scenic_planner::error::{Result, ScenicError};
use scenic_planner::haversine::{HaversineRouter, LocalProjection, haversine_m};
use scenic_planner::heatmap::ScoredSample;
use scenic_planner::polyline::Polyline;
use scenic_planner::traits::{RouteAlternative, RoutingProvider};

/// Origin of every synthetic scenario.
pub const ORIGIN: (f64, f64) = (45.0, 7.0);

/// Point `x` metres east and `y` metres north of [`ORIGIN`].
pub fn at(x: f64, y: f64) -> (f64, f64) {
    LocalProjection::new(ORIGIN).unproject(x, y)
}

pub fn scored(x: f64, y: f64, scenic_score: f64) -> ScoredSample {
    let (lat, lon) = at(x, y);
    ScoredSample {
        lat,
        lon,
        scenic_score,
    }
}

/// Retries without meaningful sleeps.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay_ms: 1,
        rate_limit_delay_ms: 1,
        max_delay_ms: 2,
    }
}

enum Behaviour {
    Fail,
    Empty,
    /// Answers with the direct origin-destination route.
    Direct,
    Duration(f64),
}

/// Straight-line router whose answers can be scripted per waypoint.
///
/// Requests with a single intermediate coordinate are matched against the
/// scripted waypoints (within 1 m); anything unscripted is routed normally.
pub struct MockRouter {
    inner: HaversineRouter,
    fail_base: bool,
    alternatives: Vec<RouteAlternative>,
    scripted: Vec<((f64, f64), Behaviour)>,
    calls: AtomicUsize,
}

impl Default for MockRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRouter {
    pub fn new() -> Self {
        Self {
            inner: HaversineRouter::default(),
            fail_base: false,
            alternatives: Vec::new(),
            scripted: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_base(mut self) -> Self {
        self.fail_base = true;
        self
    }

    /// Extra route offered with the base answer when alternatives are asked for.
    pub fn with_alternative(mut self, route: RouteAlternative) -> Self {
        self.alternatives.push(route);
        self
    }

    pub fn failing_at(mut self, waypoint: (f64, f64)) -> Self {
        self.scripted.push((waypoint, Behaviour::Fail));
        self
    }

    pub fn empty_at(mut self, waypoint: (f64, f64)) -> Self {
        self.scripted.push((waypoint, Behaviour::Empty));
        self
    }

    pub fn direct_at(mut self, waypoint: (f64, f64)) -> Self {
        self.scripted.push((waypoint, Behaviour::Direct));
        self
    }

    pub fn duration_at(mut self, waypoint: (f64, f64), duration_s: f64) -> Self {
        self.scripted.push((waypoint, Behaviour::Duration(duration_s)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, waypoint: (f64, f64)) -> Option<&Behaviour> {
        self.scripted
            .iter()
            .find(|(point, _)| haversine_m(*point, waypoint) < 1.0)
            .map(|(_, behaviour)| behaviour)
    }
}

impl RoutingProvider for MockRouter {
    fn routes_for(
        &self,
        coordinates: &[(f64, f64)],
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = coordinates[0];
        let last = coordinates[coordinates.len() - 1];

        if coordinates.len() == 2 {
            if self.fail_base {
                return Err(ScenicError::TransientNetwork("connection reset".to_string()));
            }
            let mut routes = self.inner.routes_for(coordinates, false)?;
            if alternatives {
                routes.extend(self.alternatives.iter().cloned());
            }
            return Ok(routes);
        }

        match self.behaviour_for(coordinates[1]) {
            Some(Behaviour::Fail) => Err(ScenicError::data("unroutable waypoint")),
            Some(Behaviour::Empty) => Ok(Vec::new()),
            Some(Behaviour::Direct) => self.inner.routes_for(&[first, last], false),
            Some(Behaviour::Duration(duration_s)) => {
                let mut routes = self.inner.routes_for(coordinates, false)?;
                for route in &mut routes {
                    route.duration_s = *duration_s;
                }
                Ok(routes)
            }
            None => self.inner.routes_for(coordinates, false),
        }
    }
}

/// Straight route through `points` with an explicit duration.
pub fn route_through(points: &[(f64, f64)], duration_s: f64) -> RouteAlternative {
    let geometry = Polyline::new(points.to_vec());
    RouteAlternative {
        distance_m: geometry.length_m(),
        duration_s,
        geometry,
    }
}
