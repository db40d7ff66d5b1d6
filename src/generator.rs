//! Candidate route generation.
//!
//! The fastest origin-destination route is mandatory. Alternatives come from
//! the router's own alternatives and from detours through scenic waypoints,
//! up to `waypoint_count` in total.

use fxhash::FxHashSet;
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GeneratorParams, RetryPolicy};
use crate::error::{Result, ScenicError};
use crate::haversine::{LocalProjection, haversine_m};
use crate::heatmap::Heatmap;
use crate::polyline::Polyline;
use crate::retry::with_retry;
use crate::traits::{RouteAlternative, RoutingProvider};

/// An intermediate coordinate used to bias a route request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn point(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Scored heatmap cells as waypoint candidates, most scenic first.
pub fn heatmap_waypoints(heatmap: &Heatmap) -> Vec<Waypoint> {
    heatmap
        .scenic_cells()
        .into_iter()
        .map(|cell| Waypoint::new(cell.center_lat, cell.center_lon))
        .collect()
}

/// How a candidate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteVariant {
    Fastest,
    RouterAlternative { index: usize },
    Waypoint { waypoint: Waypoint },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub variant: RouteVariant,
    pub geometry: Polyline,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Mean matched score; `None` until scored or when nothing matched.
    pub scenic_score: Option<f64>,
    pub scenic_coverage: f64,
    pub scenic_effective_score: f64,
    pub scenic_matched: usize,
    pub scenic_sampled: usize,
}

impl RouteCandidate {
    pub fn new(variant: RouteVariant, route: RouteAlternative) -> Self {
        Self {
            variant,
            geometry: route.geometry,
            distance_m: route.distance_m,
            duration_s: route.duration_s,
            scenic_score: None,
            scenic_coverage: 0.0,
            scenic_effective_score: 0.0,
            scenic_matched: 0,
            scenic_sampled: 0,
        }
    }

    pub fn is_base(&self) -> bool {
        self.variant == RouteVariant::Fastest
    }
}

/// Counts of what generation skipped, so callers can judge result quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub waypoints_considered: usize,
    pub rejected_outside_corridor: usize,
    pub rejected_near_endpoint: usize,
    pub rejected_separation: usize,
    pub requests: usize,
    pub failed_requests: usize,
    pub empty_results: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct GeneratedRoutes {
    pub base: RouteCandidate,
    pub alternatives: Vec<RouteCandidate>,
    pub report: GenerationReport,
}

impl GeneratedRoutes {
    /// Base first, then alternatives in generation order.
    pub fn into_candidates(self) -> Vec<RouteCandidate> {
        let mut candidates = Vec::with_capacity(self.alternatives.len() + 1);
        candidates.push(self.base);
        candidates.extend(self.alternatives);
        candidates
    }
}

/// Produces the base route plus up to `params.waypoint_count` alternatives.
///
/// `waypoints` is the candidate pool in priority order. Failure of the base
/// request is fatal; failed or empty waypoint requests are skipped and
/// counted, and more waypoints are tried until the count is reached, the
/// pool runs dry, or `generation_budget` requests have been made.
pub fn generate_candidates<P>(
    origin: (f64, f64),
    destination: (f64, f64),
    router: &P,
    waypoints: &[Waypoint],
    params: &GeneratorParams,
    retry: &RetryPolicy,
    pool: &ThreadPool,
) -> Result<GeneratedRoutes>
where
    P: RoutingProvider,
{
    params.validate()?;

    let want_alternatives = params.router_alternatives && params.waypoint_count > 0;
    let base_routes = with_retry(retry, "base route", || {
        router.routes_for(&[origin, destination], want_alternatives)
    })?;
    let (base, router_alternatives) = split_fastest(base_routes)?;

    let mut report = GenerationReport::default();
    let mut seen: FxHashSet<u64> = FxHashSet::default();
    seen.insert(base.geometry.signature());

    let mut alternatives: Vec<RouteCandidate> = Vec::new();
    if want_alternatives {
        for (index, route) in router_alternatives.into_iter().enumerate() {
            if alternatives.len() >= params.waypoint_count {
                break;
            }
            if !seen.insert(route.geometry.signature()) {
                report.duplicates += 1;
                continue;
            }
            alternatives.push(RouteCandidate::new(
                RouteVariant::RouterAlternative { index },
                route,
            ));
        }
    }

    if alternatives.len() < params.waypoint_count {
        let eligible = eligible_waypoints(origin, destination, waypoints, params, &mut report);
        let mut selector = WaypointSelector::new(&eligible, params.waypoint_min_separation_m);

        while alternatives.len() < params.waypoint_count
            && report.requests < params.generation_budget
        {
            let need = (params.waypoint_count - alternatives.len())
                .min(params.generation_budget - report.requests);
            let batch = selector.next_batch(need, &mut report);
            if batch.is_empty() {
                break;
            }
            report.requests += batch.len();

            let results: Vec<Result<Vec<RouteAlternative>>> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|waypoint| {
                        with_retry(retry, "waypoint route", || {
                            router.routes_for(&[origin, waypoint.point(), destination], false)
                        })
                    })
                    .collect()
            });

            for (waypoint, result) in batch.iter().zip(results) {
                let route = match result {
                    Ok(routes) => match routes.into_iter().next() {
                        Some(route) => route,
                        None => {
                            debug!(
                                lat = waypoint.lat,
                                lon = waypoint.lon,
                                "router found no route via waypoint"
                            );
                            report.empty_results += 1;
                            continue;
                        }
                    },
                    Err(err) => {
                        warn!(
                            lat = waypoint.lat,
                            lon = waypoint.lon,
                            error = %err,
                            "skipping waypoint route"
                        );
                        report.failed_requests += 1;
                        continue;
                    }
                };

                if !seen.insert(route.geometry.signature()) {
                    debug!(lat = waypoint.lat, lon = waypoint.lon, "dropping duplicate route");
                    report.duplicates += 1;
                    continue;
                }
                if alternatives.len() < params.waypoint_count {
                    alternatives.push(RouteCandidate::new(
                        RouteVariant::Waypoint { waypoint: *waypoint },
                        route,
                    ));
                }
            }
        }
    }

    info!(
        alternatives = alternatives.len(),
        requested = params.waypoint_count,
        requests = report.requests,
        failed = report.failed_requests,
        duplicates = report.duplicates,
        "generated route candidates"
    );

    Ok(GeneratedRoutes {
        base: RouteCandidate::new(RouteVariant::Fastest, base),
        alternatives,
        report,
    })
}

/// Fastest route first; the rest keep router order.
fn split_fastest(
    mut routes: Vec<RouteAlternative>,
) -> Result<(RouteAlternative, Vec<RouteAlternative>)> {
    routes.retain(|route| !route.geometry.is_empty() && route.duration_s.is_finite());
    if routes.is_empty() {
        return Err(ScenicError::data("router returned no base route"));
    }
    let fastest = routes
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.duration_s.total_cmp(&b.1.duration_s))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let base = routes.remove(fastest);
    Ok((base, routes))
}

fn eligible_waypoints(
    origin: (f64, f64),
    destination: (f64, f64),
    waypoints: &[Waypoint],
    params: &GeneratorParams,
    report: &mut GenerationReport,
) -> Vec<Waypoint> {
    let projection = LocalProjection::new(origin);
    let end = projection.project(destination);

    let mut eligible = Vec::new();
    for waypoint in waypoints {
        report.waypoints_considered += 1;
        let point = waypoint.point();
        if distance_to_segment(projection.project(point), end) > params.waypoint_radius_m {
            report.rejected_outside_corridor += 1;
            continue;
        }
        if haversine_m(point, origin) < params.waypoint_min_distance_m
            || haversine_m(point, destination) < params.waypoint_min_distance_m
        {
            report.rejected_near_endpoint += 1;
            continue;
        }
        eligible.push(*waypoint);
    }
    eligible
}

/// Planar distance from `point` to the segment from the origin to `end`.
fn distance_to_segment(point: (f64, f64), end: (f64, f64)) -> f64 {
    let length_sq = end.0 * end.0 + end.1 * end.1;
    let t = if length_sq > 0.0 {
        ((point.0 * end.0 + point.1 * end.1) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = point.0 - end.0 * t;
    let dy = point.1 - end.1 * t;
    (dx * dx + dy * dy).sqrt()
}

/// Walks the eligible pool once, enforcing separation from every waypoint
/// already handed out.
struct WaypointSelector<'a> {
    pool: &'a [Waypoint],
    cursor: usize,
    min_separation_m: f64,
    selected: Vec<Waypoint>,
}

impl<'a> WaypointSelector<'a> {
    fn new(pool: &'a [Waypoint], min_separation_m: f64) -> Self {
        Self {
            pool,
            cursor: 0,
            min_separation_m,
            selected: Vec::new(),
        }
    }

    fn next_batch(&mut self, size: usize, report: &mut GenerationReport) -> Vec<Waypoint> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size && self.cursor < self.pool.len() {
            let candidate = self.pool[self.cursor];
            self.cursor += 1;
            let too_close = self.selected.iter().any(|chosen| {
                haversine_m(chosen.point(), candidate.point()) < self.min_separation_m
            });
            if too_close {
                report.rejected_separation += 1;
                continue;
            }
            self.selected.push(candidate);
            batch.push(candidate);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_segment() {
        let end = (1000.0, 0.0);
        assert!((distance_to_segment((500.0, 300.0), end) - 300.0).abs() < 1e-9);
        assert!((distance_to_segment((-400.0, 300.0), end) - 500.0).abs() < 1e-9);
        assert!((distance_to_segment((1300.0, 400.0), end) - 500.0).abs() < 1e-9);
        assert!((distance_to_segment((3.0, 4.0), (0.0, 0.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_fastest_picks_min_duration() {
        let route = |duration_s: f64| RouteAlternative {
            geometry: Polyline::new(vec![(0.0, 0.0), (0.0, 0.01)]),
            distance_m: 1000.0,
            duration_s,
        };
        let (base, rest) = split_fastest(vec![route(120.0), route(90.0), route(150.0)]).unwrap();
        assert_eq!(base.duration_s, 90.0);
        let durations: Vec<f64> = rest.iter().map(|r| r.duration_s).collect();
        assert_eq!(durations, vec![120.0, 150.0]);

        assert!(matches!(split_fastest(Vec::new()), Err(ScenicError::Data(_))));
    }

    #[test]
    fn test_selector_enforces_separation() {
        // ~1.1 km apart along a meridian
        let pool = [
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.001, 0.0),
            Waypoint::new(0.01, 0.0),
            Waypoint::new(0.02, 0.0),
        ];
        let mut report = GenerationReport::default();
        let mut selector = WaypointSelector::new(&pool, 500.0);
        let first = selector.next_batch(2, &mut report);
        assert_eq!(first, vec![pool[0], pool[2]]);
        assert_eq!(report.rejected_separation, 1);
        let second = selector.next_batch(2, &mut report);
        assert_eq!(second, vec![pool[3]]);
        assert!(selector.next_batch(2, &mut report).is_empty());
    }
}
