//! Collaborator seams consumed by the planner core.
//!
//! Road routing and per-image scoring live outside this crate. Concrete
//! adapters (an OSRM client, a straight-line fallback, test mocks) implement
//! these traits.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::polyline::Polyline;

/// One route returned by a routing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    pub geometry: Polyline,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Computes road routes through an ordered list of coordinates.
///
/// Input is `[origin, waypoints.., destination]` as (latitude, longitude).
/// The first returned alternative is the router's preferred (fastest) one.
/// An empty vector is a valid "no route" answer.
pub trait RoutingProvider: Sync {
    fn routes_for(
        &self,
        coordinates: &[(f64, f64)],
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>>;
}

/// Reference to a street-level sample awaiting a scenic score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRef {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Opaque per-sample scenicness model.
///
/// Returns `Ok(None)` when no image exists for the sample. Scores outside
/// `0.0..=1.0` are clamped by the caller; non-finite scores are discarded.
pub trait SampleScorer: Sync {
    fn score(&self, sample: &SampleRef) -> Result<Option<f64>>;
}
