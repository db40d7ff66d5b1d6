//! Great-circle helpers and a straight-line routing fallback.
//!
//! The fallback router ignores roads entirely but is always available,
//! which makes it useful for offline runs and for tests.

use crate::error::{Result, ScenicError};
use crate::polyline::Polyline;
use crate::traits::{RouteAlternative, RoutingProvider};

/// Average travel speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance between two (lat, lon) points in metres.
pub fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Linear interpolation in degree space; fine at segment scale.
pub fn interpolate(from: (f64, f64), to: (f64, f64), fraction: f64) -> (f64, f64) {
    (
        from.0 + (to.0 - from.0) * fraction,
        from.1 + (to.1 - from.1) * fraction,
    )
}

/// Equirectangular projection around a fixed origin.
///
/// `x` grows east and `y` grows north, both in metres. Accurate enough for
/// the extent of a single run (tens of kilometres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin: (f64, f64),
    cos_lat: f64,
}

impl LocalProjection {
    pub fn new(origin: (f64, f64)) -> Self {
        Self {
            origin,
            cos_lat: origin.0.to_radians().cos().max(1e-6),
        }
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn project(&self, point: (f64, f64)) -> (f64, f64) {
        let x = (point.1 - self.origin.1).to_radians() * EARTH_RADIUS_M * self.cos_lat;
        let y = (point.0 - self.origin.0).to_radians() * EARTH_RADIUS_M;
        (x, y)
    }

    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let lat = self.origin.0 + (y / EARTH_RADIUS_M).to_degrees();
        let lon = self.origin.1 + (x / (EARTH_RADIUS_M * self.cos_lat)).to_degrees();
        (lat, lon)
    }
}

/// Straight-line routing provider.
///
/// Estimates travel time using great-circle distance and an assumed speed.
#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    fn metres_to_seconds(&self, metres: f64) -> f64 {
        let hours = metres / 1000.0 / self.speed_kmh;
        hours * 3600.0
    }
}

impl RoutingProvider for HaversineRouter {
    fn routes_for(
        &self,
        coordinates: &[(f64, f64)],
        _alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        if coordinates.len() < 2 {
            return Err(ScenicError::data("a route needs at least two coordinates"));
        }
        if self.speed_kmh <= 0.0 {
            return Err(ScenicError::config("speed_kmh must be > 0"));
        }

        let geometry = Polyline::new(coordinates.to_vec());
        let distance_m = geometry.length_m();

        Ok(vec![RouteAlternative {
            duration_s: self.metres_to_seconds(distance_m),
            distance_m,
            geometry,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_m((36.1, -115.1), (36.1, -115.1));
        assert!(dist < 1.0, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas (36.17, -115.14) to Los Angeles (34.05, -118.24)
        // Actual distance ~370 km
        let dist = haversine_m((36.17, -115.14), (34.05, -118.24));
        assert!(
            dist > 350_000.0 && dist < 400_000.0,
            "LV to LA should be ~370km, got {}",
            dist
        );
    }

    #[test]
    fn test_projection_round_trip() {
        let projection = LocalProjection::new((42.5389, -71.0481));
        let (x, y) = projection.project((42.55, -71.02));
        let (lat, lon) = projection.unproject(x, y);
        assert!((lat - 42.55).abs() < 1e-9);
        assert!((lon - -71.02).abs() < 1e-9);
    }

    #[test]
    fn test_projection_matches_haversine_locally() {
        let projection = LocalProjection::new((42.5389, -71.0481));
        let point = projection.unproject(600.0, 800.0);
        let dist = haversine_m(projection.origin(), point);
        assert!((dist - 1000.0).abs() < 1.0, "got {}", dist);
    }

    #[test]
    fn test_router_requires_two_points() {
        let router = HaversineRouter::default();
        let err = router.routes_for(&[(36.1, -115.1)], false).unwrap_err();
        assert!(matches!(err, ScenicError::Data(_)));
    }

    #[test]
    fn test_reasonable_travel_time() {
        let router = HaversineRouter::new(40.0);
        // 10 km at 40 km/h = 0.25 hours = 900 seconds
        let seconds = router.metres_to_seconds(10_000.0);
        assert!((seconds - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_router_goes_through_waypoints() {
        let router = HaversineRouter::default();
        let coords = [(36.10, -115.10), (36.15, -115.05), (36.20, -115.10)];
        let routes = router.routes_for(&coords, true).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].geometry.points(), &coords[..]);
        assert!(routes[0].distance_m > haversine_m(coords[0], coords[2]));
    }
}
