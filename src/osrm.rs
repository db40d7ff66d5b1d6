//! OSRM HTTP adapter for route requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::cache::{RequestCache, cache_key};
use crate::error::{Result, ScenicError};
use crate::polyline::Polyline;
use crate::traits::{RouteAlternative, RoutingProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    cache: Option<RequestCache>,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: RequestCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn route_url(&self, coordinates: &[(f64, f64)]) -> String {
        let coords = coordinates
            .iter()
            .map(|(lat, lon)| format!("{:.6},{:.6}", lon, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/route/v1/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }

    fn request_key(&self, coordinates: &[(f64, f64)], alternatives: bool) -> String {
        let coords: Vec<[f64; 2]> = coordinates
            .iter()
            .map(|(lat, lon)| [round6(*lat), round6(*lon)])
            .collect();
        cache_key(&json!({
            "coords": coords,
            "endpoint": self.config.base_url,
            "profile": self.config.profile,
            "alternatives": alternatives,
        }))
    }

    fn fetch(
        &self,
        coordinates: &[(f64, f64)],
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        let url = self.route_url(coordinates);
        debug!(%url, alternatives, "requesting OSRM route");

        let response = self
            .client
            .get(url)
            .query(&[
                ("alternatives", if alternatives { "true" } else { "false" }),
                ("overview", "full"),
                ("geometries", "geojson"),
            ])
            .send()?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ScenicError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(ScenicError::TransientNetwork(format!(
                "OSRM responded with {}",
                status
            )));
        }

        let body = response.text()?;
        let parsed: OsrmRouteResponse = serde_json::from_str(&body).map_err(|err| {
            ScenicError::data(format!("malformed OSRM response ({}): {}", status, err))
        })?;
        parse_route_response(parsed)
    }
}

impl RoutingProvider for OsrmClient {
    fn routes_for(
        &self,
        coordinates: &[(f64, f64)],
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        if coordinates.len() < 2 {
            return Err(ScenicError::data("a route needs at least two coordinates"));
        }

        match &self.cache {
            Some(cache) => cache.get_or_fetch(&self.request_key(coordinates, alternatives), || {
                self.fetch(coordinates, alternatives)
            }),
            None => self.fetch(coordinates, alternatives),
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// "NoRoute" is a valid empty answer; any other non-Ok code is a data error.
fn parse_route_response(body: OsrmRouteResponse) -> Result<Vec<RouteAlternative>> {
    match body.code.as_str() {
        "Ok" => {}
        "NoRoute" => return Ok(Vec::new()),
        other => {
            return Err(ScenicError::data(format!(
                "OSRM error {}: {}",
                other,
                body.message.unwrap_or_default()
            )));
        }
    }

    Ok(body
        .routes
        .into_iter()
        .filter(|route| route.geometry.coordinates.len() >= 2)
        .map(|route| RouteAlternative {
            geometry: Polyline::from_lon_lat(&route.geometry.coordinates),
            distance_m: route.distance,
            duration_s: route.duration,
        })
        .collect())
}
