//! Routing service boundary.
//!
//! [`DirectionsService`] is what the stitcher and fetcher depend on;
//! [`MapboxDirections`] is the production implementation over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::DirectionsError,
    models::{Coordinate, LegMetrics, TravelMode},
};

pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";
pub const DEFAULT_MAX_WAYPOINTS: usize = 25;

/// One service response for one request window.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRoute {
    pub geometry: Vec<Coordinate>,
    pub legs: Vec<LegMetrics>,
    /// Meters between each requested coordinate and its match on the network.
    pub snap_distances_m: Vec<f64>,
}

/// Multi-stop directions provider.
///
/// # Contract
/// - `coordinates` never exceeds [`max_waypoints`](Self::max_waypoints)
/// - `NoSegment` / `NoRoute` waypoint indices are local to `coordinates`
/// - `legs` has `coordinates.len() - 1` entries on success
#[async_trait]
pub trait DirectionsService: Send + Sync {
    fn max_waypoints(&self) -> usize {
        DEFAULT_MAX_WAYPOINTS
    }

    async fn route(
        &self,
        coordinates: &[Coordinate],
        mode: TravelMode,
    ) -> Result<ServiceRoute, DirectionsError>;
}

#[derive(Debug, Clone)]
pub struct MapboxDirections {
    client: Client,
    base_url: String,
    access_token: String,
    max_waypoints: usize,
}

impl MapboxDirections {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        max_waypoints: usize,
    ) -> Result<Self, DirectionsError> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(DirectionsError::MissingAccessToken);
        }
        // The fetcher enforces its own ceiling; this only guards against hung sockets.
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            max_waypoints: max_waypoints.max(2),
        })
    }

    fn url(&self, coordinates: &[Coordinate], mode: TravelMode) -> String {
        let path = coordinates
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/directions/v5/mapbox/{}/{}",
            self.base_url,
            profile(mode),
            path
        )
    }
}

#[async_trait]
impl DirectionsService for MapboxDirections {
    fn max_waypoints(&self) -> usize {
        self.max_waypoints
    }

    async fn route(
        &self,
        coordinates: &[Coordinate],
        mode: TravelMode,
    ) -> Result<ServiceRoute, DirectionsError> {
        let response = self
            .client
            .get(self.url(coordinates, mode))
            .query(&[
                ("geometries", "geojson"),
                ("overview", "full"),
                ("steps", "false"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(
            "directions response {} for {} coordinates ({} bytes)",
            status,
            coordinates.len(),
            body.len()
        );
        parse_response(status.as_u16(), &body)
    }
}

fn profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Walking => "walking",
        TravelMode::Cycling => "cycling",
        // Straight never reaches the service.
        TravelMode::Driving | TravelMode::Straight => "driving",
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<ApiRoute>,
    #[serde(default)]
    waypoints: Vec<ApiWaypoint>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    geometry: ApiGeometry,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct ApiWaypoint {
    #[serde(default)]
    distance: Option<f64>,
}

pub fn parse_response(status: u16, body: &str) -> Result<ServiceRoute, DirectionsError> {
    let parsed: DirectionsResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) if (200..300).contains(&status) => {
            return Err(DirectionsError::Decode(err.to_string()));
        }
        Err(_) => return Err(DirectionsError::Generic(format!("HTTP {status}"))),
    };

    let message = parsed.message.clone().unwrap_or_default();
    match parsed.code.as_deref() {
        Some("Ok") => {
            let route = parsed
                .routes
                .into_iter()
                .next()
                .ok_or(DirectionsError::NoRoute { waypoints: Vec::new() })?;
            Ok(ServiceRoute {
                geometry: route
                    .geometry
                    .coordinates
                    .into_iter()
                    .map(|[lon, lat]| Coordinate { lat, lon })
                    .collect(),
                legs: route
                    .legs
                    .into_iter()
                    .map(|leg| LegMetrics {
                        distance_m: leg.distance,
                        duration_s: leg.duration,
                    })
                    .collect(),
                snap_distances_m: parsed
                    .waypoints
                    .iter()
                    .map(|w| w.distance.unwrap_or(0.0))
                    .collect(),
            })
        }
        Some("NoSegment") => Err(DirectionsError::NoSegment {
            waypoints: indices_in_message(&message),
        }),
        Some("NoRoute") => Err(DirectionsError::NoRoute {
            waypoints: indices_in_message(&message),
        }),
        Some(code) if message.is_empty() => Err(DirectionsError::Generic(code.to_string())),
        _ if message.is_empty() => Err(DirectionsError::Generic(format!("HTTP {status}"))),
        _ => Err(DirectionsError::Generic(message)),
    }
}

/// Pull waypoint indices out of messages like
/// "Could not find a matching segment for coordinate 3".
fn indices_in_message(message: &str) -> Vec<usize> {
    let words: Vec<&str> = message.split_whitespace().collect();
    let mut indices: Vec<usize> = words
        .windows(2)
        .filter(|pair| {
            let word = pair[0].trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            matches!(word.as_str(), "coordinate" | "coordinates" | "waypoint" | "location" | "index")
        })
        .filter_map(|pair| {
            pair[1]
                .trim_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .ok()
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
