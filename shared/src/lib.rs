use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// `(0, 0)` is what the content forms store when no location was picked.
    pub fn is_unset(self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    /// Straight lines between waypoints, no directions request.
    Straight,
    Walking,
    Cycling,
    #[default]
    Driving,
}

impl TravelMode {
    pub fn is_routed(self) -> bool {
        !matches!(self, TravelMode::Straight)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Straight => "straight",
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
            TravelMode::Driving => "driving",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointKind {
    Start,
    End,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: Uuid,
    pub sequence: usize,
    pub kind: WaypointKind,
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub distance_from_previous_km: f64,
    #[serde(default)]
    pub cumulative_distance_km: f64,
    #[serde(default)]
    pub travel_time_from_previous_s: f64,
    #[serde(default)]
    pub cumulative_travel_time_s: f64,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            kind: WaypointKind::Standard,
            coordinate,
            date: None,
            name: String::new(),
            description: None,
            distance_from_previous_km: 0.0,
            cumulative_distance_km: 0.0,
            travel_time_from_previous_s: 0.0,
            cumulative_travel_time_s: 0.0,
        }
    }

    /// Name shown to users; unnamed waypoints fall back to their 1-based position.
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Waypoint {}", self.sequence + 1)
        } else {
            self.name.clone()
        }
    }
}

/// Partial update applied by `WaypointSequencer::update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

/// Journal entry as supplied by the content service. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub coordinates: Vec<Coordinate>,
    pub mode: TravelMode,
    #[serde(default)]
    pub round_trip: bool,
    /// Display names aligned with `coordinates`; only used for messages.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl RouteQuery {
    pub fn new(coordinates: Vec<Coordinate>, mode: TravelMode, round_trip: bool) -> Self {
        Self {
            coordinates,
            mode,
            round_trip,
            labels: Vec::new(),
        }
    }

    /// Canonical summary of everything that affects the fetched route.
    pub fn fingerprint(&self) -> String {
        let coords = self
            .coordinates
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lat, c.lon))
            .collect::<Vec<_>>()
            .join(";");
        format!("{coords}|{}|{}", self.mode, self.round_trip)
    }

    /// Coordinates sent to the routing service, closed back to the start for round trips.
    pub fn request_coordinates(&self) -> Vec<Coordinate> {
        let mut coords = self.coordinates.clone();
        if self.round_trip && coords.len() >= 2 {
            coords.push(coords[0]);
        }
        coords
    }

    pub fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .filter(|label| !label.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Waypoint {}", index + 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegMetrics {
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub path: Vec<Coordinate>,
    pub leg_distances_m: Vec<f64>,
    pub leg_durations_s: Vec<f64>,
    pub snap_distances_m: Vec<f64>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RouteResult {
    pub fn total_distance_m(&self) -> f64 {
        self.leg_distances_m.iter().sum()
    }

    pub fn total_duration_s(&self) -> f64 {
        self.leg_durations_s.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopKind {
    Waypoint { id: Uuid, sequence: usize },
    Entry { id: Uuid },
    /// Synthetic closing stop of a round trip.
    Return,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStop {
    pub kind: StopKind,
    pub coordinate: Coordinate,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraKeyframe {
    pub center: Coordinate,
    pub zoom: f64,
    pub duration_ms: u64,
    /// Final, precise move onto the destination.
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub waypoints: Vec<Coordinate>,
    #[serde(default)]
    pub mode: TravelMode,
    #[serde(default)]
    pub round_trip: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub path: Vec<Coordinate>,
    pub legs: Vec<LegMetrics>,
    pub distance_km: f64,
    pub duration_s: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// `false` when the path is straight-line geometry.
    pub routed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebriefRequest {
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
    #[serde(default)]
    pub round_trip: bool,
    #[serde(default)]
    pub route: Vec<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebriefResponse {
    pub stops: Vec<TourStop>,
    /// Geometry the indices point into; straight lines through the stops when no route was given.
    pub route: Vec<Coordinate>,
    pub route_indices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub route: Vec<Coordinate>,
    #[serde(default)]
    pub from_index: Option<usize>,
    #[serde(default)]
    pub to_index: Option<usize>,
    pub destination: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub keyframes: Vec<CameraKeyframe>,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpxRequest {
    pub path: Vec<Coordinate>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpxResponse {
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
