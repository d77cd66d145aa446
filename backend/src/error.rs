use thiserror::Error;
use uuid::Uuid;

use crate::models::TravelMode;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    #[error("unknown waypoint {0}")]
    UnknownWaypoint(Uuid),
    #[error(transparent)]
    InvalidCoordinate(#[from] GeoError),
}

/// Failures of a directions fetch. Waypoint indices refer to the caller's
/// original waypoint list, never to a chunk.
#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("no road or path segment near waypoint(s) {waypoints:?}")]
    NoSegment { waypoints: Vec<usize> },
    #[error("no route between waypoint(s) {waypoints:?}")]
    NoRoute { waypoints: Vec<usize> },
    #[error("directions request timed out")]
    Timeout,
    #[error("directions request superseded")]
    Aborted,
    #[error("directions service error: {0}")]
    Generic(String),
    #[error("directions request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unreadable directions response: {0}")]
    Decode(String),
    #[error(transparent)]
    InvalidCoordinate(#[from] GeoError),
    #[error("directions access token is not configured")]
    MissingAccessToken,
    #[error("directions response covered {legs} leg(s) and {snaps} waypoint(s) of {requested} requested coordinates")]
    Incomplete {
        requested: usize,
        legs: usize,
        snaps: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoSegment,
    NoRoute,
    Timeout,
    Aborted,
    InvalidCoordinate,
    Service,
}

impl DirectionsError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DirectionsError::NoSegment { .. } => FailureKind::NoSegment,
            DirectionsError::NoRoute { .. } => FailureKind::NoRoute,
            DirectionsError::Timeout => FailureKind::Timeout,
            DirectionsError::Aborted => FailureKind::Aborted,
            DirectionsError::InvalidCoordinate(_) => FailureKind::InvalidCoordinate,
            DirectionsError::Generic(_)
            | DirectionsError::Http(_)
            | DirectionsError::Decode(_)
            | DirectionsError::MissingAccessToken
            | DirectionsError::Incomplete { .. } => FailureKind::Service,
        }
    }

    pub fn waypoints(&self) -> &[usize] {
        match self {
            DirectionsError::NoSegment { waypoints } | DirectionsError::NoRoute { waypoints } => {
                waypoints
            }
            _ => &[],
        }
    }

    /// Shift chunk-local waypoint indices to positions in the full request.
    /// Indices at or past `original_len` belong to the round-trip closing
    /// coordinate and fold back onto the first waypoint.
    pub fn offset_waypoints(self, offset: usize, original_len: usize) -> Self {
        let remap = |locals: Vec<usize>| {
            let mut globals: Vec<usize> = locals
                .into_iter()
                .map(|local| {
                    let global = local + offset;
                    if global >= original_len { 0 } else { global }
                })
                .collect();
            globals.sort_unstable();
            globals.dedup();
            globals
        };
        match self {
            DirectionsError::NoSegment { waypoints } => DirectionsError::NoSegment {
                waypoints: remap(waypoints),
            },
            DirectionsError::NoRoute { waypoints } => DirectionsError::NoRoute {
                waypoints: remap(waypoints),
            },
            other => other,
        }
    }

    /// Dismissible warning text. `label` resolves a waypoint index to its display name.
    pub fn user_message(&self, mode: TravelMode, label: impl Fn(usize) -> String) -> String {
        let names = self
            .waypoints()
            .iter()
            .map(|&idx| label(idx))
            .collect::<Vec<_>>()
            .join(", ");
        match self {
            DirectionsError::NoSegment { .. } if names.is_empty() => format!(
                "One or more waypoints can't be reached by {mode}. They may be on water, private land, or away from any {mode} network."
            ),
            DirectionsError::NoSegment { .. } => format!(
                "{names} can't be reached by {mode}. It may be on water, private land, or away from any {mode} network."
            ),
            DirectionsError::NoRoute { .. } if names.is_empty() => {
                format!("No {mode} route could be found between your waypoints.")
            }
            DirectionsError::NoRoute { .. } => {
                format!("No {mode} route could be found around {names}.")
            }
            DirectionsError::Timeout => {
                "The route request timed out. Showing straight-line distances instead.".to_string()
            }
            DirectionsError::Aborted => String::new(),
            DirectionsError::Generic(message) => format!("Routing service error: {message}"),
            other => format!("Routing unavailable: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    #[error("tour has no stops")]
    EmptyTour,
    #[error("stop {index} is out of range for a tour of {len} stops")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Directions(#[from] DirectionsError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}
