//! Chronological tour of waypoints and journal entries, pinned onto route geometry.

use crate::{
    geometry::{nearest_vertex_from, validate_coordinate},
    models::{Coordinate, JournalEntry, StopKind, TourStop, Waypoint},
};

/// Stops in replay order plus, per stop, a vertex index into `route`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebriefTour {
    stops: Vec<TourStop>,
    route: Vec<Coordinate>,
    route_indices: Vec<usize>,
}

impl DebriefTour {
    /// An empty `route` is replaced by straight lines through the stops.
    pub fn new(stops: Vec<TourStop>, route: Vec<Coordinate>) -> Self {
        let mut tour = Self {
            stops,
            route: Vec::new(),
            route_indices: Vec::new(),
        };
        tour.set_route(route);
        tour
    }

    pub fn from_expedition(
        waypoints: &[Waypoint],
        entries: &[JournalEntry],
        round_trip: bool,
        route: Vec<Coordinate>,
    ) -> Self {
        Self::new(build_tour(waypoints, entries, round_trip), route)
    }

    /// Swap in new geometry and re-resolve every stop against it.
    pub fn set_route(&mut self, route: Vec<Coordinate>) {
        self.route = if route.len() >= 2 {
            route
        } else {
            self.stops.iter().map(|stop| stop.coordinate).collect()
        };
        self.route_indices = resolve_route_indices(&self.route, &self.stops);
    }

    pub fn stops(&self) -> &[TourStop] {
        &self.stops
    }

    pub fn stop(&self, index: usize) -> Option<&TourStop> {
        self.stops.get(index)
    }

    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }

    pub fn route_indices(&self) -> &[usize] {
        &self.route_indices
    }

    pub fn route_index(&self, index: usize) -> Option<usize> {
        self.route_indices.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Merge waypoints and entries into replay order.
///
/// Stops without a usable coordinate are dropped. Undated stops come before
/// dated ones; among undated stops, waypoints keep their sequence order and
/// precede entries. Round trips with at least two stops get a closing
/// [`StopKind::Return`] stop on the first stop's coordinate.
pub fn build_tour(waypoints: &[Waypoint], entries: &[JournalEntry], round_trip: bool) -> Vec<TourStop> {
    let mut ordered: Vec<&Waypoint> = waypoints.iter().collect();
    ordered.sort_by_key(|waypoint| waypoint.sequence);

    let waypoint_stops = ordered
        .into_iter()
        .filter(|waypoint| usable(waypoint.coordinate))
        .map(|waypoint| TourStop {
            kind: StopKind::Waypoint {
                id: waypoint.id,
                sequence: waypoint.sequence,
            },
            coordinate: waypoint.coordinate,
            title: waypoint.label(),
            date: waypoint.date,
            rank: 0,
            excerpt: waypoint.description.clone(),
        });

    let entry_stops = entries.iter().filter_map(|entry| {
        let coordinate = entry.coordinate.filter(|c| usable(*c))?;
        Some(TourStop {
            kind: StopKind::Entry { id: entry.id },
            coordinate,
            title: if entry.title.trim().is_empty() {
                "Untitled entry".to_string()
            } else {
                entry.title.clone()
            },
            date: entry.date,
            rank: 0,
            excerpt: entry.excerpt.clone(),
        })
    });

    let mut stops: Vec<TourStop> = waypoint_stops.chain(entry_stops).collect();
    // Stable: undated waypoints stay ahead of undated entries.
    stops.sort_by_key(|stop| (stop.date.is_some(), stop.date));

    if round_trip && stops.len() >= 2 {
        let first = &stops[0];
        let closing = TourStop {
            kind: StopKind::Return,
            coordinate: first.coordinate,
            title: format!("Return to {}", first.title),
            date: None,
            rank: 0,
            excerpt: None,
        };
        stops.push(closing);
    }

    for (rank, stop) in stops.iter_mut().enumerate() {
        stop.rank = rank;
    }
    tracing::debug!("built debrief tour with {} stops", stops.len());
    stops
}

/// Nearest route vertex for each stop, scanning forward only from the
/// previous stop's vertex. The result is non-decreasing, which keeps later
/// stops on the return leg of overlapping geometry.
pub fn resolve_route_indices(route: &[Coordinate], stops: &[TourStop]) -> Vec<usize> {
    let mut from = 0;
    stops
        .iter()
        .map(|stop| {
            from = nearest_vertex_from(route, stop.coordinate, from).unwrap_or(from);
            from
        })
        .collect()
}

fn usable(coordinate: Coordinate) -> bool {
    !coordinate.is_unset() && validate_coordinate(coordinate).is_ok()
}
