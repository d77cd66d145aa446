//! Ordered waypoint collection with derived distance and travel-time rollups.
//!
//! The sequencer is the single owner of waypoint order. Invariants kept after
//! every operation:
//! - `sequence` equals the array index (contiguous `0..N`)
//! - index 0 is the start, the last index is the end unless the expedition is
//!   a round trip (the start then doubles as the end)
//! - `cumulative_distance_km` is non-decreasing

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::{
    config::SequencerConfig,
    error::SequencerError,
    geometry::{haversine_km, validate_coordinate},
    models::{Coordinate, LegMetrics, RouteQuery, TravelMode, Waypoint, WaypointKind, WaypointPatch},
};

/// The sequencer as shared between the host and the directions fetcher.
/// Locks are held only for synchronous mutations, never across an await.
pub type SharedSequencer = Arc<Mutex<WaypointSequencer>>;

pub fn lock_sequencer(shared: &SharedSequencer) -> MutexGuard<'_, WaypointSequencer> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transient "moved to position N" message raised by date resequencing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderNotice {
    pub waypoint_id: Uuid,
    pub name: String,
    /// 1-based position after the move.
    pub position: usize,
    pub issued_at: Instant,
}

impl ReorderNotice {
    pub fn message(&self) -> String {
        format!("{} moved to position {}", self.name, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub distance_km: f64,
    pub travel_time_s: f64,
    /// Last waypoint back to the first, only for round trips.
    pub closing_distance_km: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct WaypointSequencer {
    waypoints: Vec<Waypoint>,
    round_trip: bool,
    selected: Option<Uuid>,
    closing_leg: Option<LegMetrics>,
    notice: Option<ReorderNotice>,
    notice_ttl: Duration,
}

impl Default for WaypointSequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
    }
}

impl WaypointSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            waypoints: Vec::new(),
            round_trip: false,
            selected: None,
            closing_leg: None,
            notice: None,
            notice_ttl: config.notice_ttl(),
        }
    }

    /// Seed from records supplied by the persistence layer. Array order wins
    /// over any stored `sequence`.
    pub fn from_waypoints(waypoints: Vec<Waypoint>, config: SequencerConfig) -> Self {
        let mut sequencer = Self::new(config);
        sequencer.waypoints = waypoints;
        sequencer.recompute();
        sequencer
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.waypoints.iter().map(|w| w.coordinate).collect()
    }

    pub fn is_round_trip(&self) -> bool {
        self.round_trip
    }

    /// Returns the effective flag; round trips need at least two waypoints.
    pub fn set_round_trip(&mut self, round_trip: bool) -> bool {
        let effective = round_trip && self.waypoints.len() >= 2;
        if effective != self.round_trip {
            self.round_trip = effective;
            self.recompute();
        }
        effective
    }

    pub fn select(&mut self, id: Option<Uuid>) -> Result<(), SequencerError> {
        if let Some(id) = id {
            self.position(id)?;
        }
        self.selected = id;
        Ok(())
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn append(&mut self, coordinate: Coordinate) -> Result<Uuid, SequencerError> {
        let coordinate = validate_coordinate(coordinate)?;
        let waypoint = Waypoint::new(coordinate);
        let id = waypoint.id;
        self.waypoints.push(waypoint);
        self.recompute();
        tracing::debug!("appended waypoint {id} at position {}", self.waypoints.len());
        Ok(id)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<Waypoint, SequencerError> {
        let idx = self.position(id)?;
        let removed = self.waypoints.remove(idx);
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.waypoints.len() < 2 {
            self.round_trip = false;
        }
        self.recompute();
        Ok(removed)
    }

    /// Apply a partial update. A changed date reorders the dated waypoints;
    /// everything else leaves the order alone.
    pub fn update(
        &mut self,
        id: Uuid,
        patch: WaypointPatch,
    ) -> Result<Option<ReorderNotice>, SequencerError> {
        let idx = self.position(id)?;
        let coordinate = patch.coordinate.map(validate_coordinate).transpose()?;

        let waypoint = &mut self.waypoints[idx];
        if let Some(name) = patch.name {
            waypoint.name = name;
        }
        if let Some(description) = patch.description {
            waypoint.description = description;
        }
        let coordinate_changed = match coordinate {
            Some(coordinate) if coordinate != waypoint.coordinate => {
                waypoint.coordinate = coordinate;
                true
            }
            _ => false,
        };
        let date_changed = match patch.date {
            Some(date) if date != waypoint.date => {
                waypoint.date = date;
                true
            }
            _ => false,
        };

        // Routed leg metrics stay valid until coordinates or order change.
        let reordered = if date_changed { self.sort_dated() } else { None };
        if reordered.is_some() || coordinate_changed {
            self.recompute();
        }
        Ok(reordered.and_then(|before| self.raise_notice(&before, Some(id))))
    }

    /// Coordinate change from a marker drag: distances only, never reorders.
    pub fn move_marker(&mut self, id: Uuid, coordinate: Coordinate) -> Result<(), SequencerError> {
        let coordinate = validate_coordinate(coordinate)?;
        let idx = self.position(id)?;
        self.waypoints[idx].coordinate = coordinate;
        self.recompute();
        Ok(())
    }

    /// Sort the dated waypoints by date within the slots they already occupy.
    /// Undated waypoints keep their index.
    ///
    /// When anything moved, a notice is raised for `mutated` if it moved,
    /// otherwise for the first waypoint that did.
    pub fn resequence_by_date(&mut self, mutated: Option<Uuid>) -> Option<ReorderNotice> {
        let before = self.sort_dated()?;
        self.recompute();
        self.raise_notice(&before, mutated)
    }

    /// Stable sort of the dated slots. Returns the previous id order if anything moved.
    fn sort_dated(&mut self) -> Option<Vec<Uuid>> {
        let before: Vec<Uuid> = self.waypoints.iter().map(|w| w.id).collect();

        let slots: Vec<usize> = self
            .waypoints
            .iter()
            .enumerate()
            .filter(|(_, w)| w.date.is_some())
            .map(|(idx, _)| idx)
            .collect();
        let mut dated: Vec<Waypoint> = slots.iter().map(|&idx| self.waypoints[idx].clone()).collect();
        // Stable: equal dates keep their relative order.
        dated.sort_by_key(|w| w.date);
        for (slot, waypoint) in slots.into_iter().zip(dated) {
            self.waypoints[slot] = waypoint;
        }

        let unchanged = self.waypoints.iter().map(|w| w.id).eq(before.iter().copied());
        if unchanged { None } else { Some(before) }
    }

    fn raise_notice(&mut self, before: &[Uuid], mutated: Option<Uuid>) -> Option<ReorderNotice> {
        let moved = |id: &Uuid| {
            let old = before.iter().position(|b| b == id);
            let new = self.waypoints.iter().position(|w| w.id == *id);
            old != new
        };
        let subject = mutated
            .filter(|id| moved(id))
            .or_else(|| before.iter().copied().find(|id| moved(id)))?;

        let position = self.position(subject).ok()?;
        let notice = ReorderNotice {
            waypoint_id: subject,
            name: self.waypoints[position].label(),
            position: position + 1,
            issued_at: Instant::now(),
        };
        tracing::info!("{}", notice.message());
        self.notice = Some(notice.clone());
        Some(notice)
    }

    /// Current reorder notice, if it has not expired at `now`.
    pub fn notice_at(&self, now: Instant) -> Option<&ReorderNotice> {
        self.notice
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.issued_at) < self.notice_ttl)
    }

    pub fn notice(&self) -> Option<&ReorderNotice> {
        self.notice_at(Instant::now())
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Overwrite estimated distances with routed leg metrics. Expects one leg
    /// per consecutive pair, plus the closing leg for round trips. Order,
    /// kinds and identities are untouched.
    pub fn apply_route_metrics(&mut self, distances_m: &[f64], durations_s: &[f64]) -> bool {
        let needed = self.waypoints.len().saturating_sub(1);
        if distances_m.len() < needed || durations_s.len() < needed {
            tracing::warn!(
                "ignoring route metrics: {} legs for {} waypoints",
                distances_m.len().min(durations_s.len()),
                self.waypoints.len()
            );
            return false;
        }

        let mut cumulative_km = 0.0;
        let mut cumulative_s = 0.0;
        for (idx, waypoint) in self.waypoints.iter_mut().enumerate() {
            let (leg_km, leg_s) = if idx == 0 {
                (0.0, 0.0)
            } else {
                (distances_m[idx - 1].max(0.0) / 1000.0, durations_s[idx - 1].max(0.0))
            };
            cumulative_km += leg_km;
            cumulative_s += leg_s;
            waypoint.distance_from_previous_km = leg_km;
            waypoint.cumulative_distance_km = cumulative_km;
            waypoint.travel_time_from_previous_s = leg_s;
            waypoint.cumulative_travel_time_s = cumulative_s;
        }

        self.closing_leg = match (self.round_trip, distances_m.get(needed), durations_s.get(needed)) {
            (true, Some(&distance_m), Some(&duration_s)) => Some(LegMetrics {
                distance_m,
                duration_s,
            }),
            _ => None,
        };
        true
    }

    /// Drop routed metrics and fall back to Haversine estimates.
    pub fn clear_route_metrics(&mut self) {
        self.recompute();
    }

    pub fn totals(&self) -> Totals {
        let last = self.waypoints.last();
        let closing_distance_km = match (self.round_trip, self.waypoints.first(), last) {
            (true, Some(first), Some(last)) => Some(
                self.closing_leg
                    .map(|leg| leg.distance_m / 1000.0)
                    .unwrap_or_else(|| haversine_km(last.coordinate, first.coordinate)),
            ),
            _ => None,
        };
        let closing_time_s = self.closing_leg.map(|leg| leg.duration_s).unwrap_or(0.0);

        Totals {
            distance_km: last.map(|w| w.cumulative_distance_km).unwrap_or(0.0)
                + closing_distance_km.unwrap_or(0.0),
            travel_time_s: last.map(|w| w.cumulative_travel_time_s).unwrap_or(0.0) + closing_time_s,
            closing_distance_km,
        }
    }

    pub fn route_query(&self, mode: TravelMode) -> RouteQuery {
        RouteQuery {
            coordinates: self.coordinates(),
            mode,
            round_trip: self.round_trip,
            labels: self.waypoints.iter().map(Waypoint::label).collect(),
        }
    }

    fn position(&self, id: Uuid) -> Result<usize, SequencerError> {
        self.waypoints
            .iter()
            .position(|w| w.id == id)
            .ok_or(SequencerError::UnknownWaypoint(id))
    }

    /// Reassign sequence and kind, then rebuild Haversine rollups. Travel
    /// times reset to zero until routed durations arrive.
    fn recompute(&mut self) {
        let last = self.waypoints.len().saturating_sub(1);
        let round_trip = self.round_trip;
        let mut cumulative_km = 0.0;
        let mut previous: Option<Coordinate> = None;

        for (idx, waypoint) in self.waypoints.iter_mut().enumerate() {
            waypoint.sequence = idx;
            waypoint.kind = if idx == 0 {
                WaypointKind::Start
            } else if idx == last && !round_trip {
                WaypointKind::End
            } else {
                WaypointKind::Standard
            };

            let leg_km = previous
                .map(|prev| haversine_km(prev, waypoint.coordinate))
                .unwrap_or(0.0);
            cumulative_km += leg_km;
            waypoint.distance_from_previous_km = leg_km;
            waypoint.cumulative_distance_km = cumulative_km;
            waypoint.travel_time_from_previous_s = 0.0;
            waypoint.cumulative_travel_time_s = 0.0;
            previous = Some(waypoint.coordinate);
        }
        self.closing_leg = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn named(sequencer: &mut WaypointSequencer, name: &str, c: Coordinate) -> Uuid {
        let id = sequencer.append(c).unwrap();
        sequencer
            .update(
                id,
                WaypointPatch {
                    name: Some(name.into()),
                    ..Default::default()
                },
            )
            .unwrap();
        id
    }

    fn names(sequencer: &WaypointSequencer) -> Vec<String> {
        sequencer.waypoints().iter().map(|w| w.name.clone()).collect()
    }

    fn set_date(sequencer: &mut WaypointSequencer, id: Uuid, date: NaiveDate) -> Option<ReorderNotice> {
        sequencer
            .update(
                id,
                WaypointPatch {
                    date: Some(Some(date)),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn append_assigns_kinds_and_distances() {
        let mut seq = WaypointSequencer::default();
        seq.append(coord(45.0, 5.0)).unwrap();
        seq.append(coord(45.1, 5.0)).unwrap();
        seq.append(coord(45.2, 5.0)).unwrap();

        let kinds: Vec<_> = seq.waypoints().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WaypointKind::Start, WaypointKind::Standard, WaypointKind::End]
        );
        let first = &seq.waypoints()[0];
        assert_eq!(first.distance_from_previous_km, 0.0);
        assert_eq!(first.cumulative_distance_km, 0.0);
        let last = &seq.waypoints()[2];
        assert!((last.cumulative_distance_km - 22.24).abs() < 0.1);
    }

    #[test]
    fn append_rejects_invalid_coordinate() {
        let mut seq = WaypointSequencer::default();
        let err = seq.append(coord(120.0, 0.0)).unwrap_err();
        assert!(matches!(err, SequencerError::InvalidCoordinate(_)));
        assert!(seq.is_empty());
    }

    #[test]
    fn round_trip_makes_last_waypoint_standard() {
        let mut seq = WaypointSequencer::default();
        seq.append(coord(45.0, 5.0)).unwrap();
        seq.append(coord(45.1, 5.0)).unwrap();
        assert!(seq.set_round_trip(true));
        assert_eq!(seq.waypoints()[1].kind, WaypointKind::Standard);
        assert!(seq.totals().closing_distance_km.unwrap() > 11.0);
    }

    #[test]
    fn round_trip_needs_two_waypoints() {
        let mut seq = WaypointSequencer::default();
        seq.append(coord(45.0, 5.0)).unwrap();
        assert!(!seq.set_round_trip(true));
    }

    #[test]
    fn remove_resequences_clears_selection_and_round_trip() {
        let mut seq = WaypointSequencer::default();
        let a = seq.append(coord(45.0, 5.0)).unwrap();
        let b = seq.append(coord(45.1, 5.0)).unwrap();
        seq.set_round_trip(true);
        seq.select(Some(b)).unwrap();

        seq.remove(b).unwrap();
        assert_eq!(seq.selected(), None);
        assert!(!seq.is_round_trip());
        assert_eq!(seq.waypoints()[0].id, a);
        assert_eq!(seq.waypoints()[0].sequence, 0);
        assert_eq!(seq.waypoints()[0].kind, WaypointKind::Start);
    }

    #[test]
    fn remove_unknown_waypoint_fails() {
        let mut seq = WaypointSequencer::default();
        let id = Uuid::new_v4();
        assert_eq!(seq.remove(id), Err(SequencerError::UnknownWaypoint(id)));
    }

    #[test]
    fn non_date_update_keeps_order() {
        let mut seq = WaypointSequencer::default();
        let a = named(&mut seq, "A", coord(45.0, 5.0));
        named(&mut seq, "B", coord(45.1, 5.0));
        let notice = seq
            .update(
                a,
                WaypointPatch {
                    description: Some(Some("trailhead".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(notice.is_none());
        assert_eq!(names(&seq), vec!["A", "B"]);
    }

    #[test]
    fn date_resequencing_only_moves_dated_waypoints() {
        let mut seq = WaypointSequencer::default();
        named(&mut seq, "A", coord(45.0, 5.0));
        let b = named(&mut seq, "B", coord(45.1, 5.0));
        named(&mut seq, "C", coord(45.2, 5.0));
        let d = named(&mut seq, "D", coord(45.3, 5.0));

        assert!(set_date(&mut seq, b, date(2, 5)).is_none());
        let notice = set_date(&mut seq, d, date(2, 1)).expect("D moved");

        assert_eq!(names(&seq), vec!["A", "D", "C", "B"]);
        assert_eq!(notice.waypoint_id, d);
        assert_eq!(notice.position, 2);
        assert_eq!(notice.message(), "D moved to position 2");
        let sequences: Vec<_> = seq.waypoints().iter().map(|w| w.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
        assert_eq!(seq.waypoints()[3].kind, WaypointKind::End);
    }

    #[test]
    fn resequence_run_on_loaded_records() {
        let mut records = Vec::new();
        for (name, day) in [("A", None), ("B", Some(5)), ("C", None), ("D", Some(1))] {
            let mut w = Waypoint::new(coord(45.0 + records.len() as f64 * 0.1, 5.0));
            w.name = name.into();
            w.date = day.map(|d| date(2, d));
            records.push(w);
        }
        let mut seq = WaypointSequencer::from_waypoints(records, SequencerConfig::default());

        let notice = seq.resequence_by_date(None).expect("something moved");
        assert_eq!(names(&seq), vec!["A", "D", "C", "B"]);
        assert_eq!(notice.name, "B");
        assert_eq!(notice.position, 4);
    }

    #[test]
    fn notice_expires_and_newer_replaces_older() {
        let mut seq = WaypointSequencer::default();
        let a = named(&mut seq, "A", coord(45.0, 5.0));
        let b = named(&mut seq, "B", coord(45.1, 5.0));
        set_date(&mut seq, a, date(3, 1));
        let first = set_date(&mut seq, b, date(1, 1)).expect("B moved first");
        assert_eq!(seq.notice().map(|n| n.waypoint_id), Some(b));

        let later = first.issued_at + Duration::from_millis(3_001);
        assert!(seq.notice_at(later).is_none());

        let second = set_date(&mut seq, b, date(4, 1)).expect("B moved back");
        assert_eq!(second.position, 2);
        assert_eq!(seq.notice().map(|n| n.position), Some(2));
    }

    #[test]
    fn move_marker_updates_distances_without_reordering() {
        let mut seq = WaypointSequencer::default();
        let a = named(&mut seq, "A", coord(45.0, 5.0));
        named(&mut seq, "B", coord(45.1, 5.0));
        seq.move_marker(a, coord(44.9, 5.0)).unwrap();
        assert_eq!(names(&seq), vec!["A", "B"]);
        assert!((seq.waypoints()[1].distance_from_previous_km - 22.24).abs() < 0.1);
    }

    #[test]
    fn routed_metrics_overwrite_estimates() {
        let mut seq = WaypointSequencer::default();
        seq.append(coord(45.0, 5.0)).unwrap();
        seq.append(coord(45.1, 5.0)).unwrap();
        seq.append(coord(45.2, 5.0)).unwrap();
        seq.set_round_trip(true);
        let ids: Vec<_> = seq.waypoints().iter().map(|w| w.id).collect();

        assert!(seq.apply_route_metrics(&[15_000.0, 12_000.0, 30_000.0], &[900.0, 700.0, 1_800.0]));
        let wps = seq.waypoints();
        assert_eq!(wps.iter().map(|w| w.id).collect::<Vec<_>>(), ids);
        assert_eq!(wps[1].distance_from_previous_km, 15.0);
        assert_eq!(wps[2].cumulative_distance_km, 27.0);
        assert_eq!(wps[2].cumulative_travel_time_s, 1_600.0);

        let totals = seq.totals();
        assert_eq!(totals.closing_distance_km, Some(30.0));
        assert_eq!(totals.distance_km, 57.0);
        assert_eq!(totals.travel_time_s, 3_400.0);

        seq.clear_route_metrics();
        assert_eq!(seq.waypoints()[2].cumulative_travel_time_s, 0.0);
    }

    #[test]
    fn short_metrics_are_ignored() {
        let mut seq = WaypointSequencer::default();
        seq.append(coord(45.0, 5.0)).unwrap();
        seq.append(coord(45.1, 5.0)).unwrap();
        seq.append(coord(45.2, 5.0)).unwrap();
        assert!(!seq.apply_route_metrics(&[1_000.0], &[60.0]));
    }

    #[test]
    fn edits_that_keep_order_keep_routed_metrics() {
        let mut seq = WaypointSequencer::default();
        let a = named(&mut seq, "A", coord(45.0, 5.0));
        let b = named(&mut seq, "B", coord(45.1, 5.0));
        named(&mut seq, "C", coord(45.2, 5.0));
        seq.set_round_trip(true);
        assert!(seq.apply_route_metrics(&[15_000.0, 12_000.0, 30_000.0], &[900.0, 700.0, 1_800.0]));

        seq.update(
            b,
            WaypointPatch {
                name: Some("Col".into()),
                description: Some(Some("windy".into())),
                coordinate: Some(coord(45.1, 5.0)),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(set_date(&mut seq, a, date(6, 1)).is_none());

        assert_eq!(names(&seq), vec!["A", "Col", "C"]);
        assert_eq!(seq.waypoints()[2].cumulative_travel_time_s, 1_600.0);
        assert_eq!(seq.waypoints()[2].cumulative_distance_km, 27.0);
        assert_eq!(seq.totals().travel_time_s, 3_400.0);

        seq.move_marker(b, coord(45.15, 5.0)).unwrap();
        assert_eq!(seq.waypoints()[2].cumulative_travel_time_s, 0.0);
    }

    #[test]
    fn route_query_carries_labels() {
        let mut seq = WaypointSequencer::default();
        named(&mut seq, "Camp", coord(45.0, 5.0));
        seq.append(coord(45.1, 5.0)).unwrap();
        let query = seq.route_query(TravelMode::Walking);
        assert_eq!(query.labels, vec!["Camp".to_string(), "Waypoint 2".to_string()]);
        assert_eq!(query.coordinates.len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn waypoint_specs() -> impl Strategy<Value = Vec<(f64, f64, Option<u32>)>> {
            prop::collection::vec((-60.0..60.0f64, -170.0..170.0f64, prop::option::of(1u32..28)), 1..12)
        }

        fn build(specs: &[(f64, f64, Option<u32>)]) -> WaypointSequencer {
            let records = specs
                .iter()
                .map(|&(lat, lon, day)| {
                    let mut w = Waypoint::new(Coordinate { lat, lon });
                    w.date = day.map(|d| date(1, d));
                    w
                })
                .collect();
            WaypointSequencer::from_waypoints(records, SequencerConfig::default())
        }

        proptest! {
            #[test]
            fn prop_undated_waypoints_keep_their_index(specs in waypoint_specs()) {
                let mut seq = build(&specs);
                let before: Vec<_> = seq.waypoints().iter().map(|w| (w.id, w.date)).collect();
                seq.resequence_by_date(None);
                for (idx, (id, date)) in before.iter().enumerate() {
                    if date.is_none() {
                        prop_assert_eq!(seq.waypoints()[idx].id, *id);
                    }
                }
            }

            #[test]
            fn prop_dated_waypoints_end_up_sorted(specs in waypoint_specs()) {
                let mut seq = build(&specs);
                seq.resequence_by_date(None);
                let dates: Vec<_> = seq.waypoints().iter().filter_map(|w| w.date).collect();
                prop_assert!(dates.windows(2).all(|w| w[0] <= w[1]));
            }

            #[test]
            fn prop_cumulative_distance_non_decreasing(specs in waypoint_specs()) {
                let mut seq = build(&specs);
                seq.resequence_by_date(None);
                let wps = seq.waypoints();
                prop_assert!(wps.windows(2).all(|w| w[0].cumulative_distance_km <= w[1].cumulative_distance_km));
                prop_assert!(wps.iter().enumerate().all(|(idx, w)| w.sequence == idx));
            }
        }
    }
}
