//! Camera replay over a [`DebriefTour`].
//!
//! Transitions are planned as a keyframe list ([`CameraPath`]) and played as
//! a sequential chain against a [`MapRenderer`]. At most one chain runs; a
//! new transition or `exit` cancels the running one first.

use std::{
    f64::consts::PI,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::{
    cancel::CancelToken,
    config::ReplayConfig,
    debrief::DebriefTour,
    error::ReplayError,
    geometry::{approximate_distance_km, cumulative_lengths, interpolate},
    models::{CameraKeyframe, Coordinate},
};

/// Keyframes for one stop-to-stop transition.
///
/// Without a previous position or usable geometry this yields a single direct
/// move. Otherwise it walks the route slice between the two vertex indices
/// (reversed when moving backward) and finishes with a settle frame exactly
/// on `destination`.
#[derive(Debug, Clone)]
pub struct CameraPath {
    segment: Vec<Coordinate>,
    cumulative: Vec<f64>,
    destination: Coordinate,
    frames: usize,
    next_frame: usize,
    frame_ms: u64,
    dip: f64,
    base_zoom: f64,
    settle_ms: u64,
    done: bool,
}

impl CameraPath {
    pub fn new(
        route: &[Coordinate],
        from: Option<usize>,
        to: Option<usize>,
        destination: Coordinate,
        config: &ReplayConfig,
    ) -> Self {
        let segment = match (from, to) {
            (Some(from), Some(to)) if from != to && from.max(to) < route.len() => {
                let mut slice = route[from.min(to)..=from.max(to)].to_vec();
                if from > to {
                    slice.reverse();
                }
                slice
            }
            _ => Vec::new(),
        };

        if segment.len() < 2 {
            return Self::direct(destination, config);
        }

        let length_km = approximate_distance_km(&segment);
        let frames = ((length_km / config.km_per_frame.max(f64::EPSILON)).ceil() as usize)
            .clamp(config.min_frames.max(1), config.max_frames.max(1));
        let total_ms = ((length_km * config.ms_per_km) as u64)
            .clamp(config.min_duration_ms, config.max_duration_ms.max(config.min_duration_ms));
        let dip = config.max_zoom_dip * (length_km / config.dip_full_km.max(f64::EPSILON)).min(1.0);

        tracing::debug!(
            "camera transit over {:.1} km: {} frames in {} ms, zoom dip {:.2}",
            length_km,
            frames,
            total_ms,
            dip
        );

        Self {
            cumulative: cumulative_lengths(&segment),
            segment,
            destination,
            frames,
            next_frame: 1,
            frame_ms: total_ms / frames as u64,
            dip,
            base_zoom: config.base_zoom,
            settle_ms: config.settle_duration_ms,
            done: false,
        }
    }

    fn direct(destination: Coordinate, config: &ReplayConfig) -> Self {
        Self {
            segment: Vec::new(),
            cumulative: Vec::new(),
            destination,
            frames: 0,
            next_frame: 1,
            frame_ms: 0,
            dip: 0.0,
            base_zoom: config.base_zoom,
            settle_ms: config.direct_duration_ms,
            done: false,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.frames == 0
    }
}

impl Iterator for CameraPath {
    type Item = CameraKeyframe;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.next_frame <= self.frames {
            let t = self.next_frame as f64 / self.frames as f64;
            self.next_frame += 1;
            let center = interpolate(&self.segment, &self.cumulative, t)?;
            return Some(CameraKeyframe {
                center,
                zoom: self.base_zoom - self.dip * (PI * t).sin(),
                duration_ms: self.frame_ms,
                settle: false,
            });
        }

        self.done = true;
        Some(CameraKeyframe {
            center: self.destination,
            zoom: self.base_zoom,
            duration_ms: self.settle_ms,
            settle: true,
        })
    }
}

pub fn plan_transition(
    route: &[Coordinate],
    from: Option<usize>,
    to: Option<usize>,
    destination: Coordinate,
    config: &ReplayConfig,
) -> Vec<CameraKeyframe> {
    CameraPath::new(route, from, to, destination, config).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub coordinate: Coordinate,
}

/// What the replay needs from the map.
#[async_trait]
pub trait MapRenderer: Send + Sync {
    /// Resolves once the camera has arrived.
    async fn ease_to(&self, keyframe: CameraKeyframe);

    fn markers(&self) -> Vec<MapMarker>;

    fn set_highlighted(&self, marker_id: &str, highlighted: bool);

    async fn fit_bounds(&self, coordinates: Vec<Coordinate>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug)]
pub struct AnimationHandle {
    token: CancelToken,
    task: JoinHandle<AnimationOutcome>,
}

impl AnimationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn finished(self) -> AnimationOutcome {
        self.task.await.unwrap_or(AnimationOutcome::Cancelled)
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    tour: DebriefTour,
    active: bool,
    current: Option<usize>,
    highlighted: Option<String>,
    animation: Option<CancelToken>,
}

#[derive(Clone)]
pub struct ReplayEngine {
    renderer: Arc<dyn MapRenderer>,
    config: Arc<ReplayConfig>,
    state: Arc<Mutex<ReplayState>>,
}

impl ReplayEngine {
    pub fn new(renderer: Arc<dyn MapRenderer>, config: ReplayConfig, tour: DebriefTour) -> Self {
        Self {
            renderer,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(ReplayState {
                tour,
                ..Default::default()
            })),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    pub fn current(&self) -> Option<usize> {
        self.lock_state().current
    }

    pub fn highlighted(&self) -> Option<String> {
        self.lock_state().highlighted.clone()
    }

    pub fn is_animating(&self) -> bool {
        self.lock_state().animation.is_some()
    }

    /// Replace the tour, e.g. after the route geometry changed. Playback restarts from no stop.
    pub fn set_tour(&self, tour: DebriefTour) {
        let mut state = self.lock_state();
        if let Some(animation) = state.animation.take() {
            animation.cancel();
        }
        state.tour = tour;
        state.current = None;
    }

    pub fn enter(&self) -> Result<AnimationHandle, ReplayError> {
        {
            let mut state = self.lock_state();
            if state.tour.is_empty() {
                return Err(ReplayError::EmptyTour);
            }
            state.active = true;
            state.current = None;
        }
        tracing::info!("entering debrief replay");
        self.advance_to(0)
    }

    pub async fn exit(&self) {
        let highlighted = {
            let mut state = self.lock_state();
            if let Some(animation) = state.animation.take() {
                animation.cancel();
            }
            state.active = false;
            state.current = None;
            state.highlighted.take()
        };
        if let Some(marker) = highlighted {
            self.renderer.set_highlighted(&marker, false);
        }

        let coordinates: Vec<Coordinate> = self
            .renderer
            .markers()
            .into_iter()
            .map(|marker| marker.coordinate)
            .collect();
        tracing::info!("leaving debrief replay");
        if !coordinates.is_empty() {
            self.renderer.fit_bounds(coordinates).await;
        }
    }

    /// Idempotent.
    pub fn cancel_animation(&self) {
        if let Some(animation) = self.lock_state().animation.take() {
            animation.cancel();
        }
    }

    pub fn next(&self) -> Result<Option<AnimationHandle>, ReplayError> {
        let target = {
            let state = self.lock_state();
            let last = state.tour.len().checked_sub(1).ok_or(ReplayError::EmptyTour)?;
            state.current.map_or(0, |current| (current + 1).min(last))
        };
        self.step_to(target)
    }

    pub fn previous(&self) -> Result<Option<AnimationHandle>, ReplayError> {
        let target = {
            let state = self.lock_state();
            if state.tour.is_empty() {
                return Err(ReplayError::EmptyTour);
            }
            state.current.map_or(0, |current| current.saturating_sub(1))
        };
        self.step_to(target)
    }

    /// Out-of-range indices clamp to the last stop.
    pub fn jump_to(&self, index: usize) -> Result<Option<AnimationHandle>, ReplayError> {
        let target = {
            let state = self.lock_state();
            let last = state.tour.len().checked_sub(1).ok_or(ReplayError::EmptyTour)?;
            index.min(last)
        };
        self.step_to(target)
    }

    fn step_to(&self, target: usize) -> Result<Option<AnimationHandle>, ReplayError> {
        if self.current() == Some(target) {
            return Ok(None);
        }
        self.advance_to(target).map(Some)
    }

    /// Cancel any running chain, highlight the target stop and start the
    /// camera moving toward it.
    pub fn advance_to(&self, index: usize) -> Result<AnimationHandle, ReplayError> {
        let token = CancelToken::new();
        let (keyframes, destination) = {
            let mut state = self.lock_state();
            let len = state.tour.len();
            if len == 0 {
                return Err(ReplayError::EmptyTour);
            }
            let stop = state
                .tour
                .stop(index)
                .ok_or(ReplayError::IndexOutOfRange { index, len })?;
            let destination = stop.coordinate;

            if let Some(previous) = state.animation.replace(token.clone()) {
                tracing::debug!("camera chain #{} cancelled by #{}", previous.id(), token.id());
                previous.cancel();
            }

            let from = state.current.and_then(|current| state.tour.route_index(current));
            let to = state.tour.route_index(index);
            let keyframes = plan_transition(state.tour.route(), from, to, destination, &self.config);

            state.current = Some(index);
            tracing::debug!("advancing replay to stop {index} with {} keyframes", keyframes.len());
            (keyframes, destination)
        };

        // Renderer calls happen outside the state lock.
        let highlighted = self.highlight(destination);
        {
            let mut state = self.lock_state();
            if state.animation.as_ref() == Some(&token) {
                state.highlighted = highlighted;
            }
        }

        let renderer = Arc::clone(&self.renderer);
        let state = Arc::clone(&self.state);
        let chain_token = token.clone();
        let task = tokio::spawn(async move {
            for keyframe in keyframes {
                tokio::select! {
                    biased;
                    _ = chain_token.cancelled() => return AnimationOutcome::Cancelled,
                    _ = renderer.ease_to(keyframe) => {}
                }
            }
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.animation.as_ref() == Some(&chain_token) {
                state.animation = None;
            }
            AnimationOutcome::Completed
        });

        Ok(AnimationHandle { token, task })
    }

    /// Clear every marker highlight, then highlight the one on `target`.
    fn highlight(&self, target: Coordinate) -> Option<String> {
        let epsilon = self.config.highlight_epsilon;
        let markers = self.renderer.markers();
        for marker in &markers {
            self.renderer.set_highlighted(&marker.id, false);
        }
        let marker = markers.into_iter().find(|marker| {
            (marker.coordinate.lat - target.lat).abs() <= epsilon
                && (marker.coordinate.lon - target.lon).abs() <= epsilon
        })?;
        self.renderer.set_highlighted(&marker.id, true);
        Some(marker.id)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use crate::{debrief::build_tour, models::Waypoint};

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    fn straight_route(vertices: usize, step: f64) -> Vec<Coordinate> {
        (0..vertices).map(|i| coord(45.0 + i as f64 * step, 5.0)).collect()
    }

    #[test]
    fn first_stop_is_a_direct_move() {
        let config = ReplayConfig::default();
        let frames = plan_transition(&straight_route(10, 0.01), None, Some(4), coord(45.04, 5.0), &config);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].settle);
        assert_eq!(frames[0].duration_ms, config.direct_duration_ms);
        assert_eq!(frames[0].center, coord(45.04, 5.0));
    }

    #[test]
    fn same_vertex_or_bad_index_is_direct() {
        let config = ReplayConfig::default();
        let route = straight_route(10, 0.01);
        assert!(CameraPath::new(&route, Some(3), Some(3), route[3], &config).is_direct());
        assert!(CameraPath::new(&route, Some(3), Some(40), route[3], &config).is_direct());
        assert!(CameraPath::new(&[], Some(0), Some(1), route[3], &config).is_direct());
    }

    #[test]
    fn transit_ends_with_settle_on_destination() {
        let config = ReplayConfig::default();
        let route = straight_route(50, 0.01);
        let destination = coord(45.4901, 5.0001);
        let frames = plan_transition(&route, Some(0), Some(49), destination, &config);

        let transit = &frames[..frames.len() - 1];
        assert!(transit.len() >= config.min_frames && transit.len() <= config.max_frames);
        assert!(transit.iter().all(|frame| !frame.settle));

        let settle = frames.last().unwrap();
        assert!(settle.settle);
        assert_eq!(settle.center, destination);
        assert_eq!(settle.zoom, config.base_zoom);
        assert_eq!(settle.duration_ms, config.settle_duration_ms);

        let total: u64 = transit.iter().map(|frame| frame.duration_ms).sum();
        assert!(total <= config.max_duration_ms);
    }

    #[test]
    fn zoom_dips_mid_transit_and_grows_with_distance() {
        let config = ReplayConfig::default();
        let deepest = |route: &[Coordinate]| {
            plan_transition(route, Some(0), Some(route.len() - 1), *route.last().unwrap(), &config)
                .iter()
                .map(|frame| frame.zoom)
                .fold(f64::INFINITY, f64::min)
        };

        let short = deepest(&straight_route(5, 0.01));
        let long = deepest(&straight_route(5, 0.5));
        assert!(short < config.base_zoom);
        assert!(long < short);
        assert!(long >= config.base_zoom - config.max_zoom_dip - 1e-9);
    }

    #[test]
    fn moving_backward_walks_the_slice_in_reverse() {
        let config = ReplayConfig::default();
        let route = straight_route(20, 0.01);
        let frames = plan_transition(&route, Some(15), Some(5), route[5], &config);
        let lats: Vec<f64> = frames.iter().map(|frame| frame.center.lat).collect();
        assert!(lats.windows(2).all(|w| w[1] <= w[0] + 1e-12));
        assert!(lats[0] < route[15].lat);
    }

    /// Records every camera move; each move takes its keyframe's duration.
    #[derive(Default)]
    struct RecordingRenderer {
        markers: Vec<MapMarker>,
        frames: Mutex<Vec<CameraKeyframe>>,
        highlighted: Mutex<HashSet<String>>,
        fits: Mutex<Vec<Vec<Coordinate>>>,
    }

    #[async_trait]
    impl MapRenderer for RecordingRenderer {
        async fn ease_to(&self, keyframe: CameraKeyframe) {
            tokio::time::sleep(Duration::from_millis(keyframe.duration_ms)).await;
            self.frames.lock().unwrap().push(keyframe);
        }

        fn markers(&self) -> Vec<MapMarker> {
            self.markers.clone()
        }

        fn set_highlighted(&self, marker_id: &str, highlighted: bool) {
            let mut set = self.highlighted.lock().unwrap();
            if highlighted {
                set.insert(marker_id.to_string());
            } else {
                set.remove(marker_id);
            }
        }

        async fn fit_bounds(&self, coordinates: Vec<Coordinate>) {
            self.fits.lock().unwrap().push(coordinates);
        }
    }

    /// Reads replay state back from inside every renderer callback.
    #[derive(Default)]
    struct ReentrantRenderer {
        engine: std::sync::OnceLock<ReplayEngine>,
        markers: Vec<MapMarker>,
        observed: Mutex<Vec<Option<usize>>>,
    }

    #[async_trait]
    impl MapRenderer for ReentrantRenderer {
        async fn ease_to(&self, _keyframe: CameraKeyframe) {}

        fn markers(&self) -> Vec<MapMarker> {
            if let Some(engine) = self.engine.get() {
                self.observed.lock().unwrap().push(engine.current());
            }
            self.markers.clone()
        }

        fn set_highlighted(&self, _marker_id: &str, _highlighted: bool) {
            if let Some(engine) = self.engine.get() {
                let _ = engine.highlighted();
                let _ = engine.is_animating();
            }
        }

        async fn fit_bounds(&self, _coordinates: Vec<Coordinate>) {}
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_may_query_engine_during_highlight() {
        let stop = coord(45.0, 5.0);
        let renderer = Arc::new(ReentrantRenderer {
            markers: vec![MapMarker {
                id: "wp-0".into(),
                coordinate: stop,
            }],
            ..Default::default()
        });
        let mut waypoint = Waypoint::new(stop);
        waypoint.sequence = 0;
        let tour = DebriefTour::new(build_tour(&[waypoint], &[], false), Vec::new());
        let engine = ReplayEngine::new(renderer.clone(), ReplayConfig::default(), tour);
        assert!(renderer.engine.set(engine.clone()).is_ok());

        let outcome = engine.enter().unwrap().finished().await;

        assert_eq!(outcome, AnimationOutcome::Completed);
        assert_eq!(engine.highlighted().as_deref(), Some("wp-0"));
        assert_eq!(*renderer.observed.lock().unwrap(), vec![Some(0)]);
    }

    fn engine() -> (ReplayEngine, Arc<RecordingRenderer>) {
        let points = [coord(45.0, 5.0), coord(45.1, 5.0), coord(45.2, 5.0)];
        let waypoints: Vec<Waypoint> = points
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let mut waypoint = Waypoint::new(*c);
                waypoint.sequence = idx;
                waypoint
            })
            .collect();
        let renderer = Arc::new(RecordingRenderer {
            markers: points
                .iter()
                .enumerate()
                .map(|(idx, c)| MapMarker {
                    id: format!("wp-{idx}"),
                    coordinate: *c,
                })
                .collect(),
            ..Default::default()
        });
        let tour = DebriefTour::new(build_tour(&waypoints, &[], false), straight_route(21, 0.01));
        let engine = ReplayEngine::new(renderer.clone(), ReplayConfig::default(), tour);
        (engine, renderer)
    }

    #[tokio::test(start_paused = true)]
    async fn enter_moves_directly_to_first_stop() {
        let (engine, renderer) = engine();
        let outcome = engine.enter().unwrap().finished().await;

        assert_eq!(outcome, AnimationOutcome::Completed);
        assert!(engine.is_active());
        assert_eq!(engine.current(), Some(0));
        assert!(!engine.is_animating());
        let frames = renderer.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].center, coord(45.0, 5.0));
        assert_eq!(engine.highlighted().as_deref(), Some("wp-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn next_plays_chain_and_settles_on_stop() {
        let (engine, renderer) = engine();
        engine.enter().unwrap().finished().await;

        let handle = engine.next().unwrap().expect("stop 1 exists");
        assert_eq!(handle.finished().await, AnimationOutcome::Completed);

        let frames = renderer.frames.lock().unwrap();
        assert!(frames.len() > 2);
        let last = frames.last().unwrap();
        assert!(last.settle);
        assert_eq!(last.center, coord(45.1, 5.0));
        let highlighted = renderer.highlighted.lock().unwrap();
        assert_eq!(highlighted.len(), 1);
        assert!(highlighted.contains("wp-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn new_transition_cancels_running_chain() {
        let (engine, renderer) = engine();
        engine.enter().unwrap().finished().await;

        let first = engine.next().unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = engine.jump_to(2).unwrap().unwrap();

        assert_eq!(first.finished().await, AnimationOutcome::Cancelled);
        assert_eq!(second.finished().await, AnimationOutcome::Completed);
        assert_eq!(engine.current(), Some(2));
        let frames = renderer.frames.lock().unwrap();
        assert_eq!(frames.last().unwrap().center, coord(45.2, 5.0));
        assert_eq!(frames.iter().filter(|frame| frame.settle).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_clamps_at_boundaries() {
        let (engine, _) = engine();
        engine.enter().unwrap().finished().await;

        assert!(engine.previous().unwrap().is_none());
        engine.jump_to(99).unwrap().unwrap().finished().await;
        assert_eq!(engine.current(), Some(2));
        assert!(engine.next().unwrap().is_none());
        assert!(matches!(
            engine.advance_to(7),
            Err(ReplayError::IndexOutOfRange { index: 7, len: 3 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_cancels_clears_highlight_and_fits_markers() {
        let (engine, renderer) = engine();
        engine.enter().unwrap().finished().await;
        let running = engine.next().unwrap().unwrap();

        engine.exit().await;
        engine.cancel_animation();
        engine.cancel_animation();

        assert_eq!(running.finished().await, AnimationOutcome::Cancelled);
        assert!(!engine.is_active());
        assert!(engine.highlighted().is_none());
        assert!(renderer.highlighted.lock().unwrap().is_empty());
        assert_eq!(renderer.fits.lock().unwrap()[0].len(), 3);
    }

    #[tokio::test]
    async fn empty_tour_cannot_be_entered() {
        let renderer = Arc::new(RecordingRenderer::default());
        let engine = ReplayEngine::new(renderer, ReplayConfig::default(), DebriefTour::default());
        assert_eq!(engine.enter().unwrap_err(), ReplayError::EmptyTour);
        assert_eq!(engine.next().unwrap_err(), ReplayError::EmptyTour);
    }
}
