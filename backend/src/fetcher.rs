//! Debounced, cancelable directions fetching for the live waypoint list.
//!
//! At most one fetch is in flight; a new one cancels the old one
//! (last writer wins). A fetch that outlives the configured ceiling cancels
//! its own token. Both arrive as the same cancellation signal, so the fetch
//! decides what happened by comparing its token with the active one:
//! still active means it timed out, anything else means it was superseded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    cancel::CancelToken,
    config::FetcherConfig,
    directions_client::DirectionsService,
    error::{DirectionsError, FailureKind},
    models::{RouteQuery, RouteResult},
    sequencer::{SharedSequencer, lock_sequencer},
    stitch::fetch_stitched,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Debounce timer (re)started.
    Scheduled,
    /// Same fingerprint as the last scheduled fetch.
    Unchanged,
    /// Straight mode or too few waypoints; route state dropped.
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Superseded,
    Failed(FailureKind),
}

/// Dismissible warning left behind by a failed fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub waypoints: Vec<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteState {
    pub result: Option<RouteResult>,
    pub failure: Option<FetchFailure>,
    pub in_flight: bool,
}

#[derive(Default)]
struct FetchControl {
    last_fingerprint: Option<String>,
    generation: u64,
    pending: Option<(u64, JoinHandle<()>)>,
    active: Option<CancelToken>,
}

struct Inner {
    service: Arc<dyn DirectionsService>,
    sequencer: SharedSequencer,
    config: FetcherConfig,
    control: Mutex<FetchControl>,
    state: watch::Sender<RouteState>,
}

#[derive(Clone)]
pub struct DirectionsFetcher {
    inner: Arc<Inner>,
}

impl DirectionsFetcher {
    pub fn new(
        service: Arc<dyn DirectionsService>,
        sequencer: SharedSequencer,
        config: FetcherConfig,
    ) -> Self {
        let (state, _) = watch::channel(RouteState::default());
        Self {
            inner: Arc::new(Inner {
                service,
                sequencer,
                config,
                control: Mutex::new(FetchControl::default()),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RouteState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> RouteState {
        self.inner.state.borrow().clone()
    }

    /// Queue a fetch for `query` once the debounce window passes quietly.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, query: RouteQuery) -> ScheduleOutcome {
        if !query.mode.is_routed() || query.coordinates.len() < 2 {
            self.inner.clear();
            return ScheduleOutcome::Cleared;
        }

        let fingerprint = query.fingerprint();
        let mut control = self.inner.lock_control();
        if control.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            tracing::trace!("route fingerprint unchanged, skipping fetch");
            return ScheduleOutcome::Unchanged;
        }
        control.last_fingerprint = Some(fingerprint);

        if let Some((_, pending)) = control.pending.take() {
            pending.abort();
        }
        control.generation += 1;
        let generation = control.generation;
        let debounce = self.inner.config.debounce();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.run(query, Some(generation)).await;
        });
        control.pending = Some((generation, handle));
        ScheduleOutcome::Scheduled
    }

    /// Fetch immediately, bypassing debounce and the fingerprint gate.
    pub async fn fetch_now(&self, query: RouteQuery) -> FetchOutcome {
        Arc::clone(&self.inner).run(query, None).await
    }

    /// Drop pending and in-flight work and all route state.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Forget the last fingerprint so the same query can be fetched again.
    pub fn invalidate(&self) {
        self.inner.lock_control().last_fingerprint = None;
    }

    pub fn dismiss_warning(&self) {
        self.inner.state.send_modify(|state| state.failure = None);
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, FetchControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        {
            let mut control = self.lock_control();
            control.last_fingerprint = None;
            if let Some((_, pending)) = control.pending.take() {
                pending.abort();
            }
            if let Some(active) = control.active.take() {
                active.cancel();
            }
        }
        lock_sequencer(&self.sequencer).clear_route_metrics();
        self.state.send_replace(RouteState::default());
    }

    async fn run(self: Arc<Self>, query: RouteQuery, generation: Option<u64>) -> FetchOutcome {
        let token = CancelToken::new();
        {
            let mut control = self.lock_control();
            // Past the debounce: a later schedule must not abort this task any more.
            if generation.is_some()
                && control.pending.as_ref().map(|(g, _)| *g) == generation
            {
                control.pending = None;
            }
            if let Some(previous) = control.active.replace(token.clone()) {
                tracing::debug!("directions fetch #{} superseded by #{}", previous.id(), token.id());
                previous.cancel();
            }
        }
        self.state.send_modify(|state| state.in_flight = true);
        tracing::info!(
            "directions fetch #{}: {} waypoints by {} (round trip: {})",
            token.id(),
            query.coordinates.len(),
            query.mode,
            query.round_trip
        );

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(DirectionsError::Aborted),
            _ = tokio::time::sleep(self.config.timeout()) => {
                token.cancel();
                Err(DirectionsError::Aborted)
            }
            result = fetch_stitched(
                self.service.as_ref(),
                &query,
                self.config.snap_warning_threshold_m,
            ) => result,
        };

        self.settle(&token, &query, outcome)
    }

    fn settle(
        &self,
        token: &CancelToken,
        query: &RouteQuery,
        outcome: Result<RouteResult, DirectionsError>,
    ) -> FetchOutcome {
        {
            let mut control = self.lock_control();
            if control.active.as_ref() != Some(token) {
                tracing::debug!("discarding superseded directions fetch #{}", token.id());
                return FetchOutcome::Superseded;
            }
            control.active = None;
        }

        // Still the active token, so nobody superseded it: the ceiling fired.
        let outcome = match outcome {
            Err(DirectionsError::Aborted) => Err(DirectionsError::Timeout),
            other => other,
        };

        match outcome {
            Ok(result) => {
                {
                    let mut sequencer = lock_sequencer(&self.sequencer);
                    if sequencer.coordinates() == query.coordinates
                        && sequencer.is_round_trip() == query.round_trip
                    {
                        sequencer.apply_route_metrics(&result.leg_distances_m, &result.leg_durations_s);
                    } else {
                        tracing::debug!("waypoints changed during fetch #{}, metrics not applied", token.id());
                    }
                }
                for warning in &result.warnings {
                    tracing::warn!("{warning}");
                }
                self.state.send_replace(RouteState {
                    result: Some(result),
                    failure: None,
                    in_flight: false,
                });
                FetchOutcome::Applied
            }
            Err(err) => {
                tracing::warn!("directions fetch #{} failed, falling back to straight lines: {err}", token.id());
                let kind = err.kind();
                let failure = FetchFailure {
                    kind,
                    waypoints: err.waypoints().to_vec(),
                    message: err.user_message(query.mode, |idx| query.label(idx)),
                };
                lock_sequencer(&self.sequencer).clear_route_metrics();
                self.state.send_replace(RouteState {
                    result: None,
                    failure: Some(failure),
                    in_flight: false,
                });
                FetchOutcome::Failed(kind)
            }
        }
    }
}
