pub mod cancel;
pub mod config;
pub mod debrief;
pub mod directions_client;
pub mod error;
pub mod fetcher;
pub mod geometry;
pub mod gpx_export;
pub mod models;
pub mod replay;
pub mod sequencer;
pub mod stitch;

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use tower_http::cors::{Any, CorsLayer};

use crate::config::EngineConfig;
use crate::debrief::DebriefTour;
use crate::directions_client::DirectionsService;
use crate::error::{DirectionsError, RouteError};
use crate::geometry::{haversine_km, validate_coordinate};
use crate::gpx_export::encode_expedition_as_gpx;
use crate::models::{
    ApiError, DebriefRequest, DebriefResponse, GpxRequest, GpxResponse, LegMetrics, PlanRequest,
    PlanResponse, RouteQuery, TransitionRequest, TransitionResponse,
};
use crate::replay::plan_transition;
use crate::stitch::fetch_stitched;

#[derive(Clone)]
pub struct AppState {
    /// `None` when no directions service is configured; plans fall back to straight lines.
    pub directions: Option<Arc<dyn DirectionsService>>,
    pub config: Arc<EngineConfig>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/route/plan", post(plan_handler))
        .route("/api/route/gpx", post(gpx_handler))
        .route("/api/debrief/tour", post(tour_handler))
        .route("/api/debrief/transition", post(transition_handler))
        .layer(cors)
        .with_state(state)
}

async fn plan_handler(State(state): State<AppState>, Json(req): Json<PlanRequest>) -> ApiResult<PlanResponse> {
    for coord in &req.waypoints {
        validate_coordinate(*coord).map_err(|err| error_response(err.into()))?;
    }

    let query = RouteQuery {
        coordinates: req.waypoints,
        mode: req.mode,
        round_trip: req.round_trip,
        labels: req.labels,
    };
    if !query.mode.is_routed() || query.coordinates.len() < 2 {
        return Ok(Json(straight_plan(&query, Vec::new())));
    }

    let Some(service) = state.directions.as_deref() else {
        let warning = DirectionsError::MissingAccessToken.user_message(query.mode, |idx| query.label(idx));
        return Ok(Json(straight_plan(&query, vec![warning])));
    };

    let fetcher = &state.config.fetcher;
    let outcome = tokio::time::timeout(
        fetcher.timeout(),
        fetch_stitched(service, &query, fetcher.snap_warning_threshold_m),
    )
    .await
    .unwrap_or(Err(DirectionsError::Timeout));

    match outcome {
        Ok(result) => {
            let legs = result
                .leg_distances_m
                .iter()
                .zip(&result.leg_durations_s)
                .map(|(&distance_m, &duration_s)| LegMetrics {
                    distance_m,
                    duration_s,
                })
                .collect();
            Ok(Json(PlanResponse {
                distance_km: result.total_distance_m() / 1000.0,
                duration_s: result.total_duration_s(),
                path: result.path,
                legs,
                warnings: result.warnings,
                routed: true,
            }))
        }
        Err(err @ DirectionsError::InvalidCoordinate(_)) => Err(error_response(err.into())),
        Err(err) => {
            tracing::warn!("directions failed, answering with straight lines: {err}");
            let warning = err.user_message(query.mode, |idx| query.label(idx));
            Ok(Json(straight_plan(&query, vec![warning])))
        }
    }
}

/// Straight-line geometry with Haversine legs and no travel times.
fn straight_plan(query: &RouteQuery, warnings: Vec<String>) -> PlanResponse {
    let path = query.request_coordinates();
    let legs: Vec<LegMetrics> = path
        .windows(2)
        .map(|pair| LegMetrics {
            distance_m: haversine_km(pair[0], pair[1]) * 1000.0,
            duration_s: 0.0,
        })
        .collect();
    PlanResponse {
        distance_km: legs.iter().map(|leg| leg.distance_m).sum::<f64>() / 1000.0,
        duration_s: 0.0,
        path,
        legs,
        warnings,
        routed: false,
    }
}

async fn tour_handler(Json(req): Json<DebriefRequest>) -> ApiResult<DebriefResponse> {
    for coord in &req.route {
        validate_coordinate(*coord).map_err(|err| error_response(err.into()))?;
    }
    let tour = DebriefTour::from_expedition(&req.waypoints, &req.entries, req.round_trip, req.route);
    Ok(Json(DebriefResponse {
        stops: tour.stops().to_vec(),
        route: tour.route().to_vec(),
        route_indices: tour.route_indices().to_vec(),
    }))
}

async fn transition_handler(
    State(state): State<AppState>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<TransitionResponse> {
    let destination = validate_coordinate(req.destination).map_err(|err| error_response(err.into()))?;
    let keyframes = plan_transition(
        &req.route,
        req.from_index,
        req.to_index,
        destination,
        &state.config.replay,
    );
    let total_duration_ms = keyframes.iter().map(|frame| frame.duration_ms).sum();
    Ok(Json(TransitionResponse {
        keyframes,
        total_duration_ms,
    }))
}

async fn gpx_handler(Json(req): Json<GpxRequest>) -> ApiResult<GpxResponse> {
    let gpx_base64 = encode_expedition_as_gpx(&req.path, &req.waypoints).map_err(error_response)?;
    Ok(Json(GpxResponse { gpx_base64 }))
}

fn error_response(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        RouteError::Geo(_) | RouteError::Replay(_) => StatusCode::BAD_REQUEST,
        RouteError::Directions(DirectionsError::InvalidCoordinate(_)) => StatusCode::BAD_REQUEST,
        RouteError::Directions(_) => StatusCode::BAD_GATEWAY,
        RouteError::Gpx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
