//! Splits oversized directions requests into overlapping windows and joins
//! the responses back into one route.

use std::ops::Range;

use crate::{
    directions_client::DirectionsService,
    error::DirectionsError,
    geometry::validate_coordinate,
    models::{Coordinate, RouteQuery, RouteResult, TravelMode},
};

/// Windows of at most `limit` coordinates. Each window after the first starts
/// on the previous window's last coordinate so legs stay contiguous.
pub fn chunk_windows(len: usize, limit: usize) -> Vec<Range<usize>> {
    let limit = limit.max(2);
    if len <= limit {
        return vec![0..len];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + limit).min(len);
        windows.push(start..end);
        if end == len {
            break;
        }
        start = end - 1;
    }
    windows
}

/// Fetch the whole query, chunking as the service requires.
///
/// Any chunk failure aborts the stitch; its waypoint indices are mapped back
/// onto `query.coordinates`.
pub async fn fetch_stitched(
    service: &dyn DirectionsService,
    query: &RouteQuery,
    snap_warning_threshold_m: f64,
) -> Result<RouteResult, DirectionsError> {
    for coord in &query.coordinates {
        validate_coordinate(*coord)?;
    }

    let coords = query.request_coordinates();
    let windows = chunk_windows(coords.len(), service.max_waypoints());
    let mut result = RouteResult::default();

    for (chunk_idx, window) in windows.iter().enumerate() {
        tracing::debug!(
            "directions chunk {}/{}: coordinates {}..{} ({})",
            chunk_idx + 1,
            windows.len(),
            window.start,
            window.end,
            query.mode
        );

        let chunk = service
            .route(&coords[window.clone()], query.mode)
            .await
            .map_err(|err| err.offset_waypoints(window.start, query.coordinates.len()))?;

        // A service that silently caps coordinates returns a shorter route.
        if chunk.legs.len() != window.len() - 1 || chunk.snap_distances_m.len() != window.len() {
            tracing::warn!(
                "directions chunk {} answered {} legs / {} snaps for {} coordinates",
                chunk_idx + 1,
                chunk.legs.len(),
                chunk.snap_distances_m.len(),
                window.len()
            );
            return Err(DirectionsError::Incomplete {
                requested: window.len(),
                legs: chunk.legs.len(),
                snaps: chunk.snap_distances_m.len(),
            });
        }

        // Later chunks repeat the joint vertex and the joint waypoint's snap entry.
        let skip = usize::from(chunk_idx > 0);
        result.path.extend(chunk.geometry.into_iter().skip(skip));
        result.snap_distances_m.extend(chunk.snap_distances_m.into_iter().skip(skip));
        for leg in chunk.legs {
            result.leg_distances_m.push(leg.distance_m);
            result.leg_durations_s.push(leg.duration_s);
        }
    }

    anchor_endpoints(&mut result.path, &coords);
    result.warnings = snap_warnings(
        &result.snap_distances_m,
        query,
        query.mode,
        snap_warning_threshold_m,
    );

    tracing::info!(
        "stitched {} chunk(s): {} vertices, {} legs, {:.1} km",
        windows.len(),
        result.path.len(),
        result.leg_distances_m.len(),
        result.total_distance_m() / 1000.0
    );
    Ok(result)
}

/// Pin the snapped geometry to the requested first and last coordinates.
fn anchor_endpoints(path: &mut Vec<Coordinate>, requested: &[Coordinate]) {
    let (Some(&first), Some(&last)) = (requested.first(), requested.last()) else {
        return;
    };
    if path.first() != Some(&first) {
        path.insert(0, first);
    }
    if path.last() != Some(&last) {
        path.push(last);
    }
}

/// One warning per waypoint whose snap offset exceeds the threshold. The
/// round-trip closing coordinate repeats the start and is not reported twice.
pub fn snap_warnings(
    snap_distances_m: &[f64],
    query: &RouteQuery,
    mode: TravelMode,
    threshold_m: f64,
) -> Vec<String> {
    snap_distances_m
        .iter()
        .take(query.coordinates.len())
        .enumerate()
        .filter(|(_, distance)| **distance > threshold_m)
        .map(|(idx, distance)| {
            format!(
                "{} may be inaccessible by {mode} ({:.1} km from the nearest {mode} route)",
                query.label(idx),
                distance / 1000.0
            )
        })
        .collect()
}
