use crate::{error::GeoError, models::Coordinate};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

pub fn validate_coordinate(coord: Coordinate) -> Result<Coordinate, GeoError> {
    let valid = coord.lat.is_finite()
        && coord.lon.is_finite()
        && (-90.0..=90.0).contains(&coord.lat)
        && (-180.0..=180.0).contains(&coord.lon);
    if valid {
        Ok(coord)
    } else {
        Err(GeoError::InvalidCoordinate {
            lat: coord.lat,
            lon: coord.lon,
        })
    }
}

/// Planar distance in degrees. Only meaningful for short spans, which is all
/// the camera path needs.
pub fn planar_distance(a: Coordinate, b: Coordinate) -> f64 {
    let dlat = b.lat - a.lat;
    let dlon = b.lon - a.lon;
    (dlat * dlat + dlon * dlon).sqrt()
}

/// Partial arc lengths along `polyline`, one entry per vertex, starting at 0.
pub fn cumulative_lengths(polyline: &[Coordinate]) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(polyline.len());
    let mut total = 0.0;
    for (idx, point) in polyline.iter().enumerate() {
        if idx > 0 {
            total += planar_distance(polyline[idx - 1], *point);
        }
        lengths.push(total);
    }
    lengths
}

/// Point at fractional arc length `t` along `polyline`.
///
/// `cumulative` must come from [`cumulative_lengths`] for the same polyline.
/// `t <= 0` yields the first vertex and `t >= 1` the last one, both exactly.
/// A zero-length polyline yields its first vertex.
pub fn interpolate(polyline: &[Coordinate], cumulative: &[f64], t: f64) -> Option<Coordinate> {
    debug_assert_eq!(polyline.len(), cumulative.len());
    let first = *polyline.first()?;
    let last = *polyline.last()?;
    let total = cumulative.last().copied().unwrap_or(0.0);

    if total <= 0.0 || t.is_nan() || t <= 0.0 {
        return Some(first);
    }
    if t >= 1.0 {
        return Some(last);
    }

    let target = t * total;
    let upper_bound = polyline.len().min(cumulative.len()) - 1;
    let hi = cumulative
        .partition_point(|&len| len < target)
        .clamp(1, upper_bound);
    let lo = hi - 1;
    let span = cumulative[hi] - cumulative[lo];
    let local = if span > 0.0 {
        (target - cumulative[lo]) / span
    } else {
        0.0
    };
    Some(polyline[lo].interpolate(polyline[hi], local))
}

/// Index of the vertex closest to `target`, scanning forward from `from`.
/// Ties keep the earliest vertex.
pub fn nearest_vertex_from(polyline: &[Coordinate], target: Coordinate, from: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, point) in polyline.iter().enumerate().skip(from) {
        let dist = planar_distance(*point, target);
        if best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((idx, dist));
        }
    }
    best.map(|(idx, _)| idx)
}
