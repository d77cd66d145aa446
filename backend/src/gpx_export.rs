use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment};

use crate::error::RouteError;
use crate::models::{Coordinate, Waypoint};

const CREATOR: &str = "expedition-planner";

/// GPX 1.1 with the path as a single track and one `<wpt>` per waypoint, base64 encoded.
pub fn encode_expedition_as_gpx(path: &[Coordinate], waypoints: &[Waypoint]) -> Result<String, RouteError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };

    let mut ordered: Vec<&Waypoint> = waypoints.iter().collect();
    ordered.sort_by_key(|waypoint| waypoint.sequence);
    gpx.waypoints = ordered.into_iter().map(named_point).collect();

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().copied().map(to_point));
    let mut track = Track {
        name: Some("expedition".into()),
        ..Default::default()
    };
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn named_point(waypoint: &Waypoint) -> gpx::Waypoint {
    let mut point = to_point(waypoint.coordinate);
    point.name = Some(waypoint.label());
    point.description = waypoint.description.clone();
    point
}

fn to_point(coord: Coordinate) -> gpx::Waypoint {
    gpx::Waypoint::new(Point::new(coord.lon, coord.lat))
}
