pub use shared::{
    ApiError, CameraKeyframe, Coordinate, DebriefRequest, DebriefResponse, GpxRequest, GpxResponse,
    JournalEntry, LegMetrics, PlanRequest, PlanResponse, RouteQuery, RouteResult, StopKind,
    TourStop, TransitionRequest, TransitionResponse, TravelMode, Waypoint, WaypointKind,
    WaypointPatch,
};
