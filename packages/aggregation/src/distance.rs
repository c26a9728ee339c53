//! Distance functions shared by clustering and route planning.

use canopy_map_aggregation_models::Coordinate;
use geo::{Distance as _, Haversine, Point};

/// Great-circle distance in metres.
#[must_use]
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

/// Euclidean distance in degree space, the unit of cell sizes and
/// density distances.
#[must_use]
pub fn planar_degrees(a: Coordinate, b: Coordinate) -> f64 {
    (a.lat - b.lat).hypot(a.lng - b.lng)
}
