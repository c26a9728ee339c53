#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Maintenance route types.
//!
//! A [`RoutePlan`] is the visiting order of the trees that need attention;
//! a [`RouteGeometry`] is the path an external router draws through them.
//! The plan is useful on its own, so an [`ActiveRoute`] carries geometry
//! only when the router delivered it.

use canopy_map_aggregation_models::{BoundingBox, Coordinate};
use canopy_map_health_models::{HealthTier, TreeId};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A tree to visit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    /// Tree id.
    pub id: TreeId,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Current tier, when known.
    #[serde(default)]
    pub health: Option<HealthTier>,
}

impl RouteStop {
    /// Position of the stop.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Where a route starts.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StartPolicy {
    /// Start at the first stop of the input.
    #[default]
    FirstInput,
}

/// How the route is travelled; also the router profile name.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TravelMode {
    /// On foot.
    #[default]
    Walking,
    /// By bicycle.
    Cycling,
    /// By car.
    Driving,
}

/// Visiting order over a set of stops.
///
/// Every input stop appears exactly once and the first stop is the seed
/// chosen by the [`StartPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    /// Stops in visiting order.
    pub stops: Vec<RouteStop>,
}

impl RoutePlan {
    /// Returns `true` if there is nothing to visit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Number of stops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Tree ids in visiting order.
    #[must_use]
    pub fn ordered_tree_ids(&self) -> Vec<TreeId> {
        self.stops.iter().map(|s| s.id).collect()
    }

    /// Stop coordinates in visiting order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.stops.iter().map(RouteStop::coordinate).collect()
    }
}

/// Path returned by an external router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    /// Line vertices as `[lng, lat]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    /// Length in metres.
    pub total_distance: f64,
    /// Estimated duration in seconds.
    pub total_time: f64,
    /// Bounding box of `coordinates`.
    pub bounds: BoundingBox,
}

impl RouteGeometry {
    /// Length in kilometres.
    #[must_use]
    pub fn distance_km(&self) -> f64 {
        self.total_distance / 1000.0
    }

    /// Duration in whole minutes, rounded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn minutes(&self) -> u64 {
        (self.total_time / 60.0).round().max(0.0) as u64
    }
}

/// Returns the bounding box of `[lng, lat]` vertices, or `None` for an
/// empty line.
#[must_use]
pub fn line_bounds(coordinates: &[[f64; 2]]) -> Option<BoundingBox> {
    let first = coordinates.first()?;
    Some(coordinates.iter().fold(
        BoundingBox::new(first[0], first[1], first[0], first[1]),
        |b, &[lng, lat]| {
            BoundingBox::new(
                b.west.min(lng),
                b.south.min(lat),
                b.east.max(lng),
                b.north.max(lat),
            )
        },
    ))
}

/// The route currently shown for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoute {
    /// Visiting order.
    pub plan: RoutePlan,
    /// Router path, if the router succeeded.
    pub geometry: Option<RouteGeometry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: TreeId) -> RouteStop {
        RouteStop {
            id,
            lat: 0.0,
            lng: f64::from(u8::try_from(id).unwrap()),
            health: None,
        }
    }

    #[test]
    fn plan_reports_order() {
        let plan = RoutePlan {
            stops: vec![stop(3), stop(1), stop(2)],
        };
        assert_eq!(plan.ordered_tree_ids(), vec![3, 1, 2]);
        assert_eq!(plan.len(), 3);
        assert!(!plan.is_empty());
        assert!((plan.coordinates()[1].lng - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn travel_mode_names() {
        assert_eq!(TravelMode::default().as_ref(), "walking");
        assert_eq!("cycling".parse::<TravelMode>().unwrap(), TravelMode::Cycling);
    }

    #[test]
    fn bounds_of_line() {
        let bounds = line_bounds(&[[13.4, 52.5], [13.3, 52.6], [13.5, 52.55]]).unwrap();
        assert_eq!(bounds, BoundingBox::new(13.3, 52.5, 13.5, 52.6));
        assert!(line_bounds(&[]).is_none());
    }

    #[test]
    fn geometry_units() {
        let geometry = RouteGeometry {
            coordinates: vec![],
            total_distance: 2345.0,
            total_time: 1710.0,
            bounds: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
        };
        assert!((geometry.distance_km() - 2.345).abs() < 1e-12);
        assert_eq!(geometry.minutes(), 29);
    }

    #[test]
    fn stop_deserializes_tier_name() {
        let stop: RouteStop =
            serde_json::from_str(r#"{"id":5,"lat":1.0,"lng":2.0,"health":"BAD"}"#).unwrap();
        assert_eq!(stop.health, Some(HealthTier::Bad));
    }
}
