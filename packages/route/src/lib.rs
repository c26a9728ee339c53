#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Maintenance routes through trees that need attention.
//!
//! [`planner`] orders the stops greedily by nearest neighbour, a
//! [`Router`] (by default [`osrm::OsrmRouter`]) draws the path, and a
//! [`session::RouteSession`] keeps exactly one route active per map.

pub mod osrm;
pub mod planner;
pub mod session;

use async_trait::async_trait;
use canopy_map_aggregation_models::Coordinate;
use canopy_map_route_models::{RouteGeometry, TravelMode};

pub use planner::{plan_route, plan_route_with, select_flagged};
pub use session::{RouteOutcome, RouteSession, RouteState};

/// Errors that can occur while asking a router for geometry.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The router answered with an error code.
    #[error("Router error {code}: {message}")]
    Provider {
        /// Provider status code (e.g. `NoSegment`).
        code: String,
        /// Provider message.
        message: String,
    },

    /// The router found no route between the waypoints.
    #[error("No route found")]
    NoRoute,

    /// Fewer than two waypoints, or a waypoint off the globe.
    #[error("Invalid waypoints: {message}")]
    InvalidWaypoints {
        /// Description of what went wrong.
        message: String,
    },
}

/// An external service that turns ordered waypoints into a path.
#[async_trait]
pub trait Router: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Returns the path through `waypoints`, visited in order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the provider is unreachable or cannot
    /// route the waypoints.
    async fn route(
        &self,
        waypoints: &[Coordinate],
        mode: TravelMode,
    ) -> Result<RouteGeometry, RoutingError>;
}
