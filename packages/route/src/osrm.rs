//! OSRM routing client.
//!
//! Uses the `route` service with full GeoJSON geometry. See
//! <https://project-osrm.org/docs/v5.24.0/api/#route-service>

use async_trait::async_trait;
use canopy_map_aggregation_models::Coordinate;
use canopy_map_route_models::{RouteGeometry, TravelMode, line_bounds};

use crate::{Router, RoutingError};

/// Public OSRM demo server.
pub const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org";

/// Router backed by an OSRM instance.
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    /// Creates a router for the OSRM instance at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn route_url(&self, waypoints: &[Coordinate], mode: TravelMode) -> String {
        let path = waypoints
            .iter()
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/route/v1/{}/{path}",
            self.base_url.trim_end_matches('/'),
            mode.as_ref()
        )
    }
}

impl Default for OsrmRouter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl Router for OsrmRouter {
    fn name(&self) -> &str {
        "osrm"
    }

    async fn route(
        &self,
        waypoints: &[Coordinate],
        mode: TravelMode,
    ) -> Result<RouteGeometry, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::InvalidWaypoints {
                message: format!("need at least 2 waypoints, got {}", waypoints.len()),
            });
        }
        if let Some(bad) = waypoints
            .iter()
            .find(|c| !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng))
        {
            return Err(RoutingError::InvalidWaypoints {
                message: format!("{bad:?} is not a valid position"),
            });
        }

        let body: serde_json::Value = self
            .client
            .get(self.route_url(waypoints, mode))
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?
            .json()
            .await?;

        parse_response(&body)
    }
}

/// Parses an OSRM route response, taking the first route.
fn parse_response(body: &serde_json::Value) -> Result<RouteGeometry, RoutingError> {
    let code = body["code"].as_str().unwrap_or("Unknown");
    if code != "Ok" {
        return Err(RoutingError::Provider {
            code: code.to_string(),
            message: body["message"].as_str().unwrap_or_default().to_string(),
        });
    }

    let Some(route) = body["routes"].as_array().and_then(|routes| routes.first()) else {
        return Err(RoutingError::NoRoute);
    };

    let coordinates: Vec<[f64; 2]> = route["geometry"]["coordinates"]
        .as_array()
        .ok_or(RoutingError::NoRoute)?
        .iter()
        .filter_map(|pair| Some([pair[0].as_f64()?, pair[1].as_f64()?]))
        .collect();

    let bounds = line_bounds(&coordinates).ok_or(RoutingError::NoRoute)?;

    Ok(RouteGeometry {
        coordinates,
        total_distance: route["distance"].as_f64().unwrap_or(0.0),
        total_time: route["duration"].as_f64().unwrap_or(0.0),
        bounds,
    })
}
