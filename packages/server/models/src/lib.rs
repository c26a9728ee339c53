#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the canopy map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the aggregation and route types so the rendering contract can
//! evolve independently.

use canopy_map_aggregation_models::{AggregationPlan, MapFeature};
use canopy_map_health_models::{HealthTier, TreeId};
use canopy_map_route_models::{ActiveRoute, RouteGeometry, RouteStop};
use serde::{Deserialize, Serialize};

/// A point or cluster as drawn by the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFeature {
    /// Whether this is a cluster marker.
    pub is_cluster: bool,
    /// Latitude of the marker.
    pub lat: f64,
    /// Longitude of the marker.
    pub lng: f64,
    /// Health tier value (1-4).
    pub health: u8,
    /// Tree id, for individual trees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TreeId>,
    /// Representative index, for individual trees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndvi: Option<f64>,
    /// Number of trees, for clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_count: Option<u32>,
    /// Average index, for clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_ndvi: Option<f64>,
    /// Member tree ids, for clusters whose source reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_ids: Option<Vec<TreeId>>,
}

impl From<&MapFeature> for ApiFeature {
    fn from(feature: &MapFeature) -> Self {
        match feature {
            MapFeature::Point(point) => Self {
                is_cluster: feature.is_cluster(),
                lat: point.lat,
                lng: point.lng,
                health: feature.health_tier().value(),
                id: point.id,
                ndvi: Some(point.index),
                tree_count: None,
                avg_ndvi: None,
                tree_ids: None,
            },
            MapFeature::Cluster(cluster) => Self {
                is_cluster: feature.is_cluster(),
                lat: cluster.centroid.lat,
                lng: cluster.centroid.lng,
                health: feature.health_tier().value(),
                id: None,
                ndvi: None,
                tree_count: Some(cluster.member_count),
                avg_ndvi: Some(cluster.avg_index),
                tree_ids: cluster
                    .member_tree_ids
                    .as_ref()
                    .map(|ids| ids.iter().copied().collect()),
            },
        }
    }
}

/// Query parameters for the trees endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreesQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: String,
    /// Map zoom level.
    pub zoom: u8,
    /// Map session; newer requests of a session replace older ones.
    #[serde(default)]
    pub session: Option<String>,
}

/// Query parameters for the plan endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanQueryParams {
    /// Map zoom level.
    pub zoom: u8,
}

/// How a viewport load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiViewportStatus {
    /// Features were found.
    Features,
    /// Nothing inside the viewport.
    Empty,
    /// The store failed; no features.
    Failed,
    /// A newer request for the same map replaced this one.
    Superseded,
}

/// Response of the trees endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTreesResponse {
    /// Zoom the plan was chosen for.
    pub zoom: u8,
    /// Plan used for the viewport.
    pub plan: AggregationPlan,
    /// How the load ended.
    pub status: ApiViewportStatus,
    /// Features to draw.
    pub features: Vec<ApiFeature>,
}

/// Response of the plan endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlan {
    /// Id of the active ladder.
    pub ladder: String,
    /// Requested zoom.
    pub zoom: u8,
    /// Plan for that zoom.
    pub plan: AggregationPlan,
}

/// A threshold profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    /// Profile id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Where the thresholds come from.
    pub description: Option<String>,
    /// Upper bound of tier 1.
    pub very_bad: f64,
    /// Upper bound of tier 2.
    pub bad: f64,
    /// Upper bound of tier 3.
    pub good: f64,
    /// Whether the server classifies with this profile.
    pub active: bool,
}

/// One bracket of a zoom ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBracket {
    /// Last zoom covered by the bracket.
    pub up_to: u8,
    /// Plan for the bracket.
    pub plan: AggregationPlan,
}

/// A zoom ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLadder {
    /// Ladder id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the ladder is for.
    pub description: Option<String>,
    /// Lowest supported zoom.
    pub min_zoom: u8,
    /// Highest supported zoom.
    pub max_zoom: u8,
    /// First zoom that shows individual trees.
    pub individual_zoom: Option<u8>,
    /// Brackets in zoom order.
    pub brackets: Vec<ApiBracket>,
    /// Whether the server plans with this ladder.
    pub active: bool,
}

/// A tree submitted for routing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRouteTree {
    /// Tree id.
    pub id: TreeId,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Health tier value (1-4).
    pub health: u8,
}

/// Body of the route endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Map session the route belongs to.
    pub session: String,
    /// Candidate trees; only those needing attention are routed.
    pub trees: Vec<ApiRouteTree>,
    /// First tier value that does not need attention (default 3).
    #[serde(default)]
    pub below: Option<u8>,
}

impl ApiRouteTree {
    /// Converts to a route stop; unknown tier values leave the tier unset.
    #[must_use]
    pub fn to_stop(&self) -> RouteStop {
        RouteStop {
            id: self.id,
            lat: self.lat,
            lng: self.lng,
            health: HealthTier::from_value(self.health).ok(),
        }
    }
}

/// A session's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    /// Map session.
    pub session: String,
    /// Tree ids in visiting order.
    pub ordered_tree_ids: Vec<TreeId>,
    /// Stops in visiting order.
    pub stops: Vec<RouteStop>,
    /// Router path, when available.
    pub geometry: Option<RouteGeometry>,
}

impl ApiRoute {
    /// Builds the response for `session`'s active route.
    #[must_use]
    pub fn new(session: impl Into<String>, route: ActiveRoute) -> Self {
        Self {
            session: session.into(),
            ordered_tree_ids: route.plan.ordered_tree_ids(),
            stops: route.plan.stops,
            geometry: route.geometry,
        }
    }
}

/// Server health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Name of the point store in use.
    pub store: String,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use canopy_map_aggregation_models::{ClassifiedPoint, Cluster, Coordinate};

    use super::*;

    #[test]
    fn cluster_feature_json_shape() {
        let feature = MapFeature::Cluster(Cluster {
            centroid: Coordinate::new(52.5, 13.4),
            member_count: 12,
            avg_index: 0.004,
            member_tree_ids: Some(BTreeSet::from([3, 1])),
            health_tier: HealthTier::Bad,
        });
        let json = serde_json::to_value(ApiFeature::from(&feature)).unwrap();

        assert_eq!(json["isCluster"], true);
        assert_eq!(json["health"], 2);
        assert_eq!(json["treeCount"], 12);
        assert_eq!(json["treeIds"], serde_json::json!([1, 3]));
        assert!(json.get("ndvi").is_none());
    }

    #[test]
    fn point_feature_json_shape() {
        let feature = MapFeature::Point(ClassifiedPoint {
            id: Some(9),
            lat: 52.5,
            lng: 13.4,
            index: 0.25,
            health_tier: HealthTier::Good,
        });
        let json = serde_json::to_value(ApiFeature::from(&feature)).unwrap();

        assert_eq!(json["isCluster"], false);
        assert_eq!(json["health"], 4);
        assert_eq!(json["id"], 9);
        assert!(json.get("treeCount").is_none());
    }

    #[test]
    fn route_tree_with_unknown_tier() {
        let tree = ApiRouteTree {
            id: 1,
            lat: 0.0,
            lng: 0.0,
            health: 7,
        };
        assert_eq!(tree.to_stop().health, None);
    }
}
