#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Viewport, aggregation plan and cluster types.
//!
//! A [`ViewportQuery`] is turned into an [`AggregationPlan`] by the zoom
//! ladder; executing the plan over the points inside the viewport yields
//! [`MapFeature`]s, either individual [`ClassifiedPoint`]s or [`Cluster`]
//! summaries. All of these are ephemeral and recomputed per query.

use std::collections::BTreeSet;

use canopy_map_health_models::{HealthTier, TreeId};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns `true` if all edges are finite and `south <= north`,
    /// `west <= east`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite())
            && self.south <= self.north
            && self.west <= self.east
    }
}

/// A map viewport: what the user is looking at and how closely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportQuery {
    /// Visible area.
    pub bounds: BoundingBox,
    /// Integer zoom level.
    pub zoom: u8,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// How the points of a viewport are requested and summarized.
///
/// Distances and cell sizes are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationPlan {
    /// Individual points, at most `limit` of them.
    Raw {
        /// Result-size cap.
        limit: u32,
    },
    /// Fixed-grid binning anchored at `(0, 0)`.
    GridBin {
        /// Cell side length.
        cell_size: f64,
    },
    /// Density-based clustering.
    DensityCluster {
        /// Neighbour distance.
        distance: f64,
        /// Minimum members for a group to count as a cluster.
        min_points: u32,
        /// Upper bound on the number of output groups.
        #[serde(default)]
        target_size: Option<u32>,
    },
}

impl AggregationPlan {
    /// Cell size or neighbour distance; `None` for raw plans.
    #[must_use]
    pub const fn magnitude(&self) -> Option<f64> {
        match self {
            Self::Raw { .. } => None,
            Self::GridBin { cell_size } => Some(*cell_size),
            Self::DensityCluster { distance, .. } => Some(*distance),
        }
    }

    /// Returns `true` for [`AggregationPlan::Raw`].
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }
}

/// What density clustering does with points that do not reach
/// `min_points`.
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
pub enum NoisePolicy {
    /// Noise points are left out of the result.
    #[default]
    Drop,
    /// Each noise point becomes a single-member cluster.
    Singleton,
}

/// A point handed to the aggregation engine.
///
/// `index` is the tree's representative index with a missing reading
/// already resolved to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialPoint {
    /// Tree this point belongs to, if known.
    pub id: Option<TreeId>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Representative vegetation index.
    pub index: f64,
}

/// An individual tree ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPoint {
    /// Tree id, if known.
    pub id: Option<TreeId>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Representative vegetation index.
    pub index: f64,
    /// Tier of `index`.
    pub health_tier: HealthTier,
}

/// Unclassified summary of the points in one grid cell or density group.
///
/// This is also the row shape returned by store-side aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Arithmetic mean of the member coordinates.
    pub centroid: Coordinate,
    /// Number of members.
    pub member_count: u32,
    /// Mean representative index of the members.
    pub avg_index: f64,
    /// Member ids, when the source reports them.
    pub member_tree_ids: Option<BTreeSet<TreeId>>,
}

impl ClusterSummary {
    /// Attaches the tier of `avg_index`.
    #[must_use]
    pub fn with_tier(self, health_tier: HealthTier) -> Cluster {
        Cluster {
            centroid: self.centroid,
            member_count: self.member_count,
            avg_index: self.avg_index,
            member_tree_ids: self.member_tree_ids,
            health_tier,
        }
    }
}

/// A classified group of trees ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Arithmetic mean of the member coordinates.
    pub centroid: Coordinate,
    /// Number of members.
    pub member_count: u32,
    /// Mean representative index of the members.
    pub avg_index: f64,
    /// Member ids, when the source reports them.
    pub member_tree_ids: Option<BTreeSet<TreeId>>,
    /// Tier of `avg_index`.
    pub health_tier: HealthTier,
}

/// One renderable item of a viewport result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapFeature {
    /// An individual tree.
    Point(ClassifiedPoint),
    /// A group of trees.
    Cluster(Cluster),
}

impl MapFeature {
    /// Returns `true` for [`MapFeature::Cluster`].
    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    /// Tier the feature is drawn with.
    #[must_use]
    pub const fn health_tier(&self) -> HealthTier {
        match self {
            Self::Point(p) => p.health_tier,
            Self::Cluster(c) => c.health_tier,
        }
    }
}
