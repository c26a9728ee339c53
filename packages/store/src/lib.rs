#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point stores for the canopy map.
//!
//! A [`PointStore`] answers two kinds of viewport queries: individual
//! readings inside a bounding box, and pre-aggregated cluster rows for an
//! [`AggregationPlan`]. Two implementations are provided:
//!
//! * [`memory::MemoryStore`] keeps trees in an R-tree and aggregates
//!   in-process.
//! * [`supabase::SupabaseStore`] talks to a `PostgREST` endpoint whose
//!   database functions do the aggregation.
//!
//! [`viewport::ViewportService`] sits on top of a store and turns viewport
//! queries into classified map features.

pub mod memory;
pub mod supabase;
pub mod viewport;

use async_trait::async_trait;
use canopy_map_aggregation_models::{AggregationPlan, BoundingBox, ClusterSummary, SpatialPoint};
use canopy_map_health_models::TreeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use viewport::{ViewportOutcome, ViewportService, ViewportSnapshot};

/// Errors that can occur while querying a point store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store understood the query and refused it.
    #[error("Query rejected ({status}): {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Message reported by the store.
        message: String,
    },

    /// A response did not have the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The store is misconfigured or its seed data is unreadable.
    #[error("Store configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// One reading returned by a raw query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    /// Tree id, if the store reports it.
    pub id: Option<TreeId>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Representative index; `None` when the tree has no usable reading.
    pub index: Option<f64>,
    /// When the reading was taken, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawPoint {
    /// Converts to an aggregation input, resolving a missing index to `0`.
    #[must_use]
    pub fn to_spatial(&self) -> SpatialPoint {
        SpatialPoint {
            id: self.id,
            lat: self.lat,
            lng: self.lng,
            index: self.index.unwrap_or(0.0),
        }
    }
}

/// A source of tree readings that can be queried by viewport.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Returns at most `limit` individual readings inside `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the
    /// query.
    async fn query_raw(&self, bounds: &BoundingBox, limit: u32)
    -> Result<Vec<RawPoint>, StoreError>;

    /// Returns one summary row per cluster of the readings inside `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable, rejects the
    /// query, or `plan` is [`AggregationPlan::Raw`].
    async fn query_aggregate(
        &self,
        bounds: &BoundingBox,
        plan: &AggregationPlan,
    ) -> Result<Vec<ClusterSummary>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_index_becomes_zero() {
        let raw = RawPoint {
            id: Some(7),
            lat: 1.0,
            lng: 2.0,
            index: None,
            timestamp: None,
        };
        let spatial = raw.to_spatial();
        assert_eq!(spatial.id, Some(7));
        assert!(spatial.index.abs() < f64::EPSILON);
    }
}
