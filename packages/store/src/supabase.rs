//! Supabase / `PostgREST` point store.
//!
//! Raw readings come straight from the `trees` table. Aggregated rows come
//! from two database functions:
//!
//! * `get_tree_clusters(min_lat, max_lat, min_lng, max_lng, grid_size)`
//! * `get_tree_density_clusters(min_lat, max_lat, min_lng, max_lng,
//!   distance, min_points, target_size)`
//!
//! Both return `center_lat`, `center_lng`, `tree_count` and `avg_ndvi`
//! per cluster; the density function may also return `tree_ids`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use canopy_map_aggregation_models::{AggregationPlan, BoundingBox, ClusterSummary, Coordinate};
use serde_json::json;

use crate::{PointStore, RawPoint, StoreError};

/// Point store backed by a Supabase project.
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    /// Creates a store for the project at `base_url` (e.g.
    /// `https://xyz.supabase.co`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn rpc(
        &self,
        function: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let resp = self
            .client
            .post(self.rest_url(&format!("rpc/{function}")))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        read_json(resp).await
    }
}

/// Returns the JSON body, or [`StoreError::Rejected`] for non-2xx
/// responses.
async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, StoreError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    Ok(resp.json().await?)
}

#[async_trait]
impl PointStore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn query_raw(
        &self,
        bounds: &BoundingBox,
        limit: u32,
    ) -> Result<Vec<RawPoint>, StoreError> {
        let resp = self
            .client
            .get(self.rest_url("trees"))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&[
                ("select", "id,lat,lng,ndvi".to_string()),
                ("lat", format!("gte.{}", bounds.south)),
                ("lat", format!("lte.{}", bounds.north)),
                ("lng", format!("gte.{}", bounds.west)),
                ("lng", format!("lte.{}", bounds.east)),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let body = read_json(resp).await?;
        parse_raw_rows(&body)
    }

    async fn query_aggregate(
        &self,
        bounds: &BoundingBox,
        plan: &AggregationPlan,
    ) -> Result<Vec<ClusterSummary>, StoreError> {
        let body = match *plan {
            AggregationPlan::Raw { .. } => {
                return Err(StoreError::Rejected {
                    status: 400,
                    message: "raw plans are not aggregated".to_string(),
                });
            }
            AggregationPlan::GridBin { cell_size } => {
                self.rpc(
                    "get_tree_clusters",
                    &json!({
                        "min_lat": bounds.south,
                        "max_lat": bounds.north,
                        "min_lng": bounds.west,
                        "max_lng": bounds.east,
                        "grid_size": cell_size,
                    }),
                )
                .await?
            }
            AggregationPlan::DensityCluster {
                distance,
                min_points,
                target_size,
            } => {
                self.rpc(
                    "get_tree_density_clusters",
                    &json!({
                        "min_lat": bounds.south,
                        "max_lat": bounds.north,
                        "min_lng": bounds.west,
                        "max_lng": bounds.east,
                        "distance": distance,
                        "min_points": min_points,
                        "target_size": target_size,
                    }),
                )
                .await?
            }
        };

        parse_cluster_rows(&body)
    }
}

/// Reads a numeric column that `PostgREST` may render as a JSON number or,
/// for `numeric` columns, as a string.
fn number(row: &serde_json::Value, column: &str) -> Option<f64> {
    let value = &row[column];
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn rows(body: &serde_json::Value) -> Result<&Vec<serde_json::Value>, StoreError> {
    body.as_array().ok_or_else(|| StoreError::Parse {
        message: "Response is not an array".to_string(),
    })
}

fn required(row: &serde_json::Value, column: &str) -> Result<f64, StoreError> {
    number(row, column).ok_or_else(|| StoreError::Parse {
        message: format!("Missing {column} in row"),
    })
}

/// Parses rows of the `trees` table.
fn parse_raw_rows(body: &serde_json::Value) -> Result<Vec<RawPoint>, StoreError> {
    rows(body)?
        .iter()
        .map(|row| {
            Ok(RawPoint {
                id: row["id"].as_i64(),
                lat: required(row, "lat")?,
                lng: required(row, "lng")?,
                index: number(row, "ndvi"),
                timestamp: None,
            })
        })
        .collect()
}

/// Parses rows of the cluster functions.
fn parse_cluster_rows(body: &serde_json::Value) -> Result<Vec<ClusterSummary>, StoreError> {
    rows(body)?
        .iter()
        .map(|row| {
            let count = row["tree_count"]
                .as_u64()
                .ok_or_else(|| StoreError::Parse {
                    message: "Missing tree_count in row".to_string(),
                })?;

            let member_tree_ids = row["tree_ids"]
                .as_array()
                .map(|ids| ids.iter().filter_map(serde_json::Value::as_i64).collect::<BTreeSet<_>>());

            Ok(ClusterSummary {
                centroid: Coordinate::new(required(row, "center_lat")?, required(row, "center_lng")?),
                member_count: u32::try_from(count).unwrap_or(u32::MAX),
                avg_index: number(row, "avg_ndvi").unwrap_or(0.0),
                member_tree_ids,
            })
        })
        .collect()
}
