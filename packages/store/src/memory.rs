//! In-process point store backed by an R-tree.
//!
//! Trees are loaded once (from a JSON seed file or directly) and their
//! representative readings are resolved per query with the configured
//! [`SelectionPolicy`], so a policy change never leaves stale aggregates
//! behind.

use std::path::Path;

use async_trait::async_trait;
use canopy_map_aggregation::summarize_plan;
use canopy_map_aggregation_models::{
    AggregationPlan, BoundingBox, ClusterSummary, NoisePolicy, SpatialPoint,
};
use canopy_map_health::resolve;
use canopy_map_health_models::{SelectionPolicy, Tree};
use rstar::{AABB, RTree, RTreeObject};

use crate::{PointStore, RawPoint, StoreError};

/// A tree indexed by its `[lng, lat]` position.
struct TreeEntry {
    tree: Tree,
}

impl RTreeObject for TreeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.tree.lng, self.tree.lat])
    }
}

/// Point store holding every tree in memory.
pub struct MemoryStore {
    trees: RTree<TreeEntry>,
    selection: SelectionPolicy,
    noise: NoisePolicy,
}

impl MemoryStore {
    /// Indexes `trees`.
    #[must_use]
    pub fn new(trees: Vec<Tree>, selection: SelectionPolicy, noise: NoisePolicy) -> Self {
        let entries = trees.into_iter().map(|tree| TreeEntry { tree }).collect();
        Self {
            trees: RTree::bulk_load(entries),
            selection,
            noise,
        }
    }

    /// Loads trees from a JSON array of [`Tree`] records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the file cannot be read and
    /// [`StoreError::Json`] if it is not a valid tree list.
    pub fn from_json_file(
        path: &Path,
        selection: SelectionPolicy,
        noise: NoisePolicy,
    ) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let trees: Vec<Tree> = serde_json::from_str(&text)?;

        log::info!("Loaded {} trees from {}", trees.len(), path.display());

        Ok(Self::new(trees, selection, noise))
    }

    /// Number of indexed trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.size()
    }

    /// Returns `true` if no trees are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.size() == 0
    }

    /// Trees inside `bounds`, ordered by id.
    fn trees_in(&self, bounds: &BoundingBox) -> Vec<&Tree> {
        let envelope = AABB::from_corners([bounds.west, bounds.south], [bounds.east, bounds.north]);
        let mut trees: Vec<&Tree> = self
            .trees
            .locate_in_envelope(&envelope)
            .map(|entry| &entry.tree)
            .collect();
        trees.sort_by_key(|tree| tree.id);
        trees
    }

    fn reading(&self, tree: &Tree) -> RawPoint {
        let reading = resolve(&tree.observations, &self.selection);
        RawPoint {
            id: Some(tree.id),
            lat: tree.lat,
            lng: tree.lng,
            index: reading.index,
            timestamp: reading.timestamp,
        }
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query_raw(
        &self,
        bounds: &BoundingBox,
        limit: u32,
    ) -> Result<Vec<RawPoint>, StoreError> {
        Ok(self
            .trees_in(bounds)
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|tree| self.reading(tree))
            .collect())
    }

    async fn query_aggregate(
        &self,
        bounds: &BoundingBox,
        plan: &AggregationPlan,
    ) -> Result<Vec<ClusterSummary>, StoreError> {
        let points: Vec<SpatialPoint> = self
            .trees_in(bounds)
            .into_iter()
            .map(|tree| self.reading(tree).to_spatial())
            .collect();

        summarize_plan(&points, plan, self.noise).map_err(|e| StoreError::Rejected {
            status: 400,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use canopy_map_health_models::Observation;
    use chrono::{TimeZone as _, Utc};

    use super::*;

    fn tree(id: i64, lat: f64, lng: f64, readings: &[(u32, f64)]) -> Tree {
        Tree {
            id,
            lat,
            lng,
            species: None,
            name: None,
            observations: readings
                .iter()
                .map(|&(month, index)| Observation {
                    index,
                    timestamp: Utc.with_ymd_and_hms(2024, month, 15, 0, 0, 0).unwrap(),
                })
                .collect(),
        }
    }

    fn store(selection: SelectionPolicy) -> MemoryStore {
        MemoryStore::new(
            vec![
                tree(3, 52.52, 13.41, &[(7, 0.3), (10, 0.1)]),
                tree(1, 52.50, 13.40, &[(6, 0.5)]),
                tree(2, 52.51, 13.42, &[]),
                tree(4, 48.85, 2.35, &[(8, 0.7)]),
            ],
            selection,
            NoisePolicy::Drop,
        )
    }

    fn berlin() -> BoundingBox {
        BoundingBox::new(13.3, 52.4, 13.5, 52.6)
    }

    #[tokio::test]
    async fn raw_query_filters_by_bounds_and_orders_by_id() {
        let points = store(SelectionPolicy::Latest)
            .query_raw(&berlin(), 100)
            .await
            .unwrap();

        let ids: Vec<_> = points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(points[1].index, None);
        assert_eq!(points[2].index, Some(0.1));
    }

    #[tokio::test]
    async fn raw_query_respects_limit() {
        let points = store(SelectionPolicy::Latest)
            .query_raw(&berlin(), 2)
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
    }

    #[tokio::test]
    async fn season_window_changes_the_reading() {
        let points = store(SelectionPolicy::summer())
            .query_raw(&berlin(), 100)
            .await
            .unwrap();
        assert_eq!(points[2].index, Some(0.3));
    }

    #[tokio::test]
    async fn aggregate_counts_trees_without_readings_as_zero() {
        let clusters = store(SelectionPolicy::Latest)
            .query_aggregate(&berlin(), &AggregationPlan::GridBin { cell_size: 1.0 })
            .await
            .unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_count, 3);
        assert!((clusters[0].avg_index - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn raw_plan_is_rejected_by_aggregate_query() {
        let result = store(SelectionPolicy::Latest)
            .query_aggregate(&berlin(), &AggregationPlan::Raw { limit: 10 })
            .await;
        assert!(matches!(result, Err(StoreError::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn empty_viewport_is_empty() {
        let points = store(SelectionPolicy::Latest)
            .query_raw(&BoundingBox::new(-10.0, -10.0, -9.0, -9.0), 100)
            .await
            .unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn loads_json_seed() {
        let path = std::env::temp_dir().join(format!("canopy_seed_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"id":1,"lat":52.5,"lng":13.4,"observations":[{"index":0.4,"timestamp":"2024-06-01T00:00:00Z"}]}]"#,
        )
        .unwrap();

        let store =
            MemoryStore::from_json_file(&path, SelectionPolicy::Latest, NoisePolicy::Drop).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn missing_seed_is_a_config_error() {
        let result = MemoryStore::from_json_file(
            Path::new("/nonexistent/canopy/trees.json"),
            SelectionPolicy::Latest,
            NoisePolicy::Drop,
        );
        assert!(matches!(result, Err(StoreError::Config { .. })));
    }
}
