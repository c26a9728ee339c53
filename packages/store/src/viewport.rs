//! Viewport loading with stale-result discard.
//!
//! Every call to [`ViewportService::load`] takes a ticket from a
//! monotonically increasing counter before fetching. When the fetch
//! completes, the result is only published if no newer load has started
//! in the meantime; otherwise it is reported as
//! [`ViewportOutcome::Superseded`] and dropped. Store failures never
//! escape: they are logged and published as an empty viewport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use canopy_map_aggregation::{ZoomLadder, classify_summaries, pass_through};
use canopy_map_aggregation_models::{AggregationPlan, MapFeature, SpatialPoint, ViewportQuery};
use canopy_map_health_models::ThresholdProfile;
use tokio::sync::RwLock;

use crate::{PointStore, StoreError};

/// Result of one viewport load.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportOutcome {
    /// Features to render.
    Features(Vec<MapFeature>),
    /// Nothing inside the viewport.
    Empty,
    /// The store failed; the viewport now shows nothing.
    Failed,
    /// A newer load started before this one finished.
    Superseded,
}

impl ViewportOutcome {
    /// Features to render; empty for every outcome but
    /// [`ViewportOutcome::Features`].
    #[must_use]
    pub fn features(&self) -> &[MapFeature] {
        match self {
            Self::Features(features) => features,
            Self::Empty | Self::Failed | Self::Superseded => &[],
        }
    }
}

/// The most recently published viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSnapshot {
    /// Ticket of the load that produced this snapshot.
    pub generation: u64,
    /// The query that was loaded.
    pub query: ViewportQuery,
    /// Plan chosen for the query's zoom.
    pub plan: AggregationPlan,
    /// Classified features; empty after a failure.
    pub features: Vec<MapFeature>,
}

/// Loads classified features for viewports from a [`PointStore`].
pub struct ViewportService {
    store: Arc<dyn PointStore>,
    ladder: ZoomLadder,
    profile: ThresholdProfile,
    generation: AtomicU64,
    current: RwLock<Option<ViewportSnapshot>>,
}

impl ViewportService {
    /// Creates a service that picks plans from `ladder` and classifies
    /// with `profile`.
    #[must_use]
    pub fn new(store: Arc<dyn PointStore>, ladder: ZoomLadder, profile: ThresholdProfile) -> Self {
        Self {
            store,
            ladder,
            profile,
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    /// Ladder used to choose plans.
    #[must_use]
    pub const fn ladder(&self) -> &ZoomLadder {
        &self.ladder
    }

    /// Profile used to classify features.
    #[must_use]
    pub const fn profile(&self) -> &ThresholdProfile {
        &self.profile
    }

    /// The last published viewport, if any.
    pub async fn current(&self) -> Option<ViewportSnapshot> {
        self.current.read().await.clone()
    }

    /// Fetches and classifies the features of `query`.
    ///
    /// Never fails: store errors are logged and reported as
    /// [`ViewportOutcome::Failed`].
    pub async fn load(&self, query: ViewportQuery) -> ViewportOutcome {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = self.ladder.select_plan(query.zoom);

        let fetched = if query.bounds.is_valid() {
            self.fetch(&query, &plan).await
        } else {
            Err(StoreError::Rejected {
                status: 400,
                message: format!("invalid bounding box {:?}", query.bounds),
            })
        };

        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            log::debug!("Discarding stale viewport result for zoom {}", query.zoom);
            return ViewportOutcome::Superseded;
        }

        let (features, outcome) = match fetched {
            Ok(features) if features.is_empty() => {
                log::debug!("No trees in current view");
                (Vec::new(), ViewportOutcome::Empty)
            }
            Ok(features) => {
                log::info!(
                    "Fetched {} {} in current view",
                    features.len(),
                    if plan.is_raw() { "trees" } else { "clusters" }
                );
                (features.clone(), ViewportOutcome::Features(features))
            }
            Err(e) => {
                log::error!("Viewport query on {} failed: {e}", self.store.name());
                (Vec::new(), ViewportOutcome::Failed)
            }
        };

        *current = Some(ViewportSnapshot {
            generation: ticket,
            query,
            plan,
            features,
        });

        outcome
    }

    async fn fetch(
        &self,
        query: &ViewportQuery,
        plan: &AggregationPlan,
    ) -> Result<Vec<MapFeature>, StoreError> {
        match *plan {
            AggregationPlan::Raw { limit } => {
                let points: Vec<SpatialPoint> = self
                    .store
                    .query_raw(&query.bounds, limit)
                    .await?
                    .iter()
                    .map(crate::RawPoint::to_spatial)
                    .collect();
                Ok(pass_through(&points, limit, &self.profile))
            }
            AggregationPlan::GridBin { .. } | AggregationPlan::DensityCluster { .. } => {
                let summaries = self.store.query_aggregate(&query.bounds, plan).await?;
                Ok(classify_summaries(summaries, &self.profile))
            }
        }
    }
}
