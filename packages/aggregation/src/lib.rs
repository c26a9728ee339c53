#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Zoom-adaptive aggregation of tree readings.
//!
//! The [`ladder`] module turns a zoom level into an [`AggregationPlan`];
//! [`aggregate`] executes a plan over the points of a viewport:
//!
//! * [`AggregationPlan::Raw`] passes points through, capped and classified.
//! * [`AggregationPlan::GridBin`] bins points into a fixed global grid
//!   ([`grid`]).
//! * [`AggregationPlan::DensityCluster`] groups mutually reachable points
//!   ([`density`]).
//!
//! Every step is deterministic: the same points and plan always produce
//! the same features in the same order.

pub mod density;
pub mod distance;
pub mod grid;
pub mod ladder;
pub mod registry;

use std::collections::BTreeSet;

use canopy_map_aggregation_models::{
    AggregationPlan, ClassifiedPoint, ClusterSummary, Coordinate, MapFeature, NoisePolicy,
    SpatialPoint,
};
use canopy_map_health::classify;
use canopy_map_health_models::ThresholdProfile;

pub use ladder::{ZoomBracket, ZoomLadder, validate_plan};

/// Errors that can occur while configuring or running aggregation.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    /// A plan's parameters are unusable.
    #[error("Invalid aggregation plan: {message}")]
    InvalidPlan {
        /// Description of what went wrong.
        message: String,
    },

    /// A ladder has gaps, overlaps or growing magnitudes.
    #[error("Invalid zoom ladder: {message}")]
    InvalidLadder {
        /// Description of what went wrong.
        message: String,
    },

    /// No ladder with the requested id exists.
    #[error("Unknown zoom ladder: {0}")]
    UnknownLadder(String),

    /// A ladder TOML document could not be parsed.
    #[error("Ladder parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Executes `plan` over `points`, classifying every output feature with
/// `profile`.
///
/// `noise` only affects density clustering. Empty input yields an empty
/// result.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidPlan`] if the plan fails
/// [`validate_plan`].
pub fn aggregate(
    points: &[SpatialPoint],
    plan: &AggregationPlan,
    profile: &ThresholdProfile,
    noise: NoisePolicy,
) -> Result<Vec<MapFeature>, AggregationError> {
    let features = match *plan {
        AggregationPlan::Raw { limit } => {
            validate_plan(plan)?;
            pass_through(points, limit, profile)
        }
        AggregationPlan::GridBin { .. } | AggregationPlan::DensityCluster { .. } => {
            classify_summaries(summarize_plan(points, plan, noise)?, profile)
        }
    };

    log::debug!(
        "Aggregated {} points into {} features with {plan:?}",
        points.len(),
        features.len()
    );

    Ok(features)
}

/// Groups `points` under an aggregating plan without classifying them.
///
/// This is the part of [`aggregate`] a point store can run on its own.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidPlan`] if the plan fails
/// [`validate_plan`] or is [`AggregationPlan::Raw`].
pub fn summarize_plan(
    points: &[SpatialPoint],
    plan: &AggregationPlan,
    noise: NoisePolicy,
) -> Result<Vec<ClusterSummary>, AggregationError> {
    validate_plan(plan)?;

    if points.is_empty() {
        return Ok(Vec::new());
    }

    match *plan {
        AggregationPlan::Raw { .. } => Err(AggregationError::InvalidPlan {
            message: "raw plans are not aggregated".to_string(),
        }),
        AggregationPlan::GridBin { cell_size } => Ok(grid::grid_bin(points, cell_size)),
        AggregationPlan::DensityCluster {
            distance,
            min_points,
            target_size,
        } => Ok(density::density_cluster(
            points,
            &density::DensityParams {
                distance,
                min_points,
                target_size,
                noise,
            },
        )),
    }
}

/// Returns the first `limit` points, each classified on its own.
#[must_use]
pub fn pass_through(
    points: &[SpatialPoint],
    limit: u32,
    profile: &ThresholdProfile,
) -> Vec<MapFeature> {
    points
        .iter()
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|p| {
            MapFeature::Point(ClassifiedPoint {
                id: p.id,
                lat: p.lat,
                lng: p.lng,
                index: p.index,
                health_tier: classify(p.index, profile),
            })
        })
        .collect()
}

/// Classifies each summary by its average index.
#[must_use]
pub fn classify_summaries(
    summaries: Vec<ClusterSummary>,
    profile: &ThresholdProfile,
) -> Vec<MapFeature> {
    summaries
        .into_iter()
        .map(|summary| {
            let tier = classify(summary.avg_index, profile);
            MapFeature::Cluster(summary.with_tier(tier))
        })
        .collect()
}

/// Summarizes a non-empty set of members.
///
/// The centroid and average index are recomputed from scratch. Member ids
/// are reported when at least one member has an id.
#[must_use]
pub fn summarize(members: &[&SpatialPoint]) -> ClusterSummary {
    #[allow(clippy::cast_precision_loss)]
    let count = members.len() as f64;

    let (lat_sum, lng_sum, index_sum) = members
        .iter()
        .fold((0.0, 0.0, 0.0), |(lat, lng, idx), p| {
            (lat + p.lat, lng + p.lng, idx + p.index)
        });

    let ids: BTreeSet<_> = members.iter().filter_map(|p| p.id).collect();

    ClusterSummary {
        centroid: Coordinate::new(lat_sum / count, lng_sum / count),
        member_count: u32::try_from(members.len()).unwrap_or(u32::MAX),
        avg_index: index_sum / count,
        member_tree_ids: if ids.is_empty() { None } else { Some(ids) },
    }
}

#[cfg(test)]
mod tests {
    use canopy_map_health_models::HealthTier;

    use super::*;

    fn profile() -> ThresholdProfile {
        ThresholdProfile::new(0.002, 0.01, 0.2).unwrap()
    }

    fn point(id: i64, lat: f64, lng: f64, index: f64) -> SpatialPoint {
        SpatialPoint {
            id: Some(id),
            lat,
            lng,
            index,
        }
    }

    #[test]
    fn empty_input_is_empty_output() {
        for plan in [
            AggregationPlan::Raw { limit: 10 },
            AggregationPlan::GridBin { cell_size: 0.1 },
            AggregationPlan::DensityCluster {
                distance: 0.1,
                min_points: 2,
                target_size: Some(3),
            },
        ] {
            let result = aggregate(&[], &plan, &profile(), NoisePolicy::Drop).unwrap();
            assert!(result.is_empty(), "{plan:?}");
        }
    }

    #[test]
    fn raw_caps_and_classifies() {
        let points = vec![
            point(1, 0.0, 0.0, 0.5),
            point(2, 0.0, 0.1, 0.001),
            point(3, 0.0, 0.2, 0.05),
        ];
        let result = aggregate(
            &points,
            &AggregationPlan::Raw { limit: 2 },
            &profile(),
            NoisePolicy::Drop,
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|f| !f.is_cluster()));
        assert_eq!(result[0].health_tier(), HealthTier::Good);
        assert_eq!(result[1].health_tier(), HealthTier::VeryBad);
    }

    #[test]
    fn invalid_plan_is_rejected() {
        let result = aggregate(
            &[point(1, 0.0, 0.0, 0.5)],
            &AggregationPlan::GridBin { cell_size: 0.0 },
            &profile(),
            NoisePolicy::Drop,
        );
        assert!(matches!(result, Err(AggregationError::InvalidPlan { .. })));
    }

    #[test]
    fn summary_is_arithmetic_mean() {
        let a = point(1, 10.0, 20.0, 0.1);
        let b = point(2, 12.0, 22.0, 0.3);
        let summary = summarize(&[&a, &b]);
        assert_eq!(summary.member_count, 2);
        assert!((summary.centroid.lat - 11.0).abs() < 1e-12);
        assert!((summary.centroid.lng - 21.0).abs() < 1e-12);
        assert!((summary.avg_index - 0.2).abs() < 1e-12);
        assert_eq!(summary.member_tree_ids, Some(BTreeSet::from([1, 2])));
    }

    #[test]
    fn summary_without_ids_reports_none() {
        let a = SpatialPoint {
            id: None,
            lat: 0.0,
            lng: 0.0,
            index: 0.0,
        };
        assert_eq!(summarize(&[&a]).member_tree_ids, None);
    }

    #[test]
    fn grid_features_are_classified_by_average() {
        let points = vec![point(1, 0.01, 0.01, 0.001), point(2, 0.02, 0.02, 0.005)];
        let features = aggregate(
            &points,
            &AggregationPlan::GridBin { cell_size: 0.1 },
            &profile(),
            NoisePolicy::Drop,
        )
        .unwrap();

        assert_eq!(features.len(), 1);
        let MapFeature::Cluster(cluster) = &features[0] else {
            panic!("expected a cluster, got {:?}", features[0]);
        };
        assert_eq!(cluster.member_count, 2);
        assert!((cluster.avg_index - 0.003).abs() < 1e-12);
        assert_eq!(cluster.health_tier, HealthTier::Bad);
    }

    #[test]
    fn raw_plan_is_not_summarized() {
        let result = summarize_plan(
            &[point(1, 0.0, 0.0, 0.5)],
            &AggregationPlan::Raw { limit: 5 },
            NoisePolicy::Drop,
        );
        assert!(matches!(result, Err(AggregationError::InvalidPlan { .. })));
    }
}
