//! Density-based clustering (DBSCAN-style neighbour expansion).
//!
//! Two points are neighbours when their planar distance in degrees is at
//! most `distance`. A point with at least `min_points` neighbours
//! (itself included) is a core point; clusters grow from core points
//! through their neighbours, and points reached from no core point are
//! noise. Points are visited in input order, so labels are reproducible.
//!
//! When a `target_size` is given and there are more groups than that,
//! the neighbour distance is doubled until the groups fit. If even that
//! does not help (fewer points than `min_points`), the closest groups are
//! merged pairwise.

use std::collections::VecDeque;

use canopy_map_aggregation_models::{ClusterSummary, Coordinate, NoisePolicy, SpatialPoint};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::distance::planar_degrees;
use crate::summarize;

/// Maximum number of distance doublings when shrinking to `target_size`.
const MAX_WIDENINGS: u32 = 32;

/// Parameters of one density clustering run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityParams {
    /// Neighbour distance in degrees.
    pub distance: f64,
    /// Minimum neighbourhood size of a core point.
    pub min_points: u32,
    /// Upper bound on the number of output groups.
    pub target_size: Option<u32>,
    /// What to do with noise points.
    pub noise: NoisePolicy,
}

/// A point stored in the R-tree with its position in the input slice.
struct IndexedPoint {
    idx: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Member(usize),
}

/// Result of labelling: member indices per cluster plus noise indices,
/// both in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Grouping {
    clusters: Vec<Vec<usize>>,
    noise: Vec<usize>,
}

impl Grouping {
    fn group_count(&self, noise: NoisePolicy) -> usize {
        match noise {
            NoisePolicy::Drop => self.clusters.len(),
            NoisePolicy::Singleton => self.clusters.len() + self.noise.len(),
        }
    }

    fn into_groups(self, noise: NoisePolicy) -> Vec<Vec<usize>> {
        let mut groups = self.clusters;
        if noise == NoisePolicy::Singleton {
            groups.extend(self.noise.into_iter().map(|idx| vec![idx]));
        }
        groups
    }
}

/// Clusters `points` and summarizes each group.
///
/// Clusters come first in discovery order, followed by singleton noise
/// clusters when [`NoisePolicy::Singleton`] is selected.
#[must_use]
pub fn density_cluster(points: &[SpatialPoint], params: &DensityParams) -> Vec<ClusterSummary> {
    if points.is_empty() {
        return Vec::new();
    }

    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                idx,
                position: [p.lng, p.lat],
            })
            .collect(),
    );
    let min_points = usize::try_from(params.min_points.max(1)).unwrap_or(usize::MAX);

    let mut distance = params.distance;
    let mut grouping = label(points, &tree, distance, min_points);

    let groups = match params.target_size {
        Some(target) => {
            let target = usize::try_from(target.max(1)).unwrap_or(usize::MAX);
            // Widening cannot create clusters when there are fewer points
            // than a core neighbourhood needs.
            let can_widen = points.len() >= min_points;
            let mut widenings = 0;
            while can_widen
                && grouping.group_count(params.noise) > target
                && widenings < MAX_WIDENINGS
            {
                distance *= 2.0;
                widenings += 1;
                grouping = label(points, &tree, distance, min_points);
            }
            if widenings > 0 {
                log::debug!(
                    "Widened density distance {} -> {distance} to fit {target} groups",
                    params.distance
                );
            }
            let mut groups = grouping.into_groups(params.noise);
            merge_closest(points, &mut groups, target);
            groups
        }
        None => grouping.into_groups(params.noise),
    };

    groups
        .iter()
        .map(|members| {
            let members: Vec<&SpatialPoint> = members.iter().map(|&i| &points[i]).collect();
            summarize(&members)
        })
        .collect()
}

/// Runs neighbour expansion over all points.
fn label(
    points: &[SpatialPoint],
    tree: &RTree<IndexedPoint>,
    distance: f64,
    min_points: usize,
) -> Grouping {
    let neighbours = |idx: usize| -> Vec<usize> {
        let p = &points[idx];
        let mut found: Vec<usize> = tree
            .locate_within_distance([p.lng, p.lat], distance * distance)
            .map(|n| n.idx)
            .collect();
        found.sort_unstable();
        found
    };

    let mut labels = vec![Label::Unvisited; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for start in 0..points.len() {
        if labels[start] != Label::Unvisited {
            continue;
        }

        let seeds = neighbours(start);
        if seeds.len() < min_points {
            labels[start] = Label::Noise;
            continue;
        }

        let cluster_id = clusters.len();
        let mut members = vec![start];
        labels[start] = Label::Member(cluster_id);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&i| i != start).collect();
        while let Some(idx) = queue.pop_front() {
            match labels[idx] {
                Label::Member(_) => continue,
                Label::Noise => {
                    // Border point: reachable from a core point but not
                    // itself dense enough to expand further.
                    labels[idx] = Label::Member(cluster_id);
                    members.push(idx);
                    continue;
                }
                Label::Unvisited => {
                    labels[idx] = Label::Member(cluster_id);
                    members.push(idx);
                }
            }

            let reach = neighbours(idx);
            if reach.len() >= min_points {
                queue.extend(
                    reach
                        .into_iter()
                        .filter(|&i| !matches!(labels[i], Label::Member(_))),
                );
            }
        }

        members.sort_unstable();
        clusters.push(members);
    }

    let noise = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| **l == Label::Noise)
        .map(|(idx, _)| idx)
        .collect();

    Grouping { clusters, noise }
}

/// Merges the two groups with the closest centroids until at most
/// `target` remain. Ties go to the lowest group indices.
fn merge_closest(points: &[SpatialPoint], groups: &mut Vec<Vec<usize>>, target: usize) {
    while groups.len() > target && groups.len() > 1 {
        let centroids: Vec<Coordinate> = groups.iter().map(|g| centroid(points, g)).collect();

        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..centroids.len() {
            for j in (i + 1)..centroids.len() {
                let d = planar_degrees(centroids[i], centroids[j]);
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }

        let Some((keep, absorb, _)) = best else {
            break;
        };
        let absorbed = groups.remove(absorb);
        groups[keep].extend(absorbed);
        groups[keep].sort_unstable();
    }
}

#[allow(clippy::cast_precision_loss)]
fn centroid(points: &[SpatialPoint], members: &[usize]) -> Coordinate {
    let count = members.len() as f64;
    let (lat, lng) = members.iter().fold((0.0, 0.0), |(lat, lng), &i| {
        (lat + points[i].lat, lng + points[i].lng)
    });
    Coordinate::new(lat / count, lng / count)
}
