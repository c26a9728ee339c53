//! Greedy nearest-neighbour tour construction.
//!
//! The tour starts at the first input stop and repeatedly moves to the
//! closest unvisited stop. It is a heuristic: no other start is tried and
//! the tour is not improved afterwards.

use std::collections::BTreeSet;

use canopy_map_aggregation::distance::haversine_meters;
use canopy_map_health::AttentionCutoff;
use canopy_map_route_models::{RoutePlan, RouteStop, StartPolicy};

/// Orders `stops` by nearest neighbour using great-circle distance.
#[must_use]
pub fn plan_route(stops: &[RouteStop], start: StartPolicy) -> RoutePlan {
    plan_route_with(stops, start, |a, b| {
        haversine_meters(a.coordinate(), b.coordinate())
    })
}

/// Orders `stops` by nearest neighbour under an arbitrary distance.
///
/// Ties go to the stop that comes first in the input. Repeated ids are
/// visited once, at their first occurrence.
#[must_use]
pub fn plan_route_with<F>(stops: &[RouteStop], start: StartPolicy, distance: F) -> RoutePlan
where
    F: Fn(&RouteStop, &RouteStop) -> f64,
{
    let mut seen = BTreeSet::new();
    let mut unvisited: Vec<RouteStop> = stops.iter().filter(|s| seen.insert(s.id)).copied().collect();

    if unvisited.is_empty() {
        return RoutePlan::default();
    }

    let seed = match start {
        StartPolicy::FirstInput => unvisited.remove(0),
    };

    let mut route = Vec::with_capacity(unvisited.len() + 1);
    route.push(seed);

    let mut current = seed;
    while !unvisited.is_empty() {
        let mut nearest = 0;
        let mut nearest_distance = distance(&current, &unvisited[0]);
        for (i, candidate) in unvisited.iter().enumerate().skip(1) {
            let d = distance(&current, candidate);
            if d < nearest_distance {
                nearest = i;
                nearest_distance = d;
            }
        }

        current = unvisited.remove(nearest);
        route.push(current);
    }

    RoutePlan { stops: route }
}

/// Keeps the stops whose tier needs attention, in input order.
///
/// Stops without a tier are skipped.
#[must_use]
pub fn select_flagged(stops: &[RouteStop], cutoff: AttentionCutoff) -> Vec<RouteStop> {
    stops
        .iter()
        .filter(|s| s.health.is_some_and(|tier| cutoff.needs_attention(tier)))
        .copied()
        .collect()
}
