//! Representative-reading selection over a tree's observation history.

use canopy_map_health_models::{Observation, RepresentativeReading, SelectionPolicy};
use chrono::Datelike as _;

/// Picks the observation that represents a tree under `policy`.
///
/// The input may be in any order and is never modified. Returns
/// [`RepresentativeReading::none`] when `observations` is empty or no
/// observation falls inside a season window.
#[must_use]
pub fn resolve(observations: &[Observation], policy: &SelectionPolicy) -> RepresentativeReading {
    let mut newest_first: Vec<&Observation> = observations.iter().collect();
    // Stable sort keeps input order among equal timestamps.
    newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let chosen = match policy {
        SelectionPolicy::Latest => newest_first.first().copied(),
        SelectionPolicy::LatestInSeasonWindow { months } => newest_first
            .into_iter()
            .find(|obs| months.contains(&obs.timestamp.month())),
    };

    chosen.map_or_else(RepresentativeReading::none, RepresentativeReading::from)
}
