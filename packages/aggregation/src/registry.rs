//! Compile-time registry of zoom ladders.
//!
//! Each ladder is defined in a TOML file under `ladders/`. Deployments
//! have used different ladders and individual-zoom cutoffs; callers pick
//! one by id.

use crate::AggregationError;
use crate::ladder::{ZoomLadder, parse_ladder_toml};

const LADDER_TOMLS: &[(&str, &str)] = &[
    ("grid", include_str!("../ladders/grid.toml")),
    ("density", include_str!("../ladders/density.toml")),
];

#[cfg(test)]
const EXPECTED_LADDER_COUNT: usize = 2;

/// Returns all embedded zoom ladders.
///
/// # Panics
///
/// Panics if any embedded TOML is malformed or fails validation (the
/// files are compiled in, so this is caught by the registry tests).
#[must_use]
pub fn all_ladders() -> Vec<ZoomLadder> {
    LADDER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_ladder_toml(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse zoom ladder '{name}': {e}"))
        })
        .collect()
}

/// Looks up an embedded ladder by id.
///
/// # Errors
///
/// Returns [`AggregationError::UnknownLadder`] if no ladder has that id.
pub fn ladder(id: &str) -> Result<ZoomLadder, AggregationError> {
    all_ladders()
        .into_iter()
        .find(|l| l.id() == id)
        .ok_or_else(|| AggregationError::UnknownLadder(id.to_string()))
}
