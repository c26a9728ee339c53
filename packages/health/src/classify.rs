//! Vegetation-index to health-tier classification.

use canopy_map_health_models::{HealthTier, RepresentativeReading, ThresholdProfile};
use serde::{Deserialize, Serialize};

/// Classifies a vegetation index under `profile`.
///
/// Comparisons are strict, so a value equal to a threshold lands in the
/// higher tier. `NaN` is treated like a missing reading (`0`).
#[must_use]
pub fn classify(index: f64, profile: &ThresholdProfile) -> HealthTier {
    let index = if index.is_nan() { 0.0 } else { index };

    if index < profile.very_bad() {
        HealthTier::VeryBad
    } else if index < profile.bad() {
        HealthTier::Bad
    } else if index < profile.good() {
        HealthTier::Fair
    } else {
        HealthTier::Good
    }
}

/// Classifies a representative reading, counting a missing reading as `0`.
#[must_use]
pub fn classify_reading(reading: &RepresentativeReading, profile: &ThresholdProfile) -> HealthTier {
    classify(reading.index_or_zero(), profile)
}

/// Selects the trees that need a visit: those strictly below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionCutoff {
    /// First tier that does *not* need attention.
    pub below: HealthTier,
}

impl AttentionCutoff {
    /// Returns `true` if a tree in `tier` needs attention.
    #[must_use]
    pub fn needs_attention(&self, tier: HealthTier) -> bool {
        tier < self.below
    }
}

impl Default for AttentionCutoff {
    fn default() -> Self {
        Self {
            below: HealthTier::Fair,
        }
    }
}
