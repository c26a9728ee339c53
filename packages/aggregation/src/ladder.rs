//! Zoom ladders: the step function from zoom level to aggregation plan.
//!
//! A ladder is a list of contiguous brackets, each ending at an inclusive
//! `up_to` zoom. Aggregating brackets come first with cell sizes or
//! distances that never grow as zoom increases; the trailing raw brackets
//! start at the ladder's "individual" zoom.

use canopy_map_aggregation_models::AggregationPlan;
use serde::{Deserialize, Serialize};

use crate::AggregationError;

/// One step of a [`ZoomLadder`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBracket {
    /// Last zoom level (inclusive) covered by this bracket.
    pub up_to: u8,
    /// Plan used for every zoom in the bracket.
    pub plan: AggregationPlan,
}

/// A validated zoom-to-plan step function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomLadder {
    id: String,
    name: String,
    description: Option<String>,
    min_zoom: u8,
    max_zoom: u8,
    brackets: Vec<ZoomBracket>,
}

#[derive(Debug, Deserialize)]
struct LadderToml {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    min_zoom: u8,
    max_zoom: u8,
    brackets: Vec<ZoomBracket>,
}

impl ZoomLadder {
    /// Builds a ladder, checking that the brackets cover
    /// `min_zoom..=max_zoom` without gaps and that plan magnitudes never
    /// grow with zoom.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError::InvalidLadder`] describing the first
    /// violated rule.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        min_zoom: u8,
        max_zoom: u8,
        brackets: Vec<ZoomBracket>,
    ) -> Result<Self, AggregationError> {
        let id = id.into();
        let invalid = |message: String| AggregationError::InvalidLadder {
            message: format!("{id}: {message}"),
        };

        if min_zoom > max_zoom {
            return Err(invalid(format!(
                "min_zoom {min_zoom} is above max_zoom {max_zoom}"
            )));
        }
        let Some(last) = brackets.last() else {
            return Err(invalid("ladder has no brackets".to_string()));
        };
        if last.up_to != max_zoom {
            return Err(invalid(format!(
                "last bracket ends at {} but max_zoom is {max_zoom}",
                last.up_to
            )));
        }

        let mut previous_up_to: Option<u8> = None;
        let mut previous_magnitude: Option<f64> = None;
        let mut seen_raw = false;

        for bracket in &brackets {
            if bracket.up_to < min_zoom {
                return Err(invalid(format!(
                    "bracket ending at {} lies below min_zoom {min_zoom}",
                    bracket.up_to
                )));
            }
            if previous_up_to.is_some_and(|prev| bracket.up_to <= prev) {
                return Err(invalid(format!(
                    "bracket ending at {} does not follow the previous one",
                    bracket.up_to
                )));
            }
            previous_up_to = Some(bracket.up_to);

            validate_plan(&bracket.plan).map_err(|e| invalid(e.to_string()))?;

            match bracket.plan.magnitude() {
                None => seen_raw = true,
                Some(_) if seen_raw => {
                    return Err(invalid(format!(
                        "aggregating bracket ending at {} follows a raw bracket",
                        bracket.up_to
                    )));
                }
                Some(magnitude) => {
                    if previous_magnitude.is_some_and(|prev| magnitude > prev) {
                        return Err(invalid(format!(
                            "magnitude {magnitude} at bracket ending {} grows with zoom",
                            bracket.up_to
                        )));
                    }
                    previous_magnitude = Some(magnitude);
                }
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            description: None,
            min_zoom,
            max_zoom,
            brackets,
        })
    }

    /// Unique identifier (e.g., `"grid"`).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional longer description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Lowest supported zoom.
    #[must_use]
    pub const fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    /// Highest supported zoom.
    #[must_use]
    pub const fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// The brackets in zoom order.
    #[must_use]
    pub fn brackets(&self) -> &[ZoomBracket] {
        &self.brackets
    }

    /// Returns the plan for `zoom`.
    ///
    /// Zooms outside the supported range are clamped to it, so every
    /// `u8` resolves to exactly one plan.
    #[must_use]
    pub fn select_plan(&self, zoom: u8) -> AggregationPlan {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.brackets
            .iter()
            .find(|b| zoom <= b.up_to)
            .or_else(|| self.brackets.last())
            .map_or(AggregationPlan::Raw { limit: 0 }, |b| b.plan)
    }

    /// First zoom at which individual trees are requested, if any.
    #[must_use]
    pub fn individual_zoom(&self) -> Option<u8> {
        let mut start = self.min_zoom;
        for bracket in &self.brackets {
            if bracket.plan.is_raw() {
                return Some(start);
            }
            start = bracket.up_to.saturating_add(1);
        }
        None
    }
}

/// Checks that a plan's parameters are usable.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidPlan`] for non-positive or
/// non-finite sizes and zero limits.
pub fn validate_plan(plan: &AggregationPlan) -> Result<(), AggregationError> {
    match *plan {
        AggregationPlan::Raw { limit: 0 } => Err(AggregationError::InvalidPlan {
            message: "raw limit must be positive".to_string(),
        }),
        AggregationPlan::GridBin { cell_size } if !(cell_size.is_finite() && cell_size > 0.0) => {
            Err(AggregationError::InvalidPlan {
                message: format!("cell size {cell_size} must be finite and positive"),
            })
        }
        AggregationPlan::DensityCluster { distance, .. }
            if !(distance.is_finite() && distance > 0.0) =>
        {
            Err(AggregationError::InvalidPlan {
                message: format!("distance {distance} must be finite and positive"),
            })
        }
        AggregationPlan::DensityCluster { min_points: 0, .. } => {
            Err(AggregationError::InvalidPlan {
                message: "min_points must be at least 1".to_string(),
            })
        }
        AggregationPlan::DensityCluster {
            target_size: Some(0),
            ..
        } => Err(AggregationError::InvalidPlan {
            message: "target_size must be at least 1".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Parses and validates a ladder TOML document.
///
/// # Errors
///
/// Returns [`AggregationError::Parse`] for malformed TOML and
/// [`AggregationError::InvalidLadder`] for ladders with gaps, overlaps or
/// growing magnitudes.
pub fn parse_ladder_toml(toml_str: &str) -> Result<ZoomLadder, AggregationError> {
    let raw: LadderToml = toml::de::from_str(toml_str)?;
    let mut ladder = ZoomLadder::new(raw.id, raw.name, raw.min_zoom, raw.max_zoom, raw.brackets)?;
    ladder.description = raw.description;
    Ok(ladder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(up_to: u8, cell_size: f64) -> ZoomBracket {
        ZoomBracket {
            up_to,
            plan: AggregationPlan::GridBin { cell_size },
        }
    }

    fn raw(up_to: u8) -> ZoomBracket {
        ZoomBracket {
            up_to,
            plan: AggregationPlan::Raw { limit: 1000 },
        }
    }

    #[test]
    fn selects_bracket_for_each_zoom() {
        let ladder = ZoomLadder::new(
            "t",
            "Test",
            0,
            20,
            vec![grid(10, 0.2), grid(14, 0.02), raw(20)],
        )
        .unwrap();

        assert_eq!(
            ladder.select_plan(0),
            AggregationPlan::GridBin { cell_size: 0.2 }
        );
        assert_eq!(
            ladder.select_plan(10),
            AggregationPlan::GridBin { cell_size: 0.2 }
        );
        assert_eq!(
            ladder.select_plan(11),
            AggregationPlan::GridBin { cell_size: 0.02 }
        );
        assert_eq!(ladder.select_plan(15), AggregationPlan::Raw { limit: 1000 });
        assert_eq!(ladder.individual_zoom(), Some(15));
    }

    #[test]
    fn out_of_range_zoom_is_clamped() {
        let ladder =
            ZoomLadder::new("t", "Test", 3, 20, vec![grid(10, 0.2), raw(20)]).unwrap();
        assert_eq!(ladder.select_plan(0), ladder.select_plan(3));
        assert_eq!(ladder.select_plan(255), ladder.select_plan(20));
    }

    #[test]
    fn rejects_gap_at_the_end() {
        let result = ZoomLadder::new("t", "Test", 0, 22, vec![grid(10, 0.2), raw(20)]);
        assert!(matches!(result, Err(AggregationError::InvalidLadder { .. })));
    }

    #[test]
    fn rejects_overlapping_brackets() {
        let result = ZoomLadder::new("t", "Test", 0, 20, vec![grid(10, 0.2), grid(10, 0.1), raw(20)]);
        assert!(matches!(result, Err(AggregationError::InvalidLadder { .. })));
    }

    #[test]
    fn rejects_growing_magnitude() {
        let result = ZoomLadder::new("t", "Test", 0, 20, vec![grid(10, 0.02), grid(14, 0.2), raw(20)]);
        assert!(matches!(result, Err(AggregationError::InvalidLadder { .. })));
    }

    #[test]
    fn rejects_aggregation_after_raw() {
        let result = ZoomLadder::new("t", "Test", 0, 20, vec![raw(10), grid(20, 0.2)]);
        assert!(matches!(result, Err(AggregationError::InvalidLadder { .. })));
    }

    #[test]
    fn ladder_without_raw_has_no_individual_zoom() {
        let ladder = ZoomLadder::new("t", "Test", 0, 20, vec![grid(10, 0.2), grid(20, 0.01)]).unwrap();
        assert_eq!(ladder.individual_zoom(), None);
    }

    #[test]
    fn validates_plans() {
        assert!(validate_plan(&AggregationPlan::Raw { limit: 0 }).is_err());
        assert!(validate_plan(&AggregationPlan::GridBin { cell_size: -1.0 }).is_err());
        assert!(
            validate_plan(&AggregationPlan::DensityCluster {
                distance: 0.01,
                min_points: 0,
                target_size: None
            })
            .is_err()
        );
        assert!(
            validate_plan(&AggregationPlan::DensityCluster {
                distance: 0.01,
                min_points: 2,
                target_size: Some(0)
            })
            .is_err()
        );
        assert!(validate_plan(&AggregationPlan::GridBin { cell_size: 0.01 }).is_ok());
    }
}
