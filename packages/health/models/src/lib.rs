#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tree, observation and health tier types.
//!
//! This crate defines the data shared by every part of the canopy map:
//! trees with their vegetation-index history, the reading chosen to
//! represent a tree at query time, and the ordinal health tiers that
//! readings are classified into.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifier of a tree in the point store.
pub type TreeId = i64;

/// Ordinal health tier, from 1 (very bad) to 4 (good).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthTier {
    /// Tier 1: index below the profile's `very_bad` threshold
    VeryBad = 1,
    /// Tier 2: index below the profile's `bad` threshold
    Bad = 2,
    /// Tier 3: index below the profile's `good` threshold
    Fair = 3,
    /// Tier 4: everything else
    Good = 4,
}

impl HealthTier {
    /// Returns the numeric value of this tier.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a tier from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-4.
    pub const fn from_value(value: u8) -> Result<Self, InvalidTierError> {
        match value {
            1 => Ok(Self::VeryBad),
            2 => Ok(Self::Bad),
            3 => Ok(Self::Fair),
            4 => Ok(Self::Good),
            _ => Err(InvalidTierError { value }),
        }
    }

    /// Returns all variants, worst first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::VeryBad, Self::Bad, Self::Fair, Self::Good]
    }
}

/// Error returned when attempting to create a [`HealthTier`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTierError {
    /// The invalid tier value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidTierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid health tier {}: expected 1-4", self.value)
    }
}

impl std::error::Error for InvalidTierError {}

/// Threshold values separating the four health tiers.
///
/// Always satisfies `very_bad < bad < good` with finite values; the only
/// ways to obtain one are [`ThresholdProfile::new`] and deserialization,
/// which both validate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ThresholdValues", rename_all = "camelCase")]
pub struct ThresholdProfile {
    very_bad: f64,
    bad: f64,
    good: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdValues {
    #[serde(alias = "very_bad")]
    very_bad: f64,
    bad: f64,
    good: f64,
}

impl TryFrom<ThresholdValues> for ThresholdProfile {
    type Error = InvalidProfileError;

    fn try_from(values: ThresholdValues) -> Result<Self, Self::Error> {
        Self::new(values.very_bad, values.bad, values.good)
    }
}

impl ThresholdProfile {
    /// Creates a profile from its three thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidProfileError`] if any threshold is not finite or the
    /// thresholds are not strictly increasing.
    pub fn new(very_bad: f64, bad: f64, good: f64) -> Result<Self, InvalidProfileError> {
        if !(very_bad.is_finite() && bad.is_finite() && good.is_finite()) {
            return Err(InvalidProfileError {
                very_bad,
                bad,
                good,
            });
        }
        if !(very_bad < bad && bad < good) {
            return Err(InvalidProfileError {
                very_bad,
                bad,
                good,
            });
        }
        Ok(Self {
            very_bad,
            bad,
            good,
        })
    }

    /// Upper (exclusive) bound of [`HealthTier::VeryBad`].
    #[must_use]
    pub const fn very_bad(&self) -> f64 {
        self.very_bad
    }

    /// Upper (exclusive) bound of [`HealthTier::Bad`].
    #[must_use]
    pub const fn bad(&self) -> f64 {
        self.bad
    }

    /// Upper (exclusive) bound of [`HealthTier::Fair`].
    #[must_use]
    pub const fn good(&self) -> f64 {
        self.good
    }
}

/// Error returned for thresholds that are not finite and strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidProfileError {
    /// Provided `very_bad` threshold.
    pub very_bad: f64,
    /// Provided `bad` threshold.
    pub bad: f64,
    /// Provided `good` threshold.
    pub good: f64,
}

impl std::fmt::Display for InvalidProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid threshold profile ({}, {}, {}): expected finite very_bad < bad < good",
            self.very_bad, self.bad, self.good
        )
    }
}

impl std::error::Error for InvalidProfileError {}

/// A single vegetation-index measurement of one tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Vegetation index value (NDVI).
    pub index: f64,
    /// When the measurement was taken.
    pub timestamp: DateTime<Utc>,
}

/// A tree with its observation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    /// Store identifier.
    pub id: TreeId,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Species, if known.
    #[serde(default)]
    pub species: Option<String>,
    /// Display name, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Observation history in any order.
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// The observation chosen to represent a tree at query time.
///
/// Both fields are `None` when no observation qualified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentativeReading {
    /// Index of the chosen observation.
    pub index: Option<f64>,
    /// Timestamp of the chosen observation.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RepresentativeReading {
    /// A reading with no representative observation.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            index: None,
            timestamp: None,
        }
    }

    /// Returns `true` if an observation was chosen.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.index.is_some()
    }

    /// The index to classify: missing readings count as `0`.
    #[must_use]
    pub fn index_or_zero(&self) -> f64 {
        self.index.unwrap_or(0.0)
    }
}

impl From<&Observation> for RepresentativeReading {
    fn from(observation: &Observation) -> Self {
        Self {
            index: Some(observation.index),
            timestamp: Some(observation.timestamp),
        }
    }
}

/// How the representative observation of a tree is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// The observation with the most recent timestamp.
    Latest,
    /// The most recent observation whose calendar month (1-12) is in
    /// `months`.
    LatestInSeasonWindow {
        /// Accepted calendar months.
        months: BTreeSet<u32>,
    },
}

impl SelectionPolicy {
    /// June through August.
    #[must_use]
    pub fn summer() -> Self {
        Self::LatestInSeasonWindow {
            months: BTreeSet::from([6, 7, 8]),
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::Latest
    }
}
