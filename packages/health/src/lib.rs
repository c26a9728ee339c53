#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Health classification for the canopy map.
//!
//! Turns a tree's observation history into a single representative
//! reading ([`resolve`]) and maps vegetation-index values to ordinal
//! [`HealthTier`]s under an explicit [`ThresholdProfile`] ([`classify`]).
//! Threshold profiles are configuration data loaded from the embedded
//! [`profiles`] registry; no profile is treated as canonical.

pub mod classify;
pub mod profiles;
pub mod resolve;

pub use canopy_map_health_models::{HealthTier, ThresholdProfile};
pub use classify::{AttentionCutoff, classify, classify_reading};
pub use resolve::resolve;

/// Errors that can occur while loading health configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No profile with the requested id exists.
    #[error("Unknown threshold profile: {0}")]
    UnknownProfile(String),

    /// A profile TOML document could not be parsed.
    #[error("Profile parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A profile parsed but violates its invariants.
    #[error("Invalid profile: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}
