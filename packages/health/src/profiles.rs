//! Compile-time registry of threshold profiles.
//!
//! Each profile is defined in a TOML file under `profiles/`. Several
//! profiles have been used across deployments and none of them is the
//! canonical one, so callers always pick a profile by id.

use canopy_map_health_models::ThresholdProfile;
use serde::Deserialize;

use crate::ConfigError;

/// A named threshold profile loaded from TOML.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedProfile {
    /// Unique identifier (e.g., `"ndvi_sparse"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// The validated thresholds.
    pub thresholds: ThresholdProfile,
}

#[derive(Debug, Deserialize)]
struct ProfileToml {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    very_bad: f64,
    bad: f64,
    good: f64,
}

/// Parses and validates a profile TOML document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] if the thresholds are not strictly increasing.
pub fn parse_profile_toml(toml_str: &str) -> Result<NamedProfile, ConfigError> {
    let raw: ProfileToml = toml::de::from_str(toml_str)?;
    if raw.id.is_empty() {
        return Err(ConfigError::Invalid {
            message: "profile id must not be empty".to_string(),
        });
    }
    let thresholds =
        ThresholdProfile::new(raw.very_bad, raw.bad, raw.good).map_err(|e| ConfigError::Invalid {
            message: format!("{}: {e}", raw.id),
        })?;

    Ok(NamedProfile {
        id: raw.id,
        name: raw.name,
        description: raw.description,
        thresholds,
    })
}

// ── Compile-time embedded TOML files ────────────────────────────────

const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("ndvi_sparse", include_str!("../profiles/ndvi_sparse.toml")),
    ("ndvi_standard", include_str!("../profiles/ndvi_standard.toml")),
];

#[cfg(test)]
const EXPECTED_PROFILE_COUNT: usize = 2;

/// Returns all embedded threshold profiles.
///
/// # Panics
///
/// Panics if any embedded TOML is malformed (the files are compiled in,
/// so this is caught by the registry tests).
#[must_use]
pub fn all_profiles() -> Vec<NamedProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_profile_toml(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse threshold profile '{name}': {e}"))
        })
        .collect()
}

/// Looks up an embedded profile by id.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownProfile`] if no profile has that id.
pub fn profile(id: &str) -> Result<NamedProfile, ConfigError> {
    all_profiles()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ConfigError::UnknownProfile(id.to_string()))
}
