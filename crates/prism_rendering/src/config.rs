//! # Render Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [instancing]
//! growth = "geometric"
//! degenerate_normals = "skip"
//! initial_capacity = 64
//!
//! [shadow]
//! light_distance = 100.0
//! ortho_width = 50.0
//! ortho_height = 50.0
//! near_plane = 0.01
//! far_plane = 200.0
//!
//! [debug]
//! normals = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How an instance buffer grows when it is too small.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPolicy {
    /// Recreate at exactly the required size.
    #[default]
    Exact,
    /// Recreate at the next doubling of the current size.
    Geometric,
}

/// What to do with an instance whose normal matrix cannot be inverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Substitute 1 for the determinant and draw the instance.
    #[default]
    Fallback,
    /// Leave the instance out of the packed set.
    Skip,
}

/// `[instancing]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancingConfig {
    /// Instance buffer growth.
    pub growth: GrowthPolicy,
    /// Handling of near-singular transforms.
    pub degenerate_normals: DegeneratePolicy,
    /// Instance capacity allocated when a mesh is created.
    pub initial_capacity: u32,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            growth: GrowthPolicy::Exact,
            degenerate_normals: DegeneratePolicy::Fallback,
            initial_capacity: 0,
        }
    }
}

/// `[shadow]` section: the light's orthographic volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Distance from the focus point back to the light.
    pub light_distance: f32,
    /// Width of the orthographic volume.
    pub ortho_width: f32,
    /// Height of the orthographic volume.
    pub ortho_height: f32,
    /// Near clip distance.
    pub near_plane: f32,
    /// Far clip distance.
    pub far_plane: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            light_distance: 100.0,
            ortho_width: 50.0,
            ortho_height: 50.0,
            near_plane: 0.01,
            far_plane: 200.0,
        }
    }
}

/// `[debug]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Draw the normal-visualisation overlay after the main pass.
    pub normals: bool,
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Instance buffer behaviour.
    pub instancing: InstancingConfig,
    /// Shadow volume.
    pub shadow: ShadowConfig,
    /// Debug overlays.
    pub debug: DebugConfig,
}

impl RenderConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shadow = &self.shadow;
        let finite = [
            shadow.light_distance,
            shadow.ortho_width,
            shadow.ortho_height,
            shadow.near_plane,
            shadow.far_plane,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(ConfigError::Invalid(
                "shadow parameters must be finite".to_owned(),
            ));
        }
        if shadow.ortho_width <= 0.0 || shadow.ortho_height <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "shadow ortho size must be positive, got {}x{}",
                shadow.ortho_width, shadow.ortho_height
            )));
        }
        if shadow.far_plane <= shadow.near_plane {
            return Err(ConfigError::Invalid(format!(
                "shadow far_plane ({}) must exceed near_plane ({})",
                shadow.far_plane, shadow.near_plane
            )));
        }
        Ok(())
    }
}
