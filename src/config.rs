//! Render settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::spatial::DEFAULT_PARALLEL_THRESHOLD;
use crate::util::{Error, Result};

/// Seed hashed with path index and iteration for light paths.
pub const DEFAULT_BASE_SEED_LIGHT: u32 = 0xC030114;
/// Seed hashed with pixel index and iteration for camera rays.
pub const DEFAULT_BASE_SEED_CAMERA: u32 = 0x13C0FEFE;

/// Parameters of a photon mapping render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // Iterations
    pub num_iterations: u32,
    /// Maximum number of vertices per light path, emitter included.
    pub max_depth: usize,
    /// Light paths per iteration; `None` traces one per pixel.
    pub num_light_paths: Option<usize>,

    // Gather
    /// Nearest photons kept per gather; `None` uses every photon within the radius.
    pub max_photons: Option<usize>,
    /// Gather radius as a fraction of the scene radius.
    pub radius_scale: f32,
    /// Pixel footprint angle in degrees, bounds the radius for nearby hits.
    pub footprint_angle_deg: f32,

    // Seeds
    pub base_seed_light: u32,
    pub base_seed_camera: u32,

    // Index build
    pub build_parallel_threshold: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            num_iterations: 2,
            max_depth: 10,
            num_light_paths: None,
            max_photons: None,
            radius_scale: 1e-3,
            footprint_angle_deg: 0.1,
            base_seed_light: DEFAULT_BASE_SEED_LIGHT,
            base_seed_camera: DEFAULT_BASE_SEED_CAMERA,
            build_parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl RenderSettings {
    /// Parse and validate settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.num_iterations == 0 {
            return Err(Error::config("num_iterations must be positive"));
        }
        if self.max_depth == 0 {
            return Err(Error::ZeroCapacity("light path depth"));
        }
        // Depth is stored per vertex as u8
        if self.max_depth > u8::MAX as usize {
            return Err(Error::config(format!("max_depth {} exceeds {}", self.max_depth, u8::MAX)));
        }
        if self.num_light_paths == Some(0) {
            return Err(Error::ZeroLightPaths);
        }
        if self.max_photons == Some(0) {
            return Err(Error::ZeroCapacity("photons per gather"));
        }
        if !(self.radius_scale.is_finite() && self.radius_scale > 0.0) {
            return Err(Error::InvalidRadius(self.radius_scale));
        }
        if !(self.footprint_angle_deg > 0.0 && self.footprint_angle_deg < 90.0) {
            return Err(Error::config(format!(
                "footprint_angle_deg must be in (0, 90), got {}",
                self.footprint_angle_deg
            )));
        }
        if self.build_parallel_threshold == 0 {
            return Err(Error::ZeroCapacity("parallel build threshold"));
        }
        Ok(())
    }
}
