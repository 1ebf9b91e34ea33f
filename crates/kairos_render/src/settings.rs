//! Renderer Settings
//!
//! Plain configuration structs consumed once, when the [`Renderer`] is built.
//! Every field has a sensible default so struct-update syntax works:
//!
//! ```rust,ignore
//! use kairos_render::{RendererSettings, SceneLimits};
//!
//! let settings = RendererSettings {
//!     frames_in_flight: 3,
//!     limits: SceneLimits { max_lights: 32, ..Default::default() },
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```
//!
//! [`Renderer`]: crate::Renderer

use glam::Vec4;
use kairos_core::{KairosError, Result};

/// Upper bound on frames in flight; per-slot arrays are sized for it inline.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Capacities of the scene pass's fixed-size tables.
///
/// Exceeding any of them while draining scene mutations is a hard error,
/// never a silent truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLimits {
    pub max_models: usize,
    pub max_materials: usize,
    /// Also the length of the sampled image array bound by the scene pass.
    pub max_images: usize,
    pub max_lights: usize,
}

impl Default for SceneLimits {
    fn default() -> Self {
        Self {
            max_models: 1024,
            max_materials: 256,
            max_images: 64,
            max_lights: 16,
        }
    }
}

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererSettings {
    /// Number of frames the CPU may record ahead of the GPU (`F`).
    pub frames_in_flight: usize,
    /// Fallback clear colour when no environment node is active.
    pub clear_color: Vec4,
    /// Exposure applied by the tone mapping pass.
    pub exposure: f32,
    pub limits: SceneLimits,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            exposure: 1.0,
            limits: SceneLimits::default(),
        }
    }
}

impl RendererSettings {
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(KairosError::InvalidConfig(format!(
                "frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        if !(self.exposure.is_finite() && self.exposure > 0.0) {
            return Err(KairosError::InvalidConfig(format!(
                "exposure must be a positive number, got {}",
                self.exposure
            )));
        }
        let limits = &self.limits;
        for (name, value) in [
            ("max_models", limits.max_models),
            ("max_materials", limits.max_materials),
            ("max_images", limits.max_images),
            ("max_lights", limits.max_lights),
        ] {
            if value == 0 || u32::try_from(value).is_err() {
                return Err(KairosError::InvalidConfig(format!("{name} must be in 1..=u32::MAX, got {value}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RendererSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero_frames = RendererSettings { frames_in_flight: 0, ..Default::default() };
        assert!(zero_frames.validate().is_err());

        let too_many = RendererSettings { frames_in_flight: MAX_FRAMES_IN_FLIGHT + 1, ..Default::default() };
        assert!(too_many.validate().is_err());

        let no_lights = RendererSettings {
            limits: SceneLimits { max_lights: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(no_lights.validate(), Err(KairosError::InvalidConfig(_))));
    }
}
