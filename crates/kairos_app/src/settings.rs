//! Engine Settings
//!
//! ```rust,ignore
//! use kairos_app::{EngineSettings, SchedulerSettings};
//!
//! let settings = EngineSettings {
//!     scheduler: SchedulerSettings { fixed_step: 1.0 / 120.0, ..Default::default() },
//!     ..Default::default()
//! };
//! ```

use kairos_core::{KairosError, Result};
use kairos_render::RendererSettings;

/// Fixed-step loop configuration. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Simulation step `dt`.
    pub fixed_step: f64,
    /// Longest wall-clock delta a single tick may accumulate. Anything above
    /// it is dropped.
    pub max_frame_delta: f64,
    /// Cap on steps run by one tick. `None` derives it from
    /// `max_frame_delta / fixed_step`, rounded up.
    pub max_steps_per_tick: Option<u32>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            max_frame_delta: 0.25,
            max_steps_per_tick: None,
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            return Err(KairosError::InvalidConfig(format!(
                "fixed_step must be positive, got {}",
                self.fixed_step
            )));
        }
        if !(self.max_frame_delta.is_finite() && self.max_frame_delta >= self.fixed_step) {
            return Err(KairosError::InvalidConfig(format!(
                "max_frame_delta ({}) must be at least fixed_step ({})",
                self.max_frame_delta, self.fixed_step
            )));
        }
        if self.max_steps_per_tick == Some(0) {
            return Err(KairosError::InvalidConfig("max_steps_per_tick must be at least 1".into()));
        }
        Ok(())
    }

    /// Effective per-tick step cap.
    #[must_use]
    pub fn step_cap(&self) -> u32 {
        self.max_steps_per_tick
            .unwrap_or_else(|| (self.max_frame_delta / self.fixed_step).ceil().max(1.0) as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSettings {
    pub scheduler: SchedulerSettings,
    pub renderer: RendererSettings,
    /// Start with the pause flag set.
    pub start_paused: bool,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.renderer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineSettings::default().validate().is_ok());
        assert_eq!(SchedulerSettings::default().step_cap(), 15);
    }

    #[test]
    fn rejects_degenerate_steps() {
        let zero = SchedulerSettings { fixed_step: 0.0, ..Default::default() };
        assert!(zero.validate().is_err());

        let short_clamp = SchedulerSettings { max_frame_delta: 0.001, ..Default::default() };
        assert!(short_clamp.validate().is_err());

        let no_steps = SchedulerSettings { max_steps_per_tick: Some(0), ..Default::default() };
        assert!(no_steps.validate().is_err());
    }
}
