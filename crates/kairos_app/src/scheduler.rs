//! Fixed-Step Scheduler
//!
//! Accumulator arithmetic of the simulation loop, free of any engine state:
//!
//! ```text
//! accumulate(min(delta, max_frame_delta))
//! while try_consume_step() { simulate(dt) }
//! render(alpha())
//! ```
//!
//! Two bounds keep a slow frame from starving the loop: the per-tick delta
//! clamp, and a cap on steps per tick. When the cap is hit, the whole-step
//! remainder of the accumulator is discarded, so `alpha()` stays in `[0, 1)`.

use std::time::Duration;

use crate::settings::SchedulerSettings;

/// Largest `f32` below one.
const ALPHA_MAX: f32 = 1.0 - f32::EPSILON / 2.0;

#[derive(Debug, Clone)]
pub struct FixedStepScheduler {
    settings: SchedulerSettings,
    step_cap: u32,
    accumulator: f64,
    steps_this_tick: u32,
    total_steps: u64,
    dropped_time: f64,
}

impl FixedStepScheduler {
    #[must_use]
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            step_cap: settings.step_cap(),
            settings,
            accumulator: 0.0,
            steps_this_tick: 0,
            total_steps: 0,
            dropped_time: 0.0,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// `dt` in seconds.
    #[inline]
    #[must_use]
    pub fn fixed_step(&self) -> f64 {
        self.settings.fixed_step
    }

    #[inline]
    #[must_use]
    pub fn fixed_step_f32(&self) -> f32 {
        self.settings.fixed_step as f32
    }

    #[inline]
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    #[inline]
    #[must_use]
    pub fn steps_this_tick(&self) -> u32 {
        self.steps_this_tick
    }

    #[inline]
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Wall-clock time discarded by the delta clamp and the step cap.
    #[inline]
    #[must_use]
    pub fn dropped_time(&self) -> f64 {
        self.dropped_time
    }

    /// Starts a tick: adds `delta`, clamped to `max_frame_delta`, to the
    /// accumulator. Returns whether the clamp engaged.
    pub fn accumulate(&mut self, delta: Duration) -> bool {
        let delta = delta.as_secs_f64();
        let clamped = delta > self.settings.max_frame_delta;
        let accepted = delta.min(self.settings.max_frame_delta);
        if clamped {
            self.dropped_time += delta - accepted;
        }
        self.accumulator += accepted;
        self.steps_this_tick = 0;
        clamped
    }

    /// Consumes one `dt` from the accumulator if a whole step is available
    /// and the per-tick cap allows it.
    pub fn try_consume_step(&mut self) -> bool {
        let dt = self.settings.fixed_step;
        if self.accumulator < dt {
            return false;
        }
        if self.steps_this_tick >= self.step_cap {
            let excess = self.accumulator - self.accumulator % dt;
            self.accumulator -= excess;
            self.dropped_time += excess;
            log::debug!("Step cap of {} reached, dropping {:.4}s of simulation", self.step_cap, excess);
            return false;
        }
        self.accumulator -= dt;
        self.steps_this_tick += 1;
        self.total_steps += 1;
        true
    }

    /// Interpolation factor between the previous and current simulation
    /// states, in `[0, 1)`.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        ((self.accumulator / self.settings.fixed_step) as f32).clamp(0.0, ALPHA_MAX)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.steps_this_tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_tick(scheduler: &mut FixedStepScheduler, seconds: f64) -> u32 {
        scheduler.accumulate(Duration::from_secs_f64(seconds));
        let mut steps = 0;
        while scheduler.try_consume_step() {
            steps += 1;
        }
        steps
    }

    #[test]
    fn exact_step_runs_before_alpha() {
        let mut scheduler = FixedStepScheduler::new(SchedulerSettings { fixed_step: 0.5, ..Default::default() });
        assert_eq!(run_tick(&mut scheduler, 0.5), 1);
        assert_eq!(scheduler.alpha(), 0.0);
    }

    #[test]
    fn remainder_becomes_alpha() {
        let mut scheduler = FixedStepScheduler::new(SchedulerSettings { fixed_step: 0.25, ..Default::default() });
        assert_eq!(run_tick(&mut scheduler, 0.125), 0);
        assert!((scheduler.alpha() - 0.5).abs() < 1e-6);
        assert_eq!(run_tick(&mut scheduler, 0.125), 1);
        assert!(scheduler.alpha() < 1e-6);
    }

    #[test]
    fn cap_drops_whole_steps_only() {
        let settings = SchedulerSettings {
            fixed_step: 0.1,
            max_frame_delta: 1.0,
            max_steps_per_tick: Some(2),
        };
        let mut scheduler = FixedStepScheduler::new(settings);
        assert_eq!(run_tick(&mut scheduler, 0.55), 2);
        assert!(scheduler.accumulator() < 0.1);
        assert!((0.0..1.0).contains(&scheduler.alpha()));
        assert!((scheduler.alpha() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn clamp_reports_and_bounds_steps() {
        let mut scheduler = FixedStepScheduler::new(SchedulerSettings::default());
        assert!(scheduler.accumulate(Duration::from_secs(1)));
        let mut steps = 0;
        while scheduler.try_consume_step() {
            steps += 1;
        }
        assert!(steps <= 15);
        assert!(scheduler.dropped_time() >= 0.75 - 1e-9);
    }
}
