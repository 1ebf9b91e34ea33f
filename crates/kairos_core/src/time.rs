//! Wall-clock sources and the frame timer.
//!
//! The scheduler never reads `Instant::now()` directly; it asks a [`Clock`].
//! [`SystemClock`] is the real monotonic clock, [`ManualClock`] is advanced by
//! hand so that fixed-step behaviour can be tested deterministically.

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// A monotonic time source.
pub trait Clock {
    /// Time elapsed since the clock was created. Never decreases.
    fn now(&self) -> Duration;
}

/// Monotonic clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance_secs(&mut self, seconds: f64) {
        self.now += Duration::from_secs_f64(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }
}

/// Timer for tracking frame timing and elapsed time.
#[derive(Debug, Clone)]
pub struct Timer<C: Clock = SystemClock> {
    clock: C,
    last_update: Duration,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for Timer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer<SystemClock> {
    /// Creates a new timer starting from now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl<C: Clock> Timer<C> {
    /// Creates a timer reading from `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Samples the clock, updating `delta`, `elapsed` and `frame_count`.
    pub fn tick(&mut self) -> Duration {
        let now = self.clock.now();
        self.delta = now.saturating_sub(self.last_update);
        self.elapsed += self.delta;
        self.last_update = now;
        self.frame_count += 1;
        self.delta
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[inline]
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_reports_exact_deltas() {
        let mut timer = Timer::with_clock(ManualClock::new());
        timer.clock_mut().advance(Duration::from_millis(16));
        assert_eq!(timer.tick(), Duration::from_millis(16));

        timer.clock_mut().advance(Duration::from_millis(4));
        timer.tick();
        assert_eq!(timer.delta, Duration::from_millis(4));
        assert_eq!(timer.elapsed, Duration::from_millis(20));
        assert_eq!(timer.frame_count, 2);
    }

    #[test]
    fn tick_without_advance_is_zero() {
        let mut timer = Timer::with_clock(ManualClock::new());
        assert_eq!(timer.tick(), Duration::ZERO);
    }
}
