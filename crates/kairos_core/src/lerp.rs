//! Interpolation between fixed simulation steps.
//!
//! Simulation runs at a fixed rate while rendering runs at the display rate.
//! Objects keep the state of the two most recent steps in an
//! [`Interpolated`] and render `lerp(previous, current, alpha)`.

use glam::{Quat, Vec2, Vec3, Vec4};

/// Linear (or spherical, for rotations) blend between two values.
pub trait Lerp: Copy {
    /// Returns `self` at `t == 0` and `other` at `t == 1`.
    #[must_use]
    fn lerp_to(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp_to(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec2 {
    #[inline]
    fn lerp_to(self, other: Self, t: f32) -> Self {
        self.lerp(other, t)
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp_to(self, other: Self, t: f32) -> Self {
        self.lerp(other, t)
    }
}

impl Lerp for Vec4 {
    #[inline]
    fn lerp_to(self, other: Self, t: f32) -> Self {
        self.lerp(other, t)
    }
}

impl Lerp for Quat {
    #[inline]
    fn lerp_to(self, other: Self, t: f32) -> Self {
        self.slerp(other, t)
    }
}

/// Double-buffered simulation state.
///
/// Call [`push`](Self::push) once per fixed step and
/// [`interpolate`](Self::interpolate) from the render-facing update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolated<T: Lerp> {
    previous: T,
    current: T,
}

impl<T: Lerp> Interpolated<T> {
    /// Both snapshots start at `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self { previous: value, current: value }
    }

    /// Records the state produced by a new simulation step.
    pub fn push(&mut self, value: T) {
        self.previous = self.current;
        self.current = value;
    }

    /// Teleports: no blending from the old state.
    pub fn snap(&mut self, value: T) {
        self.previous = value;
        self.current = value;
    }

    #[inline]
    #[must_use]
    pub fn previous(&self) -> T {
        self.previous
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> T {
        self.current
    }

    /// Render-facing value for interpolation factor `alpha` in `[0, 1)`.
    #[must_use]
    pub fn interpolate(&self, alpha: f32) -> T {
        self.previous.lerp_to(self.current, alpha)
    }
}

impl<T: Lerp + Default> Default for Interpolated<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_steps() {
        let mut state = Interpolated::new(Vec3::ZERO);
        state.push(Vec3::new(2.0, 0.0, 0.0));
        let mid = state.interpolate(0.25);
        assert!((mid.x - 0.5).abs() < 1e-6);
        assert_eq!(state.previous(), Vec3::ZERO);
    }

    #[test]
    fn snap_discards_history() {
        let mut state = Interpolated::new(1.0_f32);
        state.push(3.0);
        state.snap(10.0);
        assert!((state.interpolate(0.5) - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn quaternion_uses_slerp() {
        let mut rot = Interpolated::new(Quat::IDENTITY);
        rot.push(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let half = rot.interpolate(0.5);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(half.angle_between(expected) < 1e-4);
    }
}
