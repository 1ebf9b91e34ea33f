//! Property tweens driven by the fixed simulation step.
//!
//! A tween owned by the scene advances once per simulation step, as long as
//! its target node passes the pause filter, and is dropped when it finishes
//! or its target disappears.

use kairos_core::Lerp;

use crate::NodeHandle;
use crate::scene::Scene;

/// Something that animates scene state over time.
pub trait Tween {
    /// Node the tween writes to.
    fn target(&self) -> NodeHandle;

    /// Advances by `dt` seconds. Returns `true` once finished.
    fn update(&mut self, scene: &mut Scene, dt: f32) -> bool;
}

/// Function that writes an interpolated value into a node.
pub type PropertySetter<T> = fn(&mut Scene, NodeHandle, T);

/// Interpolates a node property from `start` to `end` over `duration` seconds.
pub struct PropertyTween<T: Lerp> {
    target: NodeHandle,
    setter: PropertySetter<T>,
    start: T,
    end: T,
    duration: f32,
    elapsed: f32,
}

impl<T: Lerp> PropertyTween<T> {
    #[must_use]
    pub fn new(target: NodeHandle, setter: PropertySetter<T>, start: T, end: T, duration: f32) -> Self {
        Self {
            target,
            setter,
            start,
            end,
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Normalized progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }
}

impl<T: Lerp> Tween for PropertyTween<T> {
    fn target(&self) -> NodeHandle {
        self.target
    }

    fn update(&mut self, scene: &mut Scene, dt: f32) -> bool {
        self.elapsed += dt;
        let t = self.progress();
        (self.setter)(scene, self.target, self.start.lerp_to(self.end, t));
        t >= 1.0
    }
}

/// Setter for [`PropertyTween`] that moves a node in local space.
pub fn set_position(scene: &mut Scene, node: NodeHandle, position: glam::Vec3) {
    if let Err(err) = scene.set_position(node, position) {
        log::debug!("position tween target vanished: {err}");
    }
}

/// Setter for [`PropertyTween`] that rotates a node in local space.
pub fn set_rotation(scene: &mut Scene, node: NodeHandle, rotation: glam::Quat) {
    if let Err(err) = scene.set_rotation(node, rotation) {
        log::debug!("rotation tween target vanished: {err}");
    }
}

/// Setter for [`PropertyTween`] that scales a node in local space.
pub fn set_scale(scene: &mut Scene, node: NodeHandle, scale: glam::Vec3) {
    if let Err(err) = scene.set_scale(node, scale) {
        log::debug!("scale tween target vanished: {err}");
    }
}
