//! Per-node behaviour callbacks.

use crate::NodeHandle;
use crate::scene::Scene;

/// Access handed to a script while one of its callbacks runs.
///
/// The script is temporarily taken out of its node, so the whole scene
/// (including the node itself) can be borrowed mutably.
pub struct ScriptContext<'a> {
    pub scene: &'a mut Scene,
    pub node: NodeHandle,
}

/// Behaviour attached to a node.
///
/// Callbacks only run for nodes that are in the scene and pass the pause
/// filter.
pub trait NodeScript {
    /// Called once, at the start of the first simulation step after the node
    /// entered the scene.
    fn on_ready(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// Called once per fixed simulation step with the fixed `dt`.
    fn on_physics_process(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) {}

    /// Called once per displayed frame with the interpolation factor.
    fn on_process(&mut self, _ctx: &mut ScriptContext<'_>, _alpha: f32) {}
}
