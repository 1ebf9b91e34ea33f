//! Simulation collaborator.
//!
//! Physics or any other fixed-rate system plugs in here. It runs once per
//! fixed step, before per-node physics callbacks read the scene.

use kairos_core::Result;
use kairos_scene::Scene;

pub trait Simulation {
    fn advance(&mut self, scene: &mut Scene, dt: f32) -> Result<()>;
}

/// A simulation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSimulation;

impl Simulation for NoSimulation {
    fn advance(&mut self, _scene: &mut Scene, _dt: f32) -> Result<()> {
        Ok(())
    }
}

impl<F> Simulation for F
where
    F: FnMut(&mut Scene, f32) -> Result<()>,
{
    fn advance(&mut self, scene: &mut Scene, dt: f32) -> Result<()> {
        self(scene, dt)
    }
}
