//! Render Pass Contract
//!
//! A [`RenderPass`] is one unit of GPU work in the [`RenderChain`]. Its
//! resources are provisioned lazily, exactly once, in a fixed order driven
//! by the chain:
//!
//! 1. `create_backing_resources` (size-dependent images)
//! 2. `set_color_input` (wiring to the previous pass)
//! 3. `create_binding_layout`
//! 4. `create_or_update_bindings(create = true)` for every slot
//! 5. `create_pipeline_layout`
//! 6. `load_shader_programs`
//!
//! After that, a frame only runs `update` and `begin_pass`/`record`/
//! `end_pass`, plus `create_or_update_bindings(create = false)` for the slot
//! being recorded when the pass flagged it stale. Surface recreation only
//! repeats steps 1 and 2.
//!
//! [`RenderChain`]: crate::RenderChain

pub mod resource_set;

use std::any::Any;

use kairos_core::Result;
use kairos_scene::{NodeHandle, Scene, SceneMutation};

pub use resource_set::{ResourceSet, ResourceSetState};

use crate::command::{Command, CommandStream};
use crate::gpu::{Extent2d, GpuDevice, ResourceHandle};
use crate::slot::FrameSlot;

/// Read-only frame inputs handed to passes.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    /// Interpolation factor between the last two simulation states.
    pub alpha: f32,
    pub paused: bool,
    /// Simulated time in seconds.
    pub elapsed: f32,
    pub extent: Extent2d,
}

pub trait RenderPass {
    fn name(&self) -> &str;

    fn resource_set(&self) -> &ResourceSet;

    // === Size-dependent resources ===

    fn create_backing_resources(&mut self, gpu: &mut dyn GpuDevice, extent: Extent2d) -> Result<()>;

    fn cleanup_backing_resources(&mut self, gpu: &mut dyn GpuDevice);

    // === One-time provisioning ===

    fn create_binding_layout(&mut self, gpu: &mut dyn GpuDevice) -> Result<()>;

    /// Builds (`create`) or rebuilds the binding table of `slot`.
    fn create_or_update_bindings(&mut self, gpu: &mut dyn GpuDevice, slot: FrameSlot, create: bool) -> Result<()>;

    fn create_pipeline_layout(&mut self, gpu: &mut dyn GpuDevice) -> Result<()>;

    fn load_shader_programs(&mut self, gpu: &mut dyn GpuDevice) -> Result<()>;

    // === Scene mutations ===

    /// Applies one drained attach/detach entry to the tables of `slot`.
    fn apply_mutation(&mut self, _gpu: &mut dyn GpuDevice, _slot: FrameSlot, _entry: &SceneMutation) -> Result<()> {
        Ok(())
    }

    /// Runs once per drain of `slot`, after every entry has been applied.
    fn after_drain(
        &mut self,
        _gpu: &mut dyn GpuDevice,
        _slot: FrameSlot,
        _camera_request: Option<NodeHandle>,
        _frame: &FrameContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    // === Per frame ===

    /// Writes per-frame buffer data for `slot`. Runs before any pass of the
    /// frame begins.
    fn update(&mut self, _gpu: &mut dyn GpuDevice, _slot: FrameSlot, _frame: &FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    fn begin_pass(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()>;

    fn record(&mut self, stream: &mut CommandStream, slot: FrameSlot) -> Result<()>;

    /// Closes the pass. The last pass of the chain also blits its colour
    /// output into the presentable image.
    fn end_pass(&mut self, stream: &mut CommandStream, slot: FrameSlot, is_last: bool) -> Result<()> {
        stream.push(Command::EndPass);
        if is_last {
            let source = self.color_output(slot).ok_or_else(|| kairos_core::KairosError::FramePhase {
                slot: slot.index(),
                operation: "blit to the surface",
                phase: "the pass has no colour output",
            })?;
            stream.push(Command::BlitToSurface { source });
        }
        Ok(())
    }

    // === Chaining ===

    fn color_output(&self, slot: FrameSlot) -> Option<ResourceHandle>;

    /// Receives the previous pass's colour output for `slot`.
    fn set_color_input(&mut self, _slot: FrameSlot, _image: ResourceHandle) -> Result<()> {
        Ok(())
    }

    /// Destroys everything the pass created and returns it to the
    /// unprovisioned state.
    fn cleanup(&mut self, gpu: &mut dyn GpuDevice);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
