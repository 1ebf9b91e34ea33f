//! Render Chain
//!
//! An ordered list of [`RenderPass`]es where pass `k`'s colour output is pass
//! `k + 1`'s sampled input. Whichever pass sits last blits into the
//! presentable image; "last" is decided by position, never by type.

use kairos_core::{KairosError, Result};

use crate::command::{Command, CommandStream};
use crate::gpu::{Extent2d, GpuDevice};
use crate::pass::{FrameContext, RenderPass};
use crate::queue::DrainedMutations;
use crate::slot::FrameSlot;

pub struct RenderChain {
    passes: Vec<Box<dyn RenderPass>>,
    frames_in_flight: usize,
    provisioned: bool,
}

impl RenderChain {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            passes: Vec::new(),
            frames_in_flight,
            provisioned: false,
        }
    }

    /// Appends a pass. Passes can only be added before provisioning.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) -> Result<()> {
        if self.provisioned {
            return Err(KairosError::FramePhase {
                slot: 0,
                operation: "add a render pass",
                phase: "the chain is provisioned",
            });
        }
        self.passes.push(pass);
        Ok(())
    }

    #[must_use]
    pub fn with_pass(mut self, pass: impl RenderPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name())
    }

    #[must_use]
    pub fn pass(&self, index: usize) -> Option<&dyn RenderPass> {
        self.passes.get(index).map(|p| &**p)
    }

    /// First pass of concrete type `T`.
    #[must_use]
    pub fn find_pass<T: RenderPass + 'static>(&self) -> Option<&T> {
        self.passes.iter().find_map(|p| p.as_any().downcast_ref::<T>())
    }

    pub fn find_pass_mut<T: RenderPass + 'static>(&mut self) -> Option<&mut T> {
        self.passes.iter_mut().find_map(|p| p.as_any_mut().downcast_mut::<T>())
    }

    // ========================================================================
    // Provisioning
    // ========================================================================

    /// One-time resource creation for every pass, in contract order.
    pub fn provision(&mut self, gpu: &mut dyn GpuDevice) -> Result<()> {
        if self.provisioned {
            return Ok(());
        }
        if self.passes.is_empty() {
            return Err(KairosError::InvalidConfig("the render chain has no passes".into()));
        }

        let extent = gpu.surface_extent();
        for pass in &mut self.passes {
            pass.create_backing_resources(gpu, extent)?;
        }
        self.wire_inputs()?;

        for pass in &mut self.passes {
            pass.create_binding_layout(gpu)?;
            for index in 0..self.frames_in_flight {
                pass.create_or_update_bindings(gpu, FrameSlot(index), true)?;
            }
            pass.create_pipeline_layout(gpu)?;
            pass.load_shader_programs(gpu)?;
            log::debug!("Provisioned render pass '{}'", pass.name());
        }

        self.provisioned = true;
        log::info!(
            "Render chain provisioned: [{}] at {}x{}",
            self.pass_names().collect::<Vec<_>>().join(" -> "),
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Rebuilds only the size-dependent resources after the surface changed,
    /// then re-wires the chain. Layouts and shader programs are untouched.
    ///
    /// The old targets are destroyed immediately; no submission may still
    /// reference them.
    pub fn recreate_size_dependent(&mut self, gpu: &mut dyn GpuDevice, extent: Extent2d) -> Result<()> {
        for pass in &mut self.passes {
            pass.cleanup_backing_resources(gpu);
            pass.create_backing_resources(gpu, extent)?;
        }
        self.wire_inputs()?;
        log::debug!("Render chain resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn wire_inputs(&mut self) -> Result<()> {
        for k in 1..self.passes.len() {
            let (before, after) = self.passes.split_at_mut(k);
            let (producer, consumer) = (&before[k - 1], &mut after[0]);
            for index in 0..self.frames_in_flight {
                let slot = FrameSlot(index);
                if let Some(output) = producer.color_output(slot) {
                    consumer.set_color_input(slot, output)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Per frame
    // ========================================================================

    /// Applies `slot`'s drained mutations, in FIFO order, to every pass.
    pub fn drain(
        &mut self,
        gpu: &mut dyn GpuDevice,
        slot: FrameSlot,
        drained: DrainedMutations,
        frame: &FrameContext<'_>,
    ) -> Result<()> {
        let DrainedMutations { entries, camera_request } = drained;
        if !entries.is_empty() {
            log::trace!("{slot}: draining {} scene mutations", entries.len());
        }
        for entry in &entries {
            for pass in &mut self.passes {
                pass.apply_mutation(gpu, slot, entry)?;
            }
        }
        for pass in &mut self.passes {
            pass.after_drain(gpu, slot, camera_request, frame)?;
        }
        Ok(())
    }

    /// Records one frame for `slot` into `stream`.
    ///
    /// Stale bindings of `slot` are rebuilt and every pass's buffers are
    /// written before the first pass begins.
    pub fn record_frame(
        &mut self,
        gpu: &mut dyn GpuDevice,
        slot: FrameSlot,
        stream: &mut CommandStream,
        frame: &FrameContext<'_>,
    ) -> Result<()> {
        if !self.provisioned {
            return Err(KairosError::FramePhase {
                slot: slot.index(),
                operation: "record a frame",
                phase: "the chain is not provisioned",
            });
        }

        for pass in &mut self.passes {
            if pass.resource_set().is_stale(slot) {
                log::trace!("{slot}: rebuilding bindings of '{}'", pass.name());
                pass.create_or_update_bindings(gpu, slot, false)?;
            }
            pass.update(gpu, slot, frame)?;
        }

        let last = self.passes.len() - 1;
        for (k, pass) in self.passes.iter_mut().enumerate() {
            stream.push(Command::PushDebugGroup(pass.name().to_string()));
            pass.begin_pass(stream, slot)?;
            pass.record(stream, slot)?;
            pass.end_pass(stream, slot, k == last)?;
            stream.push(Command::PopDebugGroup);
        }
        Ok(())
    }

    /// Destroys every pass's resources.
    pub fn cleanup(&mut self, gpu: &mut dyn GpuDevice) {
        for pass in &mut self.passes {
            pass.cleanup(gpu);
        }
        self.provisioned = false;
    }
}
