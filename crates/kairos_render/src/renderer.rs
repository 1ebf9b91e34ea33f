//! Renderer
//!
//! Owns the [`FrameSynchronizer`] and the [`RenderChain`] and ties them to
//! the [`RendererSettings`] they were built from. The application layer
//! talks to this type only.

use kairos_core::{KairosError, Result};

use crate::chain::RenderChain;
use crate::frame::{FrameOutcome, FrameSynchronizer, SlotStats};
use crate::gpu::{Extent2d, GpuBackend};
use crate::pass::FrameContext;
use crate::passes;
use crate::queue::MutationQueues;
use crate::settings::RendererSettings;
use crate::slot::FrameSlot;

pub struct Renderer<B: GpuBackend> {
    sync: FrameSynchronizer<B>,
    chain: RenderChain,
    settings: RendererSettings,
}

impl<B: GpuBackend> Renderer<B> {
    /// Validates `settings`, creates the per-slot primitives and provisions
    /// every pass of `chain`.
    pub fn new(backend: B, settings: RendererSettings, mut chain: RenderChain) -> Result<Self> {
        settings.validate()?;
        if chain.is_empty() {
            return Err(KairosError::InvalidConfig("the render chain has no passes".into()));
        }
        let mut sync = FrameSynchronizer::new(backend, settings.frames_in_flight)?;
        chain.provision(sync.backend_mut())?;
        log::info!(
            "Renderer ready: {} frames in flight, {}x{}",
            settings.frames_in_flight,
            sync.extent().width,
            sync.extent().height
        );
        Ok(Self { sync, chain, settings })
    }

    /// Builds the renderer with the default scene + tone map chain.
    pub fn with_default_chain(backend: B, settings: RendererSettings) -> Result<Self> {
        let chain = passes::default_chain(&settings);
        Self::new(backend, settings, chain)
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.settings.frames_in_flight
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent2d {
        self.sync.extent()
    }

    /// Draws one frame on `slot`, draining that slot's mutation queue first.
    pub fn render(&mut self, slot: FrameSlot, queues: &mut MutationQueues, frame: &FrameContext<'_>) -> Result<FrameOutcome> {
        self.sync.draw_frame(slot, &mut self.chain, queues, frame)
    }

    /// The window changed size; recreation happens on the next acquisition.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.sync.notify_resized(Extent2d::new(width, height));
    }

    #[must_use]
    pub fn stats(&self, slot: FrameSlot) -> Option<SlotStats> {
        self.sync.stats(slot)
    }

    #[inline]
    #[must_use]
    pub fn synchronizer(&self) -> &FrameSynchronizer<B> {
        &self.sync
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        self.sync.backend()
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        self.sync.backend_mut()
    }

    #[inline]
    #[must_use]
    pub fn chain(&self) -> &RenderChain {
        &self.chain
    }

    #[inline]
    pub fn chain_mut(&mut self) -> &mut RenderChain {
        &mut self.chain
    }

    /// Waits for the GPU and destroys everything the chain created.
    pub fn shutdown(&mut self) -> Result<()> {
        self.sync.shutdown(&mut self.chain)?;
        log::info!("Renderer shut down");
        Ok(())
    }
}
