//! Frame Synchronizer
//!
//! Sequences one logical frame on a frame slot:
//!
//! ```text
//! begin (wait fence) -> drain mutations -> acquire image
//!     stale: wait idle, recreate surface + size-dependent resources,
//!            skip the frame
//!     ok:    reset fence -> record chain -> submit -> present
//!                                                    stale: wait idle, recreate
//! ```
//!
//! The fence is reset only once an image has been acquired. A skipped frame
//! therefore leaves the slot's fence signaled, and the next `begin` on that
//! slot cannot block on a submission that never happened.
//!
//! Mutations are drained after the fence wait, so the slot's previous frame
//! is known to be done with the resources the drain may release.

use kairos_core::{KairosError, Result};

use crate::chain::RenderChain;
use crate::command::CommandStream;
use crate::gpu::{Acquire, Extent2d, GpuBackend, Present};
use crate::pass::FrameContext;
use crate::queue::MutationQueues;
use crate::slot::{FrameSlot, PerSlot};

/// Where a frame slot is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    Begun,
    Acquired,
    Submitted,
}

impl FramePhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Begun => "begun",
            Self::Acquired => "acquired",
            Self::Submitted => "submitted",
        }
    }
}

/// Result of [`FrameSynchronizer::draw_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented {
        /// The surface went stale at present time and was rebuilt.
        surface_recreated: bool,
    },
    /// The surface was stale at acquisition; nothing was recorded.
    Skipped,
}

impl FrameOutcome {
    #[must_use]
    pub fn is_presented(self) -> bool {
        matches!(self, Self::Presented { .. })
    }
}

/// Per-slot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub surface_recreations: u64,
    /// Commands in the most recent submission.
    pub last_command_count: usize,
}

#[derive(Debug)]
struct FrameSlotState {
    stream: CommandStream,
    phase: FramePhase,
    stats: SlotStats,
}

pub struct FrameSynchronizer<B: GpuBackend> {
    backend: B,
    slots: PerSlot<FrameSlotState>,
    extent: Extent2d,
}

impl<B: GpuBackend> FrameSynchronizer<B> {
    /// Creates the synchronization primitives of every slot.
    ///
    /// Any creation failure is fatal and returned as is.
    pub fn new(mut backend: B, frames_in_flight: usize) -> Result<Self> {
        let slots = PerSlot::from_fn(frames_in_flight, |slot| FrameSlotState {
            stream: CommandStream::new(format!("Frame Commands {}", slot.index())),
            phase: FramePhase::Idle,
            stats: SlotStats::default(),
        });
        for slot in slots.slots() {
            backend.create_frame_sync(slot)?;
        }
        let extent = backend.surface_extent();
        Ok(Self { backend, slots, extent })
    }

    #[inline]
    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn phase(&self, slot: FrameSlot) -> Option<FramePhase> {
        self.slots.get(slot).map(|s| s.phase)
    }

    #[must_use]
    pub fn stats(&self, slot: FrameSlot) -> Option<SlotStats> {
        self.slots.get(slot).map(|s| s.stats)
    }

    /// Commands recorded for `slot`'s most recent frame.
    #[must_use]
    pub fn command_stream(&self, slot: FrameSlot) -> Option<&CommandStream> {
        self.slots.get(slot).map(|s| &s.stream)
    }

    /// Blocks until `slot`'s previous submission has completed.
    pub fn begin_frame(&mut self, slot: FrameSlot) -> Result<()> {
        self.expect_phase(slot, FramePhase::Idle, "begin a frame")?;
        self.backend.wait_for_fence(slot)?;
        self.slots[slot].phase = FramePhase::Begun;
        Ok(())
    }

    /// Runs one full frame on `slot`.
    pub fn draw_frame(
        &mut self,
        slot: FrameSlot,
        chain: &mut RenderChain,
        queues: &mut MutationQueues,
        frame: &FrameContext<'_>,
    ) -> Result<FrameOutcome> {
        self.begin_frame(slot)?;

        let drained = queues.drain(slot)?;
        chain.drain(&mut self.backend, slot, drained, frame)?;

        let target = match self.backend.acquire_image(slot)? {
            Acquire::Image(image) => image,
            Acquire::Stale => {
                log::debug!("{slot}: surface stale at acquire, skipping frame");
                self.recreate_surface(slot, chain)?;
                let state = &mut self.slots[slot];
                state.phase = FramePhase::Idle;
                state.stats.frames_skipped += 1;
                return Ok(FrameOutcome::Skipped);
            }
        };
        self.slots[slot].phase = FramePhase::Acquired;
        self.backend.reset_fence(slot)?;

        let frame = FrameContext { extent: self.extent, ..*frame };
        let state = &mut self.slots[slot];
        state.stream.reset();
        chain.record_frame(&mut self.backend, slot, &mut state.stream, &frame)?;
        self.backend.submit(slot, &state.stream, target)?;
        state.phase = FramePhase::Submitted;
        state.stats.last_command_count = state.stream.len();

        let surface_recreated = match self.backend.present(slot, target)? {
            Present::Presented => false,
            Present::Stale => {
                log::debug!("{slot}: surface stale at present");
                self.recreate_surface(slot, chain)?;
                true
            }
        };

        let state = &mut self.slots[slot];
        state.phase = FramePhase::Idle;
        state.stats.frames_presented += 1;
        Ok(FrameOutcome::Presented { surface_recreated })
    }

    /// Rebuilds the surface and every pass's size-dependent resources.
    ///
    /// Submissions of other slots, and the current one on a stale present,
    /// may still read the old targets, so the device is drained first.
    fn recreate_surface(&mut self, slot: FrameSlot, chain: &mut RenderChain) -> Result<()> {
        self.backend.wait_idle()?;
        let extent = self.backend.recreate_surface()?;
        chain.recreate_size_dependent(&mut self.backend, extent)?;
        log::info!("Surface recreated at {}x{}", extent.width, extent.height);
        self.extent = extent;
        self.slots[slot].stats.surface_recreations += 1;
        Ok(())
    }

    /// Forwards a window resize; the next acquisition will see a stale
    /// surface and trigger recreation.
    pub fn notify_resized(&mut self, extent: Extent2d) {
        self.backend.notify_resized(extent);
    }

    /// Waits for the GPU, destroys the chain's resources and the per-slot
    /// primitives.
    pub fn shutdown(&mut self, chain: &mut RenderChain) -> Result<()> {
        self.backend.wait_idle()?;
        chain.cleanup(&mut self.backend);
        for slot in self.slots.slots() {
            self.backend.destroy_frame_sync(slot);
            self.slots[slot].phase = FramePhase::Idle;
        }
        Ok(())
    }

    fn expect_phase(&self, slot: FrameSlot, expected: FramePhase, operation: &'static str) -> Result<()> {
        let state = self.slots.get(slot).ok_or(KairosError::SlotOutOfRange {
            slot: slot.index(),
            frames_in_flight: self.slots.len(),
        })?;
        if state.phase == expected {
            Ok(())
        } else {
            Err(KairosError::FramePhase {
                slot: slot.index(),
                operation,
                phase: state.phase.as_str(),
            })
        }
    }
}
