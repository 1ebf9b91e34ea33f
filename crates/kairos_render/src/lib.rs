//! # Kairos Render
//!
//! The GPU-facing half of the runtime core:
//!
//! - [`FrameSynchronizer`]: `F` frames in flight, each slot owning a fence
//!   and two semaphores, with stale-surface recovery
//! - [`RenderChain`] and the [`RenderPass`] contract: lazily provisioned
//!   passes, the last of which blits into the presentable image
//! - [`MutationQueues`]: per-slot FIFO queues of scene attach/detach entries
//! - [`ScenePass`] / [`ToneMapPass`]: the default chain
//!
//! Backends implement [`GpuDevice`] + [`GpuBackend`]. [`HeadlessBackend`] is
//! always available and records everything it is asked to do; the `wgpu`
//! feature adds [`WgpuBackend`].

pub mod chain;
pub mod command;
pub mod frame;
pub mod gpu;
pub mod pass;
pub mod passes;
pub mod queue;
pub mod renderer;
pub mod settings;
pub mod slot;

pub use chain::RenderChain;
pub use command::{Command, CommandStream, LoadOp};
pub use frame::{FrameOutcome, FramePhase, FrameSynchronizer, SlotStats};
pub use gpu::{
    Acquire, BackendEvent, Extent2d, FenceState, GpuBackend, GpuDevice, HeadlessBackend, InFlightDestruction, Present,
    ResourceDesc, ResourceHandle, ResourceKind, SurfaceImage,
};
#[cfg(feature = "wgpu")]
pub use gpu::WgpuBackend;
pub use pass::{FrameContext, RenderPass, ResourceSet, ResourceSetState};
pub use passes::{ScenePass, SlotScene, ToneMapPass, default_chain};
pub use queue::{DrainedMutations, MutationQueues};
pub use renderer::Renderer;
pub use settings::{MAX_FRAMES_IN_FLIGHT, RendererSettings, SceneLimits};
pub use slot::{FrameSlot, PerSlot};
