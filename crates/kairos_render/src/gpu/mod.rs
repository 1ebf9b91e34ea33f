//! GPU Backends
//!
//! Two traits split the backend surface along the line the render code
//! needs:
//!
//! - [`GpuDevice`]: object-safe resource creation. Render passes only ever
//!   see `&mut dyn GpuDevice`.
//! - [`GpuBackend`]: the frame-level protocol driven by the
//!   [`FrameSynchronizer`](crate::FrameSynchronizer): per-slot fences and
//!   semaphores, surface image acquisition, submission, presentation and
//!   surface recreation.
//!
//! A stale surface is reported as [`Acquire::Stale`] / [`Present::Stale`],
//! never as an error, because it is the one condition the synchronizer
//! recovers from.

pub mod headless;
pub mod resource;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use headless::{BackendEvent, FenceState, HeadlessBackend, InFlightDestruction};
pub use resource::{
    BindingKind, BindingLayoutDesc, BindingTableDesc, BoundResource, BufferDesc, ImageDesc, ImageFormat,
    PipelineDesc, PipelineLayoutDesc, ResourceDesc, ResourceHandle, ResourceKind, ResourceUsage, ShaderDesc,
};
#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuBackend;

use kairos_core::Result;

use crate::command::CommandStream;
use crate::slot::FrameSlot;

/// Size of the presentable surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-sized extents (minimized windows) become 1x1.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }

    #[must_use]
    pub fn aspect(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// An acquired presentable image. Backends use the index to find their
/// native surface texture again at submit and present time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceImage {
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Image(SurfaceImage),
    /// The surface no longer matches the window and must be recreated.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Present {
    Presented,
    /// Presentation happened (or was dropped) but the surface must be
    /// recreated before the next frame.
    Stale,
}

/// Resource creation, usable as a trait object.
pub trait GpuDevice {
    /// Current size of the presentable surface.
    fn surface_extent(&self) -> Extent2d;

    /// Creates a resource. `owner` names the pass or subsystem that will
    /// destroy it.
    fn create_resource(&mut self, owner: &str, desc: ResourceDesc) -> Result<ResourceHandle>;

    /// Destroys a resource. Unknown handles are ignored.
    fn destroy_resource(&mut self, handle: ResourceHandle);

    /// Uploads `data` into a buffer at `offset` bytes.
    fn write_buffer(&mut self, buffer: ResourceHandle, offset: u64, data: &[u8]) -> Result<()>;
}

/// Frame protocol on top of [`GpuDevice`].
pub trait GpuBackend: GpuDevice {
    /// Creates the fence (initially signaled) and the two semaphores of a
    /// frame slot.
    fn create_frame_sync(&mut self, slot: FrameSlot) -> Result<()>;

    fn destroy_frame_sync(&mut self, slot: FrameSlot);

    /// Blocks until the slot's previous submission has completed.
    fn wait_for_fence(&mut self, slot: FrameSlot) -> Result<()>;

    /// Unsignals the slot's fence ahead of a new submission.
    fn reset_fence(&mut self, slot: FrameSlot) -> Result<()>;

    /// Acquires the next presentable image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: FrameSlot) -> Result<Acquire>;

    /// Submits `stream`, waiting on image-available and signaling
    /// render-finished plus the slot's fence.
    fn submit(&mut self, slot: FrameSlot, stream: &CommandStream, target: SurfaceImage) -> Result<()>;

    /// Presents `target` once render-finished is signaled.
    fn present(&mut self, slot: FrameSlot, target: SurfaceImage) -> Result<Present>;

    /// Rebuilds the presentable image ring at the window's current size.
    fn recreate_surface(&mut self) -> Result<Extent2d>;

    /// Records a new window size; the next acquisition reports staleness.
    fn notify_resized(&mut self, extent: Extent2d);

    /// Blocks until the device is idle.
    fn wait_idle(&mut self) -> Result<()>;
}
