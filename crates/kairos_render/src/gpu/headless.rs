//! Headless Backend
//!
//! A CPU-only [`GpuBackend`] that simulates the synchronization protocol of a
//! real GPU closely enough to catch sequencing bugs:
//!
//! - fences go `Signaled -> Unsignaled (reset) -> Pending (submit) ->
//!   Signaled (wait)`. Waiting on a fence that was reset but never submitted
//!   would block forever on hardware and is reported as an error here.
//! - the image-available and render-finished semaphores must be signaled
//!   exactly once before they are consumed.
//! - submitted streams are validated: every referenced resource must be live
//!   and of the right kind, passes and debug groups must balance, and the
//!   stream must end with exactly one surface blit (only debug groups may
//!   close after it).
//!
//! Work "completes" instantly, so waiting on a pending fence never blocks.
//! Until that wait (or `wait_idle`) happens, the resources a slot's submitted
//! stream references count as in flight; destroying one is recorded as an
//! [`InFlightDestruction`].
//!
//! Faults can be injected (stale acquisitions and presentations, submission
//! and primitive-creation failures), and every protocol call is appended to
//! an event log that tests can inspect.

use kairos_core::{KairosError, Result};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::{
    Acquire, BindingKind, Extent2d, GpuBackend, GpuDevice, Present, ResourceDesc, ResourceHandle, ResourceKind,
    SurfaceImage,
};
use crate::command::{Command, CommandStream};
use crate::slot::FrameSlot;

/// Simulated fence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

/// One protocol call, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    CreateSync(FrameSlot),
    Wait(FrameSlot),
    Reset(FrameSlot),
    Acquire { slot: FrameSlot, image: u32 },
    AcquireStale(FrameSlot),
    Submit { slot: FrameSlot, commands: usize },
    Present(FrameSlot),
    PresentStale(FrameSlot),
    Recreate(Extent2d),
    WaitIdle,
    DestroySync(FrameSlot),
}

/// A resource destroyed while a pending submission still referenced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightDestruction {
    pub slot: FrameSlot,
    pub handle: ResourceHandle,
}

#[derive(Debug)]
struct SlotSync {
    fence: FenceState,
    image_available: bool,
    render_finished: bool,
    /// Resources referenced by the pending submission.
    in_flight: Vec<ResourceHandle>,
}

#[derive(Debug)]
struct HeadlessResource {
    owner: String,
    desc: ResourceDesc,
    data: Vec<u8>,
}

/// Simulated GPU.
#[derive(Debug)]
pub struct HeadlessBackend {
    extent: Extent2d,
    pending_extent: Option<Extent2d>,
    surface_stale: bool,
    image_count: u32,
    next_image: u32,
    surface_generation: u64,

    sync: FxHashMap<FrameSlot, SlotSync>,
    resources: SlotMap<ResourceHandle, HeadlessResource>,
    created: FxHashMap<ResourceKind, usize>,
    destroyed: FxHashMap<ResourceKind, usize>,
    events: Vec<BackendEvent>,
    submitted: Vec<CommandStream>,
    in_flight_destructions: Vec<InFlightDestruction>,

    stale_acquires: u32,
    stale_presents: u32,
    fail_next_submit: bool,
    fail_sync_creation: bool,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new(extent: Extent2d) -> Self {
        Self {
            extent: extent.clamped(),
            pending_extent: None,
            surface_stale: false,
            image_count: 3,
            next_image: 0,
            surface_generation: 0,
            sync: FxHashMap::default(),
            resources: SlotMap::with_key(),
            created: FxHashMap::default(),
            destroyed: FxHashMap::default(),
            events: Vec::new(),
            submitted: Vec::new(),
            in_flight_destructions: Vec::new(),
            stale_acquires: 0,
            stale_presents: 0,
            fail_next_submit: false,
            fail_sync_creation: false,
        }
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Makes the next `count` acquisitions report a stale surface.
    pub fn inject_stale_acquires(&mut self, count: u32) {
        self.stale_acquires += count;
    }

    /// Makes the next `count` presentations report a stale surface.
    pub fn inject_stale_presents(&mut self, count: u32) {
        self.stale_presents += count;
    }

    pub fn fail_next_submit(&mut self) {
        self.fail_next_submit = true;
    }

    /// Makes every subsequent `create_frame_sync` fail.
    pub fn fail_sync_creation(&mut self) {
        self.fail_sync_creation = true;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Every stream submitted so far, in submission order.
    #[must_use]
    pub fn submitted(&self) -> &[CommandStream] {
        &self.submitted
    }

    #[must_use]
    pub fn fence_state(&self, slot: FrameSlot) -> Option<FenceState> {
        self.sync.get(&slot).map(|s| s.fence)
    }

    /// Resources destroyed while a pending submission still used them.
    #[must_use]
    pub fn in_flight_destructions(&self) -> &[InFlightDestruction] {
        &self.in_flight_destructions
    }

    /// Whether a pending submission of any slot references `handle`.
    #[must_use]
    pub fn is_in_flight(&self, handle: ResourceHandle) -> bool {
        self.sync.values().any(|sync| sync.in_flight.contains(&handle))
    }

    #[must_use]
    pub fn surface_generation(&self) -> u64 {
        self.surface_generation
    }

    #[must_use]
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.desc.kind() == kind).count()
    }

    /// Total number of resources of `kind` ever created.
    #[must_use]
    pub fn created_count(&self, kind: ResourceKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn destroyed_count(&self, kind: ResourceKind) -> usize {
        self.destroyed.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn live_resources(&self) -> usize {
        self.resources.len()
    }

    /// Live resources created on behalf of `owner`.
    #[must_use]
    pub fn owned_by(&self, owner: &str) -> usize {
        self.resources.values().filter(|r| r.owner == owner).count()
    }

    #[must_use]
    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.resources.contains_key(handle)
    }

    #[must_use]
    pub fn desc(&self, handle: ResourceHandle) -> Option<&ResourceDesc> {
        self.resources.get(handle).map(|r| &r.desc)
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn buffer_contents(&self, handle: ResourceHandle) -> Option<&[u8]> {
        self.resources
            .get(handle)
            .filter(|r| r.desc.kind() == ResourceKind::Buffer)
            .map(|r| r.data.as_slice())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn sync_mut(&mut self, slot: FrameSlot) -> Result<&mut SlotSync> {
        let frames_in_flight = self.sync.len();
        self.sync.get_mut(&slot).ok_or(KairosError::SlotOutOfRange {
            slot: slot.index(),
            frames_in_flight,
        })
    }

    fn expect_kind(&self, handle: ResourceHandle, kind: ResourceKind) -> std::result::Result<(), String> {
        match self.resources.get(handle) {
            Some(r) if r.desc.kind() == kind => Ok(()),
            Some(r) => Err(format!(
                "'{}' is a {:?}, expected a {kind:?}",
                r.desc.label(),
                r.desc.kind()
            )),
            None => Err(format!("{kind:?} {handle:?} is not live")),
        }
    }

    fn validate_desc(&self, desc: &ResourceDesc) -> std::result::Result<(), String> {
        match desc {
            ResourceDesc::Buffer(d) if d.size == 0 => Err("zero-sized buffer".into()),
            ResourceDesc::Image(d) if d.extent.width == 0 || d.extent.height == 0 => Err("zero-sized image".into()),
            ResourceDesc::BindingTable(d) => {
                self.expect_kind(d.layout, ResourceKind::BindingLayout)?;
                let Some(ResourceDesc::BindingLayout(layout)) = self.resources.get(d.layout).map(|r| &r.desc) else {
                    return Err("binding layout vanished".into());
                };
                if layout.entries.len() != d.resources.len() {
                    return Err(format!(
                        "layout '{}' has {} entries, table provides {}",
                        layout.label,
                        layout.entries.len(),
                        d.resources.len()
                    ));
                }
                for (index, (kind, bound)) in layout.entries.iter().zip(&d.resources).enumerate() {
                    if !bound.matches(*kind) {
                        return Err(format!("binding {index}: {bound:?} does not fit {kind:?}"));
                    }
                    let expected = match kind {
                        BindingKind::UniformBuffer | BindingKind::StorageBuffer => ResourceKind::Buffer,
                        _ => ResourceKind::Image,
                    };
                    for handle in bound.handles() {
                        self.expect_kind(handle, expected)?;
                    }
                }
                Ok(())
            }
            ResourceDesc::PipelineLayout(d) => {
                for layout in &d.binding_layouts {
                    self.expect_kind(*layout, ResourceKind::BindingLayout)?;
                }
                Ok(())
            }
            ResourceDesc::Pipeline(d) => {
                self.expect_kind(d.layout, ResourceKind::PipelineLayout)?;
                self.expect_kind(d.shader, ResourceKind::Shader)
            }
            _ => Ok(()),
        }
    }

    fn validate_table(&self, table: ResourceHandle) -> std::result::Result<(), String> {
        self.expect_kind(table, ResourceKind::BindingTable)?;
        if let Some(ResourceDesc::BindingTable(desc)) = self.resources.get(table).map(|r| &r.desc) {
            for handle in desc.resources.iter().flat_map(|bound| bound.handles()) {
                if !self.resources.contains_key(handle) {
                    return Err(format!("binding table '{}' references a destroyed resource", desc.label));
                }
            }
        }
        Ok(())
    }

    /// Every resource `stream` touches, binding-table contents included.
    fn stream_resources(&self, stream: &CommandStream) -> Vec<ResourceHandle> {
        let mut handles = Vec::new();
        for command in stream.commands() {
            match command {
                Command::BeginPass { color, depth, .. } => handles.extend(std::iter::once(*color).chain(*depth)),
                Command::SetPipeline(pipeline) => handles.push(*pipeline),
                Command::SetBindings { table, .. } => {
                    handles.push(*table);
                    if let Some(ResourceDesc::BindingTable(desc)) = self.resources.get(*table).map(|r| &r.desc) {
                        handles.extend(desc.resources.iter().flat_map(|bound| bound.handles()));
                    }
                }
                Command::BlitToSurface { source } => handles.push(*source),
                _ => {}
            }
        }
        handles.sort_unstable();
        handles.dedup();
        handles
    }

    fn validate_stream(&self, stream: &CommandStream) -> std::result::Result<(), String> {
        let mut in_pass = false;
        let mut groups = 0_usize;
        let mut blits = 0_usize;

        for command in stream.commands() {
            if blits > 0 && *command != Command::PopDebugGroup {
                return Err(format!("{command:?} recorded after the surface blit"));
            }
            match command {
                Command::PushDebugGroup(_) => groups += 1,
                Command::PopDebugGroup => {
                    groups = groups.checked_sub(1).ok_or("unbalanced debug group")?;
                }
                Command::BeginPass { color, depth, .. } => {
                    if in_pass {
                        return Err("nested pass".into());
                    }
                    in_pass = true;
                    self.expect_kind(*color, ResourceKind::Image)?;
                    if let Some(depth) = depth {
                        self.expect_kind(*depth, ResourceKind::Image)?;
                    }
                }
                Command::SetPipeline(pipeline) => {
                    if !in_pass {
                        return Err("pipeline bound outside a pass".into());
                    }
                    self.expect_kind(*pipeline, ResourceKind::Pipeline)?;
                }
                Command::SetBindings { table, .. } => {
                    if !in_pass {
                        return Err("bindings set outside a pass".into());
                    }
                    self.validate_table(*table)?;
                }
                Command::Draw { .. } => {
                    if !in_pass {
                        return Err("draw outside a pass".into());
                    }
                }
                Command::EndPass => {
                    if !in_pass {
                        return Err("end of a pass that never began".into());
                    }
                    in_pass = false;
                }
                Command::BlitToSurface { source } => {
                    if in_pass {
                        return Err("surface blit inside a pass".into());
                    }
                    self.expect_kind(*source, ResourceKind::Image)?;
                    blits += 1;
                }
            }
        }

        if in_pass || groups > 0 {
            return Err("stream ended inside a pass or debug group".into());
        }
        if blits != 1 {
            return Err(format!("expected exactly one surface blit, found {blits}"));
        }
        Ok(())
    }
}

impl GpuDevice for HeadlessBackend {
    fn surface_extent(&self) -> Extent2d {
        self.extent
    }

    fn create_resource(&mut self, owner: &str, desc: ResourceDesc) -> Result<ResourceHandle> {
        if let Err(reason) = self.validate_desc(&desc) {
            return Err(KairosError::ResourceCreation { label: desc.label().to_string(), reason });
        }
        let data = match &desc {
            ResourceDesc::Buffer(d) => vec![0; usize::try_from(d.size).unwrap_or(usize::MAX)],
            _ => Vec::new(),
        };
        *self.created.entry(desc.kind()).or_default() += 1;
        log::trace!("headless: {owner} created {:?} '{}'", desc.kind(), desc.label());
        Ok(self.resources.insert(HeadlessResource { owner: owner.to_string(), desc, data }))
    }

    fn destroy_resource(&mut self, handle: ResourceHandle) {
        for (slot, sync) in &self.sync {
            if sync.fence == FenceState::Pending && sync.in_flight.contains(&handle) {
                log::error!("headless: {handle:?} destroyed while {slot}'s submission still uses it");
                self.in_flight_destructions.push(InFlightDestruction { slot: *slot, handle });
            }
        }
        if let Some(resource) = self.resources.remove(handle) {
            *self.destroyed.entry(resource.desc.kind()).or_default() += 1;
        }
    }

    fn write_buffer(&mut self, buffer: ResourceHandle, offset: u64, data: &[u8]) -> Result<()> {
        let resource = self
            .resources
            .get_mut(buffer)
            .filter(|r| r.desc.kind() == ResourceKind::Buffer)
            .ok_or_else(|| KairosError::UnknownResource(format!("buffer {buffer:?}")))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(data.len());
        if end > resource.data.len() {
            return Err(KairosError::ResourceCreation {
                label: resource.desc.label().to_string(),
                reason: format!("write of {} bytes at {offset} overflows {} bytes", data.len(), resource.data.len()),
            });
        }
        resource.data[start..end].copy_from_slice(data);
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_frame_sync(&mut self, slot: FrameSlot) -> Result<()> {
        if self.fail_sync_creation {
            return Err(KairosError::SyncPrimitiveCreation {
                slot: slot.index(),
                reason: "injected failure".into(),
            });
        }
        self.sync.insert(
            slot,
            SlotSync {
                fence: FenceState::Signaled,
                image_available: false,
                render_finished: false,
                in_flight: Vec::new(),
            },
        );
        self.events.push(BackendEvent::CreateSync(slot));
        Ok(())
    }

    fn destroy_frame_sync(&mut self, slot: FrameSlot) {
        if self.sync.remove(&slot).is_some() {
            self.events.push(BackendEvent::DestroySync(slot));
        }
    }

    fn wait_for_fence(&mut self, slot: FrameSlot) -> Result<()> {
        let sync = self.sync_mut(slot)?;
        match sync.fence {
            FenceState::Unsignaled => {
                return Err(KairosError::FenceWait {
                    slot: slot.index(),
                    reason: "fence was reset but nothing was submitted; the wait would never return".into(),
                });
            }
            FenceState::Pending | FenceState::Signaled => {
                sync.fence = FenceState::Signaled;
                sync.in_flight.clear();
            }
        }
        self.events.push(BackendEvent::Wait(slot));
        Ok(())
    }

    fn reset_fence(&mut self, slot: FrameSlot) -> Result<()> {
        let sync = self.sync_mut(slot)?;
        if sync.fence != FenceState::Signaled {
            return Err(KairosError::FenceWait {
                slot: slot.index(),
                reason: format!("cannot reset a {:?} fence", sync.fence),
            });
        }
        sync.fence = FenceState::Unsignaled;
        self.events.push(BackendEvent::Reset(slot));
        Ok(())
    }

    fn acquire_image(&mut self, slot: FrameSlot) -> Result<Acquire> {
        if self.surface_stale || self.stale_acquires > 0 {
            self.stale_acquires = self.stale_acquires.saturating_sub(1);
            self.sync_mut(slot)?;
            self.events.push(BackendEvent::AcquireStale(slot));
            return Ok(Acquire::Stale);
        }

        let sync = self.sync_mut(slot)?;
        if sync.image_available {
            return Err(KairosError::AcquireFailed(format!(
                "image-available semaphore of {slot} is already signaled"
            )));
        }
        sync.image_available = true;

        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.events.push(BackendEvent::Acquire { slot, image });
        Ok(Acquire::Image(SurfaceImage { index: image }))
    }

    fn submit(&mut self, slot: FrameSlot, stream: &CommandStream, _target: SurfaceImage) -> Result<()> {
        let submit_error = |reason: String| KairosError::SubmitFailed { slot: slot.index(), reason };

        if std::mem::take(&mut self.fail_next_submit) {
            return Err(submit_error("injected failure".into()));
        }
        self.validate_stream(stream).map_err(submit_error)?;
        let in_flight = self.stream_resources(stream);

        let sync = self.sync_mut(slot)?;
        if sync.fence != FenceState::Unsignaled {
            return Err(submit_error(format!("fence must be reset before submit, it is {:?}", sync.fence)));
        }
        if !sync.image_available {
            return Err(submit_error("no surface image was acquired".into()));
        }
        sync.image_available = false;
        sync.render_finished = true;
        sync.fence = FenceState::Pending;
        sync.in_flight = in_flight;

        self.events.push(BackendEvent::Submit { slot, commands: stream.len() });
        self.submitted.push(stream.clone());
        Ok(())
    }

    fn present(&mut self, slot: FrameSlot, _target: SurfaceImage) -> Result<Present> {
        let sync = self.sync_mut(slot)?;
        if !sync.render_finished {
            return Err(KairosError::PresentFailed(format!("{slot} presented before its submission")));
        }
        sync.render_finished = false;

        if self.stale_presents > 0 {
            self.stale_presents -= 1;
            self.events.push(BackendEvent::PresentStale(slot));
            return Ok(Present::Stale);
        }
        self.events.push(BackendEvent::Present(slot));
        Ok(Present::Presented)
    }

    fn recreate_surface(&mut self) -> Result<Extent2d> {
        if let Some(extent) = self.pending_extent.take() {
            self.extent = extent.clamped();
        }
        self.surface_stale = false;
        self.next_image = 0;
        self.surface_generation += 1;
        self.events.push(BackendEvent::Recreate(self.extent));
        Ok(self.extent)
    }

    fn notify_resized(&mut self, extent: Extent2d) {
        self.pending_extent = Some(extent);
        self.surface_stale = true;
    }

    fn wait_idle(&mut self) -> Result<()> {
        for sync in self.sync.values_mut() {
            if sync.fence == FenceState::Pending {
                sync.fence = FenceState::Signaled;
            }
            sync.in_flight.clear();
        }
        self.events.push(BackendEvent::WaitIdle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BufferDesc, ImageDesc, ImageFormat, ResourceUsage};

    fn backend() -> HeadlessBackend {
        let mut backend = HeadlessBackend::new(Extent2d::new(64, 64));
        backend.create_frame_sync(FrameSlot(0)).unwrap();
        backend
    }

    #[test]
    fn waiting_on_a_reset_unsubmitted_fence_is_an_error() {
        let mut backend = backend();
        backend.wait_for_fence(FrameSlot(0)).unwrap();
        backend.reset_fence(FrameSlot(0)).unwrap();
        assert!(matches!(backend.wait_for_fence(FrameSlot(0)), Err(KairosError::FenceWait { .. })));
    }

    #[test]
    fn submit_requires_reset_fence_and_acquired_image() {
        let mut backend = backend();
        let stream = CommandStream::new("empty");
        let image = SurfaceImage { index: 0 };
        assert!(backend.submit(FrameSlot(0), &stream, image).is_err());
        backend.reset_fence(FrameSlot(0)).unwrap();
        // No blit and no acquired image.
        assert!(backend.submit(FrameSlot(0), &stream, image).is_err());
    }

    #[test]
    fn resize_makes_acquire_stale_until_recreated() {
        let mut backend = backend();
        backend.notify_resized(Extent2d::new(128, 32));
        assert_eq!(backend.acquire_image(FrameSlot(0)).unwrap(), Acquire::Stale);
        assert_eq!(backend.acquire_image(FrameSlot(0)).unwrap(), Acquire::Stale);
        assert_eq!(backend.recreate_surface().unwrap(), Extent2d::new(128, 32));
        assert!(matches!(backend.acquire_image(FrameSlot(0)).unwrap(), Acquire::Image(_)));
    }

    #[test]
    fn destroying_a_resource_of_a_pending_submission_is_recorded() {
        let mut backend = backend();
        let image = backend
            .create_resource(
                "test",
                ResourceDesc::Image(ImageDesc {
                    label: "target".into(),
                    extent: Extent2d::new(4, 4),
                    format: ImageFormat::Rgba8Unorm,
                    usage: ResourceUsage::COLOR_TARGET | ResourceUsage::COPY_SRC,
                }),
            )
            .unwrap();
        let mut stream = CommandStream::new("blit");
        stream.push(Command::BlitToSurface { source: image });

        backend.reset_fence(FrameSlot(0)).unwrap();
        let Acquire::Image(target) = backend.acquire_image(FrameSlot(0)).unwrap() else {
            panic!("surface should not be stale");
        };
        backend.submit(FrameSlot(0), &stream, target).unwrap();
        assert!(backend.is_in_flight(image));

        backend.destroy_resource(image);
        assert_eq!(
            backend.in_flight_destructions(),
            &[InFlightDestruction { slot: FrameSlot(0), handle: image }]
        );
        assert!(!backend.is_live(image));
    }

    #[test]
    fn waiting_releases_in_flight_resources() {
        let mut backend = backend();
        let image = backend
            .create_resource(
                "test",
                ResourceDesc::Image(ImageDesc {
                    label: "target".into(),
                    extent: Extent2d::new(4, 4),
                    format: ImageFormat::Rgba8Unorm,
                    usage: ResourceUsage::COPY_SRC,
                }),
            )
            .unwrap();
        let mut stream = CommandStream::new("blit");
        stream.push(Command::BlitToSurface { source: image });
        backend.reset_fence(FrameSlot(0)).unwrap();
        let Acquire::Image(target) = backend.acquire_image(FrameSlot(0)).unwrap() else {
            panic!("surface should not be stale");
        };
        backend.submit(FrameSlot(0), &stream, target).unwrap();

        backend.wait_idle().unwrap();
        assert!(!backend.is_in_flight(image));
        backend.destroy_resource(image);
        assert!(backend.in_flight_destructions().is_empty());
    }

    #[test]
    fn buffer_writes_are_bounds_checked() {
        let mut backend = backend();
        let buffer = backend
            .create_resource(
                "test",
                ResourceDesc::Buffer(BufferDesc { label: "b".into(), size: 8, usage: ResourceUsage::UNIFORM }),
            )
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.buffer_contents(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(backend.write_buffer(buffer, 6, &[0; 4]).is_err());
        assert_eq!(backend.owned_by("test"), 1);
        backend.destroy_resource(buffer);
        assert_eq!(backend.destroyed_count(ResourceKind::Buffer), 1);
        assert!(backend.write_buffer(buffer, 0, &[0]).is_err());
    }
}
