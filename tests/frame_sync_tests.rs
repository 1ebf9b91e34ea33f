//! Frame Synchronizer Integration Tests
//!
//! Tests for:
//! - The per-frame protocol: wait, acquire, reset, submit, present
//! - Stale surfaces at acquisition and at presentation
//! - Fence bookkeeping across skipped frames
//! - Fatal errors and shutdown

use std::time::Duration;

use kairos::prelude::*;
use kairos::core::ErrorCategory;
use kairos::render::{
    BackendEvent, FenceState, FramePhase, ResourceDesc, ResourceHandle, ResourceKind, ScenePass, ToneMapPass,
};

type TestEngine = Engine<HeadlessBackend, ManualClock>;

const EXTENT: Extent2d = Extent2d::new(320, 200);

fn engine(frames_in_flight: usize) -> TestEngine {
    let settings = EngineSettings {
        renderer: RendererSettings { frames_in_flight, ..Default::default() },
        ..Default::default()
    };
    Engine::with_clock(HeadlessBackend::new(EXTENT), ManualClock::new(), settings).unwrap()
}

fn tick(engine: &mut TestEngine) -> TickReport {
    engine.clock_mut().advance(Duration::from_millis(16));
    engine.tick().unwrap()
}

fn backend(engine: &TestEngine) -> &HeadlessBackend {
    engine.renderer().backend()
}

fn backend_mut(engine: &mut TestEngine) -> &mut HeadlessBackend {
    engine.renderer_mut().backend_mut()
}

fn created(engine: &TestEngine) -> Vec<usize> {
    ResourceKind::ALL.iter().map(|kind| backend(engine).created_count(*kind)).collect()
}

fn created_of(engine: &TestEngine, kind: ResourceKind) -> usize {
    backend(engine).created_count(kind)
}

fn image_extent(engine: &TestEngine, handle: ResourceHandle) -> Extent2d {
    match backend(engine).desc(handle) {
        Some(ResourceDesc::Image(desc)) => desc.extent,
        other => panic!("expected an image, got {other:?}"),
    }
}

// ============================================================================
// Protocol
// ============================================================================

#[test]
fn construction_creates_one_set_of_primitives_per_slot() {
    let engine = engine(3);
    let events = backend(&engine).events();
    assert_eq!(
        events,
        &[
            BackendEvent::CreateSync(FrameSlot(0)),
            BackendEvent::CreateSync(FrameSlot(1)),
            BackendEvent::CreateSync(FrameSlot(2)),
        ]
    );
    for index in 0..3 {
        assert_eq!(backend(&engine).fence_state(FrameSlot(index)), Some(FenceState::Signaled));
    }
}

#[test]
fn one_frame_follows_wait_acquire_reset_submit_present() {
    let mut engine = engine(2);
    backend_mut(&mut engine).clear_events();

    let report = tick(&mut engine);
    assert_eq!(report.outcome, FrameOutcome::Presented { surface_recreated: false });

    let events = backend(&engine).events();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], BackendEvent::Wait(FrameSlot(0)));
    assert_eq!(events[1], BackendEvent::Acquire { slot: FrameSlot(0), image: 0 });
    assert_eq!(events[2], BackendEvent::Reset(FrameSlot(0)));
    assert!(matches!(events[3], BackendEvent::Submit { slot: FrameSlot(0), .. }));
    assert_eq!(events[4], BackendEvent::Present(FrameSlot(0)));
    assert_eq!(backend(&engine).fence_state(FrameSlot(0)), Some(FenceState::Pending));
}

#[test]
fn slots_cycle_and_each_waits_on_its_own_fence() {
    let mut engine = engine(3);
    for _ in 0..7 {
        tick(&mut engine);
    }
    let waits: Vec<usize> = backend(&engine)
        .events()
        .iter()
        .filter_map(|event| match event {
            BackendEvent::Wait(slot) => Some(slot.index()),
            _ => None,
        })
        .collect();
    assert_eq!(waits, vec![0, 1, 2, 0, 1, 2, 0]);

    let stats = engine.renderer().stats(FrameSlot(0)).unwrap();
    assert_eq!(stats.frames_presented, 3);
    assert_eq!(stats.frames_skipped, 0);
    assert_eq!(backend(&engine).submitted().len(), 7);
}

#[test]
fn phases_return_to_idle_after_every_frame() {
    let mut engine = engine(2);
    tick(&mut engine);
    for index in 0..2 {
        assert_eq!(engine.renderer().synchronizer().phase(FrameSlot(index)), Some(FramePhase::Idle));
    }
}

// ============================================================================
// Stale Surfaces
// ============================================================================

#[test]
fn stale_acquire_skips_the_frame_and_submits_nothing() {
    let mut engine = engine(2);
    backend_mut(&mut engine).inject_stale_acquires(1);
    backend_mut(&mut engine).clear_events();

    let report = tick(&mut engine);
    assert_eq!(report.outcome, FrameOutcome::Skipped);
    assert_eq!(
        backend(&engine).events(),
        &[
            BackendEvent::Wait(FrameSlot(0)),
            BackendEvent::AcquireStale(FrameSlot(0)),
            BackendEvent::WaitIdle,
            BackendEvent::Recreate(EXTENT),
        ]
    );
    assert!(backend(&engine).submitted().is_empty());
    assert_eq!(engine.renderer().stats(FrameSlot(0)).unwrap().frames_skipped, 1);
}

#[test]
fn skipped_frame_leaves_the_fence_signaled() {
    let mut engine = engine(2);
    backend_mut(&mut engine).inject_stale_acquires(1);
    tick(&mut engine);
    assert_eq!(backend(&engine).fence_state(FrameSlot(0)), Some(FenceState::Signaled));

    // The next use of the slot must not wait on a reset, never-submitted fence.
    tick(&mut engine);
    let report = tick(&mut engine);
    assert_eq!(report.slot, FrameSlot(0));
    assert!(report.outcome.is_presented());
}

#[test]
fn recreation_rebuilds_only_size_dependent_images() {
    let mut engine = engine(2);
    tick(&mut engine);
    let before = created(&engine);
    let images_before = created_of(&engine, ResourceKind::Image);

    backend_mut(&mut engine).inject_stale_acquires(1);
    tick(&mut engine);

    // Scene colour + depth and tone map output, per slot.
    assert_eq!(created_of(&engine, ResourceKind::Image), images_before + 3 * 2);
    for (kind, count) in ResourceKind::ALL.iter().zip(&before) {
        if *kind != ResourceKind::Image {
            assert_eq!(created_of(&engine, *kind), *count, "{kind:?} was recreated");
        }
    }
    assert_eq!(backend(&engine).destroyed_count(ResourceKind::Image), 3 * 2);
}

#[test]
fn resize_recreates_targets_at_the_new_extent() {
    let mut engine = engine(2);
    tick(&mut engine);

    let size = Extent2d::new(1024, 768);
    engine.resize(size.width, size.height);
    assert_eq!(tick(&mut engine).outcome, FrameOutcome::Skipped);
    assert_eq!(engine.renderer().extent(), size);

    let chain = engine.renderer().chain();
    let scene = chain.find_pass::<ScenePass>().unwrap();
    let tone_map = chain.find_pass::<ToneMapPass>().unwrap();
    for index in 0..2 {
        let slot = FrameSlot(index);
        let color = scene.color_output(slot).unwrap();
        assert_eq!(image_extent(&engine, color), size);
        assert_eq!(image_extent(&engine, tone_map.color_output(slot).unwrap()), size);
        // The tone map samples the new scene colour.
        assert_eq!(tone_map.color_input(slot), Some(color));
    }

    assert!(tick(&mut engine).outcome.is_presented());
    assert!(tick(&mut engine).outcome.is_presented());
}

#[test]
fn stale_present_still_counts_as_presented_and_recreates() {
    let mut engine = engine(2);
    backend_mut(&mut engine).inject_stale_presents(1);

    let report = tick(&mut engine);
    assert_eq!(report.outcome, FrameOutcome::Presented { surface_recreated: true });
    let stats = engine.renderer().stats(FrameSlot(0)).unwrap();
    assert_eq!(stats.frames_presented, 1);
    assert_eq!(stats.surface_recreations, 1);
    assert_eq!(backend(&engine).surface_generation(), 1);

    assert_eq!(tick(&mut engine).outcome, FrameOutcome::Presented { surface_recreated: false });
}

#[test]
fn stale_present_drains_the_device_before_destroying_targets() {
    let mut engine = engine(2);
    tick(&mut engine);
    let scene = engine.renderer().chain().find_pass::<ScenePass>().unwrap();
    let slot0_color = scene.color_output(FrameSlot(0)).unwrap();
    assert_eq!(backend(&engine).fence_state(FrameSlot(0)), Some(FenceState::Pending));
    assert!(backend(&engine).is_in_flight(slot0_color));

    backend_mut(&mut engine).inject_stale_presents(1);
    backend_mut(&mut engine).clear_events();
    let report = tick(&mut engine);
    assert_eq!(report.outcome, FrameOutcome::Presented { surface_recreated: true });

    let events = backend(&engine).events();
    let idle = events.iter().position(|e| *e == BackendEvent::WaitIdle).unwrap();
    let recreate = events.iter().position(|e| matches!(e, BackendEvent::Recreate(_))).unwrap();
    assert!(idle < recreate);

    assert!(!backend(&engine).is_live(slot0_color));
    assert!(backend(&engine).in_flight_destructions().is_empty());
    assert_eq!(backend(&engine).fence_state(FrameSlot(0)), Some(FenceState::Signaled));
}

#[test]
fn stale_acquire_with_other_slots_pending_destroys_nothing_in_flight() {
    let mut engine = engine(3);
    tick(&mut engine);
    tick(&mut engine);
    backend_mut(&mut engine).inject_stale_acquires(1);
    assert_eq!(tick(&mut engine).outcome, FrameOutcome::Skipped);
    assert!(backend(&engine).in_flight_destructions().is_empty());

    let size = Extent2d::new(640, 480);
    engine.resize(size.width, size.height);
    for _ in 0..4 {
        tick(&mut engine);
    }
    assert_eq!(engine.renderer().extent(), size);
    assert!(backend(&engine).in_flight_destructions().is_empty());
}

#[test]
fn consecutive_stale_acquires_skip_consecutive_slots() {
    let mut engine = engine(2);
    backend_mut(&mut engine).inject_stale_acquires(3);
    let outcomes: Vec<bool> = (0..4).map(|_| tick(&mut engine).outcome.is_presented()).collect();
    assert_eq!(outcomes, vec![false, false, false, true]);
    assert_eq!(backend(&engine).surface_generation(), 3);
}

// ============================================================================
// Fatal Errors and Shutdown
// ============================================================================

#[test]
fn sync_primitive_failure_is_fatal_at_construction() {
    let mut backend = HeadlessBackend::new(EXTENT);
    backend.fail_sync_creation();
    let result = Engine::with_clock(backend, ManualClock::new(), EngineSettings::default());
    assert!(matches!(result, Err(KairosError::SyncPrimitiveCreation { slot: 0, .. })));
}

#[test]
fn submit_failure_is_returned() {
    let mut engine = engine(2);
    tick(&mut engine);
    backend_mut(&mut engine).fail_next_submit();
    engine.clock_mut().advance(Duration::from_millis(16));

    let err = engine.tick().unwrap_err();
    assert!(matches!(err, KairosError::SubmitFailed { slot: 1, .. }));
    assert_eq!(err.category(), ErrorCategory::Submission);
}

#[test]
fn shutdown_releases_every_resource_and_primitive() {
    let mut engine = engine(2);
    let root = engine.scene().root();
    let image = Image::new("albedo", 8, 8, PixelFormat::Rgba8);
    let material = Material::builder("textured").texture(image).build();
    engine
        .scene_mut()
        .spawn(root, Node::with_kind("cube", NodeKind::MeshInstance(MeshInstance::new(Mesh::new("cube", [material])))))
        .unwrap();
    tick(&mut engine);
    tick(&mut engine);
    assert!(backend(&engine).live_resources() > 0);

    backend_mut(&mut engine).clear_events();
    engine.shutdown().unwrap();

    assert_eq!(backend(&engine).live_resources(), 0);
    assert_eq!(
        backend(&engine).events(),
        &[
            BackendEvent::WaitIdle,
            BackendEvent::DestroySync(FrameSlot(0)),
            BackendEvent::DestroySync(FrameSlot(1)),
        ]
    );
    for kind in ResourceKind::ALL {
        assert_eq!(backend(&engine).created_count(kind), backend(&engine).destroyed_count(kind), "{kind:?} leaked");
    }
}
