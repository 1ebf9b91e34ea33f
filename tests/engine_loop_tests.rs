//! Engine Loop Integration Tests
//!
//! Tests for:
//! - Fixed-step scheduling driven by a manual clock
//! - Callback ordering: on_ready, on_physics_process, on_process
//! - Pause semantics for process modes, tweens and the simulation hook
//! - Frame slot cycling, host-driven runs and fatal errors

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kairos::prelude::*;
use kairos::scene::PropertyTween;
use kairos::scene::tween::set_position;

type TestEngine = Engine<HeadlessBackend, ManualClock>;
type CallLog = Rc<RefCell<Vec<String>>>;

fn settings(fixed_step: f64) -> EngineSettings {
    EngineSettings {
        scheduler: SchedulerSettings { fixed_step, max_frame_delta: 0.5, max_steps_per_tick: None },
        ..Default::default()
    }
}

fn engine_with(settings: EngineSettings) -> TestEngine {
    Engine::with_clock(HeadlessBackend::new(Extent2d::new(320, 240)), ManualClock::new(), settings).unwrap()
}

fn engine() -> TestEngine {
    engine_with(settings(0.125))
}

fn tick_after(engine: &mut TestEngine, millis: u64) -> TickReport {
    engine.clock_mut().advance(Duration::from_millis(millis));
    engine.tick().unwrap()
}

/// Appends `"<name>:<callback>"` for every callback it receives.
struct Recorder {
    name: &'static str,
    log: CallLog,
}

impl Recorder {
    fn node(name: &'static str, log: &CallLog) -> Node {
        Node::new(name).with_script(Recorder { name, log: log.clone() })
    }

    fn push(&self, callback: &str) {
        self.log.borrow_mut().push(format!("{}:{callback}", self.name));
    }
}

impl NodeScript for Recorder {
    fn on_ready(&mut self, _ctx: &mut ScriptContext<'_>) {
        self.push("ready");
    }

    fn on_physics_process(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) {
        self.push("physics");
    }

    fn on_process(&mut self, _ctx: &mut ScriptContext<'_>, _alpha: f32) {
        self.push("process");
    }
}

/// `(previous, current, displayed)` as seen by `on_process`.
type Samples = Rc<RefCell<Vec<(f32, f32, f32)>>>;

/// Moves along X at `speed` units per second in fixed steps and displays the
/// blend of the last two steps.
struct Glide {
    speed: f32,
    x: Interpolated<f32>,
    samples: Samples,
}

impl NodeScript for Glide {
    fn on_physics_process(&mut self, _ctx: &mut ScriptContext<'_>, dt: f32) {
        self.x.push(self.x.current() + self.speed * dt);
    }

    fn on_process(&mut self, ctx: &mut ScriptContext<'_>, alpha: f32) {
        let shown = self.x.interpolate(alpha);
        ctx.scene.set_position(ctx.node, Vec3::new(shown, 0.0, 0.0)).unwrap();
        self.samples.borrow_mut().push((self.x.previous(), self.x.current(), shown));
    }
}

fn take(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

// ============================================================================
// Fixed-Step Scheduling
// ============================================================================

#[test]
fn tick_runs_whole_steps_and_reports_remainder_as_alpha() {
    let mut engine = engine();

    let report = tick_after(&mut engine, 300);
    assert_eq!(report.steps, 2);
    assert!(!report.clamped);
    assert!((report.alpha - 0.4).abs() < 1e-4);

    let report = tick_after(&mut engine, 50);
    assert_eq!(report.steps, 0);
    assert!((report.alpha - 0.8).abs() < 1e-4);

    let report = tick_after(&mut engine, 50);
    assert_eq!(report.steps, 1);
    assert!((report.alpha - 0.2).abs() < 1e-4);
}

#[test]
fn zero_delta_runs_no_step() {
    let mut engine = engine();
    let report = engine.tick().unwrap();
    assert_eq!(report.steps, 0);
    assert_eq!(report.alpha, 0.0);
    assert!(report.outcome.is_presented());
}

#[test]
fn long_frame_is_clamped_to_max_frame_delta() {
    let mut engine = engine();
    let report = tick_after(&mut engine, 2_000);
    assert!(report.clamped);
    assert_eq!(report.steps, 4);
    assert!(engine.scheduler().dropped_time() >= 1.5 - 1e-9);
}

#[test]
fn simulated_time_advances_by_fixed_steps() {
    let mut engine = engine();
    for _ in 0..4 {
        tick_after(&mut engine, 250);
    }
    assert_eq!(engine.scheduler().total_steps(), 8);
    assert!((engine.simulated_time() - 1.0).abs() < 1e-9);
}

// ============================================================================
// Callback Ordering
// ============================================================================

#[test]
fn ready_precedes_physics_and_process_runs_once_per_tick() {
    let log = CallLog::default();
    let mut engine = engine();
    let root = engine.scene().root();
    let a = engine.scene_mut().spawn(root, Recorder::node("a", &log)).unwrap();
    engine.scene_mut().spawn(a, Recorder::node("b", &log)).unwrap();

    tick_after(&mut engine, 250);
    assert_eq!(
        take(&log),
        vec![
            "a:ready", "b:ready", "a:physics", "b:physics", "a:physics", "b:physics", "a:process", "b:process"
        ]
    );

    // No step due: only the interpolated update runs.
    tick_after(&mut engine, 10);
    assert_eq!(take(&log), vec!["a:process", "b:process"]);
}

#[test]
fn displayed_state_blends_the_last_two_steps_by_alpha() {
    let mut engine = engine();
    let samples = Samples::default();
    let root = engine.scene().root();
    let node = engine
        .scene_mut()
        .spawn(
            root,
            Node::new("glider").with_script(Glide { speed: 1.0, x: Interpolated::new(0.0), samples: samples.clone() }),
        )
        .unwrap();

    // 2 steps of 0.125s, alpha 0.4
    tick_after(&mut engine, 300);
    let (previous, current, shown) = samples.borrow()[0];
    assert!((previous - 0.125).abs() < 1e-6);
    assert!((current - 0.25).abs() < 1e-6);
    assert!((shown - 0.175).abs() < 1e-4);
    let world_x = engine.scene().world_transform(node).unwrap().translation.x;
    assert!((world_x - shown).abs() < 1e-6);

    for millis in [50, 50, 16, 90, 125] {
        tick_after(&mut engine, millis);
    }
    let samples = samples.borrow();
    assert_eq!(samples.len(), 6);
    for window in samples.windows(2) {
        assert!(window[1].2 >= window[0].2 - 1e-6, "displayed value went backwards: {window:?}");
    }
    for &(previous, current, shown) in samples.iter() {
        assert!(previous - 1e-6 <= shown && shown <= current + 1e-6, "{shown} outside [{previous}, {current}]");
    }
}

#[test]
fn detached_nodes_receive_no_callbacks() {
    let log = CallLog::default();
    let mut engine = engine();
    let orphan = engine.scene_mut().insert(Recorder::node("orphan", &log));

    tick_after(&mut engine, 125);
    assert!(take(&log).is_empty());

    let root = engine.scene().root();
    engine.scene_mut().add_child(root, orphan).unwrap();
    tick_after(&mut engine, 125);
    assert_eq!(take(&log), vec!["orphan:ready", "orphan:physics", "orphan:process"]);
}

#[test]
fn simulation_runs_before_physics_callbacks() {
    let log = CallLog::default();
    let mut engine = engine();
    let root = engine.scene().root();
    engine.scene_mut().spawn(root, Recorder::node("n", &log)).unwrap();

    let sim_log = log.clone();
    engine.set_simulation(move |_scene: &mut Scene, dt: f32| {
        sim_log.borrow_mut().push(format!("sim:{dt}"));
        Ok(())
    });

    tick_after(&mut engine, 125);
    assert_eq!(take(&log), vec!["n:ready", "sim:0.125", "n:physics", "n:process"]);
}

#[test]
fn simulation_error_aborts_the_tick() {
    let mut engine = engine();
    engine.set_simulation(|_: &mut Scene, _: f32| Err(KairosError::InvalidConfig("solver diverged".into())));
    engine.clock_mut().advance(Duration::from_millis(125));
    assert!(matches!(engine.tick(), Err(KairosError::InvalidConfig(_))));
}

// ============================================================================
// Pause
// ============================================================================

#[test]
fn pause_filters_callbacks_by_process_mode() {
    let log = CallLog::default();
    let mut engine = engine();
    let root = engine.scene().root();
    let scene = engine.scene_mut();
    scene.spawn(root, Recorder::node("pausable", &log)).unwrap();
    scene
        .spawn(root, Recorder::node("menu", &log).with_process_mode(ProcessMode::WhenPaused))
        .unwrap();
    let hud = scene
        .spawn(root, Recorder::node("hud", &log).with_process_mode(ProcessMode::Always))
        .unwrap();
    scene
        .spawn(hud, Recorder::node("hud_child", &log))
        .unwrap();
    scene
        .spawn(root, Recorder::node("off", &log).with_process_mode(ProcessMode::Disabled))
        .unwrap();

    tick_after(&mut engine, 125);
    let calls = take(&log);
    assert!(calls.contains(&"pausable:physics".to_string()));
    assert!(calls.contains(&"hud_child:physics".to_string()));
    assert!(!calls.contains(&"menu:physics".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("off:physics") || c.starts_with("off:process")));

    engine.set_paused(true);
    tick_after(&mut engine, 125);
    let calls = take(&log);
    assert_eq!(
        calls,
        vec!["menu:physics", "hud:physics", "hud_child:physics", "menu:process", "hud:process", "hud_child:process"]
    );
}

#[test]
fn pause_freezes_simulation_and_tweens() {
    let mut engine = engine();
    let root = engine.scene().root();
    let node = engine.scene_mut().spawn(root, Node::new("slider")).unwrap();
    engine
        .scene_mut()
        .add_tween(PropertyTween::new(node, set_position, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 0.5));

    let steps = Rc::new(RefCell::new(0_u32));
    let counter = steps.clone();
    engine.set_simulation(move |_: &mut Scene, _: f32| {
        *counter.borrow_mut() += 1;
        Ok(())
    });

    engine.set_paused(true);
    let report = tick_after(&mut engine, 250);
    assert_eq!(report.steps, 2);
    assert_eq!(*steps.borrow(), 0);
    assert_eq!(engine.simulated_time(), 0.0);
    assert_eq!(engine.scene().get(node).unwrap().transform().position(), Vec3::ZERO);
    assert_eq!(engine.scene().active_tweens(), 1);

    engine.set_paused(false);
    tick_after(&mut engine, 125);
    assert_eq!(*steps.borrow(), 1);
    let position = engine.scene().get(node).unwrap().transform().position();
    assert!((position.x - 1.0).abs() < 1e-5);
}

#[test]
fn start_paused_setting_is_honoured() {
    let engine = engine_with(EngineSettings { start_paused: true, ..settings(0.125) });
    assert!(engine.is_paused());
}

// ============================================================================
// Frame Slots
// ============================================================================

#[test]
fn slot_advances_every_tick_even_when_the_frame_is_skipped() {
    let mut engine = engine();
    let mut slots = Vec::new();
    for i in 0..5 {
        if i == 1 {
            engine.renderer_mut().backend_mut().inject_stale_acquires(1);
        }
        let report = tick_after(&mut engine, 16);
        slots.push((report.slot.index(), report.outcome.is_presented()));
    }
    assert_eq!(slots, vec![(0, true), (1, false), (0, true), (1, true), (0, true)]);
    assert_eq!(engine.current_slot(), FrameSlot(1));
}

#[test]
fn tick_report_counts_published_mutations() {
    let mut engine = engine();
    let root = engine.scene().root();
    let parent = engine.scene_mut().spawn(root, Node::new("parent")).unwrap();
    engine.scene_mut().spawn(parent, Node::new("child")).unwrap();

    assert_eq!(tick_after(&mut engine, 16).mutations, 2);
    assert_eq!(tick_after(&mut engine, 16).mutations, 0);

    engine.scene_mut().detach(parent).unwrap();
    assert_eq!(tick_after(&mut engine, 16).mutations, 2);
}

#[test]
fn activate_camera_rejects_non_cameras_and_detached_cameras() {
    let mut engine = engine();
    let root = engine.scene().root();
    let plain = engine.scene_mut().spawn(root, Node::new("plain")).unwrap();
    let loose = engine
        .scene_mut()
        .create_node_with_kind("loose", NodeKind::Camera(Camera::default()));

    assert!(matches!(engine.activate_camera(plain), Err(KairosError::InvalidNode(_))));
    assert!(matches!(engine.activate_camera(loose), Err(KairosError::InvalidNode(_))));

    engine.scene_mut().add_child(root, loose).unwrap();
    assert!(engine.activate_camera(loose).is_ok());
}

// ============================================================================
// Host-Driven Runs
// ============================================================================

#[test]
fn run_stops_when_the_host_closes() {
    let mut engine = Engine::new(HeadlessBackend::new(Extent2d::new(64, 64)), EngineSettings::default()).unwrap();
    let mut host = HeadlessHost::new(6);
    assert_eq!(engine.run(&mut host).unwrap(), 6);
    assert_eq!(host.frames(), 6);
    assert_eq!(host.presented(), 6);
    assert_eq!(engine.frame_count(), 6);
}

#[test]
fn host_resize_skips_one_frame_and_recreates_the_surface() {
    let mut engine = engine();
    let mut host = HeadlessHost::new(5).with_resize_at(2, Extent2d::new(800, 600));
    engine.run(&mut host).unwrap();

    assert_eq!(host.presented(), 4);
    assert_eq!(host.skipped(), 1);
    assert_eq!(engine.renderer().extent(), Extent2d::new(800, 600));
}

#[test]
fn run_returns_fatal_errors() {
    let mut engine = engine();
    engine.renderer_mut().backend_mut().fail_next_submit();
    let mut host = HeadlessHost::new(3);

    let err = engine.run(&mut host).unwrap_err();
    assert!(matches!(err, KairosError::SubmitFailed { slot: 0, .. }));
    assert_eq!(host.frames(), 0);
}

#[test]
fn invalid_settings_are_rejected_before_any_gpu_work() {
    let bad = EngineSettings {
        scheduler: SchedulerSettings { fixed_step: 0.0, ..Default::default() },
        ..Default::default()
    };
    let result = Engine::with_clock(HeadlessBackend::new(Extent2d::new(8, 8)), ManualClock::new(), bad);
    assert!(matches!(result, Err(KairosError::InvalidConfig(_))));
}
