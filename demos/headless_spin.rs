//! Headless Spin Demo
//!
//! Runs the engine for a few seconds of simulated time on the CPU-only
//! backend: a spinning cube lit by a point light, a tween sliding it
//! sideways, a pause halfway through and a window resize along the way.
//!
//! Run with `RUST_LOG=debug cargo run --example headless_spin` to watch the
//! frame slots cycle and the surface get recreated.

use kairos::prelude::*;
use kairos::scene::PropertyTween;
use kairos::scene::tween::set_position;

/// Spins its node around Y. The angle advances per simulation step and the
/// displayed rotation blends the last two steps.
struct Spin {
    speed: f32,
    angle: f32,
    rotation: Interpolated<Quat>,
}

impl Spin {
    fn new(speed: f32) -> Self {
        Self { speed, angle: 0.0, rotation: Interpolated::new(Quat::IDENTITY) }
    }
}

impl NodeScript for Spin {
    fn on_ready(&mut self, ctx: &mut ScriptContext<'_>) {
        let name = ctx.scene.get(ctx.node).map_or("?", Node::name);
        log::info!("'{name}' is ready");
    }

    fn on_physics_process(&mut self, _ctx: &mut ScriptContext<'_>, dt: f32) {
        self.angle = (self.angle + self.speed * dt) % std::f32::consts::TAU;
        self.rotation.push(Quat::from_rotation_y(self.angle));
    }

    fn on_process(&mut self, ctx: &mut ScriptContext<'_>, alpha: f32) {
        if let Err(err) = ctx.scene.set_rotation(ctx.node, self.rotation.interpolate(alpha)) {
            log::warn!("spin: {err}");
        }
    }
}

/// Only ticks while the engine is paused.
#[derive(Default)]
struct PauseClock {
    paused_for: f32,
}

impl NodeScript for PauseClock {
    fn on_physics_process(&mut self, _ctx: &mut ScriptContext<'_>, dt: f32) {
        self.paused_for += dt;
        log::debug!("paused for {:.2}s", self.paused_for);
    }
}

fn build_scene(scene: &mut Scene) -> anyhow::Result<NodeHandle> {
    let root = scene.root();

    let camera = scene.spawn(
        root,
        Node::with_kind("Camera", NodeKind::Camera(Camera::default()))
            .with_transform(Transform::from_translation(Vec3::new(0.0, 1.5, 6.0))),
    )?;
    scene.spawn(root, Node::with_kind("Sun", NodeKind::Light(Light::new_directional(Vec3::ONE, 2.0))))?;
    scene.spawn(
        root,
        Node::with_kind("Lamp", NodeKind::Light(Light::new_point(Vec3::new(1.0, 0.8, 0.6), 5.0, 10.0)))
            .with_transform(Transform::from_translation(Vec3::new(2.0, 3.0, 2.0))),
    )?;
    scene.spawn(root, Node::with_kind("Environment", NodeKind::Environment(Environment::default())))?;

    let checker = Image::new("Checker", 256, 256, PixelFormat::Rgba8Srgb);
    let crate_material = Material::builder("Crate").texture(checker).build();
    let glass = Material::builder("Glass")
        .base_color(Vec4::new(0.6, 0.8, 1.0, 0.4))
        .alpha_mode(AlphaMode::Blend)
        .build();

    let cube = scene.spawn(
        root,
        Node::with_kind("Cube", NodeKind::MeshInstance(MeshInstance::new(Mesh::new("Cube", [crate_material]))))
            .with_script(Spin::new(1.5)),
    )?;
    scene.spawn(
        cube,
        Node::with_kind("Shell", NodeKind::MeshInstance(MeshInstance::new(Mesh::new("Shell", [glass])))),
    )?;
    scene.add_tween(PropertyTween::new(cube, set_position, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 2.0));

    scene.spawn(
        root,
        Node::new("Pause Clock")
            .with_process_mode(ProcessMode::WhenPaused)
            .with_script(PauseClock::default()),
    )?;

    Ok(camera)
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let mut engine = Engine::with_clock(
        HeadlessBackend::new(Extent2d::new(1280, 720)),
        ManualClock::new(),
        EngineSettings::default(),
    )?;
    let camera = build_scene(engine.scene_mut())?;
    engine.activate_camera(camera)?;

    let mut host = HeadlessHost::new(240).with_resize_at(90, Extent2d::new(1920, 1080));
    while !host.should_close() {
        if let Some(extent) = host.take_resize() {
            engine.resize(extent.width, extent.height);
        }
        engine.clock_mut().advance_secs(1.0 / 60.0);
        let report = engine.tick()?;
        host.frame_finished(&report);

        match engine.frame_count() {
            60 => engine.set_paused(true),
            120 => engine.set_paused(false),
            _ => {}
        }
    }

    log::info!(
        "{} frames: {} presented, {} skipped, {:.2}s simulated",
        host.frames(),
        host.presented(),
        host.skipped(),
        engine.simulated_time()
    );
    for slot in 0..engine.renderer().frames_in_flight() {
        if let Some(stats) = engine.renderer().stats(FrameSlot(slot)) {
            log::info!("slot {slot}: {stats:?}");
        }
    }

    engine.shutdown()?;
    Ok(())
}
