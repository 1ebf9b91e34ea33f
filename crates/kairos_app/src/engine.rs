//! Engine
//!
//! [`Engine`] is the single context that owns everything the runtime core
//! touches: the scene, the per-slot mutation queues, the renderer, the timer
//! and the scheduler. Nothing is global; every subsystem is reached through
//! `&mut Engine`.
//!
//! # Tick
//!
//! ```text
//! delta = timer.tick()                  clamp to max_frame_delta
//! while a fixed step is due:
//!     on_ready for nodes that entered the scene
//!     simulation.advance(dt)
//!     on_physics_process(dt)            tree order, pause-filtered
//!     tweens
//! on_process(alpha)                     once, pause-filtered
//! publish scene mutations to every slot's queue
//! render the current slot               drains that slot's queue
//! advance to the next slot
//! ```
//!
//! The slot advances even when the frame is skipped for a stale surface:
//! its queue was drained, so the next drain must be the following slot's.

use kairos_core::{Clock, KairosError, Result, SystemClock, Timer};
use kairos_render::{
    FrameContext, FrameOutcome, FrameSlot, GpuBackend, MutationQueues, RenderChain, Renderer, default_chain,
};
use kairos_scene::{NodeHandle, Scene};

use crate::host::HostWindow;
use crate::scheduler::FixedStepScheduler;
use crate::settings::EngineSettings;
use crate::simulation::{NoSimulation, Simulation};

/// What one [`Engine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Fixed steps simulated.
    pub steps: u32,
    /// Interpolation factor handed to `on_process` and the renderer.
    pub alpha: f32,
    /// The wall-clock delta exceeded `max_frame_delta`.
    pub clamped: bool,
    /// Slot the frame was drawn on.
    pub slot: FrameSlot,
    /// Scene mutations published to the queues during this tick.
    pub mutations: usize,
    pub outcome: FrameOutcome,
}

pub struct Engine<B: GpuBackend, C: Clock = SystemClock> {
    scene: Scene,
    queues: MutationQueues,
    renderer: Renderer<B>,
    scheduler: FixedStepScheduler,
    timer: Timer<C>,
    simulation: Box<dyn Simulation>,
    paused: bool,
    slot: FrameSlot,
    simulated_time: f64,
    frames: u64,
}

impl<B: GpuBackend> Engine<B, SystemClock> {
    /// Engine on the system clock with the default render chain.
    pub fn new(backend: B, settings: EngineSettings) -> Result<Self> {
        Self::with_clock(backend, SystemClock::new(), settings)
    }
}

impl<B: GpuBackend, C: Clock> Engine<B, C> {
    pub fn with_clock(backend: B, clock: C, settings: EngineSettings) -> Result<Self> {
        let chain = default_chain(&settings.renderer);
        Self::with_chain(backend, clock, settings, chain)
    }

    /// Validates `settings` and provisions `chain` on `backend`.
    pub fn with_chain(backend: B, clock: C, settings: EngineSettings, chain: RenderChain) -> Result<Self> {
        settings.validate()?;
        let frames_in_flight = settings.renderer.frames_in_flight;
        let renderer = Renderer::new(backend, settings.renderer.clone(), chain)?;
        log::info!(
            "Engine started: dt = {:.4}s, {} frames in flight",
            settings.scheduler.fixed_step,
            frames_in_flight
        );
        Ok(Self {
            scene: Scene::new(),
            queues: MutationQueues::new(frames_in_flight),
            renderer,
            scheduler: FixedStepScheduler::new(settings.scheduler),
            timer: Timer::with_clock(clock),
            simulation: Box::new(NoSimulation),
            paused: settings.start_paused,
            slot: FrameSlot(0),
            simulated_time: 0.0,
            frames: 0,
        })
    }

    pub fn set_simulation(&mut self, simulation: impl Simulation + 'static) {
        self.simulation = Box::new(simulation);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    #[must_use]
    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    #[inline]
    #[must_use]
    pub fn queues(&self) -> &MutationQueues {
        &self.queues
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &FixedStepScheduler {
        &self.scheduler
    }

    #[inline]
    #[must_use]
    pub fn timer(&self) -> &Timer<C> {
        &self.timer
    }

    /// The clock, e.g. to advance a `ManualClock` between ticks.
    #[inline]
    pub fn clock_mut(&mut self) -> &mut C {
        self.timer.clock_mut()
    }

    /// Slot the next tick will draw on.
    #[inline]
    #[must_use]
    pub fn current_slot(&self) -> FrameSlot {
        self.slot
    }

    /// Simulated time in seconds. Does not advance while paused.
    #[inline]
    #[must_use]
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::debug!("Engine {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    // ========================================================================
    // Scene-facing operations
    // ========================================================================

    /// Asks every slot to switch to `camera` once it has drained its pending
    /// mutations, so a camera attached in the same tick is already known.
    pub fn activate_camera(&mut self, camera: NodeHandle) -> Result<()> {
        let node = self.scene.get(camera).ok_or_else(|| KairosError::InvalidNode(format!("{camera:?}")))?;
        if node.kind().as_camera().is_none() {
            return Err(KairosError::InvalidNode(format!("'{}' is not a camera", node.name())));
        }
        if !node.is_in_scene() {
            return Err(KairosError::InvalidNode(format!("camera '{}' is not in the scene", node.name())));
        }
        self.queues.request_camera(camera);
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Resize requested: {width}x{height}");
        self.renderer.resize(width, height);
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// One host iteration: fixed steps, the interpolated update and one frame.
    pub fn tick(&mut self) -> Result<TickReport> {
        let delta = self.timer.tick();
        let clamped = self.scheduler.accumulate(delta);
        if clamped {
            log::debug!("Frame delta {:.3}s clamped", delta.as_secs_f64());
        }

        let dt = self.scheduler.fixed_step_f32();
        let mut steps = 0;
        while self.scheduler.try_consume_step() {
            self.scene.dispatch_ready();
            if !self.paused {
                self.simulation.advance(&mut self.scene, dt)?;
                self.simulated_time += self.scheduler.fixed_step();
            }
            self.scene.physics_process(dt, self.paused);
            self.scene.update_tweens(dt, self.paused);
            steps += 1;
        }

        let alpha = self.scheduler.alpha();
        self.scene.process(alpha, self.paused);

        let mutations = self.publish_mutations();

        let slot = self.slot;
        let frame = FrameContext {
            scene: &self.scene,
            alpha,
            paused: self.paused,
            elapsed: self.simulated_time as f32,
            extent: self.renderer.extent(),
        };
        let outcome = self.renderer.render(slot, &mut self.queues, &frame)?;
        self.slot = slot.next(self.queues.frames_in_flight());
        self.frames += 1;

        Ok(TickReport { steps, alpha, clamped, slot, mutations, outcome })
    }

    /// Drives the engine until `host` asks to close. Returns the number of
    /// ticks run. A fatal error is logged and returned.
    pub fn run(&mut self, host: &mut impl HostWindow) -> Result<u64> {
        log::info!("Engine loop running");
        let mut ticks = 0;
        while !host.should_close() {
            if let Some(extent) = host.take_resize() {
                self.resize(extent.width, extent.height);
            }
            match self.tick() {
                Ok(report) => host.frame_finished(&report),
                Err(err) => {
                    log::error!("Fatal {} error: {err}", err.category());
                    return Err(err);
                }
            }
            ticks += 1;
        }
        log::info!("Engine loop stopped after {ticks} ticks");
        Ok(ticks)
    }

    /// Waits for the GPU and releases every render resource.
    pub fn shutdown(&mut self) -> Result<()> {
        self.renderer.shutdown()?;
        self.queues.clear();
        log::info!("Engine shut down after {} frames", self.frames);
        Ok(())
    }

    fn publish_mutations(&mut self) -> usize {
        let mutations = self.scene.take_mutations();
        let count = mutations.len();
        if count > 0 {
            log::trace!("Publishing {count} scene mutations to every frame slot");
            self.queues.publish_all(mutations);
        }
        count
    }
}
