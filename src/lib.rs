//! # Kairos
//!
//! A runtime core for real-time 3D engines: a fixed-step scheduler with
//! interpolation, a scene graph with process modes, per-frame-slot deferred
//! mutation queues, and a frame synchronizer that keeps `F` frames in flight
//! through a chain of render passes.
//!
//! This crate re-exports the workspace members:
//!
//! - [`core`]: errors, clocks and interpolation
//! - [`resources`]: images, materials and meshes
//! - [`scene`]: nodes, the scene graph, scripts and tweens
//! - [`render`]: the frame synchronizer, render chain and GPU backends
//! - [`app`]: the scheduler, the engine context and host collaborators
//!
//! ```rust,ignore
//! use kairos::prelude::*;
//!
//! let backend = HeadlessBackend::new(Extent2d::new(1280, 720));
//! let mut engine = Engine::new(backend, EngineSettings::default())?;
//! let root = engine.scene().root();
//! engine.scene_mut().spawn(root, Node::with_kind("Camera", NodeKind::Camera(Camera::default())))?;
//! engine.run(&mut HeadlessHost::new(120))?;
//! engine.shutdown()?;
//! ```

pub use kairos_app as app;
pub use kairos_core as core;
pub use kairos_render as render;
pub use kairos_resources as resources;
pub use kairos_scene as scene;

pub use kairos_app::{Engine, EngineSettings, SchedulerSettings, TickReport};
pub use kairos_core::{KairosError, Result};

pub mod prelude {
    pub use glam::{Affine3A, Quat, Vec3, Vec4};

    pub use kairos_app::{
        Engine, EngineSettings, FixedStepScheduler, HeadlessHost, HostWindow, SchedulerSettings, Simulation,
        TickReport, init_logger,
    };
    pub use kairos_core::{Interpolated, KairosError, ManualClock, Result, SystemClock};
    pub use kairos_render::{
        Extent2d, FrameOutcome, FrameSlot, GpuBackend, HeadlessBackend, RenderChain, RenderPass, Renderer,
        RendererSettings, SceneLimits,
    };
    pub use kairos_resources::{AlphaMode, Image, Material, Mesh, PixelFormat};
    pub use kairos_scene::{
        Camera, Environment, Light, MeshInstance, Node, NodeHandle, NodeKind, NodeScript, ProcessMode, Scene,
        ScriptContext, Skybox, Transform, Viewport,
    };

    #[cfg(feature = "wgpu")]
    pub use kairos_render::WgpuBackend;
}
