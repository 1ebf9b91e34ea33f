//! # Kairos App
//!
//! The top of the runtime core: the [`FixedStepScheduler`], the [`Engine`]
//! context that ties the scene to the renderer, and the collaborator traits
//! for hosts and simulations.

pub mod engine;
pub mod host;
pub mod logging;
pub mod scheduler;
pub mod settings;
pub mod simulation;

pub use engine::{Engine, TickReport};
pub use host::{HeadlessHost, HostWindow};
pub use logging::init_logger;
pub use scheduler::FixedStepScheduler;
pub use settings::{EngineSettings, SchedulerSettings};
pub use simulation::{NoSimulation, Simulation};
