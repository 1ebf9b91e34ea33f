//! Scene graph: node arena, hierarchy, transforms, process modes, scripts
//! and the attach/detach mutation outbox consumed by the renderer.

pub mod camera;
pub mod environment;
pub mod kind;
pub mod light;
pub mod mutation;
pub mod node;
pub mod process;
pub mod scene;
pub mod script;
pub mod transform;
pub mod transform_system;
pub mod tween;

slotmap::new_key_type! {
    /// Generational handle to a node in a [`Scene`].
    pub struct NodeHandle;
}

pub use camera::{Camera, Projection};
pub use environment::{Environment, Skybox, Viewport};
pub use kind::{Capability, MeshInstance, NodeKind};
pub use light::{Light, LightKind, PointLight, SpotLight};
pub use mutation::{MutationOp, SceneMutation};
pub use node::{Node, NodeId};
pub use process::ProcessMode;
pub use scene::Scene;
pub use script::{NodeScript, ScriptContext};
pub use transform::Transform;
pub use tween::{PropertySetter, PropertyTween, Tween};
