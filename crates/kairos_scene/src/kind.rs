//! Node capability tag.
//!
//! Every node carries exactly one [`NodeKind`]. The renderer classifies
//! attached and detached nodes with a single `match` on it instead of probing
//! for component types.

use kairos_resources::Mesh;

use crate::camera::Camera;
use crate::environment::{Environment, Skybox, Viewport};
use crate::light::Light;

/// A drawable instance of a shared mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub mesh: Mesh,
}

impl MeshInstance {
    #[must_use]
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh }
    }
}

/// What a node is, for the renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeKind {
    /// Grouping / transform-only node.
    #[default]
    Plain,
    Camera(Camera),
    MeshInstance(MeshInstance),
    Viewport(Viewport),
    Light(Light),
    Environment(Environment),
    Skybox(Skybox),
}

/// Fieldless mirror of [`NodeKind`] for logging and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Plain,
    Camera,
    MeshInstance,
    Viewport,
    Light,
    Environment,
    Skybox,
}

impl NodeKind {
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            Self::Plain => Capability::Plain,
            Self::Camera(_) => Capability::Camera,
            Self::MeshInstance(_) => Capability::MeshInstance,
            Self::Viewport(_) => Capability::Viewport,
            Self::Light(_) => Capability::Light,
            Self::Environment(_) => Capability::Environment,
            Self::Skybox(_) => Capability::Skybox,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            Self::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Self::Light(light) => Some(light),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_mesh_instance(&self) -> Option<&MeshInstance> {
        match self {
            Self::MeshInstance(instance) => Some(instance),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_environment(&self) -> Option<&Environment> {
        match self {
            Self::Environment(env) => Some(env),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_viewport(&self) -> Option<&Viewport> {
        match self {
            Self::Viewport(viewport) => Some(viewport),
            _ => None,
        }
    }
}
