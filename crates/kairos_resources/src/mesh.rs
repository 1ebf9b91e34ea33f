use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::material::Material;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique mesh identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

#[derive(Debug)]
pub struct MeshInner {
    pub id: MeshId,
    name: Cow<'static, str>,
    /// One material per surface.
    pub materials: SmallVec<[Material; 2]>,
}

/// A drawable shape and the materials of its surfaces.
///
/// Geometry buffers belong to the asset pipeline; the runtime core only
/// tracks which materials a mesh references.
#[derive(Debug, Clone)]
pub struct Mesh(Arc<MeshInner>);

impl PartialEq for Mesh {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Mesh {}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, materials: impl IntoIterator<Item = Material>) -> Self {
        Self(Arc::new(MeshInner {
            id: MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            materials: materials.into_iter().collect(),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MeshId {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.0.materials
    }

    /// `true` when any surface material blends.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.0.materials.iter().any(Material::is_transparent)
    }
}
