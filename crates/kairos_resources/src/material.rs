use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;
use smallvec::SmallVec;

use crate::image::Image;

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique material identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

/// How a material combines with what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
}

#[derive(Debug)]
pub struct MaterialInner {
    pub id: MaterialId,
    name: Cow<'static, str>,
    pub base_color: Vec4,
    pub alpha_mode: AlphaMode,
    pub textures: SmallVec<[Image; 4]>,
}

/// A shared, immutable material.
///
/// The renderer reference-counts materials by id and, through them, the
/// images they sample.
#[derive(Debug, Clone)]
pub struct Material(Arc<MaterialInner>);

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Material {}
impl std::hash::Hash for Material {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Material {
    /// Starts building a material.
    #[must_use]
    pub fn builder(name: impl Into<Cow<'static, str>>) -> MaterialBuilder {
        MaterialBuilder {
            name: name.into(),
            base_color: Vec4::ONE,
            alpha_mode: AlphaMode::Opaque,
            textures: SmallVec::new(),
        }
    }

    /// An untextured opaque material.
    #[must_use]
    pub fn color(name: impl Into<Cow<'static, str>>, base_color: Vec4) -> Self {
        Self::builder(name).base_color(base_color).build()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MaterialId {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    #[must_use]
    pub fn base_color(&self) -> Vec4 {
        self.0.base_color
    }

    #[inline]
    #[must_use]
    pub fn alpha_mode(&self) -> AlphaMode {
        self.0.alpha_mode
    }

    #[inline]
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.0.alpha_mode == AlphaMode::Blend
    }

    /// Images sampled by this material.
    #[inline]
    #[must_use]
    pub fn textures(&self) -> &[Image] {
        &self.0.textures
    }
}

/// Builder for [`Material`].
#[derive(Debug, Clone)]
pub struct MaterialBuilder {
    name: Cow<'static, str>,
    base_color: Vec4,
    alpha_mode: AlphaMode,
    textures: SmallVec<[Image; 4]>,
}

impl MaterialBuilder {
    #[must_use]
    pub fn base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    #[must_use]
    pub fn alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.alpha_mode = mode;
        self
    }

    /// Adds a sampled image. The same image is only kept once.
    #[must_use]
    pub fn texture(mut self, image: Image) -> Self {
        if !self.textures.contains(&image) {
            self.textures.push(image);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Material {
        Material(Arc::new(MaterialInner {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
            name: self.name,
            base_color: self.base_color,
            alpha_mode: self.alpha_mode,
            textures: self.textures,
        }))
    }
}
