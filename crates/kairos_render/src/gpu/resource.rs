//! GPU Resource Descriptions
//!
//! Backend-neutral descriptions of everything a render pass can ask a
//! [`GpuDevice`](super::GpuDevice) to create. A backend turns each
//! [`ResourceDesc`] into its native object and hands back an opaque
//! [`ResourceHandle`]; the owner label passed alongside is kept for
//! diagnostics and leak accounting.

use std::borrow::Cow;

use bitflags::bitflags;

use super::Extent2d;

slotmap::new_key_type! {
    /// Opaque handle to a backend-owned GPU object.
    pub struct ResourceHandle;
}

/// Category of a GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Buffer,
    Image,
    BindingLayout,
    BindingTable,
    PipelineLayout,
    Shader,
    Pipeline,
}

impl ResourceKind {
    pub const ALL: [Self; 7] = [
        Self::Buffer,
        Self::Image,
        Self::BindingLayout,
        Self::BindingTable,
        Self::PipelineLayout,
        Self::Shader,
        Self::Pipeline,
    ];
}

bitflags! {
    /// How a buffer or image will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceUsage: u32 {
        const UNIFORM      = 1 << 0;
        const STORAGE      = 1 << 1;
        const COPY_SRC     = 1 << 2;
        const COPY_DST     = 1 << 3;
        const SAMPLED      = 1 << 4;
        const COLOR_TARGET = 1 << 5;
        const DEPTH_TARGET = 1 << 6;
    }
}

/// Texel format of a GPU image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Depth32Float,
    /// Whatever format the presentable surface is configured with.
    Surface,
}

impl ImageFormat {
    #[inline]
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Bytes per texel; `None` for the backend-chosen surface format.
    #[must_use]
    pub fn texel_size(self) -> Option<u32> {
        match self {
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Depth32Float => Some(4),
            Self::Rgba16Float => Some(8),
            Self::Surface => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    pub label: Cow<'static, str>,
    pub size: u64,
    pub usage: ResourceUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    pub label: Cow<'static, str>,
    pub extent: Extent2d,
    pub format: ImageFormat,
    pub usage: ResourceUsage,
}

/// One entry of a binding layout. The binding index is the entry's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    /// Fixed-length array of sampled images.
    SampledImageArray { count: u32 },
    Sampler,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingLayoutDesc {
    pub label: Cow<'static, str>,
    pub entries: Vec<BindingKind>,
}

/// A resource plugged into one binding-layout entry.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundResource {
    Buffer(ResourceHandle),
    Image(ResourceHandle),
    ImageArray(Vec<ResourceHandle>),
    /// The backend's shared linear sampler.
    Sampler,
}

impl BoundResource {
    /// Whether this resource can fill an entry of the given kind.
    #[must_use]
    pub fn matches(&self, kind: BindingKind) -> bool {
        match (self, kind) {
            (Self::Buffer(_), BindingKind::UniformBuffer | BindingKind::StorageBuffer)
            | (Self::Image(_), BindingKind::SampledImage)
            | (Self::Sampler, BindingKind::Sampler) => true,
            (Self::ImageArray(images), BindingKind::SampledImageArray { count }) => images.len() == count as usize,
            _ => false,
        }
    }

    /// Handles referenced by this binding.
    pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        let (single, many): (Option<ResourceHandle>, &[ResourceHandle]) = match self {
            Self::Buffer(h) | Self::Image(h) => (Some(*h), &[]),
            Self::ImageArray(images) => (None, images.as_slice()),
            Self::Sampler => (None, &[]),
        };
        single.into_iter().chain(many.iter().copied())
    }
}

/// A binding-table instance: concrete resources for every layout entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTableDesc {
    pub label: Cow<'static, str>,
    pub layout: ResourceHandle,
    pub resources: Vec<BoundResource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineLayoutDesc {
    pub label: Cow<'static, str>,
    pub binding_layouts: Vec<ResourceHandle>,
}

/// A WGSL module exposing `vs_main` and `fs_main`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDesc {
    pub label: Cow<'static, str>,
    pub source: Cow<'static, str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub label: Cow<'static, str>,
    pub layout: ResourceHandle,
    pub shader: ResourceHandle,
    pub color_format: ImageFormat,
    pub depth_format: Option<ImageFormat>,
    /// Premultiplied-alpha blending and no depth writes.
    pub alpha_blend: bool,
}

/// Anything a pass can create through [`GpuDevice`](super::GpuDevice).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDesc {
    Buffer(BufferDesc),
    Image(ImageDesc),
    BindingLayout(BindingLayoutDesc),
    BindingTable(BindingTableDesc),
    PipelineLayout(PipelineLayoutDesc),
    Shader(ShaderDesc),
    Pipeline(PipelineDesc),
}

impl ResourceDesc {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Image(_) => ResourceKind::Image,
            Self::BindingLayout(_) => ResourceKind::BindingLayout,
            Self::BindingTable(_) => ResourceKind::BindingTable,
            Self::PipelineLayout(_) => ResourceKind::PipelineLayout,
            Self::Shader(_) => ResourceKind::Shader,
            Self::Pipeline(_) => ResourceKind::Pipeline,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Buffer(d) => &d.label,
            Self::Image(d) => &d.label,
            Self::BindingLayout(d) => &d.label,
            Self::BindingTable(d) => &d.label,
            Self::PipelineLayout(d) => &d.label,
            Self::Shader(d) => &d.label,
            Self::Pipeline(d) => &d.label,
        }
    }
}
