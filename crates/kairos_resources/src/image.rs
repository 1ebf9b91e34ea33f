use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// Global Image ID generator
static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique image identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

/// Pixel layout of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Rgba8Srgb,
    Rgba16Float,
}

#[derive(Debug)]
pub struct ImageInner {
    pub id: ImageId,
    label: Cow<'static, str>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// A shared, immutable image description.
///
/// Clones share the same identity; equality and hashing use the id only.
/// Pixel data lives with the asset loader, the renderer only needs the
/// identity and the dimensions to allocate GPU storage.
#[derive(Debug, Clone)]
pub struct Image(Arc<ImageInner>);

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Image {}
impl std::hash::Hash for Image {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Image {
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self(Arc::new(ImageInner {
            id: ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)),
            label: label.into(),
            width: width.max(1),
            height: height.max(1),
            format,
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ImageId {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.0.width, self.0.height)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.0.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Image::new("albedo", 256, 256, PixelFormat::Rgba8Srgb);
        let b = a.clone();
        let c = Image::new("albedo", 256, 256, PixelFormat::Rgba8Srgb);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_sized_images_are_clamped() {
        let img = Image::new("empty", 0, 0, PixelFormat::Rgba8);
        assert_eq!(img.size(), (1, 1));
    }
}
