//! Fixed-capacity, reference-counted index tables.
//!
//! Scene passes address shared resources (materials, images, models) by a
//! small integer index into a GPU array. [`RefCountedTable`] hands out those
//! indices, reuses freed ones, and refuses to grow past its capacity.

use kairos_core::{KairosError, Result};
use rustc_hash::FxHashMap;

use crate::gpu::{GpuDevice, ImageDesc, ImageFormat, ResourceDesc, ResourceHandle, ResourceUsage};
use kairos_resources::{Image, PixelFormat};

#[derive(Debug, Clone)]
struct TableEntry<T> {
    value: T,
    index: u32,
    refs: u32,
}

/// Outcome of [`RefCountedTable::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub index: u32,
    /// This was the first reference; the entry was just inserted.
    pub first: bool,
}

/// Outcome of [`RefCountedTable::release`].
#[derive(Debug, Clone, PartialEq)]
pub struct Released<T> {
    pub index: u32,
    /// The entry was dropped from the table, carrying its value.
    pub last: Option<T>,
}

#[derive(Debug, Clone)]
pub struct RefCountedTable<T> {
    name: &'static str,
    entries: FxHashMap<u64, TableEntry<T>>,
    free: Vec<u32>,
    next_index: u32,
    capacity: usize,
}

impl<T: Clone> RefCountedTable<T> {
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            entries: FxHashMap::default(),
            free: Vec::new(),
            next_index: 0,
            capacity,
        }
    }

    /// Adds a reference to `key`, inserting `value` on the first one.
    pub fn acquire(&mut self, key: u64, value: &T) -> Result<Acquired> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refs += 1;
            return Ok(Acquired { index: entry.index, first: false });
        }

        if self.entries.len() >= self.capacity {
            return Err(KairosError::ResourceLimitExceeded { table: self.name, max: self.capacity });
        }
        // Lowest free index first keeps the GPU arrays dense.
        let index = if let Some(position) = self.free.iter().enumerate().min_by_key(|(_, i)| **i).map(|(p, _)| p) {
            self.free.swap_remove(position)
        } else {
            let index = self.next_index;
            self.next_index += 1;
            index
        };
        self.entries.insert(key, TableEntry { value: value.clone(), index, refs: 1 });
        Ok(Acquired { index, first: true })
    }

    /// Drops a reference to `key`. Returns `None` for unknown keys.
    pub fn release(&mut self, key: u64) -> Option<Released<T>> {
        let entry = self.entries.get_mut(&key)?;
        entry.refs -= 1;
        let index = entry.index;
        if entry.refs > 0 {
            return Some(Released { index, last: None });
        }
        let entry = self.entries.remove(&key)?;
        self.free.push(entry.index);
        Some(Released { index, last: Some(entry.value) })
    }

    #[must_use]
    pub fn index_of(&self, key: u64) -> Option<u32> {
        self.entries.get(&key).map(|e| e.index)
    }

    #[must_use]
    pub fn ref_count(&self, key: u64) -> u32 {
        self.entries.get(&key).map_or(0, |e| e.refs)
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<&T> {
        self.entries.get(&key).map(|e| &e.value)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One past the highest index in use.
    #[must_use]
    pub fn high_water(&self) -> u32 {
        self.entries.values().map(|e| e.index + 1).max().unwrap_or(0)
    }

    /// `(index, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.values().map(|e| (e.index, &e.value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.next_index = 0;
    }
}

/// GPU copies of [`Image`]s, shared by every frame slot.
///
/// Each slot table that references an image counts once; the GPU image is
/// created with the first reference and destroyed with the last.
#[derive(Debug, Default)]
pub struct SharedImages {
    resident: FxHashMap<u64, (ResourceHandle, u32)>,
}

impl SharedImages {
    pub fn acquire(&mut self, gpu: &mut dyn GpuDevice, owner: &str, image: &Image) -> Result<ResourceHandle> {
        let key = image.id().0;
        if let Some((handle, refs)) = self.resident.get_mut(&key) {
            *refs += 1;
            return Ok(*handle);
        }
        let (width, height) = image.size();
        let handle = gpu.create_resource(
            owner,
            ResourceDesc::Image(ImageDesc {
                label: format!("Image {}", image.label()).into(),
                extent: crate::gpu::Extent2d::new(width, height),
                format: image_format(image.format()),
                usage: ResourceUsage::SAMPLED | ResourceUsage::COPY_DST,
            }),
        )?;
        log::debug!("Image '{}' resident ({width}x{height})", image.label());
        self.resident.insert(key, (handle, 1));
        Ok(handle)
    }

    pub fn release(&mut self, gpu: &mut dyn GpuDevice, image: &Image) {
        let key = image.id().0;
        let Some((handle, refs)) = self.resident.get_mut(&key) else {
            return;
        };
        *refs -= 1;
        if *refs == 0 {
            gpu.destroy_resource(*handle);
            self.resident.remove(&key);
            log::debug!("Image '{}' evicted", image.label());
        }
    }

    #[must_use]
    pub fn handle(&self, image: &Image) -> Option<ResourceHandle> {
        self.resident.get(&image.id().0).map(|(h, _)| *h)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resident.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    pub fn destroy_all(&mut self, gpu: &mut dyn GpuDevice) {
        for (_, (handle, _)) in self.resident.drain() {
            gpu.destroy_resource(handle);
        }
    }
}

fn image_format(format: PixelFormat) -> ImageFormat {
    match format {
        PixelFormat::Rgba8 => ImageFormat::Rgba8Unorm,
        PixelFormat::Rgba8Srgb => ImageFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba16Float => ImageFormat::Rgba16Float,
    }
}
