//! # Kairos Resources
//!
//! Shared CPU-side descriptions of the assets a scene references.
//!
//! [`Image`], [`Material`] and [`Mesh`] are cheap-to-clone `Arc` handles with
//! process-unique ids. The render passes key their per-frame-slot reference
//! counts on those ids.

pub mod image;
pub mod material;
pub mod mesh;

pub use image::{Image, ImageId, PixelFormat};
pub use material::{AlphaMode, Material, MaterialBuilder, MaterialId};
pub use mesh::{Mesh, MeshId};
