use glam::{Vec3, Vec4};
use kairos_resources::Image;

/// Global lighting environment. Only the first one attached is used.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    /// Colour the scene target is cleared to.
    pub clear_color: Vec4,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.1,
            clear_color: Vec4::new(0.02, 0.02, 0.03, 1.0),
        }
    }
}

/// A background image drawn behind the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Skybox {
    pub image: Image,
}

/// Sub-rectangle of the target the camera renders into, in normalized
/// `[0, 1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, width: 1.0, height: 1.0 }
    }
}
