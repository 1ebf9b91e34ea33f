use glam::{Affine3A, Mat4};

/// Projection model of a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Visible height in world units.
        height: f32,
        near: f32,
        far: f32,
    },
}

/// Camera component. The view is derived from the owning node's world
/// transform; the aspect ratio comes from the surface at render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(60.0_f32.to_radians(), 0.1, 1000.0)
    }
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_y: f32, near: f32, far: f32) -> Self {
        Self { projection: Projection::Perspective { fov_y, near, far } }
    }

    #[must_use]
    pub fn new_orthographic(height: f32, near: f32, far: f32) -> Self {
        Self { projection: Projection::Orthographic { height, near, far } }
    }

    /// Right-handed projection matrix with a `[0, 1]` depth range.
    #[must_use]
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        match self.projection {
            Projection::Perspective { fov_y, near, far } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic { height, near, far } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    /// View matrix for a camera placed at `world`.
    #[must_use]
    pub fn view_matrix(world: &Affine3A) -> Mat4 {
        Mat4::from(world.inverse())
    }

    #[must_use]
    pub fn view_projection(&self, world: &Affine3A, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * Self::view_matrix(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn view_matrix_inverts_camera_placement() {
        let world = Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let view = Camera::view_matrix(&world);
        let origin_in_view = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin_in_view.z + 5.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_aspect_falls_back_to_square() {
        let cam = Camera::default();
        assert_eq!(cam.projection_matrix(0.0), cam.projection_matrix(1.0));
    }
}
