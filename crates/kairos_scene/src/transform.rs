use glam::{Affine3A, EulerRot, Mat4, Quat, Vec3};

/// Transform component
///
/// Holds a node's local affine transform and the cached world transform.
/// The world matrix is written only by the transform system, which the
/// [`Scene`](crate::Scene) runs eagerly after every transform-affecting call,
/// so `world == parent.world * local` holds whenever control returns to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub(crate) local: Affine3A,
    pub(crate) world: Affine3A,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        local: Affine3A::IDENTITY,
        world: Affine3A::IDENTITY,
    };

    /// A transform whose local matrix is `local`.
    #[must_use]
    pub fn from_local(local: Affine3A) -> Self {
        Self { local, world: local }
    }

    #[must_use]
    pub fn from_translation(position: Vec3) -> Self {
        Self::from_local(Affine3A::from_translation(position))
    }

    #[must_use]
    pub fn from_scale_rotation_translation(scale: Vec3, rotation: Quat, position: Vec3) -> Self {
        Self::from_local(Affine3A::from_scale_rotation_translation(scale, rotation, position))
    }

    // ========================================================================
    // Getters & Helpers
    // ========================================================================

    /// Local matrix (relative to the parent).
    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local
    }

    /// World matrix, for CPU-side logic.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world
    }

    /// World matrix as `Mat4`, for GPU upload.
    #[inline]
    #[must_use]
    pub fn world_matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.world)
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.local.translation)
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        Vec3::from(self.world.translation)
    }

    /// Decomposes the local matrix. Shear is lost.
    #[must_use]
    pub fn scale_rotation_translation(&self) -> (Vec3, Quat, Vec3) {
        self.local.to_scale_rotation_translation()
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.scale_rotation_translation().1
    }

    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale_rotation_translation().0
    }

    /// Local rotation as XYZ Euler angles.
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation().to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    // ========================================================================
    // Local-space edits (applied by the Scene, which then propagates)
    // ========================================================================

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.local.translation = position.into();
    }

    pub(crate) fn translate(&mut self, offset: Vec3) {
        self.local.translation += glam::Vec3A::from(offset);
    }

    pub(crate) fn rotate_local(&mut self, rotation: Quat) {
        self.local *= Affine3A::from_quat(rotation);
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        let (scale, _, translation) = self.scale_rotation_translation();
        self.local = Affine3A::from_scale_rotation_translation(scale, rotation, translation);
    }

    pub(crate) fn set_scale(&mut self, scale: Vec3) {
        let (_, rotation, translation) = self.scale_rotation_translation();
        self.local = Affine3A::from_scale_rotation_translation(scale, rotation, translation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_scale_keeps_rotation_and_translation() {
        let mut t = Transform::from_scale_rotation_translation(
            Vec3::ONE,
            Quat::from_rotation_z(0.5),
            Vec3::new(1.0, 2.0, 3.0),
        );
        t.set_scale(Vec3::splat(2.0));
        let (s, r, p) = t.scale_rotation_translation();
        assert!((s - Vec3::splat(2.0)).length() < 1e-5);
        assert!(r.angle_between(Quat::from_rotation_z(0.5)) < 1e-4);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn translate_accumulates() {
        let mut t = Transform::default();
        t.translate(Vec3::X);
        t.translate(Vec3::Y);
        assert_eq!(t.position(), Vec3::new(1.0, 1.0, 0.0));
    }
}
