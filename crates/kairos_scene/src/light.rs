use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub range: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub range: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,
}

// Shape of the light; direction and position come from the node transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point(PointLight),
    Spot(SpotLight),
}

impl LightKind {
    /// Numeric tag written to GPU light records.
    #[must_use]
    pub fn gpu_tag(&self) -> u32 {
        match self {
            Self::Directional => 0,
            Self::Point(_) => 1,
            Self::Spot(_) => 2,
        }
    }

    /// Attenuation range; infinite for directional lights.
    #[must_use]
    pub fn range(&self) -> f32 {
        match self {
            Self::Directional => f32::INFINITY,
            Self::Point(p) => p.range,
            Self::Spot(s) => s.range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
    pub cast_shadows: bool,
}

impl Light {
    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32) -> Self {
        Self { color, intensity, kind: LightKind::Directional, cast_shadows: false }
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Point(PointLight { range }),
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn new_spot(color: Vec3, intensity: f32, range: f32, inner_cone: f32, outer_cone: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Spot(SpotLight { range, inner_cone, outer_cone }),
            cast_shadows: false,
        }
    }
}
