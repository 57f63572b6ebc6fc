//! Per-instance CPU records.

use glam::{Mat4, Vec3, Vec4};

use crate::math::BoundingSphere;

/// Placement and colour of one instance, owned by the scene layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceData {
    /// Object-to-world transform.
    pub transform: Mat4,
    /// RGBA colour.
    pub color: Vec4,
}

impl Default for InstanceData {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            color: Vec4::ONE,
        }
    }
}

impl InstanceData {
    /// Creates an instance with a transform and colour.
    #[must_use]
    pub const fn new(transform: Mat4, color: Vec4) -> Self {
        Self { transform, color }
    }

    /// White instance at a translation.
    #[must_use]
    pub fn at(translation: Vec3) -> Self {
        Self {
            transform: Mat4::from_translation(translation),
            color: Vec4::ONE,
        }
    }

    /// Sets the colour.
    #[must_use]
    pub const fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// World-space translation.
    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Visibility state derived each frame from the transform and mesh radius.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisibilityData {
    /// Base radius scaled by the largest axis of the transform.
    pub radius: f32,
    /// Passed the most recent camera-frustum pack.
    pub visible_camera: bool,
    /// Passed the most recent light-box pack.
    pub visible_light: bool,
}

/// One slot of an [`InstanceStore`](super::InstanceStore).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstanceRecord {
    /// Scene-owned placement.
    pub data: InstanceData,
    /// Derived visibility.
    pub visibility: VisibilityData,
}

impl InstanceRecord {
    /// Bounding sphere from the current transform and effective radius.
    #[inline]
    #[must_use]
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::from_transform(&self.data.transform, self.visibility.radius)
    }
}
