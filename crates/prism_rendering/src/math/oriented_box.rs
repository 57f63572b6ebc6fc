//! Oriented bounding box, used for the light's shadow volume.

use glam::{Quat, Vec3};

use super::bounds::{BoundingSphere, Containment};

/// A rotated box: centre, half-size along each local axis, orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// World-space centre.
    pub center: Vec3,
    /// Half-size along each local axis.
    pub extents: Vec3,
    /// Rotation from box space to world space.
    pub orientation: Quat,
}

impl Default for OrientedBox {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            extents: Vec3::ONE,
            orientation: Quat::IDENTITY,
        }
    }
}

impl OrientedBox {
    /// Creates a box.
    #[must_use]
    pub const fn new(center: Vec3, extents: Vec3, orientation: Quat) -> Self {
        Self {
            center,
            extents,
            orientation,
        }
    }

    /// Moves a world-space point into box space.
    #[inline]
    #[must_use]
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.center)
    }

    /// Classifies a sphere against the box.
    ///
    /// A sphere exactly touching a face from outside intersects.
    #[must_use]
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> Containment {
        let local = self.to_local(sphere.center);
        let closest = local.clamp(-self.extents, self.extents);
        let gap = (local - closest).length_squared();

        if gap > sphere.radius * sphere.radius {
            return Containment::Disjoint;
        }

        let reach = local.abs() + Vec3::splat(sphere.radius);
        if reach.cmple(self.extents).all() {
            Containment::Contains
        } else {
            Containment::Intersects
        }
    }

    /// Tests if a sphere is visible (intersects or is inside the box).
    #[inline]
    #[must_use]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.contains_sphere(sphere).is_visible()
    }

    /// Returns the eight world-space corners.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let mut out = [Vec3::ZERO; 8];
        for (i, corner) in out.iter_mut().enumerate() {
            let sign = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            *corner = self.center + self.orientation * (sign * self.extents);
        }
        out
    }
}
