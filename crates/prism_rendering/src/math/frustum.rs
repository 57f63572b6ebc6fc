//! View frustum for camera culling.
//!
//! Extracts frustum planes from the view-projection matrix and tests
//! bounding spheres against them.

use glam::{Mat4, Vec3, Vec4};

use super::bounds::{BoundingSphere, Containment};

/// A plane in 3D space (`normal · p + d = 0`). Normal points inward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vec3,
    /// Distance term.
    pub d: f32,
}

impl Plane {
    /// Creates a plane from its coefficients.
    #[must_use]
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Creates a plane from packed `(a, b, c, d)` and normalizes it.
    #[must_use]
    pub fn from_coefficients(v: Vec4) -> Self {
        Self::new(v.truncate(), v.w).normalized()
    }

    /// Normalizes the plane.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.normal.length();
        if len > 0.0 {
            Self {
                normal: self.normal / len,
                d: self.d / len,
            }
        } else {
            self
        }
    }

    /// Returns the signed distance from a point to the plane.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

/// View frustum for culling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Creates a frustum from six inward-facing planes.
    #[must_use]
    pub const fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extracts world-space frustum planes from a view-projection matrix.
    ///
    /// Expects clip-space depth in `[0, 1]`.
    #[must_use]
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Classifies a sphere against the frustum.
    ///
    /// A sphere exactly tangent to a plane from outside intersects.
    #[must_use]
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> Containment {
        let mut inside = true;
        for plane in &self.planes {
            let distance = plane.distance_to_point(sphere.center);
            if distance < -sphere.radius {
                return Containment::Disjoint;
            }
            if distance < sphere.radius {
                inside = false;
            }
        }
        if inside {
            Containment::Contains
        } else {
            Containment::Intersects
        }
    }

    /// Tests if a sphere is visible (intersects or is inside the frustum).
    #[inline]
    #[must_use]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.contains_sphere(sphere).is_visible()
    }
}
