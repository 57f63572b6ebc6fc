//! Bounding spheres, scale bounds and normal matrices.

use glam::{Mat3, Mat4, Vec3};

/// Determinant magnitude below which a 3x3 block is treated as singular.
pub const DETERMINANT_EPSILON: f32 = 1e-6;

/// Result of testing a bounding sphere against a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Fully outside.
    Disjoint,
    /// Partially inside, or touching the boundary.
    Intersects,
    /// Fully inside.
    Contains,
}

impl Containment {
    /// True for anything that is not fully outside.
    #[inline]
    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

/// Sphere used for cheap visibility tests.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// World-space centre.
    pub center: Vec3,
    /// Radius, never negative.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere.
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere around an instance: centred on the translation column.
    #[inline]
    #[must_use]
    pub fn from_transform(transform: &Mat4, radius: f32) -> Self {
        Self {
            center: transform.w_axis.truncate(),
            radius,
        }
    }
}

/// Largest distance of any point from the origin. Zero for no points.
#[must_use]
pub fn bounding_radius(points: impl IntoIterator<Item = Vec3>) -> f32 {
    points
        .into_iter()
        .map(Vec3::length_squared)
        .fold(0.0_f32, f32::max)
        .sqrt()
}

/// Length of the longest basis column of the upper 3x3 block.
///
/// Scaling a sphere of radius `r` by `transform` never leaves a sphere of
/// radius `r * max_axis_scale(transform)`. One square root per call.
#[inline]
#[must_use]
pub fn max_axis_scale(transform: &Mat4) -> f32 {
    let x = transform.x_axis.truncate().length_squared();
    let y = transform.y_axis.truncate().length_squared();
    let z = transform.z_axis.truncate().length_squared();
    x.max(y).max(z).sqrt()
}

/// Inverse-transpose of the upper 3x3 block, for transforming normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalMatrix {
    /// The normal transform.
    pub matrix: Mat3,
    /// True if the block was near-singular and the determinant was replaced by 1.
    pub degenerate: bool,
}

impl NormalMatrix {
    /// Computes the normal matrix of `transform`.
    ///
    /// A determinant with `|det| < DETERMINANT_EPSILON` is replaced by 1 so
    /// the result stays finite. Such matrices are flagged `degenerate`.
    #[must_use]
    pub fn from_transform(transform: &Mat4) -> Self {
        let a = transform.x_axis.truncate();
        let b = transform.y_axis.truncate();
        let c = transform.z_axis.truncate();

        let bc = b.cross(c);
        let ca = c.cross(a);
        let ab = a.cross(b);

        let mut det = a.dot(bc);
        let degenerate = det.abs() < DETERMINANT_EPSILON;
        if degenerate {
            det = 1.0;
        }
        let inv_det = det.recip();

        // Rows of the inverse are bc, ca, ab; its transpose has them as columns.
        Self {
            matrix: Mat3::from_cols(bc * inv_det, ca * inv_det, ab * inv_det),
            degenerate,
        }
    }
}
