//! Instance data structures for GPU upload.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

/// Per-instance data sent to the GPU.
///
/// This struct is written into the instance buffer and consumed by the vertex
/// shader as a per-instance vertex stream. Both matrices are stored
/// transposed (one row per `[f32; 4]`), which is what the instance input
/// layout reads.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuInstance {
    /// Rows of the object-to-world transform.
    pub model: [[f32; 4]; 4],

    /// Instance colour, RGBA.
    pub color: [f32; 4],

    /// Rows of the normal transform (inverse-transpose of the upper 3x3).
    pub normal: [[f32; 4]; 4],
}

impl GpuInstance {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Stride in bytes, as passed to vertex-stream binding.
    pub const STRIDE: u32 = Self::SIZE as u32;

    /// Packs an instance for upload.
    #[inline]
    #[must_use]
    pub fn pack(transform: &Mat4, color: Vec4, normal: &Mat3) -> Self {
        Self {
            model: transform.transpose().to_cols_array_2d(),
            color: color.to_array(),
            normal: Mat4::from_mat3(*normal).transpose().to_cols_array_2d(),
        }
    }

    /// Recovers the object-to-world transform.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model).transpose()
    }

    /// Recovers the normal transform.
    #[must_use]
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(Mat4::from_cols_array_2d(&self.normal).transpose())
    }
}
