//! Vertex layout shared by every mesh.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One mesh vertex as laid out in the vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Object-space tangent.
    pub tangent: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Vertex colour.
    pub color: [f32; 4],
}

impl Vertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a white vertex with only a position.
    #[must_use]
    pub const fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            normal: [0.0, 0.0, 0.0],
            tangent: [0.0, 0.0, 0.0],
            uv: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    /// Sets the normal.
    #[must_use]
    pub const fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = normal;
        self
    }

    /// Sets the texture coordinates.
    #[must_use]
    pub const fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.uv = [u, v];
        self
    }

    /// Position as a vector.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// The 8 corners of an axis-aligned cube of side `size` centred on the origin,
/// with the 36 indices of its 12 triangles.
#[must_use]
pub fn cube(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let vertices = (0..8)
        .map(|i| {
            Vertex::at(
                if i & 1 == 0 { -h } else { h },
                if i & 2 == 0 { -h } else { h },
                if i & 4 == 0 { -h } else { h },
            )
        })
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -Z
        4, 5, 6, 5, 7, 6, // +Z
        0, 1, 4, 1, 5, 4, // -Y
        2, 6, 3, 3, 6, 7, // +Y
        0, 4, 2, 2, 4, 6, // -X
        1, 3, 5, 3, 7, 5, // +X
    ];

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // 15 floats, no padding
        assert_eq!(Vertex::SIZE, 60);
    }

    #[test]
    fn test_cube_shape() {
        let (vertices, indices) = cube(1.0);
        assert_eq!(vertices.len(), 8);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| i < 8));
    }
}
