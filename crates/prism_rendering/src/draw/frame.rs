//! Per-frame global constants.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use super::shadow::ShadowVolume;

/// Constant slot the frame block is bound to.
pub const FRAME_CONSTANT_SLOT: u32 = 0;

/// Global constant block shared by every program.
///
/// Matrices are stored as rows, matching the instance stream. Scalars are
/// packed into the `w` lane of the preceding vector so every field stays on
/// a 16-byte boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    /// Camera view.
    pub view: [[f32; 4]; 4],
    /// Camera projection.
    pub projection: [[f32; 4]; 4],
    /// Camera view-projection.
    pub view_projection: [[f32; 4]; 4],
    /// Light view.
    pub light_view: [[f32; 4]; 4],
    /// Light projection.
    pub light_projection: [[f32; 4]; 4],
    /// Light view-projection.
    pub light_view_projection: [[f32; 4]; 4],
    /// Camera world position.
    pub camera_position: [f32; 3],
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Sun colour.
    pub sun_color: [f32; 3],
    /// Seconds since start.
    pub time: f32,
    /// Direction the sunlight travels.
    pub sun_direction: [f32; 3],
    /// Sun intensity.
    pub sun_intensity: f32,
    /// Ambient light colour.
    pub ambient: [f32; 3],
    /// Frames rendered so far.
    pub frame_count: u32,
    /// Render target size in pixels.
    pub screen_size: [f32; 2],
    /// Cursor position in pixels.
    pub mouse_position: [f32; 2],
    /// Player world position.
    pub player_position: [f32; 3],
    /// Shadow map edge length in texels.
    pub shadow_map_size: i32,
}

fn rows(m: &Mat4) -> [[f32; 4]; 4] {
    m.transpose().to_cols_array_2d()
}

impl FrameConstants {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Sets the camera matrices and position.
    #[must_use]
    pub fn with_camera(mut self, view: &Mat4, projection: &Mat4, position: Vec3) -> Self {
        self.view = rows(view);
        self.projection = rows(projection);
        self.view_projection = rows(&(*projection * *view));
        self.camera_position = position.to_array();
        self
    }

    /// Sets the light matrices from a shadow volume.
    #[must_use]
    pub fn with_light(mut self, volume: &ShadowVolume) -> Self {
        self.light_view = rows(&volume.view);
        self.light_projection = rows(&volume.projection);
        self.light_view_projection = rows(&volume.view_projection);
        self
    }

    /// Sets the sun.
    #[must_use]
    pub fn with_sun(mut self, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        self.sun_direction = direction.normalize_or_zero().to_array();
        self.sun_color = color.to_array();
        self.sun_intensity = intensity;
        self
    }

    /// Sets the screen and cursor.
    #[must_use]
    pub fn with_screen(mut self, size: Vec2, mouse: Vec2) -> Self {
        self.screen_size = size.to_array();
        self.mouse_position = mouse.to_array();
        self
    }

    /// Advances the clock by `delta_time` seconds.
    pub fn tick(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        self.time += delta_time;
        self.frame_count = self.frame_count.wrapping_add(1);
    }
}
