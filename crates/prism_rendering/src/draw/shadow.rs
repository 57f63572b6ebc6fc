//! Directional-light shadow volume.

use glam::{Mat4, Quat, Vec3};

use crate::config::ShadowConfig;
use crate::math::{Frustum, OrientedBox};

/// Orthographic light volume following a focus point.
///
/// The light sits `light_distance` back from the focus along the sun
/// direction and looks at the focus. World up is +Z, switched to +Y when
/// the sun is within 0.99 of vertical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowVolume {
    config: ShadowConfig,
    /// World to light space.
    pub view: Mat4,
    /// Light orthographic projection.
    pub projection: Mat4,
    /// `projection * view`.
    pub view_projection: Mat4,
}

impl ShadowVolume {
    /// Creates a volume looking down -Z from the origin.
    #[must_use]
    pub fn new(config: ShadowConfig) -> Self {
        let mut volume = Self {
            config,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
        };
        volume.update(Vec3::ZERO, Vec3::NEG_Z);
        volume
    }

    /// Volume parameters.
    #[must_use]
    pub const fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Re-aims the light at `focus`. A zero `sun_direction` keeps the
    /// previous aim.
    pub fn update(&mut self, focus: Vec3, sun_direction: Vec3) {
        let Some(sun) = sun_direction.try_normalize() else {
            return;
        };
        let c = &self.config;

        let eye = focus - sun * c.light_distance;
        let up = if sun.dot(Vec3::Z).abs() > 0.99 {
            Vec3::Y
        } else {
            Vec3::Z
        };

        self.view = Mat4::look_at_rh(eye, focus, up);
        self.projection = Mat4::orthographic_rh(
            -c.ortho_width * 0.5,
            c.ortho_width * 0.5,
            -c.ortho_height * 0.5,
            c.ortho_height * 0.5,
            c.near_plane,
            c.far_plane,
        );
        self.view_projection = self.projection * self.view;
    }

    /// World-space box covering the orthographic volume.
    #[must_use]
    pub fn light_box(&self) -> OrientedBox {
        let c = &self.config;
        let depth = c.far_plane - c.near_plane;
        let center_ls = Vec3::new(0.0, 0.0, -(c.near_plane + depth * 0.5));
        let extents = Vec3::new(c.ortho_width * 0.5, c.ortho_height * 0.5, depth * 0.5);

        let inv_view = self.view.inverse();
        OrientedBox::new(
            inv_view.transform_point3(center_ls),
            extents,
            Quat::from_mat4(&inv_view).normalize(),
        )
    }

    /// Planes of the light's view volume.
    #[must_use]
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection)
    }
}

impl Default for ShadowVolume {
    fn default() -> Self {
        Self::new(ShadowConfig::default())
    }
}
