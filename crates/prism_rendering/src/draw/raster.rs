//! Scoped rasterizer state.

use std::ops::{Deref, DerefMut};

use crate::device::{GraphicsDevice, RasterizerState};

/// Applies a rasterizer state and puts another back when dropped.
///
/// Derefs to the device so the scope can be passed wherever a device is
/// expected.
pub struct RasterScope<'a> {
    device: &'a mut dyn GraphicsDevice,
    restore: RasterizerState,
}

impl<'a> RasterScope<'a> {
    /// Sets `state` now and `restore` on drop.
    pub fn new(
        device: &'a mut dyn GraphicsDevice,
        state: RasterizerState,
        restore: RasterizerState,
    ) -> Self {
        device.set_rasterizer_state(state);
        Self { device, restore }
    }
}

impl<'a> Deref for RasterScope<'a> {
    type Target = dyn GraphicsDevice + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl<'a> DerefMut for RasterScope<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for RasterScope<'_> {
    fn drop(&mut self) {
        self.device.set_rasterizer_state(self.restore);
    }
}
