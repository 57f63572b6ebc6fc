//! Textured material with a tint.

use std::cell::Cell;

use glam::Vec4;

use super::colour::ColourConstants;
use super::{Material, MATERIAL_CONSTANT_SLOT};
use crate::device::{
    BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice, ProgramId, TextureId,
};
use crate::error::DeviceError;

/// Texture slot the albedo texture is bound to.
const ALBEDO_SLOT: u32 = 0;

/// A program sampling one texture, modulated by a tint.
///
/// The tint shares the [`ColourConstants`] layout.
#[derive(Debug)]
pub struct TexturedMaterial {
    name: String,
    program: Option<ProgramId>,
    texture: TextureId,
    tint: Cell<Vec4>,
    constants: Cell<Option<BufferId>>,
}

impl TexturedMaterial {
    /// Creates the material and its constant buffer, with a white tint.
    ///
    /// # Errors
    ///
    /// Returns the device error if the constant buffer cannot be created.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        program: Option<ProgramId>,
        texture: TextureId,
    ) -> Result<Self, DeviceError> {
        let tint = Vec4::ONE;
        let block = ColourConstants {
            colour: tint.to_array(),
        };
        let constants = device.create_buffer(&BufferDesc {
            label: name,
            kind: BufferKind::Constant,
            usage: BufferUsage::Default,
            size: std::mem::size_of::<ColourConstants>() as u64,
            initial_data: Some(bytemuck::bytes_of(&block)),
        })?;
        Ok(Self {
            name: name.to_owned(),
            program,
            texture,
            tint: Cell::new(tint),
            constants: Cell::new(Some(constants)),
        })
    }

    /// Sets the tint. Takes effect at the next upload.
    pub fn set_tint(&self, tint: Vec4) {
        self.tint.set(tint);
    }

    /// Current tint.
    #[must_use]
    pub fn tint(&self) -> Vec4 {
        self.tint.get()
    }

    /// Sampled texture.
    #[must_use]
    pub const fn texture(&self) -> TextureId {
        self.texture
    }
}

impl Material for TexturedMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_program(&self, device: &mut dyn GraphicsDevice) -> bool {
        self.program.is_some_and(|program| device.bind_program(program))
    }

    fn upload_constants(&self, device: &mut dyn GraphicsDevice) -> Result<(), DeviceError> {
        match self.constants.get() {
            Some(buffer) => {
                let block = ColourConstants {
                    colour: self.tint.get().to_array(),
                };
                device.update_buffer(buffer, 0, bytemuck::bytes_of(&block))
            }
            None => Ok(()),
        }
    }

    fn bind_constants(&self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.constants.get() {
            device.bind_constant_buffer(MATERIAL_CONSTANT_SLOT, buffer);
        }
        device.bind_texture(ALBEDO_SLOT, self.texture);
    }

    fn release(&self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.constants.take() {
            device.destroy_buffer(buffer);
        }
    }
}
