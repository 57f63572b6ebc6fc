//! Constant-colour material.

use std::cell::Cell;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::{Material, MATERIAL_CONSTANT_SLOT};
use crate::device::{
    BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice, ProgramId,
};
use crate::error::DeviceError;

/// Constant block of a [`ColourMaterial`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ColourConstants {
    /// RGBA colour.
    pub colour: [f32; 4],
}

/// A program drawn with one colour.
#[derive(Debug)]
pub struct ColourMaterial {
    name: String,
    program: Option<ProgramId>,
    colour: Cell<Vec4>,
    constants: Cell<Option<BufferId>>,
}

impl ColourMaterial {
    /// Creates the material and its constant buffer.
    ///
    /// `program` is `None` when the program failed to compile; the material
    /// then refuses to bind.
    ///
    /// # Errors
    ///
    /// Returns the device error if the constant buffer cannot be created.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        program: Option<ProgramId>,
    ) -> Result<Self, DeviceError> {
        let constants = device.create_buffer(&BufferDesc {
            label: name,
            kind: BufferKind::Constant,
            usage: BufferUsage::Dynamic,
            size: std::mem::size_of::<ColourConstants>() as u64,
            initial_data: None,
        })?;
        Ok(Self {
            name: name.to_owned(),
            program,
            colour: Cell::new(Vec4::ZERO),
            constants: Cell::new(Some(constants)),
        })
    }

    /// Sets the colour. Takes effect at the next upload.
    pub fn set_colour(&self, colour: Vec4) {
        self.colour.set(colour);
    }

    /// Current colour.
    #[must_use]
    pub fn colour(&self) -> Vec4 {
        self.colour.get()
    }

    /// Device constant buffer, if not released.
    #[must_use]
    pub fn constant_buffer(&self) -> Option<BufferId> {
        self.constants.get()
    }
}

impl Material for ColourMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_program(&self, device: &mut dyn GraphicsDevice) -> bool {
        self.program.is_some_and(|program| device.bind_program(program))
    }

    fn upload_constants(&self, device: &mut dyn GraphicsDevice) -> Result<(), DeviceError> {
        let Some(buffer) = self.constants.get() else {
            return Ok(());
        };
        let block = ColourConstants {
            colour: self.colour.get().to_array(),
        };
        device.map_write_discard(buffer)?;
        let written = device.write_mapped(buffer, 0, bytemuck::bytes_of(&block));
        device.unmap(buffer);
        written
    }

    fn bind_constants(&self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.constants.get() {
            device.bind_constant_buffer(MATERIAL_CONSTANT_SLOT, buffer);
        }
    }

    fn release(&self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.constants.take() {
            device.destroy_buffer(buffer);
        }
    }
}
