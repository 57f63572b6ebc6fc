//! # Materials
//!
//! A material is the program plus constant data shared by every mesh that
//! draws with it. Meshes hold materials through [`MaterialRef`], a shared
//! reference; the draw coordinator groups meshes by the identity of that
//! reference, never by name.
//!
//! Material kinds implement the same three-step contract:
//!
//! 1. [`Material::bind_program`], which may refuse (unknown program).
//! 2. [`Material::upload_constants`].
//! 3. [`Material::bind_constants`].
//!
//! Materials own device buffers but are not released by the meshes that
//! share them. Whoever created a material calls [`Material::release`]
//! once the last mesh using it is gone.

mod colour;
mod textured;

use std::fmt;
use std::rc::Rc;

pub use colour::{ColourConstants, ColourMaterial};
pub use textured::TexturedMaterial;

use crate::device::GraphicsDevice;
use crate::error::DeviceError;

/// Constant slot used by per-material data. Slot 0 holds frame constants.
pub const MATERIAL_CONSTANT_SLOT: u32 = 1;

/// Shared handle to a material.
pub type MaterialRef = Rc<dyn Material>;

/// A program and its constants.
///
/// Called only from the render-owning thread. Implementations keep their
/// CPU-side constants behind interior mutability so a material shared by
/// many meshes can still be edited between frames.
pub trait Material: fmt::Debug {
    /// Debug name.
    fn name(&self) -> &str;

    /// Binds the program. Returns false if it cannot be bound, in which
    /// case nothing using this material is drawn.
    fn bind_program(&self, device: &mut dyn GraphicsDevice) -> bool;

    /// Writes the CPU-side constants to the device.
    ///
    /// # Errors
    ///
    /// Returns the device error if the constant buffer cannot be written.
    fn upload_constants(&self, device: &mut dyn GraphicsDevice) -> Result<(), DeviceError>;

    /// Binds the constant buffer and any other resources.
    fn bind_constants(&self, device: &mut dyn GraphicsDevice);

    /// Releases device resources. The material must not be bound afterwards.
    ///
    /// Dropping the last [`MaterialRef`] does not do this.
    fn release(&self, _device: &mut dyn GraphicsDevice) {}
}

/// True if two references point at the same material.
#[inline]
#[must_use]
pub fn same_material(a: &MaterialRef, b: &MaterialRef) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}
