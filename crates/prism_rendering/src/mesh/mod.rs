//! # Meshes
//!
//! A [`MeshEntry`] couples one shape's geometry buffers, its instance store,
//! its instance buffer and an optional shared material. The
//! [`MeshRegistry`] owns every entry under a unique name.

mod entry;
mod registry;

pub use entry::{MeshEntry, MeshPhase, GEOMETRY_SLOT, INSTANCE_SLOT};
pub use registry::MeshRegistry;
