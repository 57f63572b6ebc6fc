//! # GPU Buffers
//!
//! Device-side storage for mesh shapes and their instances.
//!
//! - [`GeometryBuffer`]: vertex and index buffers, replaced wholesale.
//! - [`InstanceBuffer`]: resizable per-instance stream written through a
//!   scoped [`MappedInstances`] window.
//! - [`Vertex`] and [`GpuInstance`]: the `Pod` layouts both buffers hold.

mod geometry;
mod gpu_instance;
mod instance;
mod vertex;

pub use geometry::{GeometryBuffer, ShadowIndexSwap};
pub use gpu_instance::GpuInstance;
pub use instance::{InstanceBuffer, MappedInstances, Push};
pub use vertex::{cube, Vertex};
