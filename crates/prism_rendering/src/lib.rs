//! # PRISM Rendering
//!
//! Instanced mesh rendering with per-frame visibility culling:
//! - One batched draw per mesh, all visible instances in one call
//! - Meshes grouped by material, one program bind per material per pass
//! - Camera frustum and light-space culling on bounding spheres
//! - Generational instance handles, stale handles detected in O(1)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DRAW COORDINATOR                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  MeshRegistry ─→ MeshEntry ─→ InstanceStore (arena)           │
//! │                      │               ↓                        │
//! │                      │        VisibilityCuller                │
//! │                      │     classify → pack (≤ capacity)       │
//! │                      ↓               ↓                        │
//! │               GeometryBuffer   InstanceBuffer                 │
//! │                      └──────┬────────┘                        │
//! │                             ↓                                 │
//! │                 GraphicsDevice (recording / wgpu)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use glam::{Mat4, Vec3};
//! use prism_rendering::prelude::*;
//!
//! let mut device = RecordingDevice::new();
//! let program = device.register_program();
//! let material: MaterialRef =
//!     Rc::new(ColourMaterial::new(&mut device, "red", Some(program)).unwrap());
//!
//! let mut registry = MeshRegistry::default();
//! let (vertices, indices) = cube(1.0);
//! let id = registry.create(&mut device, "cube", vertices, indices).unwrap();
//! let mesh = registry.get_mut(id).unwrap();
//! mesh.set_material(Some(material));
//! mesh.create_instance(InstanceData::at(Vec3::ZERO));
//!
//! let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
//! let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
//! let frustum = Frustum::from_view_projection(&(proj * view));
//!
//! let mut coordinator = DrawCoordinator::new(RenderConfig::default());
//! let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &frustum);
//! assert_eq!(stats.draw_calls, 1);
//! assert_eq!(stats.instances_drawn, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffer;
pub mod config;
pub mod culling;
pub mod device;
pub mod draw;
pub mod error;
pub mod instance;
pub mod material;
pub mod math;
pub mod mesh;

pub use buffer::{GeometryBuffer, GpuInstance, InstanceBuffer, Vertex};
pub use config::{DegeneratePolicy, GrowthPolicy, RenderConfig};
pub use culling::{CullVolume, VisibilityCuller};
pub use device::{GraphicsDevice, RecordingDevice};
pub use draw::{DrawCoordinator, DrawStats, FrameConstants, ShadowVolume};
pub use error::{ConfigError, DeviceError, RenderError, RenderResult};
pub use instance::{InstanceData, InstanceHandle, InstanceStore};
pub use material::{ColourMaterial, Material, MaterialRef, TexturedMaterial};
pub use math::{BoundingSphere, Frustum, OrientedBox};
pub use mesh::{MeshEntry, MeshRegistry};

/// Everything a frame loop usually touches.
pub mod prelude {
    pub use crate::buffer::{cube, Vertex};
    pub use crate::config::RenderConfig;
    pub use crate::device::{GraphicsDevice, RecordingDevice};
    pub use crate::draw::{DrawCoordinator, DrawStats, FrameConstants, ShadowVolume};
    pub use crate::instance::{InstanceData, InstanceHandle};
    pub use crate::material::{ColourMaterial, Material, MaterialRef, TexturedMaterial};
    pub use crate::math::{Frustum, OrientedBox};
    pub use crate::mesh::{MeshEntry, MeshRegistry};
}
