//! Graphics device interface.
//!
//! The rendering core never talks to a GPU API directly. Buffer lifetime,
//! map/unmap windows, state binding and draw submission all go through
//! [`GraphicsDevice`]. Two implementations ship with the crate:
//!
//! - [`RecordingDevice`]: headless, keeps buffer contents in memory and logs
//!   every command. Used by tests, benches and tooling.
//! - `WgpuDevice` (feature `wgpu-backend`): records commands and replays them
//!   into a `wgpu::RenderPass`.

mod recording;
#[cfg(feature = "wgpu-backend")]
mod wgpu_backend;

pub use recording::{CommandLog, DeviceCommand, RecordingDevice};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::{ProgramPipelines, WgpuDevice};

use crate::error::DeviceError;

/// Opaque id of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Opaque id of a compiled shader program.
///
/// Program compilation and reflection happen outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Opaque id of a texture view loaded outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex geometry.
    Vertex,
    /// 32-bit indices.
    Index,
    /// Per-instance vertex stream.
    Instance,
    /// Shader constants.
    Constant,
}

impl BufferKind {
    /// Short lowercase name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Index => "index",
            Self::Instance => "instance",
            Self::Constant => "constant",
        }
    }
}

/// How the CPU is allowed to touch a buffer after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// GPU-resident; contents replaced through `update_buffer`.
    Default,
    /// CPU-writable; contents replaced through a write-discard map window.
    Dynamic,
}

/// Parameters for [`GraphicsDevice::create_buffer`].
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Binding kind.
    pub kind: BufferKind,
    /// CPU access mode.
    pub usage: BufferUsage,
    /// Size in bytes. Must be non-zero.
    pub size: u64,
    /// Initial contents. Shorter than `size` means the tail is zeroed.
    pub initial_data: Option<&'a [u8]>,
}

/// Triangle face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Discard front faces (shadow casters).
    Front,
    /// Discard back faces (regular passes).
    Back,
}

/// Polygon fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    /// Filled triangles.
    Solid,
    /// Edges only.
    Wireframe,
}

/// Fixed-function rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    /// Polygon fill.
    pub fill: FillMode,
    /// Face culling.
    pub cull: CullMode,
}

impl RasterizerState {
    /// Solid fill, back faces culled. The state every pass expects on entry.
    pub const SOLID_BACK: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::Back,
    };

    /// Solid fill, front faces culled. Used while rendering shadow casters.
    pub const SOLID_FRONT: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::Front,
    };
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::SOLID_BACK
    }
}

/// The narrow device capability the rendering core consumes.
///
/// All calls happen on the render-owning thread. Between
/// [`map_write_discard`](Self::map_write_discard) and [`unmap`](Self::unmap)
/// only [`write_mapped`](Self::write_mapped) may touch that buffer.
pub trait GraphicsDevice {
    /// Creates a buffer.
    ///
    /// # Errors
    ///
    /// Fails on a zero size or when the backend cannot allocate.
    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError>;

    /// Releases a buffer. Unknown ids are ignored.
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Overwrites a region of a buffer.
    ///
    /// # Errors
    ///
    /// Fails on unknown ids or writes past the end of the buffer.
    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    /// Opens a write-discard window. Previous contents become undefined.
    ///
    /// # Errors
    ///
    /// Fails on unknown, non-dynamic or already-mapped buffers.
    fn map_write_discard(&mut self, buffer: BufferId) -> Result<(), DeviceError>;

    /// Writes into an open map window.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is not mapped or the write is out of range.
    fn write_mapped(&mut self, buffer: BufferId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    /// Closes a map window. Unmapped or unknown ids are ignored.
    fn unmap(&mut self, buffer: BufferId);

    /// Binds a vertex stream to an input slot.
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32);

    /// Binds the active 32-bit index buffer.
    fn bind_index_buffer(&mut self, buffer: BufferId);

    /// Binds a compiled program. Returns false if the program is unknown.
    fn bind_program(&mut self, program: ProgramId) -> bool;

    /// Binds a constant buffer to a shader slot.
    fn bind_constant_buffer(&mut self, slot: u32, buffer: BufferId);

    /// Binds a texture view to a shader slot.
    fn bind_texture(&mut self, slot: u32, texture: TextureId);

    /// Sets the rasterizer state for subsequent draws.
    fn set_rasterizer_state(&mut self, state: RasterizerState);

    /// Issues one indexed, instanced draw.
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        start_instance: u32,
    );
}
