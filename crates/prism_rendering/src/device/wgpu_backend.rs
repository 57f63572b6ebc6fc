//! `wgpu` implementation of the device interface.
//!
//! Buffer creation and uploads go straight to the `wgpu::Queue`. State
//! binds and draws are recorded and replayed into a `wgpu::RenderPass` by
//! [`WgpuDevice::encode`].
//!
//! Uploads are queued immediately, so a pass must be encoded and submitted
//! before the next pass rewrites the instance buffers it reads. The usual
//! order is: shadow pass, encode, submit, main pass, encode, submit.

use std::ops::Range;

use super::{
    BufferDesc, BufferId, BufferKind, BufferUsage, CullMode, FillMode, GraphicsDevice,
    ProgramId, RasterizerState, TextureId,
};
use crate::buffer::{GpuInstance, Vertex};
use crate::error::DeviceError;

/// Bind group index of the first texture slot. Constant slots map to
/// groups `0..TEXTURE_GROUP_BASE`.
const TEXTURE_GROUP_BASE: u32 = 2;

impl Vertex {
    /// Vertex attributes, locations 0 to 4.
    pub const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,  // position
        1 => Float32x3,  // normal
        2 => Float32x3,  // tangent
        3 => Float32x2,  // uv
        4 => Float32x4,  // color
    ];

    /// Per-vertex stream layout.
    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

impl GpuInstance {
    /// Instance attributes, locations 5 to 13.
    pub const ATTRIBS: [wgpu::VertexAttribute; 9] = wgpu::vertex_attr_array![
        5 => Float32x4,  // model row 0
        6 => Float32x4,  // model row 1
        7 => Float32x4,  // model row 2
        8 => Float32x4,  // model row 3
        9 => Float32x4,  // color
        10 => Float32x4, // normal row 0
        11 => Float32x4, // normal row 1
        12 => Float32x4, // normal row 2
        13 => Float32x4, // normal row 3
    ];

    /// Per-instance stream layout.
    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Render pipelines of one program, one per rasterizer state in use.
///
/// Pipelines are built by the caller from the program's shader module with
/// [`Vertex::desc`] and [`GpuInstance::desc`] as vertex buffers and
/// [`WgpuDevice::constant_layout`] for the constant groups.
#[derive(Debug)]
pub struct ProgramPipelines {
    /// Solid fill, back faces culled.
    pub cull_back: wgpu::RenderPipeline,
    /// Solid fill, front faces culled.
    pub cull_front: wgpu::RenderPipeline,
    /// Solid fill, no culling.
    pub cull_none: Option<wgpu::RenderPipeline>,
    /// Wireframe, no culling.
    pub wireframe: Option<wgpu::RenderPipeline>,
}

/// Which of a program's pipelines a rasterizer state asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineVariant {
    CullBack,
    CullFront,
    CullNone,
    Wireframe,
}

impl PipelineVariant {
    const fn for_state(state: RasterizerState) -> Self {
        match (state.fill, state.cull) {
            (FillMode::Wireframe, _) => Self::Wireframe,
            (FillMode::Solid, CullMode::Front) => Self::CullFront,
            (FillMode::Solid, CullMode::None) => Self::CullNone,
            (FillMode::Solid, CullMode::Back) => Self::CullBack,
        }
    }
}

impl ProgramPipelines {
    /// Optional variants fall back to back-face culling.
    fn select(&self, state: RasterizerState) -> &wgpu::RenderPipeline {
        match PipelineVariant::for_state(state) {
            PipelineVariant::Wireframe => self.wireframe.as_ref().unwrap_or(&self.cull_back),
            PipelineVariant::CullFront => &self.cull_front,
            PipelineVariant::CullNone => self.cull_none.as_ref().unwrap_or(&self.cull_back),
            PipelineVariant::CullBack => &self.cull_back,
        }
    }
}

#[derive(Debug)]
struct GpuBuffer {
    buffer: wgpu::Buffer,
    usage: BufferUsage,
    size: u64,
    /// Host copy while a write-discard window is open.
    staging: Option<Vec<u8>>,
    /// Uniform bind group, built on first bind.
    constants: Option<wgpu::BindGroup>,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Pipeline { program: u32, state: RasterizerState },
    VertexBuffer { slot: u32, buffer: u32 },
    IndexBuffer(u32),
    Constants { group: u32, buffer: u32 },
    Texture { group: u32, texture: u32 },
    Draw { indices: Range<u32>, instances: Range<u32> },
}

/// [`GraphicsDevice`] on top of a `wgpu` device and queue.
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    constant_layout: wgpu::BindGroupLayout,
    buffers: Vec<Option<GpuBuffer>>,
    programs: Vec<ProgramPipelines>,
    textures: Vec<wgpu::BindGroup>,
    commands: Vec<Command>,
    program: Option<u32>,
    state: RasterizerState,
    bound_pipeline: Option<(u32, RasterizerState)>,
}

impl WgpuDevice {
    /// Wraps a device and queue.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let constant_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prism constants"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        Self {
            device,
            queue,
            constant_layout,
            buffers: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            commands: Vec::new(),
            program: None,
            state: RasterizerState::SOLID_BACK,
            bound_pipeline: None,
        }
    }

    /// The underlying device, for building pipelines and textures.
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The underlying queue.
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Layout every constant group uses: one uniform buffer at binding 0.
    #[must_use]
    pub const fn constant_layout(&self) -> &wgpu::BindGroupLayout {
        &self.constant_layout
    }

    /// Registers a program's pipelines.
    pub fn register_program(&mut self, pipelines: ProgramPipelines) -> ProgramId {
        self.programs.push(pipelines);
        ProgramId(self.programs.len() as u32 - 1)
    }

    /// Registers a bind group holding a texture view and sampler.
    pub fn register_texture(&mut self, bind_group: wgpu::BindGroup) -> TextureId {
        self.textures.push(bind_group);
        TextureId(self.textures.len() as u32 - 1)
    }

    /// Replays the recorded commands into `pass`.
    ///
    /// Commands that name a buffer destroyed since recording are skipped.
    pub fn encode<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        for command in &self.commands {
            match command {
                Command::Pipeline { program, state } => {
                    if let Some(pipelines) = self.programs.get(*program as usize) {
                        pass.set_pipeline(pipelines.select(*state));
                    }
                }
                Command::VertexBuffer { slot, buffer } => {
                    if let Some(gpu) = self.gpu(*buffer) {
                        pass.set_vertex_buffer(*slot, gpu.buffer.slice(..));
                    }
                }
                Command::IndexBuffer(buffer) => {
                    if let Some(gpu) = self.gpu(*buffer) {
                        pass.set_index_buffer(gpu.buffer.slice(..), wgpu::IndexFormat::Uint32);
                    }
                }
                Command::Constants { group, buffer } => {
                    if let Some(bind_group) = self.gpu(*buffer).and_then(|g| g.constants.as_ref()) {
                        pass.set_bind_group(*group, bind_group, &[]);
                    }
                }
                Command::Texture { group, texture } => {
                    if let Some(bind_group) = self.textures.get(*texture as usize) {
                        pass.set_bind_group(*group, bind_group, &[]);
                    }
                }
                Command::Draw { indices, instances } => {
                    pass.draw_indexed(indices.clone(), 0, instances.clone());
                }
            }
        }
    }

    /// Drops the recorded commands after the pass has been encoded.
    pub fn finish_pass(&mut self) {
        self.commands.clear();
        self.bound_pipeline = None;
    }

    fn gpu(&self, buffer: u32) -> Option<&GpuBuffer> {
        self.buffers.get(buffer as usize).and_then(Option::as_ref)
    }
}

fn slot_mut(
    buffers: &mut [Option<GpuBuffer>],
    buffer: BufferId,
) -> Result<&mut GpuBuffer, DeviceError> {
    buffers
        .get_mut(buffer.0 as usize)
        .and_then(Option::as_mut)
        .ok_or(DeviceError::UnknownBuffer(buffer.0))
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), DeviceError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(DeviceError::OutOfRange { offset, len, size }),
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        if desc.size == 0 {
            return Err(DeviceError::ZeroSized {
                kind: desc.kind.name(),
            });
        }
        let role = match desc.kind {
            BufferKind::Vertex | BufferKind::Instance => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Constant => wgpu::BufferUsages::UNIFORM,
        };
        // Copy sizes must be 4-byte aligned.
        let size = desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage: role | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(initial) = desc.initial_data {
            check_range(0, initial.len() as u64, desc.size)?;
            self.queue.write_buffer(&buffer, 0, initial);
        }

        let gpu = GpuBuffer {
            buffer,
            usage: desc.usage,
            size: desc.size,
            staging: None,
            constants: None,
        };
        let index = match self.buffers.iter().position(Option::is_none) {
            Some(free) => {
                self.buffers[free] = Some(gpu);
                free
            }
            None => {
                self.buffers.push(Some(gpu));
                self.buffers.len() - 1
            }
        };
        Ok(BufferId(index as u32))
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(gpu) = self.buffers.get_mut(buffer.0 as usize).and_then(Option::take) {
            gpu.buffer.destroy();
        }
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let gpu = slot_mut(&mut self.buffers, buffer)?;
        check_range(offset, data.len() as u64, gpu.size)?;
        self.queue.write_buffer(&gpu.buffer, offset, data);
        Ok(())
    }

    fn map_write_discard(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        let gpu = slot_mut(&mut self.buffers, buffer)?;
        if gpu.usage != BufferUsage::Dynamic {
            return Err(DeviceError::NotWritable(buffer.0));
        }
        if gpu.staging.is_some() {
            return Err(DeviceError::AlreadyMapped(buffer.0));
        }
        gpu.staging = Some(vec![0; gpu.size as usize]);
        Ok(())
    }

    fn write_mapped(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let gpu = slot_mut(&mut self.buffers, buffer)?;
        let size = gpu.size;
        let staging = gpu.staging.as_mut().ok_or(DeviceError::NotMapped(buffer.0))?;
        check_range(offset, data.len() as u64, size)?;
        let start = offset as usize;
        staging[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn unmap(&mut self, buffer: BufferId) {
        let Some(gpu) = self.buffers.get_mut(buffer.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        if let Some(mut staging) = gpu.staging.take() {
            staging.resize(staging.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize), 0);
            self.queue.write_buffer(&gpu.buffer, 0, &staging);
        }
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, _stride: u32) {
        self.commands.push(Command::VertexBuffer {
            slot,
            buffer: buffer.0,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.commands.push(Command::IndexBuffer(buffer.0));
    }

    fn bind_program(&mut self, program: ProgramId) -> bool {
        if program.0 as usize >= self.programs.len() {
            return false;
        }
        self.program = Some(program.0);
        true
    }

    fn bind_constant_buffer(&mut self, slot: u32, buffer: BufferId) {
        let layout = &self.constant_layout;
        let device = &self.device;
        let Some(gpu) = self.buffers.get_mut(buffer.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        if gpu.constants.is_none() {
            gpu.constants = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("prism constants"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: gpu.buffer.as_entire_binding(),
                }],
            }));
        }
        self.commands.push(Command::Constants {
            group: slot,
            buffer: buffer.0,
        });
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureId) {
        self.commands.push(Command::Texture {
            group: TEXTURE_GROUP_BASE + slot,
            texture: texture.0,
        });
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.state = state;
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        start_instance: u32,
    ) {
        let Some(program) = self.program else {
            return;
        };
        let wanted = (program, self.state);
        if self.bound_pipeline != Some(wanted) {
            self.commands.push(Command::Pipeline {
                program,
                state: self.state,
            });
            self.bound_pipeline = Some(wanted);
        }
        self.commands.push(Command::Draw {
            indices: start_index..start_index + index_count,
            instances: start_instance..start_instance + instance_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layouts_cover_whole_stride() {
        for layout in [Vertex::desc(), GpuInstance::desc()] {
            let last = layout.attributes.last().unwrap();
            assert_eq!(last.offset + last.format.size(), layout.array_stride);
        }
        assert_eq!(Vertex::desc().step_mode, wgpu::VertexStepMode::Vertex);
        assert_eq!(GpuInstance::desc().step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(GpuInstance::ATTRIBS[0].shader_location, 5);
    }

    #[test]
    fn test_pipeline_variant_per_state() {
        assert_eq!(
            PipelineVariant::for_state(RasterizerState::SOLID_BACK),
            PipelineVariant::CullBack
        );
        assert_eq!(
            PipelineVariant::for_state(RasterizerState::SOLID_FRONT),
            PipelineVariant::CullFront
        );
        let none = RasterizerState {
            fill: FillMode::Solid,
            cull: CullMode::None,
        };
        assert_eq!(PipelineVariant::for_state(none), PipelineVariant::CullNone);
        let wire = RasterizerState {
            fill: FillMode::Wireframe,
            cull: CullMode::Front,
        };
        assert_eq!(PipelineVariant::for_state(wire), PipelineVariant::Wireframe);
    }

    #[test]
    fn test_write_range_checks() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(8, 8, 16).is_ok());
        assert_eq!(
            check_range(8, 9, 16),
            Err(DeviceError::OutOfRange {
                offset: 8,
                len: 9,
                size: 16
            })
        );
        assert!(check_range(u64::MAX, 1, 16).is_err());
    }

    #[test]
    fn test_released_slot_is_unknown() {
        let mut buffers: Vec<Option<GpuBuffer>> = vec![None];
        assert!(matches!(
            slot_mut(&mut buffers, BufferId(0)),
            Err(DeviceError::UnknownBuffer(0))
        ));
        assert!(matches!(
            slot_mut(&mut buffers, BufferId(3)),
            Err(DeviceError::UnknownBuffer(3))
        ));
    }
}
