//! Headless device.
//!
//! Keeps every buffer's bytes in host memory and appends each call to a
//! shared [`CommandLog`]. Map windows follow write-discard semantics: the
//! buffer is zero-filled when the window opens, so nothing written before
//! the window is readable through it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice, ProgramId, RasterizerState,
    TextureId,
};
use crate::error::DeviceError;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// A buffer was created.
    CreateBuffer {
        /// New buffer id.
        buffer: BufferId,
        /// Binding kind.
        kind: BufferKind,
        /// Size in bytes.
        size: u64,
    },
    /// A buffer was released.
    DestroyBuffer(BufferId),
    /// A buffer region was overwritten.
    UpdateBuffer {
        /// Target buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Bytes written.
        len: u64,
    },
    /// A write-discard window was opened.
    Map(BufferId),
    /// A write-discard window was closed.
    Unmap(BufferId),
    /// A vertex stream was bound.
    BindVertexBuffer {
        /// Input slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Element stride in bytes.
        stride: u32,
    },
    /// An index buffer was bound.
    BindIndexBuffer(BufferId),
    /// A program was bound.
    BindProgram(ProgramId),
    /// A constant buffer was bound.
    BindConstantBuffer {
        /// Shader slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
    },
    /// A texture was bound.
    BindTexture {
        /// Shader slot.
        slot: u32,
        /// Bound texture.
        texture: TextureId,
    },
    /// The rasterizer state changed.
    SetRasterizerState(RasterizerState),
    /// An indexed, instanced draw was issued.
    DrawIndexedInstanced {
        /// Indices per instance.
        index_count: u32,
        /// Instances drawn.
        instance_count: u32,
        /// First index.
        start_index: u32,
        /// First instance.
        start_instance: u32,
    },
}

/// Shared, cloneable view of a device's command history.
///
/// A test can keep a clone while the device itself is mutably borrowed by
/// the code under test.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<DeviceCommand>>>,
}

impl CommandLog {
    fn push(&self, command: DeviceCommand) {
        self.commands.lock().push(command);
    }

    /// Returns a copy of every recorded command.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }

    /// Removes and returns every recorded command.
    #[must_use]
    pub fn take(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Returns `(index_count, instance_count)` for every recorded draw.
    #[must_use]
    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.commands
            .lock()
            .iter()
            .filter_map(|cmd| match *cmd {
                DeviceCommand::DrawIndexedInstanced {
                    index_count,
                    instance_count,
                    ..
                } => Some((index_count, instance_count)),
                _ => None,
            })
            .collect()
    }

    /// Counts recorded commands matching a predicate.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|cmd| pred(cmd)).count()
    }
}

#[derive(Debug)]
struct HostBuffer {
    kind: BufferKind,
    usage: BufferUsage,
    bytes: Vec<u8>,
    mapped: bool,
}

/// Headless [`GraphicsDevice`] backed by host memory.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    buffers: Vec<Option<HostBuffer>>,
    programs: u32,
    log: CommandLog,
    /// Creations still allowed before `create_buffer` starts failing.
    creations_left: Option<u32>,
}

impl RecordingDevice {
    /// Creates an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the command history.
    #[must_use]
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Registers a compiled program and returns its id.
    pub fn register_program(&mut self) -> ProgramId {
        let id = ProgramId(self.programs);
        self.programs += 1;
        id
    }

    /// Makes every subsequent `create_buffer` fail until switched off.
    pub fn set_fail_buffer_creation(&mut self, fail: bool) {
        self.creations_left = fail.then_some(0);
    }

    /// Lets `successes` more buffers be created, then fails every
    /// `create_buffer` until switched off.
    pub fn fail_buffer_creation_after(&mut self, successes: u32) {
        self.creations_left = Some(successes);
    }

    /// Returns the current contents of a buffer.
    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.host(buffer).ok().map(|b| b.bytes.as_slice())
    }

    /// Returns the size of a buffer in bytes.
    #[must_use]
    pub fn buffer_size(&self, buffer: BufferId) -> Option<u64> {
        self.host(buffer).ok().map(|b| b.bytes.len() as u64)
    }

    /// Returns the binding kind of a buffer.
    #[must_use]
    pub fn buffer_kind(&self, buffer: BufferId) -> Option<BufferKind> {
        self.host(buffer).ok().map(|b| b.kind)
    }

    /// Returns true if a buffer is inside a map window.
    #[must_use]
    pub fn is_mapped(&self, buffer: BufferId) -> bool {
        self.host(buffer).is_ok_and(|b| b.mapped)
    }

    /// Returns the number of live buffers.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn host(&self, buffer: BufferId) -> Result<&HostBuffer, DeviceError> {
        self.buffers
            .get(buffer.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(DeviceError::UnknownBuffer(buffer.0))
    }

    fn host_mut(&mut self, buffer: BufferId) -> Result<&mut HostBuffer, DeviceError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(DeviceError::UnknownBuffer(buffer.0))
    }
}

fn write_range(target: &mut [u8], offset: u64, data: &[u8]) -> Result<(), DeviceError> {
    let size = target.len() as u64;
    let len = data.len() as u64;
    let end = offset.checked_add(len).filter(|&end| end <= size).ok_or(
        DeviceError::OutOfRange { offset, len, size },
    )?;
    target[offset as usize..end as usize].copy_from_slice(data);
    Ok(())
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        if desc.size == 0 {
            return Err(DeviceError::ZeroSized {
                kind: desc.kind.name(),
            });
        }
        match &mut self.creations_left {
            Some(0) => {
                return Err(DeviceError::CreationFailed(format!(
                    "{} ({} bytes)",
                    desc.label, desc.size
                )));
            }
            Some(left) => *left -= 1,
            None => {}
        }

        let mut bytes = vec![0u8; desc.size as usize];
        if let Some(initial) = desc.initial_data {
            write_range(&mut bytes, 0, initial)?;
        }

        let id = match self.buffers.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                self.buffers.push(None);
                self.buffers.len() - 1
            }
        };
        self.buffers[id] = Some(HostBuffer {
            kind: desc.kind,
            usage: desc.usage,
            bytes,
            mapped: false,
        });

        let buffer = BufferId(id as u32);
        self.log.push(DeviceCommand::CreateBuffer {
            buffer,
            kind: desc.kind,
            size: desc.size,
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if slot.take().is_some() {
                self.log.push(DeviceCommand::DestroyBuffer(buffer));
            }
        }
    }

    fn update_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let host = self.host_mut(buffer)?;
        write_range(&mut host.bytes, offset, data)?;
        self.log.push(DeviceCommand::UpdateBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn map_write_discard(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        let host = self.host_mut(buffer)?;
        if host.usage != BufferUsage::Dynamic {
            return Err(DeviceError::NotWritable(buffer.0));
        }
        if host.mapped {
            return Err(DeviceError::AlreadyMapped(buffer.0));
        }
        host.bytes.fill(0);
        host.mapped = true;
        self.log.push(DeviceCommand::Map(buffer));
        Ok(())
    }

    fn write_mapped(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let host = self.host_mut(buffer)?;
        if !host.mapped {
            return Err(DeviceError::NotMapped(buffer.0));
        }
        write_range(&mut host.bytes, offset, data)
    }

    fn unmap(&mut self, buffer: BufferId) {
        if let Ok(host) = self.host_mut(buffer) {
            if host.mapped {
                host.mapped = false;
                self.log.push(DeviceCommand::Unmap(buffer));
            }
        }
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32) {
        self.log.push(DeviceCommand::BindVertexBuffer {
            slot,
            buffer,
            stride,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.log.push(DeviceCommand::BindIndexBuffer(buffer));
    }

    fn bind_program(&mut self, program: ProgramId) -> bool {
        if program.0 >= self.programs {
            return false;
        }
        self.log.push(DeviceCommand::BindProgram(program));
        true
    }

    fn bind_constant_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.log
            .push(DeviceCommand::BindConstantBuffer { slot, buffer });
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureId) {
        self.log.push(DeviceCommand::BindTexture { slot, texture });
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.log.push(DeviceCommand::SetRasterizerState(state));
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        start_instance: u32,
    ) {
        self.log.push(DeviceCommand::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            start_instance,
        });
    }
}
