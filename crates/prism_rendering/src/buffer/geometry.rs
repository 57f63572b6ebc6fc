//! Vertex and index buffers for one mesh shape.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use super::vertex::Vertex;
use crate::device::{BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice};
use crate::error::DeviceError;

/// A GPU-resident array plus its element count.
#[derive(Debug, Default)]
struct DeviceArray {
    buffer: Option<BufferId>,
    count: u32,
}

impl DeviceArray {
    /// Replaces the contents. Same element count updates in place,
    /// a different count recreates the buffer. Empty input is a no-op.
    fn upload(
        &mut self,
        device: &mut dyn GraphicsDevice,
        label: &str,
        kind: BufferKind,
        bytes: &[u8],
        count: usize,
    ) -> Result<(), DeviceError> {
        match self.stage(device, label, kind, bytes, count)? {
            Some(fresh) => {
                self.swap_in(device, fresh);
                Ok(())
            }
            None => self.write_in_place(device, bytes),
        }
    }

    /// Creates a new buffer for `count` elements unless the current one
    /// can be written in place. Returns `None` for in-place writes and for
    /// empty input. The current buffer is never touched.
    fn stage(
        &self,
        device: &mut dyn GraphicsDevice,
        label: &str,
        kind: BufferKind,
        bytes: &[u8],
        count: usize,
    ) -> Result<Option<Self>, DeviceError> {
        if count == 0 {
            return Ok(None);
        }
        let count = u32::try_from(count)
            .map_err(|_| DeviceError::CreationFailed(format!("{label}: {count} elements")))?;
        if self.buffer.is_some() && self.count == count {
            return Ok(None);
        }

        let buffer = device.create_buffer(&BufferDesc {
            label,
            kind,
            usage: BufferUsage::Default,
            size: bytes.len() as u64,
            initial_data: Some(bytes),
        })?;
        debug!(label, kind = kind.name(), count, "geometry buffer created");
        Ok(Some(Self {
            buffer: Some(buffer),
            count,
        }))
    }

    fn write_in_place(
        &self,
        device: &mut dyn GraphicsDevice,
        bytes: &[u8],
    ) -> Result<(), DeviceError> {
        match self.buffer {
            Some(buffer) if !bytes.is_empty() => device.update_buffer(buffer, 0, bytes),
            _ => Ok(()),
        }
    }

    fn swap_in(&mut self, device: &mut dyn GraphicsDevice, fresh: Self) {
        let mut old = std::mem::replace(self, fresh);
        old.release(device);
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.count = 0;
    }
}

/// Owns the vertex buffer, index buffer and optional shadow index buffer
/// of one mesh shape.
#[derive(Debug)]
pub struct GeometryBuffer {
    label: String,
    vertices: DeviceArray,
    indices: DeviceArray,
    shadow_indices: DeviceArray,
}

impl GeometryBuffer {
    /// Uploads a mesh shape.
    ///
    /// # Errors
    ///
    /// Returns the device error if either buffer cannot be created. Nothing
    /// stays allocated on the device in that case.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self, DeviceError> {
        let mut geometry = Self {
            label: label.to_owned(),
            vertices: DeviceArray::default(),
            indices: DeviceArray::default(),
            shadow_indices: DeviceArray::default(),
        };
        let uploaded = geometry
            .update_vertices(device, vertices)
            .and_then(|()| geometry.update_indices(device, indices));
        if let Err(err) = uploaded {
            geometry.release(device);
            return Err(err);
        }
        Ok(geometry)
    }

    /// Replaces the vertex data.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be written or recreated.
    pub fn update_vertices(
        &mut self,
        device: &mut dyn GraphicsDevice,
        vertices: &[Vertex],
    ) -> Result<(), DeviceError> {
        self.vertices.upload(
            device,
            &self.label,
            BufferKind::Vertex,
            bytemuck::cast_slice(vertices),
            vertices.len(),
        )
    }

    /// Replaces the index data.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be written or recreated.
    pub fn update_indices(
        &mut self,
        device: &mut dyn GraphicsDevice,
        indices: &[u32],
    ) -> Result<(), DeviceError> {
        self.indices.upload(
            device,
            &self.label,
            BufferKind::Index,
            bytemuck::cast_slice(indices),
            indices.len(),
        )
    }

    /// Replaces vertices and indices together.
    ///
    /// Buffers whose element count changes are created before anything
    /// is written, so a failed creation leaves the current buffers and
    /// counts as they were. If the in-place index write fails after an
    /// in-place vertex write, the vertex contents must be restored by the
    /// caller. Empty lists leave that buffer alone.
    ///
    /// # Errors
    ///
    /// Returns the device error if a buffer cannot be created or written.
    pub fn replace(
        &mut self,
        device: &mut dyn GraphicsDevice,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), DeviceError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let fresh_vertices = self.vertices.stage(
            device,
            &self.label,
            BufferKind::Vertex,
            vertex_bytes,
            vertices.len(),
        )?;
        let fresh_indices = match self.indices.stage(
            device,
            &self.label,
            BufferKind::Index,
            index_bytes,
            indices.len(),
        ) {
            Ok(staged) => staged,
            Err(err) => {
                if let Some(mut staged) = fresh_vertices {
                    staged.release(device);
                }
                return Err(err);
            }
        };

        let written = match (&fresh_vertices, &fresh_indices) {
            (None, None) => self
                .vertices
                .write_in_place(device, vertex_bytes)
                .and_then(|()| self.indices.write_in_place(device, index_bytes)),
            (None, Some(_)) => self.vertices.write_in_place(device, vertex_bytes),
            (Some(_), None) => self.indices.write_in_place(device, index_bytes),
            (Some(_), Some(_)) => Ok(()),
        };
        if let Err(err) = written {
            for mut staged in [fresh_vertices, fresh_indices].into_iter().flatten() {
                staged.release(device);
            }
            return Err(err);
        }

        if let Some(fresh) = fresh_vertices {
            self.vertices.swap_in(device, fresh);
        }
        if let Some(fresh) = fresh_indices {
            self.indices.swap_in(device, fresh);
        }
        Ok(())
    }

    /// Sets or clears the index list used during shadow rendering.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be written or recreated.
    pub fn set_shadow_indices(
        &mut self,
        device: &mut dyn GraphicsDevice,
        indices: Option<&[u32]>,
    ) -> Result<(), DeviceError> {
        match indices {
            Some(indices) if !indices.is_empty() => self.shadow_indices.upload(
                device,
                &self.label,
                BufferKind::Index,
                bytemuck::cast_slice(indices),
                indices.len(),
            ),
            _ => {
                self.shadow_indices.release(device);
                Ok(())
            }
        }
    }

    /// Number of vertices on the device.
    #[must_use]
    pub const fn vertex_count(&self) -> u32 {
        self.vertices.count
    }

    /// Number of indices on the device.
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.indices.count
    }

    /// Number of shadow indices, zero if none are set.
    #[must_use]
    pub const fn shadow_index_count(&self) -> u32 {
        self.shadow_indices.count
    }

    /// True if a shadow-specific index list is set.
    #[must_use]
    pub const fn has_shadow_indices(&self) -> bool {
        self.shadow_indices.buffer.is_some()
    }

    /// Binds the vertex buffer at `slot` and the main index buffer.
    pub fn bind(&self, device: &mut dyn GraphicsDevice, slot: u32) {
        if let Some(vb) = self.vertices.buffer {
            device.bind_vertex_buffer(slot, vb, Vertex::SIZE as u32);
        }
        if let Some(ib) = self.indices.buffer {
            device.bind_index_buffer(ib);
        }
    }

    /// Makes the shadow index buffer active until the returned guard drops.
    ///
    /// The main index buffer is rebound on every exit path. Without shadow
    /// indices the guard is inert and reports the main index count.
    pub fn swap_to_shadow_indices<'a>(
        &self,
        device: &'a mut dyn GraphicsDevice,
    ) -> ShadowIndexSwap<'a> {
        match (self.shadow_indices.buffer, self.indices.buffer) {
            (Some(shadow), restore) => {
                device.bind_index_buffer(shadow);
                ShadowIndexSwap {
                    device,
                    restore,
                    index_count: self.shadow_indices.count,
                }
            }
            (None, _) => ShadowIndexSwap {
                device,
                restore: None,
                index_count: self.indices.count,
            },
        }
    }

    /// Releases every device buffer.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.vertices.release(device);
        self.indices.release(device);
        self.shadow_indices.release(device);
    }
}

/// Scope during which the shadow index list is the active index buffer.
///
/// Derefs to the device so draws can be issued through it.
pub struct ShadowIndexSwap<'a> {
    device: &'a mut dyn GraphicsDevice,
    restore: Option<BufferId>,
    index_count: u32,
}

impl ShadowIndexSwap<'_> {
    /// Index count of the active index list.
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl<'a> Deref for ShadowIndexSwap<'a> {
    type Target = dyn GraphicsDevice + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl<'a> DerefMut for ShadowIndexSwap<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for ShadowIndexSwap<'_> {
    fn drop(&mut self) {
        if let Some(main) = self.restore {
            self.device.bind_index_buffer(main);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::vertex::cube;
    use crate::device::{DeviceCommand, RecordingDevice};

    #[test]
    fn test_same_count_updates_in_place() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();
        assert_eq!(device.live_buffers(), 2);

        let log = device.log();
        let _ = log.take();
        let (bigger, _) = cube(2.0);
        geometry.update_vertices(&mut device, &bigger).unwrap();

        let commands = log.take();
        assert!(matches!(commands.as_slice(), [DeviceCommand::UpdateBuffer { .. }]));
        assert_eq!(geometry.vertex_count(), 8);
    }

    #[test]
    fn test_new_count_recreates() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();

        geometry.update_indices(&mut device, &indices[..6]).unwrap();
        assert_eq!(geometry.index_count(), 6);
        assert_eq!(device.live_buffers(), 2);
    }

    #[test]
    fn test_failed_index_upload_releases_vertices() {
        let mut device = RecordingDevice::new();
        device.fail_buffer_creation_after(1);
        let (vertices, indices) = cube(1.0);

        let result = GeometryBuffer::new(&mut device, "cube", &vertices, &indices);
        assert!(matches!(result, Err(DeviceError::CreationFailed(_))));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_failed_replace_keeps_current_buffers() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();

        // new vertex buffer succeeds, new index buffer fails
        device.fail_buffer_creation_after(1);
        let triangle = [
            Vertex::at(0.0, 0.0, 0.0),
            Vertex::at(1.0, 0.0, 0.0),
            Vertex::at(0.0, 1.0, 0.0),
        ];
        assert!(geometry.replace(&mut device, &triangle, &[0, 1, 2]).is_err());

        assert_eq!(geometry.vertex_count(), 8);
        assert_eq!(geometry.index_count(), 36);
        assert_eq!(device.live_buffers(), 2);
    }

    #[test]
    fn test_replace_mixes_in_place_and_recreate() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();

        let log = device.log();
        let _ = log.take();
        let (bigger, _) = cube(2.0);
        geometry.replace(&mut device, &bigger, &indices[..6]).unwrap();

        assert_eq!(geometry.vertex_count(), 8);
        assert_eq!(geometry.index_count(), 6);
        assert_eq!(device.live_buffers(), 2);
        assert_eq!(
            log.count(|c| matches!(c, DeviceCommand::UpdateBuffer { .. })),
            1
        );
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();

        geometry.update_indices(&mut device, &[]).unwrap();
        assert_eq!(geometry.index_count(), 36);
    }

    #[test]
    fn test_shadow_swap_restores_main_indices() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let mut geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();
        geometry
            .set_shadow_indices(&mut device, Some(&indices[..12]))
            .unwrap();

        let log = device.log();
        let _ = log.take();
        {
            let mut swap = geometry.swap_to_shadow_indices(&mut device);
            assert_eq!(swap.index_count(), 12);
            swap.draw_indexed_instanced(12, 1, 0, 0);
        }

        let binds: Vec<_> = log
            .take()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::BindIndexBuffer(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(binds.len(), 2);
        assert_ne!(binds[0], binds[1]);
    }

    #[test]
    fn test_swap_without_shadow_indices_is_inert() {
        let mut device = RecordingDevice::new();
        let (vertices, indices) = cube(1.0);
        let geometry = GeometryBuffer::new(&mut device, "cube", &vertices, &indices).unwrap();

        let log = device.log();
        let _ = log.take();
        let count = geometry.swap_to_shadow_indices(&mut device).index_count();
        assert_eq!(count, 36);
        assert!(log.take().is_empty());
    }
}
