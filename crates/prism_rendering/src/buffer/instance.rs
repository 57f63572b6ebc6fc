//! Resizable per-instance buffer with a scoped write-discard window.
//!
//! The buffer holds [`GpuInstance`] records. Capacity only grows through
//! [`InstanceBuffer::ensure_capacity`]; it shrinks only on an explicit
//! [`InstanceBuffer::resize`]. Writes go through a [`MappedInstances`] guard
//! that refuses to write past capacity and unmaps on drop.

use tracing::debug;

use super::gpu_instance::GpuInstance;
use crate::config::GrowthPolicy;
use crate::device::{BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice};
use crate::error::DeviceError;

/// CPU-writable instance buffer for one mesh.
#[derive(Debug)]
pub struct InstanceBuffer {
    label: String,
    buffer: Option<BufferId>,
    capacity: u32,
    written: u32,
    growth: GrowthPolicy,
}

impl InstanceBuffer {
    /// Creates an empty buffer. No device memory is allocated yet.
    #[must_use]
    pub fn new(label: &str, growth: GrowthPolicy) -> Self {
        Self {
            label: label.to_owned(),
            buffer: None,
            capacity: 0,
            written: 0,
            growth,
        }
    }

    /// Capacity in instances.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Instances written by the most recent map window.
    #[inline]
    #[must_use]
    pub const fn written(&self) -> u32 {
        self.written
    }

    /// Device buffer, if allocated.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Growth policy in effect.
    #[must_use]
    pub const fn growth(&self) -> GrowthPolicy {
        self.growth
    }

    /// Grows the buffer to hold at least `required` instances.
    ///
    /// Does nothing if the capacity already suffices. Otherwise the old
    /// buffer is destroyed and a new one created: at exactly `required`
    /// under [`GrowthPolicy::Exact`], at the next power-of-two multiple of
    /// the old capacity under [`GrowthPolicy::Geometric`].
    ///
    /// # Errors
    ///
    /// Returns the device error if the new buffer cannot be created. The
    /// buffer is then left empty with zero capacity.
    pub fn ensure_capacity(
        &mut self,
        device: &mut dyn GraphicsDevice,
        required: u32,
    ) -> Result<(), DeviceError> {
        if required <= self.capacity {
            return Ok(());
        }
        let target = match self.growth {
            GrowthPolicy::Exact => required,
            GrowthPolicy::Geometric => {
                let mut next = self.capacity.max(1);
                while next < required {
                    next = next.saturating_mul(2);
                }
                next
            }
        };
        self.resize(device, target)
    }

    /// Recreates the buffer at exactly `capacity` instances.
    ///
    /// `resize(0)` releases the device buffer.
    ///
    /// # Errors
    ///
    /// Returns the device error if the new buffer cannot be created.
    pub fn resize(
        &mut self,
        device: &mut dyn GraphicsDevice,
        capacity: u32,
    ) -> Result<(), DeviceError> {
        self.release(device);
        if capacity == 0 {
            return Ok(());
        }

        let buffer = device.create_buffer(&BufferDesc {
            label: &self.label,
            kind: BufferKind::Instance,
            usage: BufferUsage::Dynamic,
            size: u64::from(capacity) * GpuInstance::SIZE as u64,
            initial_data: None,
        })?;
        self.buffer = Some(buffer);
        self.capacity = capacity;
        debug!(label = %self.label, capacity, "instance buffer resized");
        Ok(())
    }

    /// Opens a write-discard window over the whole buffer.
    ///
    /// Returns `Ok(None)` if no device buffer is allocated. The window is
    /// closed when the returned guard drops, on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be mapped.
    pub fn map<'a>(
        &'a mut self,
        device: &'a mut dyn GraphicsDevice,
    ) -> Result<Option<MappedInstances<'a>>, DeviceError> {
        let Some(buffer) = self.buffer else {
            self.written = 0;
            return Ok(None);
        };
        device.map_write_discard(buffer)?;
        Ok(Some(MappedInstances {
            owner: self,
            device,
            buffer,
            len: 0,
        }))
    }

    /// Binds the buffer as a per-instance vertex stream.
    pub fn bind(&self, device: &mut dyn GraphicsDevice, slot: u32) {
        if let Some(buffer) = self.buffer {
            device.bind_vertex_buffer(slot, buffer, GpuInstance::STRIDE);
        }
    }

    /// Releases the device buffer.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.capacity = 0;
        self.written = 0;
    }
}

/// Result of pushing into a [`MappedInstances`] window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// The record was written.
    Written,
    /// The window is full; nothing was written.
    Full,
}

/// Exclusive write window into an [`InstanceBuffer`].
///
/// Holds the only mutable path to the buffer and the device for its
/// lifetime. Unmaps and records the written count on drop.
pub struct MappedInstances<'a> {
    owner: &'a mut InstanceBuffer,
    device: &'a mut dyn GraphicsDevice,
    buffer: BufferId,
    len: u32,
}

impl MappedInstances<'_> {
    /// Records written so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// True if nothing has been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of the underlying buffer.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.owner.capacity
    }

    /// True if another push would not fit.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len >= self.owner.capacity
    }

    /// Writes one record into the next free slot.
    ///
    /// # Errors
    ///
    /// Returns the device error if the write is rejected.
    pub fn push(&mut self, instance: &GpuInstance) -> Result<Push, DeviceError> {
        if self.is_full() {
            return Ok(Push::Full);
        }
        let offset = u64::from(self.len) * GpuInstance::SIZE as u64;
        self.device
            .write_mapped(self.buffer, offset, bytemuck::bytes_of(instance))?;
        self.len += 1;
        Ok(Push::Written)
    }
}

impl Drop for MappedInstances<'_> {
    fn drop(&mut self) {
        self.device.unmap(self.buffer);
        self.owner.written = self.len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCommand, RecordingDevice};
    use glam::{Mat3, Mat4, Vec4};

    fn record(x: f32) -> GpuInstance {
        GpuInstance::pack(
            &Mat4::from_translation(glam::Vec3::new(x, 0.0, 0.0)),
            Vec4::ONE,
            &Mat3::IDENTITY,
        )
    }

    #[test]
    fn test_exact_growth() {
        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Exact);

        buffer.ensure_capacity(&mut device, 3).unwrap();
        assert_eq!(buffer.capacity(), 3);
        buffer.ensure_capacity(&mut device, 2).unwrap();
        assert_eq!(buffer.capacity(), 3);
        buffer.ensure_capacity(&mut device, 7).unwrap();
        assert_eq!(buffer.capacity(), 7);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn test_geometric_growth() {
        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Geometric);

        buffer.ensure_capacity(&mut device, 3).unwrap();
        assert_eq!(buffer.capacity(), 4);
        buffer.ensure_capacity(&mut device, 5).unwrap();
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn test_push_stops_at_capacity() {
        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Exact);
        buffer.ensure_capacity(&mut device, 2).unwrap();

        {
            let mut window = buffer.map(&mut device).unwrap().unwrap();
            assert_eq!(window.push(&record(1.0)).unwrap(), Push::Written);
            assert_eq!(window.push(&record(2.0)).unwrap(), Push::Written);
            assert_eq!(window.push(&record(3.0)).unwrap(), Push::Full);
            assert!(window.is_full());
        }
        assert_eq!(buffer.written(), 2);
        assert!(!device.is_mapped(buffer.buffer().unwrap()));
    }

    #[test]
    fn test_early_return_unmaps() {
        fn write_one(buffer: &mut InstanceBuffer, device: &mut RecordingDevice) -> Option<()> {
            let mut window = buffer.map(device).ok()??;
            window.push(&record(0.0)).ok()?;
            None
        }

        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Exact);
        buffer.ensure_capacity(&mut device, 1).unwrap();

        assert!(write_one(&mut buffer, &mut device).is_none());
        let id = buffer.buffer().unwrap();
        assert!(!device.is_mapped(id));
        assert_eq!(
            device.log().count(|c| matches!(c, DeviceCommand::Unmap(_))),
            1
        );
    }

    #[test]
    fn test_resize_zero_releases() {
        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Exact);
        buffer.ensure_capacity(&mut device, 4).unwrap();

        buffer.resize(&mut device, 0).unwrap();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.buffer().is_none());
        assert_eq!(device.live_buffers(), 0);
        assert!(buffer.map(&mut device).unwrap().is_none());
    }

    #[test]
    fn test_failed_growth_leaves_empty_buffer() {
        let mut device = RecordingDevice::new();
        let mut buffer = InstanceBuffer::new("test", GrowthPolicy::Exact);
        buffer.ensure_capacity(&mut device, 2).unwrap();

        device.set_fail_buffer_creation(true);
        assert!(buffer.ensure_capacity(&mut device, 8).is_err());
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.buffer().is_none());
    }
}
