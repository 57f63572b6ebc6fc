//! Name-keyed mesh ownership.

use std::collections::HashMap;

use prism_core::{Arena, SlotId};
use tracing::info;

use super::entry::MeshEntry;
use crate::buffer::Vertex;
use crate::config::InstancingConfig;
use crate::device::GraphicsDevice;
use crate::error::{RenderError, RenderResult};
use crate::instance::{InstanceData, InstanceHandle};

/// Owns every [`MeshEntry`], keyed by unique name.
///
/// Meshes are iterated in registry slot order, which is creation order
/// until a destroyed mesh's slot is reused.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: Arena<MeshEntry>,
    by_name: HashMap<String, SlotId>,
    instancing: InstancingConfig,
}

impl MeshRegistry {
    /// Creates an empty registry. New meshes use `instancing` for their
    /// instance buffers.
    #[must_use]
    pub fn new(instancing: InstancingConfig) -> Self {
        Self {
            meshes: Arena::new(),
            by_name: HashMap::new(),
            instancing,
        }
    }

    /// Registers a mesh.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MeshExists`] if the name is taken; the
    /// existing mesh is left untouched. Returns [`RenderError::Device`] if
    /// its buffers cannot be created.
    pub fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> RenderResult<SlotId> {
        if self.by_name.contains_key(name) {
            return Err(RenderError::MeshExists(name.to_owned()));
        }

        let entry = MeshEntry::new(device, name, vertices, indices, &self.instancing)?;
        let radius = entry.base_radius();
        let id = self.meshes.insert(entry);
        if let Some(entry) = self.meshes.get_mut(id) {
            entry.set_id(id);
        }
        self.by_name.insert(name.to_owned(), id);

        info!(mesh = name, radius, "mesh created");
        Ok(id)
    }

    /// Returns the mesh registered as `name`, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Device`] if a new mesh's buffers cannot be
    /// created.
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> RenderResult<SlotId> {
        match self.by_name.get(name) {
            Some(&id) => Ok(id),
            None => self.create(device, name, vertices, indices),
        }
    }

    /// Destroys a mesh: clears its instances, releases its buffers and
    /// removes it. Every handle into it becomes invalid.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MeshNotFound`] if no mesh has that name.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> RenderResult<()> {
        let id = self
            .by_name
            .remove(name)
            .ok_or_else(|| RenderError::MeshNotFound(name.to_owned()))?;
        if let Some(mut entry) = self.meshes.remove(id) {
            entry.release(device);
        }
        info!(mesh = name, "mesh destroyed");
        Ok(())
    }

    /// Destroys every mesh.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for entry in self.meshes.values_mut() {
            entry.release(device);
        }
        self.meshes.clear();
        self.by_name.clear();
    }

    /// Id of the mesh registered as `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<SlotId> {
        self.by_name.get(name).copied()
    }

    /// Mesh by id.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&MeshEntry> {
        self.meshes.get(id)
    }

    /// Mesh by id, mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut MeshEntry> {
        self.meshes.get_mut(id)
    }

    /// Mesh by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&MeshEntry> {
        self.id_of(name).and_then(|id| self.meshes.get(id))
    }

    /// Mesh by name, mutably.
    #[must_use]
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut MeshEntry> {
        let id = self.id_of(name)?;
        self.meshes.get_mut(id)
    }

    /// Adds an instance to the named mesh.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MeshNotFound`] if no mesh has that name.
    pub fn create_instance(&mut self, name: &str, data: InstanceData) -> RenderResult<InstanceHandle> {
        self.by_name_mut(name)
            .map(|mesh| mesh.create_instance(data))
            .ok_or_else(|| RenderError::MeshNotFound(name.to_owned()))
    }

    /// Number of registered meshes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// True if no meshes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Meshes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &MeshEntry)> {
        self.meshes.iter()
    }

    /// Meshes in slot order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut MeshEntry)> {
        self.meshes.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::cube;
    use crate::device::RecordingDevice;

    fn registry_with_cube(device: &mut RecordingDevice) -> MeshRegistry {
        let mut registry = MeshRegistry::default();
        let (vertices, indices) = cube(1.0);
        registry.create(device, "cube", vertices, indices).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut device = RecordingDevice::new();
        let mut registry = registry_with_cube(&mut device);
        let (vertices, indices) = cube(2.0);

        let err = registry
            .create(&mut device, "cube", vertices.clone(), indices.clone())
            .unwrap_err();
        assert_eq!(err, RenderError::MeshExists("cube".to_owned()));
        assert_eq!(registry.len(), 1);

        let id = registry.get_or_create(&mut device, "cube", vertices, indices).unwrap();
        assert_eq!(Some(id), registry.id_of("cube"));
        assert!((registry.get(id).unwrap().base_radius() - 0.866_025_4).abs() < 1e-6);
    }

    #[test]
    fn test_destroy_invalidates_handles() {
        let mut device = RecordingDevice::new();
        let mut registry = registry_with_cube(&mut device);
        let handle = registry.create_instance("cube", InstanceData::default()).unwrap();
        assert!(handle.is_valid(&registry));

        registry.destroy(&mut device, "cube").unwrap();
        assert!(!handle.is_valid(&registry));
        assert!(handle.get(&registry).is_none());
        assert!(!handle.destroy(&mut registry));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(
            registry.destroy(&mut device, "cube"),
            Err(RenderError::MeshNotFound("cube".to_owned()))
        );
    }

    #[test]
    fn test_recreated_mesh_does_not_revive_handles() {
        let mut device = RecordingDevice::new();
        let mut registry = registry_with_cube(&mut device);
        let handle = registry.create_instance("cube", InstanceData::default()).unwrap();

        registry.destroy(&mut device, "cube").unwrap();
        let (vertices, indices) = cube(1.0);
        registry.create(&mut device, "cube", vertices, indices).unwrap();
        registry.create_instance("cube", InstanceData::default()).unwrap();

        assert!(!handle.is_valid(&registry));
    }

    #[test]
    fn test_handle_update() {
        let mut device = RecordingDevice::new();
        let mut registry = registry_with_cube(&mut device);
        let handle = registry.create_instance("cube", InstanceData::default()).unwrap();

        handle
            .update(&mut registry, |data| data.color = glam::Vec4::ZERO)
            .unwrap();
        assert_eq!(handle.get(&registry).unwrap().color, glam::Vec4::ZERO);

        assert!(handle.destroy(&mut registry));
        assert_eq!(
            handle.update(&mut registry, |_| {}),
            Err(RenderError::InvalidHandle)
        );
    }

    #[test]
    fn test_failed_creation_registers_nothing() {
        let mut device = RecordingDevice::new();
        device.set_fail_buffer_creation(true);
        let mut registry = MeshRegistry::default();
        let (vertices, indices) = cube(1.0);

        assert!(matches!(
            registry.create(&mut device, "cube", vertices, indices),
            Err(RenderError::Device(_))
        ));
        assert!(registry.is_empty());
        assert!(registry.id_of("cube").is_none());
    }

    #[test]
    fn test_partial_creation_leaves_no_buffers() {
        let mut device = RecordingDevice::new();
        device.fail_buffer_creation_after(1);
        let mut registry = MeshRegistry::default();
        let (vertices, indices) = cube(1.0);

        assert!(registry
            .create(&mut device, "cube", vertices.clone(), indices.clone())
            .is_err());
        assert!(registry.is_empty());
        assert_eq!(device.live_buffers(), 0);

        device.set_fail_buffer_creation(false);
        registry.create(&mut device, "cube", vertices, indices).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
