//! Validity-checked references to instances.

use prism_core::SlotId;

use super::data::InstanceData;
use crate::error::{RenderError, RenderResult};
use crate::mesh::MeshRegistry;

/// Reference to one instance of one registered mesh.
///
/// A handle owns nothing. Every access resolves the mesh id and the
/// instance id against the registry, so a handle whose instance was
/// destroyed, whose slot was recycled, or whose mesh was removed simply
/// stops resolving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    mesh: SlotId,
    instance: SlotId,
}

impl InstanceHandle {
    /// A handle that never resolves.
    pub const NULL: Self = Self {
        mesh: SlotId::NULL,
        instance: SlotId::NULL,
    };

    pub(crate) const fn new(mesh: SlotId, instance: SlotId) -> Self {
        Self { mesh, instance }
    }

    /// Registry id of the owning mesh.
    #[inline]
    #[must_use]
    pub const fn mesh_id(self) -> SlotId {
        self.mesh
    }

    /// Id of the instance within its mesh's store.
    #[inline]
    #[must_use]
    pub const fn instance_id(self) -> SlotId {
        self.instance
    }

    /// True while the referenced instance is live.
    #[must_use]
    pub fn is_valid(self, registry: &MeshRegistry) -> bool {
        registry
            .get(self.mesh)
            .is_some_and(|mesh| mesh.instances().contains(self.instance))
    }

    /// The instance's data, or `None` once the handle is invalid.
    #[must_use]
    pub fn get(self, registry: &MeshRegistry) -> Option<&InstanceData> {
        registry.get(self.mesh)?.instances().get(self.instance)
    }

    /// Mutable access to the instance's data, or `None` once invalid.
    #[must_use]
    pub fn get_mut(self, registry: &mut MeshRegistry) -> Option<&mut InstanceData> {
        registry
            .get_mut(self.mesh)?
            .instances_mut()
            .get_mut(self.instance)
    }

    /// Applies `update` to the instance's data.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidHandle`] if the handle no longer resolves.
    pub fn update(
        self,
        registry: &mut MeshRegistry,
        update: impl FnOnce(&mut InstanceData),
    ) -> RenderResult<()> {
        let data = self.get_mut(registry).ok_or(RenderError::InvalidHandle)?;
        update(data);
        Ok(())
    }

    /// Destroys the instance. Returns false if the handle was already invalid.
    pub fn destroy(self, registry: &mut MeshRegistry) -> bool {
        registry
            .get_mut(self.mesh)
            .is_some_and(|mesh| mesh.instances_mut().destroy(self.instance))
    }
}
