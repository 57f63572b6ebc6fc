//! One mesh shape with its instances, buffers and material.

use prism_core::SlotId;
use tracing::warn;

use crate::buffer::{GeometryBuffer, InstanceBuffer, Vertex};
use crate::config::InstancingConfig;
use crate::culling::{CullVolume, PackOutcome, VisibilityCuller};
use crate::device::GraphicsDevice;
use crate::error::DeviceError;
use crate::instance::{InstanceData, InstanceHandle, InstanceStore};
use crate::material::MaterialRef;
use crate::math::bounding_radius;

/// Vertex-stream slot of the geometry.
pub const GEOMETRY_SLOT: u32 = 0;
/// Vertex-stream slot of the per-instance data.
pub const INSTANCE_SLOT: u32 = 1;

/// Where a mesh is in the current frame.
///
/// `Idle -> RadiiRecomputed -> Culled -> Packed -> Drawn -> Idle`. A mesh
/// with nothing visible goes from `Packed` to `Drawn` without a draw call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeshPhase {
    /// Between frames.
    #[default]
    Idle,
    /// Effective radii are current.
    RadiiRecomputed,
    /// Visibility flags are current.
    Culled,
    /// Visible instances are in the instance buffer.
    Packed,
    /// Draw issued, or skipped because nothing was visible.
    Drawn,
}

/// A named mesh shape and everything needed to draw its instances.
#[derive(Debug)]
pub struct MeshEntry {
    id: SlotId,
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    shadow_indices: Option<Vec<u32>>,
    base_radius: f32,
    material: Option<MaterialRef>,
    geometry: GeometryBuffer,
    instance_buffer: InstanceBuffer,
    instances: InstanceStore,
    casts_shadow: bool,
    cull_outside_frustum: bool,
    visible_count: u32,
    phase: MeshPhase,
}

impl MeshEntry {
    /// Uploads the shape and allocates the configured initial capacity.
    pub(crate) fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        config: &InstancingConfig,
    ) -> Result<Self, DeviceError> {
        let mut geometry = GeometryBuffer::new(device, name, &vertices, &indices)?;
        let mut instance_buffer = InstanceBuffer::new(name, config.growth);
        if let Err(err) = instance_buffer.ensure_capacity(device, config.initial_capacity) {
            geometry.release(device);
            return Err(err);
        }

        let mut entry = Self {
            id: SlotId::NULL,
            name: name.to_owned(),
            vertices,
            indices,
            shadow_indices: None,
            base_radius: 0.0,
            material: None,
            geometry,
            instance_buffer,
            instances: InstanceStore::new(),
            casts_shadow: true,
            cull_outside_frustum: true,
            visible_count: 0,
            phase: MeshPhase::Idle,
        };
        entry.recompute_base_radius();
        Ok(entry)
    }

    pub(crate) fn set_id(&mut self, id: SlotId) {
        self.id = id;
    }

    /// Registry id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SlotId {
        self.id
    }

    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// CPU copy of the vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// CPU copy of the indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Shadow-pass index list, if set.
    #[must_use]
    pub fn shadow_indices(&self) -> Option<&[u32]> {
        self.shadow_indices.as_deref()
    }

    /// Largest vertex distance from the local origin.
    #[inline]
    #[must_use]
    pub const fn base_radius(&self) -> f32 {
        self.base_radius
    }

    /// Assigned material.
    #[must_use]
    pub fn material(&self) -> Option<&MaterialRef> {
        self.material.as_ref()
    }

    /// Assigns or clears the material. Meshes without one are not drawn.
    pub fn set_material(&mut self, material: Option<MaterialRef>) {
        self.material = material;
    }

    /// True if drawn in the shadow pass.
    #[must_use]
    pub const fn casts_shadow(&self) -> bool {
        self.casts_shadow
    }

    /// Includes or excludes the mesh from the shadow pass.
    pub fn set_casts_shadow(&mut self, casts_shadow: bool) {
        self.casts_shadow = casts_shadow;
    }

    /// True if instances outside the camera frustum are dropped.
    #[must_use]
    pub const fn cull_outside_frustum(&self) -> bool {
        self.cull_outside_frustum
    }

    /// Turns camera culling on or off. Off packs every live instance.
    pub fn set_cull_outside_frustum(&mut self, cull: bool) {
        self.cull_outside_frustum = cull;
    }

    /// Instances written by the most recent pack.
    #[inline]
    #[must_use]
    pub const fn visible_count(&self) -> u32 {
        self.visible_count
    }

    /// Index count of the main index list.
    #[inline]
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.geometry.index_count()
    }

    /// Frame phase.
    #[must_use]
    pub const fn phase(&self) -> MeshPhase {
        self.phase
    }

    /// Live instances.
    #[must_use]
    pub const fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    /// Live instances, mutably.
    #[must_use]
    pub fn instances_mut(&mut self) -> &mut InstanceStore {
        &mut self.instances
    }

    /// The instance buffer.
    #[must_use]
    pub const fn instance_buffer(&self) -> &InstanceBuffer {
        &self.instance_buffer
    }

    /// The geometry buffers.
    #[must_use]
    pub const fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    /// Adds an instance.
    pub fn create_instance(&mut self, data: InstanceData) -> InstanceHandle {
        InstanceHandle::new(self.id, self.instances.create(data))
    }

    /// Removes an instance. Returns false for handles into other meshes or
    /// handles that are already invalid.
    pub fn destroy_instance(&mut self, handle: InstanceHandle) -> bool {
        handle.mesh_id() == self.id && self.instances.destroy(handle.instance_id())
    }

    /// Removes every instance.
    pub fn clear_instances(&mut self) {
        self.instances.clear();
        self.visible_count = 0;
    }

    /// Recomputes the base radius from the CPU vertices.
    pub fn recompute_base_radius(&mut self) {
        self.base_radius = bounding_radius(self.vertices.iter().map(Vertex::position));
    }

    /// Recomputes every instance's effective radius.
    pub fn recompute_instance_radii(&mut self) {
        self.instances.recompute_radii(self.base_radius);
        self.phase = MeshPhase::RadiiRecomputed;
    }

    /// Replaces the shape.
    ///
    /// Buffers are updated in place when the element count is unchanged
    /// and recreated otherwise. An empty list leaves both the CPU and the
    /// device copy of that list alone.
    ///
    /// # Errors
    ///
    /// Returns the device error if a buffer cannot be written or recreated.
    /// The shape and base radius are then unchanged.
    pub fn update_mesh_data(
        &mut self,
        device: &mut dyn GraphicsDevice,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> Result<(), DeviceError> {
        if let Err(err) = self.geometry.replace(device, &vertices, &indices) {
            if let Err(restore) = self.geometry.update_vertices(device, &self.vertices) {
                warn!(mesh = %self.name, error = %restore, "vertex buffer not restored");
            }
            return Err(err);
        }

        if !vertices.is_empty() {
            self.vertices = vertices;
            self.recompute_base_radius();
        }
        if !indices.is_empty() {
            self.indices = indices;
        }
        Ok(())
    }

    /// Sets or clears the index list drawn in the shadow pass.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be created.
    pub fn set_shadow_indices(
        &mut self,
        device: &mut dyn GraphicsDevice,
        indices: Option<Vec<u32>>,
    ) -> Result<(), DeviceError> {
        self.geometry
            .set_shadow_indices(device, indices.as_deref())?;
        self.shadow_indices = indices.filter(|i| !i.is_empty());
        Ok(())
    }

    /// Culls against `volume` and packs the survivors into the instance
    /// buffer.
    ///
    /// The buffer is grown to the live instance count first. A mesh with
    /// no instances is left alone.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be grown, mapped or
    /// written. The visible count is zero afterwards.
    pub fn update_visible_instances(
        &mut self,
        device: &mut dyn GraphicsDevice,
        culler: &VisibilityCuller,
        volume: CullVolume<'_>,
    ) -> Result<PackOutcome, DeviceError> {
        self.visible_count = 0;
        if self.instances.is_empty() {
            self.phase = MeshPhase::Packed;
            return Ok(PackOutcome::default());
        }

        culler.classify(&mut self.instances, volume);
        self.phase = MeshPhase::Culled;

        let required = u32::try_from(self.instances.count()).unwrap_or(u32::MAX);
        if self.instance_buffer.capacity() < required {
            self.instance_buffer.ensure_capacity(device, required)?;
        }

        let outcome = match self.instance_buffer.map(device)? {
            Some(mut window) => culler.pack(&self.instances, volume.pass(), &mut window)?,
            None => PackOutcome::default(),
        };

        if outcome.overflowed {
            warn!(mesh = %self.name, visible = outcome.visible, "pack truncated at buffer capacity");
        }
        self.visible_count = outcome.visible;
        self.phase = MeshPhase::Packed;
        Ok(outcome)
    }

    /// Draws the packed instances with the main index list.
    ///
    /// Returns false, and issues no draw, when nothing is visible.
    pub fn draw_visible(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        self.geometry.bind(device, GEOMETRY_SLOT);
        let drawn = self.visible_count > 0;
        if drawn {
            self.instance_buffer.bind(device, INSTANCE_SLOT);
            device.draw_indexed_instanced(self.geometry.index_count(), self.visible_count, 0, 0);
        }
        self.phase = MeshPhase::Drawn;
        drawn
    }

    /// Draws the packed instances with the shadow index list when one is
    /// set. The main index buffer is active again on return.
    pub fn draw_visible_shadow(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        self.geometry.bind(device, GEOMETRY_SLOT);
        let drawn = self.visible_count > 0;
        if drawn {
            self.instance_buffer.bind(device, INSTANCE_SLOT);
            let mut swap = self.geometry.swap_to_shadow_indices(device);
            let index_count = swap.index_count();
            swap.draw_indexed_instanced(index_count, self.visible_count, 0, 0);
        }
        self.phase = MeshPhase::Drawn;
        drawn
    }

    /// Marks the frame finished.
    pub fn end_frame(&mut self) {
        self.phase = MeshPhase::Idle;
    }

    /// Releases every device buffer and drops all instances.
    pub(crate) fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.clear_instances();
        self.instance_buffer.release(device);
        self.geometry.release(device);
    }
}
