//! Material-batched draw submission.

use prism_core::SlotId;
use tracing::{debug, warn};

use super::frame::{FrameConstants, FRAME_CONSTANT_SLOT};
use super::raster::RasterScope;
use super::stats::DrawStats;
use crate::config::RenderConfig;
use crate::culling::{CullVolume, VisibilityCuller};
use crate::device::{
    BufferDesc, BufferId, BufferKind, BufferUsage, GraphicsDevice, ProgramId, RasterizerState,
};
use crate::error::DeviceError;
use crate::material::{same_material, MaterialRef};
use crate::math::{Frustum, OrientedBox};
use crate::mesh::{MeshEntry, MeshRegistry};

/// Meshes sharing one material, in registry order.
type MaterialGroup = (MaterialRef, Vec<SlotId>);

/// Drives a frame: frame constants, the shadow pass, the main pass and the
/// optional normal overlay.
///
/// State changes are kept to one program bind and one constant upload per
/// material per pass, and one draw call per mesh with visible instances.
#[derive(Debug)]
pub struct DrawCoordinator {
    config: RenderConfig,
    culler: VisibilityCuller,
    debug_program: Option<ProgramId>,
    frame_buffer: Option<BufferId>,
}

impl DrawCoordinator {
    /// Creates a coordinator. No device resources are allocated yet.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            culler: VisibilityCuller::new(config.instancing.degenerate_normals),
            config,
            debug_program: None,
            frame_buffer: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Turns the normal overlay on or off.
    pub fn set_debug_normals(&mut self, enabled: bool) {
        self.config.debug.normals = enabled;
    }

    /// Allocates the frame constant buffer and records the normal-overlay
    /// program. A missing program only disables the overlay.
    ///
    /// # Errors
    ///
    /// Returns the device error if the constant buffer cannot be created.
    pub fn initialise(
        &mut self,
        device: &mut dyn GraphicsDevice,
        debug_program: Option<ProgramId>,
    ) -> Result<(), DeviceError> {
        if debug_program.is_none() {
            warn!("debug normals program not found");
        }
        self.debug_program = debug_program;

        if self.frame_buffer.is_none() {
            self.frame_buffer = Some(device.create_buffer(&BufferDesc {
                label: "frame constants",
                kind: BufferKind::Constant,
                usage: BufferUsage::Default,
                size: FrameConstants::SIZE as u64,
                initial_data: None,
            })?);
        }
        Ok(())
    }

    /// Uploads the frame constants and binds them to slot 0.
    ///
    /// # Errors
    ///
    /// Returns the device error if the buffer cannot be created or written.
    pub fn begin_scene(
        &mut self,
        device: &mut dyn GraphicsDevice,
        frame: &FrameConstants,
    ) -> Result<(), DeviceError> {
        if self.frame_buffer.is_none() {
            self.initialise(device, self.debug_program)?;
        }
        let Some(buffer) = self.frame_buffer else {
            return Ok(());
        };
        device.update_buffer(buffer, 0, bytemuck::bytes_of(frame))?;
        device.bind_constant_buffer(FRAME_CONSTANT_SLOT, buffer);
        Ok(())
    }

    /// Returns every mesh to [`MeshPhase::Idle`](crate::mesh::MeshPhase::Idle).
    pub fn end_scene(&mut self, registry: &mut MeshRegistry) {
        for (_, mesh) in registry.iter_mut() {
            mesh.end_frame();
        }
    }

    /// Groups meshes with a material by material identity, in order of
    /// first appearance.
    fn material_groups(registry: &MeshRegistry) -> Vec<MaterialGroup> {
        let mut groups: Vec<MaterialGroup> = Vec::new();
        for (id, mesh) in registry.iter() {
            let Some(material) = mesh.material() else {
                continue;
            };
            match groups.iter_mut().find(|(m, _)| same_material(m, material)) {
                Some((_, meshes)) => meshes.push(id),
                None => groups.push((material.clone(), vec![id])),
            }
        }
        groups
    }

    /// Main pass.
    ///
    /// For each material: bind its program, upload and bind its constants,
    /// then for each of its meshes recompute radii, cull against `frustum`
    /// (or keep everything when the mesh opts out of culling), pack and
    /// draw. Meshes without a material are not drawn. A material whose
    /// program does not bind skips its whole group.
    pub fn render_meshes_by_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &mut MeshRegistry,
        frustum: &Frustum,
    ) -> DrawStats {
        let mut stats = DrawStats::default();

        for (material, meshes) in Self::material_groups(registry) {
            if !material.bind_program(device) {
                warn!(material = material.name(), "material program failed to bind");
                continue;
            }
            if let Err(err) = material.upload_constants(device) {
                warn!(material = material.name(), error = %err, "material constants upload failed");
                continue;
            }
            material.bind_constants(device);
            stats.material_binds += 1;

            for &id in &meshes {
                let Some(mesh) = registry.get_mut(id) else {
                    continue;
                };
                let volume = if mesh.cull_outside_frustum() {
                    CullVolume::Frustum(frustum)
                } else {
                    CullVolume::Everything
                };
                self.cull_and_draw(device, mesh, volume, &mut stats, MeshEntry::draw_visible);
            }

            if self.config.debug.normals {
                self.draw_debug_normals(device, registry, &meshes, &mut stats);
            }
        }

        debug!(
            draw_calls = stats.draw_calls,
            instances = stats.instances_drawn,
            "main pass complete"
        );
        stats
    }

    /// Shadow pass.
    ///
    /// Front faces are culled while shadow casters are drawn against
    /// `light_box`, with each mesh's shadow index list when it has one.
    /// Back-face culling is restored on return.
    pub fn render_shadow_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &mut MeshRegistry,
        light_box: &OrientedBox,
    ) -> DrawStats {
        let mut stats = DrawStats::default();
        let mut scope = RasterScope::new(
            device,
            RasterizerState::SOLID_FRONT,
            RasterizerState::SOLID_BACK,
        );

        for (_, mesh) in registry.iter_mut() {
            if mesh.material().is_none() || !mesh.casts_shadow() {
                continue;
            }
            self.cull_and_draw(
                &mut *scope,
                mesh,
                CullVolume::LightBox(light_box),
                &mut stats,
                MeshEntry::draw_visible_shadow,
            );
        }

        debug!(
            draw_calls = stats.draw_calls,
            instances = stats.instances_drawn,
            "shadow pass complete"
        );
        stats
    }

    /// Draws a mesh's already-packed instances without culling again.
    pub fn draw_mesh_visible(device: &mut dyn GraphicsDevice, mesh: &mut MeshEntry) -> bool {
        mesh.draw_visible(device)
    }

    /// Releases the frame constant buffer.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.frame_buffer.take() {
            device.destroy_buffer(buffer);
        }
    }

    fn cull_and_draw(
        &self,
        device: &mut dyn GraphicsDevice,
        mesh: &mut MeshEntry,
        volume: CullVolume<'_>,
        stats: &mut DrawStats,
        draw: fn(&mut MeshEntry, &mut dyn GraphicsDevice) -> bool,
    ) {
        mesh.recompute_instance_radii();
        match mesh.update_visible_instances(device, &self.culler, volume) {
            Ok(outcome) => stats.record_pack(&outcome),
            Err(err) => {
                warn!(mesh = mesh.name(), error = %err, "mesh dropped from pass");
                stats.mesh_failures += 1;
                return;
            }
        }
        let drawn = draw(mesh, device);
        stats.record_draw(drawn, mesh.visible_count());
    }

    fn draw_debug_normals(
        &self,
        device: &mut dyn GraphicsDevice,
        registry: &mut MeshRegistry,
        meshes: &[SlotId],
        stats: &mut DrawStats,
    ) {
        let Some(program) = self.debug_program else {
            return;
        };
        if !device.bind_program(program) {
            warn!("debug normals program failed to bind");
            return;
        }
        for &id in meshes {
            if let Some(mesh) = registry.get_mut(id) {
                if Self::draw_mesh_visible(device, mesh) {
                    stats.draw_calls += 1;
                }
            }
        }
    }
}
