//! # Frame Integration Tests
//!
//! Full main-pass frames against the recording device: culling, packing,
//! material batching and handle lifetime.

use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use prism_rendering::buffer::{InstanceBuffer, Push};
use prism_rendering::culling::{CullPass, CullVolume, VisibilityCuller};
use prism_rendering::device::{DeviceCommand, ProgramId};
use prism_rendering::instance::InstanceStore;
use prism_rendering::prelude::*;
use prism_rendering::{GpuInstance, GrowthPolicy, RenderError};

fn camera_frustum() -> Frustum {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
    Frustum::from_view_projection(&(proj * view))
}

fn material(device: &mut RecordingDevice, name: &str) -> (MaterialRef, ProgramId) {
    let program = device.register_program();
    let material: MaterialRef = Rc::new(ColourMaterial::new(device, name, Some(program)).unwrap());
    (material, program)
}

fn add_cube(
    device: &mut RecordingDevice,
    registry: &mut MeshRegistry,
    name: &str,
    material: &MaterialRef,
) -> prism_core::SlotId {
    let (vertices, indices) = cube(1.0);
    let id = registry.create(device, name, vertices, indices).unwrap();
    registry
        .get_mut(id)
        .unwrap()
        .set_material(Some(material.clone()));
    id
}

/// Reads back the instances the last pack wrote for a mesh.
fn packed(device: &RecordingDevice, mesh: &MeshEntry) -> Vec<GpuInstance> {
    let buffer = mesh.instance_buffer().buffer().expect("instance buffer allocated");
    let bytes = device.buffer_contents(buffer).expect("live buffer");
    bytes
        .chunks_exact(GpuInstance::SIZE)
        .take(mesh.visible_count() as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Unit cube, three instances: one at the origin, one far off to the side,
/// and one past the far plane that only reaches back into the frustum
/// because it is scaled by ten.
#[test]
fn test_scaled_instance_survives_far_plane() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    let id = add_cube(&mut device, &mut registry, "cube", &red);

    let mesh = registry.get_mut(id).unwrap();
    mesh.create_instance(InstanceData::at(Vec3::ZERO));
    mesh.create_instance(InstanceData::at(Vec3::new(1000.0, 0.0, 0.0)));
    let scaled = Mat4::from_scale_rotation_translation(
        Vec3::splat(10.0),
        glam::Quat::IDENTITY,
        Vec3::new(0.0, 0.0, -95.0),
    );
    mesh.create_instance(InstanceData::new(scaled, Vec4::new(0.0, 1.0, 0.0, 1.0)));

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());

    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instances_drawn, 2);
    assert_eq!(device.log().draws(), vec![(36, 2)]);

    let mesh = registry.get(id).unwrap();
    let written = packed(&device, mesh);
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].transform().w_axis.truncate(), Vec3::ZERO);
    assert_eq!(
        written[1].transform().w_axis.truncate(),
        Vec3::new(0.0, 0.0, -95.0)
    );
    assert_eq!(written[1].color, [0.0, 1.0, 0.0, 1.0]);

    // Normal matrix of a uniform scale s is I / s.
    let normal = written[1].normal_matrix();
    assert!((normal.x_axis.x - 0.1).abs() < 1e-5);
}

#[test]
fn test_pack_stops_at_capacity() {
    let mut device = RecordingDevice::new();
    let mut store = InstanceStore::new();
    for i in 0..5 {
        store.create(InstanceData::at(Vec3::new(i as f32, 0.0, 0.0)));
    }
    store.recompute_radii(1.0);

    let culler = VisibilityCuller::default();
    assert_eq!(culler.classify(&mut store, CullVolume::Everything), 5);

    let mut buffer = InstanceBuffer::new("overflow", GrowthPolicy::Exact);
    buffer.resize(&mut device, 3).unwrap();
    let outcome = {
        let mut window = buffer.map(&mut device).unwrap().unwrap();
        culler.pack(&store, CullPass::Camera, &mut window).unwrap()
    };

    assert!(outcome.overflowed);
    assert_eq!(outcome.visible, 3);
    assert_eq!(buffer.written(), 3);

    let id = buffer.buffer().unwrap();
    assert!(!device.is_mapped(id));
    let bytes = device.buffer_contents(id).unwrap();
    let first_three: Vec<f32> = bytes
        .chunks_exact(GpuInstance::SIZE)
        .map(|chunk| bytemuck::pod_read_unaligned::<GpuInstance>(chunk).transform().w_axis.x)
        .collect();
    assert_eq!(first_three, vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_push_into_full_window_is_refused() {
    let mut device = RecordingDevice::new();
    let mut buffer = InstanceBuffer::new("one", GrowthPolicy::Exact);
    buffer.resize(&mut device, 1).unwrap();

    let mut window = buffer.map(&mut device).unwrap().unwrap();
    let instance = GpuInstance::default();
    assert_eq!(window.push(&instance).unwrap(), Push::Written);
    assert!(window.is_full());
    assert_eq!(window.push(&instance).unwrap(), Push::Full);
    assert_eq!(window.len(), 1);
}

#[test]
fn test_resize_to_zero_then_grow() {
    let mut device = RecordingDevice::new();
    let mut buffer = InstanceBuffer::new("resize", GrowthPolicy::Exact);
    buffer.resize(&mut device, 2).unwrap();
    {
        let mut window = buffer.map(&mut device).unwrap().unwrap();
        let packed = GpuInstance::pack(&Mat4::IDENTITY, Vec4::ONE, &glam::Mat3::IDENTITY);
        window.push(&packed).unwrap();
        window.push(&packed).unwrap();
    }

    buffer.resize(&mut device, 0).unwrap();
    assert_eq!(buffer.capacity(), 0);
    assert!(buffer.buffer().is_none());
    assert!(buffer.map(&mut device).unwrap().is_none());

    buffer.ensure_capacity(&mut device, 5).unwrap();
    assert_eq!(buffer.capacity(), 5);
    let id = buffer.buffer().unwrap();
    assert_eq!(device.buffer_size(id), Some(5 * GpuInstance::SIZE as u64));
    assert!(device.buffer_contents(id).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn test_geometric_growth_doubles() {
    let mut device = RecordingDevice::new();
    let mut buffer = InstanceBuffer::new("grow", GrowthPolicy::Geometric);
    buffer.ensure_capacity(&mut device, 3).unwrap();
    assert_eq!(buffer.capacity(), 4);
    buffer.ensure_capacity(&mut device, 4).unwrap();
    assert_eq!(buffer.capacity(), 4);
    buffer.ensure_capacity(&mut device, 9).unwrap();
    assert_eq!(buffer.capacity(), 16);
}

#[test]
fn test_destroyed_instance_is_not_packed() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "cube", &red);

    let a = registry
        .create_instance("cube", InstanceData::at(Vec3::new(-1.0, 0.0, 0.0)))
        .unwrap();
    let b = registry
        .create_instance("cube", InstanceData::at(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    assert!(a.destroy(&mut registry));
    assert!(!a.is_valid(&registry));
    assert!(b.is_valid(&registry));

    // Reuses a's slot with a new generation.
    let c = registry
        .create_instance("cube", InstanceData::at(Vec3::new(0.0, 2.0, 0.0)))
        .unwrap();
    assert_eq!(a.instance_id().index(), c.instance_id().index());
    assert!(!a.is_valid(&registry));
    assert_eq!(
        a.update(&mut registry, |data| data.color = Vec4::ZERO),
        Err(RenderError::InvalidHandle)
    );

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    assert_eq!(stats.instances_drawn, 2);

    let mesh = registry.by_name("cube").unwrap();
    let xs: Vec<Vec3> = packed(&device, mesh)
        .iter()
        .map(|g| g.transform().w_axis.truncate())
        .collect();
    assert!(!xs.contains(&Vec3::new(-1.0, 0.0, 0.0)));
    assert!(xs.contains(&Vec3::new(1.0, 0.0, 0.0)));
    assert!(xs.contains(&Vec3::new(0.0, 2.0, 0.0)));
}

#[test]
fn test_destroying_mesh_invalidates_handles() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "cube", &red);
    let handle = registry
        .create_instance("cube", InstanceData::default())
        .unwrap();

    registry.destroy(&mut device, "cube").unwrap();
    assert!(!handle.is_valid(&registry));
    assert!(handle.get(&registry).is_none());
    assert_eq!(
        registry.destroy(&mut device, "cube"),
        Err(RenderError::MeshNotFound("cube".to_owned()))
    );
    assert_eq!(
        registry.create_instance("cube", InstanceData::default()),
        Err(RenderError::MeshNotFound("cube".to_owned()))
    );
}

#[test]
fn test_one_program_bind_per_material() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, red_program) = material(&mut device, "red");
    let (blue, blue_program) = material(&mut device, "blue");

    for (name, material) in [("a", &red), ("b", &blue), ("c", &red), ("d", &blue), ("e", &red)] {
        add_cube(&mut device, &mut registry, name, material);
        registry
            .create_instance(name, InstanceData::at(Vec3::ZERO))
            .unwrap();
    }

    let log = device.log();
    let _ = log.take();
    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());

    assert_eq!(stats.material_binds, 2);
    assert_eq!(stats.draw_calls, 5);

    let programs: Vec<ProgramId> = log
        .snapshot()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::BindProgram(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(programs, vec![red_program, blue_program]);

    // Red meshes are drawn before the blue program is bound.
    let commands = log.snapshot();
    let blue_bind = commands
        .iter()
        .position(|c| *c == DeviceCommand::BindProgram(blue_program))
        .unwrap();
    let draws_before = commands[..blue_bind]
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DrawIndexedInstanced { .. }))
        .count();
    assert_eq!(draws_before, 3);
}

#[test]
fn test_mesh_without_visible_instances_issues_no_draw() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "hidden", &red);
    registry
        .create_instance("hidden", InstanceData::at(Vec3::new(0.0, 500.0, 0.0)))
        .unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());

    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.meshes_skipped, 1);
    assert!(device.log().draws().is_empty());
    assert_eq!(registry.by_name("hidden").unwrap().visible_count(), 0);
}

#[test]
fn test_unculled_mesh_draws_everything() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    let id = add_cube(&mut device, &mut registry, "sky", &red);
    let mesh = registry.get_mut(id).unwrap();
    mesh.set_cull_outside_frustum(false);
    mesh.create_instance(InstanceData::at(Vec3::new(0.0, 500.0, 0.0)));
    mesh.create_instance(InstanceData::at(Vec3::new(0.0, 0.0, 500.0)));

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    assert_eq!(stats.instances_drawn, 2);
    assert_eq!(device.log().draws(), vec![(36, 2)]);
}

#[test]
fn test_mesh_without_material_is_not_drawn() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (vertices, indices) = cube(1.0);
    registry.create(&mut device, "bare", vertices, indices).unwrap();
    registry
        .create_instance("bare", InstanceData::default())
        .unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    assert_eq!(stats, DrawStats::default());
}

#[test]
fn test_device_failure_drops_only_that_mesh() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "a", &red);
    registry
        .create_instance("a", InstanceData::default())
        .unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    let frustum = camera_frustum();
    coordinator.render_meshes_by_material(&mut device, &mut registry, &frustum);
    coordinator.end_scene(&mut registry);

    // "b" needs a new instance buffer on its first frame.
    add_cube(&mut device, &mut registry, "b", &red);
    registry
        .create_instance("b", InstanceData::default())
        .unwrap();
    device.set_fail_buffer_creation(true);

    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &frustum);
    assert_eq!(stats.mesh_failures, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(registry.by_name("b").unwrap().visible_count(), 0);
}

#[test]
fn test_debug_normals_redraw_after_group() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, red_program) = material(&mut device, "red");
    let debug_program = device.register_program();
    add_cube(&mut device, &mut registry, "a", &red);
    add_cube(&mut device, &mut registry, "b", &red);
    registry.create_instance("a", InstanceData::default()).unwrap();
    registry.create_instance("b", InstanceData::default()).unwrap();
    registry
        .create_instance("b", InstanceData::at(Vec3::X))
        .unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    coordinator.initialise(&mut device, Some(debug_program)).unwrap();
    coordinator.set_debug_normals(true);

    let log = device.log();
    let _ = log.take();
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());

    assert_eq!(stats.draw_calls, 4);
    assert_eq!(log.draws(), vec![(36, 1), (36, 2), (36, 1), (36, 2)]);

    let commands = log.snapshot();
    let debug_bind = commands
        .iter()
        .position(|c| *c == DeviceCommand::BindProgram(debug_program))
        .unwrap();
    let red_bind = commands
        .iter()
        .position(|c| *c == DeviceCommand::BindProgram(red_program))
        .unwrap();
    assert!(red_bind < debug_bind);
    // No re-cull: the overlay never maps an instance buffer.
    assert!(!commands[debug_bind..]
        .iter()
        .any(|c| matches!(c, DeviceCommand::Map(_))));
}

#[test]
fn test_missing_debug_program_disables_overlay() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "a", &red);
    registry.create_instance("a", InstanceData::default()).unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    coordinator.initialise(&mut device, None).unwrap();
    coordinator.set_debug_normals(true);
    let stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    assert_eq!(stats.draw_calls, 1);
}

#[test]
fn test_material_edit_reaches_constant_buffer() {
    let mut device = RecordingDevice::new();
    let program = device.register_program();
    let colour = Rc::new(ColourMaterial::new(&mut device, "paint", Some(program)).unwrap());
    let shared: MaterialRef = colour.clone();

    let mut registry = MeshRegistry::default();
    add_cube(&mut device, &mut registry, "a", &shared);
    registry.create_instance("a", InstanceData::default()).unwrap();

    colour.set_colour(Vec4::new(0.25, 0.5, 0.75, 1.0));
    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());

    let buffer = colour.constant_buffer().unwrap();
    let bytes = device.buffer_contents(buffer).unwrap();
    let written: [f32; 4] = bytemuck::pod_read_unaligned(&bytes[..16]);
    assert_eq!(written, [0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_end_scene_returns_meshes_to_idle() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "a", &red);
    registry.create_instance("a", InstanceData::default()).unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    assert_eq!(
        registry.by_name("a").unwrap().phase(),
        prism_rendering::mesh::MeshPhase::Drawn
    );
    coordinator.end_scene(&mut registry);
    assert_eq!(
        registry.by_name("a").unwrap().phase(),
        prism_rendering::mesh::MeshPhase::Idle
    );
}

#[test]
fn test_teardown_leaves_no_buffers() {
    let mut device = RecordingDevice::new();
    let mut registry = MeshRegistry::default();
    let (red, _) = material(&mut device, "red");
    add_cube(&mut device, &mut registry, "a", &red);
    registry.create_instance("a", InstanceData::default()).unwrap();

    let mut coordinator = DrawCoordinator::new(RenderConfig::default());
    coordinator.initialise(&mut device, None).unwrap();
    coordinator.render_meshes_by_material(&mut device, &mut registry, &camera_frustum());
    coordinator.end_scene(&mut registry);

    coordinator.release(&mut device);
    registry.clear(&mut device);
    // the material outlives every mesh that used it
    assert_eq!(device.live_buffers(), 1);

    red.release(&mut device);
    assert_eq!(device.live_buffers(), 0);
}
