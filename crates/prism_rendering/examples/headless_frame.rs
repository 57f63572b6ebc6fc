//! # Headless Frame
//!
//! Renders a few frames of a small scene against the recording device and
//! prints the per-pass statistics.
//!
//! ```text
//! cargo run --example headless_frame -- [config.toml]
//! ```

use std::rc::Rc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use prism_rendering::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };

    let mut device = RecordingDevice::new();
    let lit = device.register_program();
    let debug_normals = device.register_program();

    let stone = Rc::new(ColourMaterial::new(&mut device, "stone", Some(lit))?);
    stone.set_colour(Vec4::new(0.5, 0.5, 0.55, 1.0));
    let stone_ref: MaterialRef = stone.clone();
    let glass = Rc::new(ColourMaterial::new(&mut device, "glass", Some(lit))?);
    glass.set_colour(Vec4::new(0.2, 0.6, 0.9, 0.5));
    let glass_ref: MaterialRef = glass.clone();

    let mut registry = MeshRegistry::new(config.instancing);
    let (vertices, indices) = cube(1.0);
    registry.create(&mut device, "pillar", vertices, indices)?;
    let (vertices, indices) = cube(0.5);
    registry.create(&mut device, "pane", vertices, indices)?;

    if let Some(pillar) = registry.by_name_mut("pillar") {
        pillar.set_material(Some(stone_ref));
        let shadow: Vec<u32> = pillar.indices()[..18].to_vec();
        pillar.set_shadow_indices(&mut device, Some(shadow))?;
    }
    if let Some(pane) = registry.by_name_mut("pane") {
        pane.set_material(Some(glass_ref));
        pane.set_casts_shadow(false);
    }

    let mut pillars = Vec::new();
    for i in 0..64 {
        let x = (i % 8) as f32 * 6.0 - 21.0;
        let z = (i / 8) as f32 * 6.0 - 21.0;
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 4.0, 1.0),
            Quat::IDENTITY,
            Vec3::new(x, 2.0, z),
        );
        pillars.push(registry.create_instance("pillar", InstanceData::new(transform, Vec4::ONE))?);
    }
    for i in 0..16 {
        let x = i as f32 * 3.0 - 24.0;
        registry.create_instance("pane", InstanceData::at(Vec3::new(x, 1.0, 30.0)))?;
    }

    let mut coordinator = DrawCoordinator::new(config);
    coordinator.initialise(&mut device, Some(debug_normals))?;
    let mut shadow = ShadowVolume::new(config.shadow);

    let projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 200.0);
    let sun = Vec3::new(0.4, -1.0, -0.3);
    let mut frame = FrameConstants::default()
        .with_sun(sun, Vec3::new(1.0, 0.95, 0.9), 1.2)
        .with_screen(Vec2::new(1920.0, 1080.0), Vec2::ZERO);
    frame.shadow_map_size = 2048;

    for tick in 0..4 {
        let angle = tick as f32 * 0.6;
        let eye = Vec3::new(angle.sin() * 60.0, 20.0, angle.cos() * 60.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let frustum = Frustum::from_view_projection(&(projection * view));
        shadow.update(Vec3::ZERO, sun);

        frame = frame.with_camera(&view, &projection, eye).with_light(&shadow);
        frame.tick(1.0 / 60.0);

        // Every other pillar is knocked down after the second frame.
        if tick == 2 {
            for handle in pillars.iter().step_by(2) {
                handle.destroy(&mut registry);
            }
        }

        coordinator.begin_scene(&mut device, &frame)?;
        let shadow_stats =
            coordinator.render_shadow_pass(&mut device, &mut registry, &shadow.light_box());
        let main_stats = coordinator.render_meshes_by_material(&mut device, &mut registry, &frustum);
        coordinator.end_scene(&mut registry);

        println!(
            "frame {tick}: shadow {} draws / {} instances, main {} draws / {} instances ({:.1} per draw)",
            shadow_stats.draw_calls,
            shadow_stats.instances_drawn,
            main_stats.draw_calls,
            main_stats.instances_drawn,
            main_stats.instances_per_draw(),
        );
        let _ = device.log().take();
    }

    let live = pillars.iter().filter(|h| h.is_valid(&registry)).count();
    println!("live pillars: {live} of {}", pillars.len());

    coordinator.release(&mut device);
    registry.clear(&mut device);
    stone.release(&mut device);
    glass.release(&mut device);
    println!("buffers still allocated: {}", device.live_buffers());
    Ok(())
}
