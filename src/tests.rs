//! Tests for the CPU-side pieces: frame state, debug cycling, and mesh
//! geometry. The GPU passes themselves are exercised interactively.

use glam::{Vec3, Vec4};

use crate::camera::Camera;
use crate::gpu::gbuffer::Attachment;
use crate::gpu::DebugView;
use crate::mesh::{bounding_sphere, needs_upright_fix, reconstruct_normals, Vertex};

#[test]
fn test_debug_cycle_period() {
    // Four presses of D restore the original view.
    let start = DebugView::Pass3;
    let mut view = start;
    for _ in 0..4 {
        view = view.next();
    }
    assert_eq!(view, start);
}

#[test]
fn test_debug_cycle_order() {
    assert_eq!(DebugView::Dummy.next(), DebugView::Pass1);
    assert_eq!(DebugView::Pass1.next(), DebugView::Pass2);
    assert_eq!(DebugView::Pass2.next(), DebugView::Pass3);
    assert_eq!(DebugView::Pass3.next(), DebugView::Dummy);
}

#[test]
fn test_status_messages() {
    assert_eq!(DebugView::Dummy.status_message(), "Program output");
    assert_eq!(DebugView::Pass1.status_message(), "After pass 1");
    assert_eq!(DebugView::Pass2.status_message(), "After pass 2");
    assert_eq!(DebugView::Pass3.status_message(), "After pass 3");
}

#[test]
fn test_attachment_slots() {
    assert_eq!(Attachment::Colour as usize, 0);
    assert_eq!(Attachment::Normal as usize, 1);
    assert_eq!(Attachment::Depth as usize, 2);
    assert_eq!(Attachment::Laplacian as usize, 3);
}

#[test]
fn test_background_clears() {
    // Pass 3 relies on the normal clearing to zero to find background
    // pixels, and on colour clearing to white for the pass-through view.
    assert_eq!(Attachment::Normal.clear_value(), wgpu::Color::TRANSPARENT);
    assert_eq!(Attachment::Colour.clear_value(), wgpu::Color::WHITE);
}

#[test]
fn test_initial_camera_placement() {
    let camera = Camera::new(Vec3::ZERO, 2.0, false);

    // Eye sits 5 radii down +Z, looking back at the origin.
    assert!((camera.eye - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-6);
    // Field of view chosen so the bounding sphere fills the frame.
    assert!((camera.fovy - 2.0 * f32::atan2(1.0, 5.0)).abs() < 1e-6);
}

#[test]
fn test_pause_freezes_rotation() {
    let mut camera = Camera::new(Vec3::ZERO, 1.0, false);

    camera.advance(1.0);
    let theta = camera.theta;
    assert!((theta - 0.3).abs() < 1e-6, "theta should advance by 0.3 * dt");

    camera.paused = true;
    camera.advance(1.0);
    camera.advance(2.5);
    assert_eq!(camera.theta, theta, "paused frames must not advance theta");

    camera.paused = false;
    camera.advance(1.0);
    assert!(camera.theta > theta);
}

#[test]
fn test_dolly_round_trip() {
    let mut camera = Camera::new(Vec3::ZERO, 3.0, false);
    let start = camera.eye;

    // Five dollies out then five in return to the start within rounding.
    for _ in 0..5 {
        camera.dolly(1.1);
    }
    for _ in 0..5 {
        camera.dolly(1.0 / 1.1);
    }

    let drift = (camera.eye - start).length();
    println!("dolly round-trip drift: {:e}", drift);
    assert!(drift < 1e-4 * start.length());
}

#[test]
fn test_zoom_round_trip() {
    let mut camera = Camera::new(Vec3::ZERO, 3.0, false);
    let start = camera.fovy;

    for _ in 0..5 {
        camera.zoom(1.1);
    }
    for _ in 0..5 {
        camera.zoom(1.0 / 1.1);
    }

    assert!((camera.fovy - start).abs() < 1e-4 * start);
}

#[test]
fn test_mesh_centre_projects_to_frame_centre() {
    let centre = Vec3::new(1.0, -2.0, 3.0);
    let camera = Camera::new(centre, 2.0, false);
    let frame = camera.frame(1.5);

    // The model transform re-centres the mesh, so its centre lands on the
    // view axis and in the middle of the depth range.
    let clip = frame.mvp * Vec4::new(centre.x, centre.y, centre.z, 1.0);
    let ndc = clip / clip.w;
    println!("centre in NDC: {:?}", ndc);
    assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
}

#[test]
fn test_bounding_sphere_encloses_frustum_depth() {
    let centre = Vec3::ZERO;
    let radius = 2.0;
    let camera = Camera::new(centre, radius, false);
    let frame = camera.frame(1.0);

    // Near and far pole of the bounding sphere along the view axis map to
    // the ends of the depth range.
    for z in [radius, -radius] {
        let clip = frame.mvp * Vec4::new(0.0, 0.0, z, 1.0);
        let ndc_z = clip.z / clip.w;
        println!("sphere pole z={} maps to NDC z {}", z, ndc_z);
        assert!(
            (-1e-3..=1.0 + 1e-3).contains(&ndc_z),
            "pole should be inside [0, 1]"
        );
    }
}

#[test]
fn test_upright_fix_stands_model_up() {
    // A torso digitized along +Z should end up along +Y after the fixed
    // -90 degree X rotation (theta = 0).
    let camera = Camera::new(Vec3::ZERO, 1.0, true);
    let frame = camera.frame(1.0);

    let up = frame.m.transform_vector3(Vec3::Z);
    println!("object +Z maps to {:?}", up);
    assert!((up - Vec3::Y).length() < 1e-6);
}

#[test]
fn test_torso_filename_detection() {
    assert!(needs_upright_fix("models/torso.obj"));
    assert!(needs_upright_fix("torso.obj"));
    assert!(!needs_upright_fix("models/sphere.obj"));
    assert!(!needs_upright_fix("torso.obj.bak"));
}

#[test]
fn test_light_direction_normalized() {
    let camera = Camera::new(Vec3::ZERO, 1.0, false);
    let frame = camera.frame(1.0);
    assert!((frame.light_dir.length() - 1.0).abs() < 1e-6);
    // Above, to the right, slightly behind the eye.
    assert!(frame.light_dir.x > 0.0 && frame.light_dir.y > 0.0 && frame.light_dir.z > 0.0);
}

#[test]
fn test_bounding_sphere_cube() {
    let positions: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            )
        })
        .collect();

    let (centre, radius) = bounding_sphere(&positions);
    assert!(centre.length() < 1e-6);
    assert!((radius - 3.0f32.sqrt()).abs() < 1e-5);

    // Every vertex lies within the sphere.
    for p in &positions {
        assert!(p.distance(centre) <= radius + 1e-5);
    }
}

#[test]
fn test_bounding_sphere_offset() {
    let positions = vec![Vec3::new(4.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)];
    let (centre, radius) = bounding_sphere(&positions);
    assert!((centre - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
    assert!((radius - 1.0).abs() < 1e-6);
}

#[test]
fn test_bounding_sphere_empty() {
    let (centre, radius) = bounding_sphere(&[]);
    assert_eq!(centre, Vec3::ZERO);
    assert_eq!(radius, 0.0);
}

#[test]
fn test_reconstructed_normals() {
    let mut vertices = vec![
        Vertex {
            position: [0.0, 0.0, 0.0],
            normal: [0.0; 3],
            uv: [0.0; 2],
        },
        Vertex {
            position: [1.0, 0.0, 0.0],
            normal: [0.0; 3],
            uv: [0.0; 2],
        },
        Vertex {
            position: [0.0, 1.0, 0.0],
            normal: [0.0; 3],
            uv: [0.0; 2],
        },
    ];
    let indices = [0u32, 1, 2];

    reconstruct_normals(&mut vertices, &indices);

    // Counter-clockwise triangle in the XY plane faces +Z.
    for v in &vertices {
        let n = Vec3::from(v.normal);
        assert!((n - Vec3::Z).length() < 1e-6, "normal was {:?}", n);
    }
}

#[test]
fn test_vertex_layout() {
    // Pass 1's vertex fetch expects tightly packed position/normal/uv.
    assert_eq!(std::mem::size_of::<Vertex>(), 32);

    let layout = Vertex::layout();
    assert_eq!(layout.array_stride, 32);
    assert_eq!(layout.attributes.len(), 3);
    assert_eq!(layout.attributes[1].offset, 12);
    assert_eq!(layout.attributes[2].offset, 24);
}
