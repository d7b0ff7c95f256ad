//! Static scene demo: a textured cube recorded once and replayed each frame
//!
//! Only the transform changes between frames; the secondary command buffer
//! holding the draw is never re-recorded.

use demo_app::{ShaderSet, Window};
use nalgebra::{Perspective3, Point3, Rotation3, Vector3};
use vk_core::foundation::logging;
use vk_core::prelude::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// Unit cube with one colour per face and per-face texture coordinates
fn cube() -> StaticMesh {
    let faces: [([f32; 3], [f32; 3], [f32; 3], [u8; 4]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [255, 80, 80, 255]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [80, 255, 80, 255]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [80, 80, 255, 255]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [255, 255, 80, 255]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [80, 255, 255, 255]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [255, 80, 255, 255]),
    ];

    let mut mesh = StaticMesh::default();
    for (normal, u, v, color) in faces {
        let base = mesh.positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            mesh.positions.push([
                0.5 * (normal[0] + su * u[0] + sv * v[0]),
                0.5 * (normal[1] + su * u[1] + sv * v[1]),
                0.5 * (normal[2] + su * u[2] + sv * v[2]),
            ]);
            mesh.colors.push(color);
            mesh.uvs.push([(su + 1.0) * 0.5, (1.0 - sv) * 0.5]);
        }
        mesh.indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    mesh
}

fn stripes(size: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let value = if (i % size / 4) % 2 == 0 { 0xff } else { 0xa0 };
            [value, value, value]
        })
        .collect()
}

fn run() -> VulkanResult<()> {
    let mut window = Window::new("vk_core static scene demo", WIDTH, HEIGHT)?;
    let shaders = ShaderSet::load()?;
    let config = RendererConfig::new("static_model").with_clear_color([0.1, 0.1, 0.12, 1.0]);
    let mut renderer = Renderer::new(window.native(), window.framebuffer_size(), &config, shaders.renderer_shaders())?;

    let core = renderer.core();
    let texture = core.upload_texture(&stripes(32), 32, 32, 3)?;
    core.load_static_scene(&cube(), texture)?;

    let extent = core.extent();
    let aspect = extent.width as f32 / extent.height.max(1) as f32;
    let projection = Perspective3::new(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0).to_homogeneous();
    let view = Mat4::look_at_rh(&Point3::new(0.0, 1.5, 3.0), &Point3::origin(), &Vector3::y());

    while window.poll() {
        let angle = window.time() as f32;
        let model = Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous();
        core.draw_static_frame(&Projection::Perspective {
            projection,
            model_view: view * model,
        })?;
    }

    core.wait_idle()
}

fn main() {
    logging::init();
    exit_on_fatal(run());
}
