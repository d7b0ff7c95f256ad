//! Immediate-mode demo: two textured quads submitted fresh every frame
//!
//! The left quad uses one texture stage, the right one modulates the same
//! checkerboard with an RGB gradient through the two-stage pipeline.

use demo_app::{ShaderSet, Window};
use vk_core::foundation::logging;
use vk_core::prelude::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];
const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            let value = if (x / cell + y / cell) % 2 == 0 { 0xff } else { 0x40 };
            [value, value, value, 0xff]
        })
        .collect()
}

fn gradient(size: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            [(x * 255 / size) as u8, (y * 255 / size) as u8, 0x80]
        })
        .collect()
}

fn quad(x: f32, y: f32, size: f32) -> [[f32; 3]; 4] {
    [[x, y, 0.0], [x + size, y, 0.0], [x + size, y + size, 0.0], [x, y + size, 0.0]]
}

fn run() -> VulkanResult<()> {
    let mut window = Window::new("vk_core tessellation demo", WIDTH, HEIGHT)?;
    let shaders = ShaderSet::load()?;
    let config = RendererConfig::new("tess_quad").with_clear_color([0.05, 0.05, 0.1, 1.0]);
    let mut renderer = Renderer::new(window.native(), window.framebuffer_size(), &config, shaders.renderer_shaders())?;

    let core = renderer.core();
    let checker = core.upload_texture(&checkerboard(64, 8), 64, 64, 4)?;
    let tint = core.upload_texture(&gradient(32), 32, 32, 3)?;

    let extent = core.extent();
    let projection = Projection::Orthographic {
        width: extent.width as f32,
        height: extent.height as f32,
    };
    let pass = PassParams::full(extent);
    let colors = [[255u8; 4]; 4];

    while window.poll() {
        let bob = (window.time().sin() * 40.0) as f32;
        let left = quad(100.0, 150.0 + bob, 256.0);
        let right = quad(440.0, 150.0 - bob, 256.0);

        let single = TessBatch {
            positions: &left,
            colors: &colors,
            uv0: &QUAD_UVS,
            uv1: None,
            indices: &QUAD_INDICES,
        };
        let multi = TessBatch {
            positions: &right,
            colors: &colors,
            uv0: &QUAD_UVS,
            uv1: Some(&QUAD_UVS),
            indices: &QUAD_INDICES,
        };

        core.begin_frame()?;
        core.draw_tess(&single, ShadingStages::Single, &[checker], &projection, &pass)?;
        core.draw_tess(&multi, ShadingStages::Multi, &[checker, tint], &projection, &pass)?;
        core.end_frame()?;
    }

    core.wait_idle()
}

fn main() {
    logging::init();
    exit_on_fatal(run());
}
