//! Math utilities and types
//!
//! Matrix aliases and the projection conversions the draw path needs.

pub use nalgebra::{Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Converts an OpenGL-convention clip space into Vulkan's
///
/// Vulkan's Y axis points down and its depth range is [0, 1] instead of
/// [-1, 1], so the host projection is pre-multiplied by a Y flip and a
/// half-scale/half-offset on Z.
#[rustfmt::skip]
pub fn gl_to_vulkan_clip() -> Mat4 {
    Mat4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Orthographic projection for 2D passes in pixel coordinates
///
/// Maps `(0, 0)` to the top-left corner and `(width, height)` to the
/// bottom-right corner of the viewport, with depth in [0, 1].
#[rustfmt::skip]
pub fn orthographic_pixels(width: f32, height: f32) -> Mat4 {
    Mat4::new(
        2.0 / width, 0.0, 0.0, -1.0,
        0.0, 2.0 / height, 0.0, -1.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Column-major float array suitable for a std140 `mat4`
pub fn to_column_major(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}
