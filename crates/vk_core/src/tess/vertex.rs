//! Vertex records and the batch format fed by the tessellator

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use crate::pipeline::VertexLayout;
use crate::{VulkanError, VulkanResult};

/// Position, normalized colour and one texture coordinate (36 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    /// Position
    pub position: [f32; 3],
    /// RGBA in [0, 1]
    pub color: [f32; 4],
    /// Texture coordinate for stage 0
    pub uv: [f32; 2],
}

/// [`TexturedVertex`] plus a second texture coordinate (44 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct DualTexturedVertex {
    /// Position
    pub position: [f32; 3],
    /// RGBA in [0, 1]
    pub color: [f32; 4],
    /// Texture coordinate for stage 0
    pub uv0: [f32; 2],
    /// Texture coordinate for stage 1
    pub uv1: [f32; 2],
}

fn attribute(location: u32, format: vk::Format, offset: u32) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        binding: 0,
        location,
        format,
        offset,
    }
}

impl TexturedVertex {
    /// Interleaved input layout on binding 0
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: size_of::<Self>() as u32,
            attributes: vec![
                attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
                attribute(1, vk::Format::R32G32B32A32_SFLOAT, 12),
                attribute(2, vk::Format::R32G32_SFLOAT, 28),
            ],
        }
    }
}

impl DualTexturedVertex {
    /// Interleaved input layout on binding 0
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: size_of::<Self>() as u32,
            attributes: vec![
                attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
                attribute(1, vk::Format::R32G32B32A32_SFLOAT, 12),
                attribute(2, vk::Format::R32G32_SFLOAT, 28),
                attribute(3, vk::Format::R32G32_SFLOAT, 36),
            ],
        }
    }
}

/// Converts an 8-bit RGBA colour to floats in [0, 1]
pub fn normalize_color(color: [u8; 4]) -> [f32; 4] {
    color.map(|c| f32::from(c) / 255.0)
}

/// One tessellated primitive batch in structure-of-arrays form
///
/// Attribute streams are indexed by vertex; `uv1` is only read for
/// two-stage shading.
#[derive(Debug, Clone, Copy)]
pub struct TessBatch<'a> {
    /// Vertex positions
    pub positions: &'a [[f32; 3]],
    /// Per-vertex RGBA colour
    pub colors: &'a [[u8; 4]],
    /// Stage 0 texture coordinates
    pub uv0: &'a [[f32; 2]],
    /// Stage 1 texture coordinates
    pub uv1: Option<&'a [[f32; 2]]>,
    /// Triangle list indices into the vertex streams
    pub indices: &'a [u32],
}

impl TessBatch<'_> {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn check_stream(&self, name: &str, len: usize) -> VulkanResult<()> {
        if len == self.positions.len() {
            Ok(())
        } else {
            Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Batch has {} positions but {len} {name} entries",
                    self.positions.len()
                ),
            })
        }
    }

    /// Interleave the streams into single-stage records
    pub fn textured_vertices(&self) -> VulkanResult<Vec<TexturedVertex>> {
        self.check_stream("colour", self.colors.len())?;
        self.check_stream("uv0", self.uv0.len())?;
        Ok(self
            .positions
            .iter()
            .zip(self.colors)
            .zip(self.uv0)
            .map(|((&position, &color), &uv)| TexturedVertex {
                position,
                color: normalize_color(color),
                uv,
            })
            .collect())
    }

    /// Interleave the streams into two-stage records
    pub fn dual_textured_vertices(&self) -> VulkanResult<Vec<DualTexturedVertex>> {
        let uv1 = self.uv1.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Two-stage draw without a second texture coordinate stream".to_string(),
        })?;
        self.check_stream("uv1", uv1.len())?;
        Ok(self
            .textured_vertices()?
            .into_iter()
            .zip(uv1)
            .map(|(v, &uv1)| DualTexturedVertex {
                position: v.position,
                color: v.color,
                uv0: v.uv,
                uv1,
            })
            .collect())
    }
}
