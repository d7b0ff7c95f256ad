//! Immediate-mode draw submission
//!
//! Every draw appends its vertices and indices to the per-frame rings,
//! takes one uniform slot for its transform and records one indexed draw
//! into the frame's primary command buffer. Nothing is retained between
//! frames except the descriptor sets, which are keyed by texture identity.

use ash::vk;

use super::ring::RingBuffer;
use super::uniform::UniformSlots;
use super::vertex::{DualTexturedVertex, TessBatch, TexturedVertex};
use crate::backend::GpuDevice;
use crate::config::RendererConfig;
use crate::foundation::math::{gl_to_vulkan_clip, orthographic_pixels, Mat4};
use crate::frame::UniformUpload;
use crate::pipeline::{GraphicsPipeline, PipelineConfig, ShaderPair};
use crate::resources::{DescriptorSetCache, ResourceManager, Texture};
use crate::{VulkanError, VulkanResult};

/// Descriptor sets the pool can hand out over the renderer's life
pub const MAX_DESCRIPTOR_SETS: u32 = 4096;

/// Number of texture stages a draw samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingStages {
    /// One texture, [`TexturedVertex`] records
    Single,
    /// Two textures, [`DualTexturedVertex`] records
    Multi,
}

impl ShadingStages {
    /// Textures the draw expects
    pub fn texture_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Multi => 2,
        }
    }
}

/// Transform a draw is rendered with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// 2D pass in pixel coordinates, origin at the top-left corner
    Orthographic {
        /// Viewport width in pixels
        width: f32,
        /// Viewport height in pixels
        height: f32,
    },
    /// 3D pass with OpenGL-convention matrices from the host engine
    Perspective {
        /// Projection matrix, clip depth in [-1, 1]
        projection: Mat4,
        /// Model-view matrix
        model_view: Mat4,
    },
}

impl Projection {
    /// Model-view-projection matrix in Vulkan clip space
    pub fn matrix(&self) -> Mat4 {
        match self {
            Self::Orthographic { width, height } => orthographic_pixels(*width, *height),
            Self::Perspective { projection, model_view } => gl_to_vulkan_clip() * projection * model_view,
        }
    }
}

/// Constant, clamp and slope factors for polygon offset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant depth offset
    pub constant: f32,
    /// Maximum offset
    pub clamp: f32,
    /// Offset scaled by the polygon's depth slope
    pub slope: f32,
}

/// Dynamic state of the pass a draw belongs to
#[derive(Debug, Clone, Copy)]
pub struct PassParams {
    /// Viewport transform
    pub viewport: vk::Viewport,
    /// Scissor rectangle
    pub scissor: vk::Rect2D,
    /// Polygon offset; `None` disables it for the draw
    pub depth_bias: Option<DepthBias>,
}

impl PassParams {
    /// Full-extent viewport and scissor without depth bias
    pub fn full(extent: vk::Extent2D) -> Self {
        Self {
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            depth_bias: None,
        }
    }
}

/// SPIR-V for the one- and two-stage pipelines
#[derive(Debug, Clone, Copy)]
pub struct TessShaders<'a> {
    /// Single texture stage
    pub single: ShaderPair<'a>,
    /// Two texture stages
    pub multi: ShaderPair<'a>,
}

/// Rings, uniform slots, descriptor sets and pipelines of the draw path
pub struct TessUploader {
    vertex_ring: RingBuffer,
    index_ring: RingBuffer,
    uniforms: UniformSlots,
    descriptors: DescriptorSetCache,
    single_pipeline: GraphicsPipeline,
    multi_pipeline: GraphicsPipeline,
}

impl TessUploader {
    /// Allocate the per-frame rings and build both pipelines against `render_pass`
    pub fn new(
        resources: &mut ResourceManager,
        config: &RendererConfig,
        render_pass: vk::RenderPass,
        shaders: TessShaders<'_>,
    ) -> VulkanResult<Self> {
        let vertex_ring = RingBuffer::new(
            resources,
            "vertex",
            config.vertex_ring_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_ring = RingBuffer::new(
            resources,
            "index",
            config.index_ring_bytes,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        let uniforms = UniformSlots::new(resources, config.uniform_slots)?;
        let descriptors = DescriptorSetCache::new(
            resources,
            uniforms.device_buffer(),
            uniforms.slot_size(),
            MAX_DESCRIPTOR_SETS,
        )?;

        let pipeline_config = PipelineConfig::tessellated();
        let single_pipeline = resources.create_graphics_pipeline(
            shaders.single,
            &TexturedVertex::layout(),
            &[descriptors.single_layout()],
            render_pass,
            &pipeline_config,
        )?;
        let multi_pipeline = resources.create_graphics_pipeline(
            shaders.multi,
            &DualTexturedVertex::layout(),
            &[descriptors.multi_layout()],
            render_pass,
            &pipeline_config,
        )?;

        Ok(Self {
            vertex_ring,
            index_ring,
            uniforms,
            descriptors,
            single_pipeline,
            multi_pipeline,
        })
    }

    /// Next vertex ring write offset
    pub fn vertex_offset(&self) -> vk::DeviceSize {
        self.vertex_ring.offset()
    }

    /// Next index ring write offset
    pub fn index_offset(&self) -> vk::DeviceSize {
        self.index_ring.offset()
    }

    /// Uniform slots consumed this frame
    pub fn uniform_slots_used(&self) -> u32 {
        self.uniforms.used()
    }

    /// Descriptor sets created so far
    pub fn descriptor_sets(&self) -> usize {
        self.descriptors.len()
    }

    /// Shared uniform slots, also used by the static scene path
    pub fn uniforms_mut(&mut self) -> &mut UniformSlots {
        &mut self.uniforms
    }

    /// Descriptor cache, also used by the static scene path
    pub fn descriptors_mut(&mut self) -> &mut DescriptorSetCache {
        &mut self.descriptors
    }

    /// Pipeline for `stages`
    pub fn pipeline(&self, stages: ShadingStages) -> GraphicsPipeline {
        match stages {
            ShadingStages::Single => self.single_pipeline,
            ShadingStages::Multi => self.multi_pipeline,
        }
    }

    /// Descriptor set layout for `stages`
    pub fn descriptor_layout(&self, stages: ShadingStages) -> vk::DescriptorSetLayout {
        match stages {
            ShadingStages::Single => self.descriptors.single_layout(),
            ShadingStages::Multi => self.descriptors.multi_layout(),
        }
    }

    /// Uniform copy the frame records before its render pass
    pub fn uniform_upload(&self) -> UniformUpload {
        self.uniforms.upload()
    }

    /// Rewind the rings and uniform slots for a new frame
    pub fn reset_frame(&mut self) {
        self.vertex_ring.reset();
        self.index_ring.reset();
        self.uniforms.reset();
    }

    /// Upload `batch` and record one indexed draw into `cb`
    ///
    /// Capacity is checked up front, so a draw that would overflow a ring
    /// or the uniform slots fails without writing anything.
    pub fn draw(
        &mut self,
        device: &dyn GpuDevice,
        cb: vk::CommandBuffer,
        batch: &TessBatch<'_>,
        stages: ShadingStages,
        textures: &[Texture],
        projection: &Projection,
        pass: &PassParams,
    ) -> VulkanResult<()> {
        if textures.len() != stages.texture_count() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "{stages:?} shading takes {} textures, got {}",
                    stages.texture_count(),
                    textures.len()
                ),
            });
        }
        if batch.indices.is_empty() || batch.vertex_count() == 0 {
            log::trace!("Skipping empty tessellation batch");
            return Ok(());
        }

        let vertex_bytes = match stages {
            ShadingStages::Single => bytemuck::cast_slice(&batch.textured_vertices()?).to_vec(),
            ShadingStages::Multi => bytemuck::cast_slice(&batch.dual_textured_vertices()?).to_vec(),
        };
        let index_bytes: &[u8] = bytemuck::cast_slice(batch.indices);

        self.vertex_ring.check_space(vertex_bytes.len() as vk::DeviceSize)?;
        self.index_ring.check_space(index_bytes.len() as vk::DeviceSize)?;
        self.uniforms.check_available()?;

        let vertex_offset = self.vertex_ring.write(device, &vertex_bytes)?;
        let index_offset = self.index_ring.write(device, index_bytes)?;

        let pipeline = self.pipeline(stages);
        device.cmd_bind_pipeline(cb, pipeline.pipeline);
        device.cmd_bind_vertex_buffer(cb, self.vertex_ring.buffer(), vertex_offset);
        device.cmd_bind_index_buffer(cb, self.index_ring.buffer(), index_offset);

        let set = self.descriptors.get_or_create(device, textures)?;
        let uniform_offset = self.uniforms.push(&projection.matrix())?;
        device.cmd_bind_descriptor_set(cb, pipeline.layout, set, &[uniform_offset]);

        device.cmd_set_viewport(cb, &pass.viewport);
        device.cmd_set_scissor(cb, &pass.scissor);
        let bias = pass.depth_bias.unwrap_or_default();
        device.cmd_set_depth_bias(cb, bias.constant, bias.clamp, bias.slope);

        device.cmd_draw_indexed(cb, batch.indices.len() as u32, 0, 0);
        Ok(())
    }
}
