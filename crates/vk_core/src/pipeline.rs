//! Shader bytecode and graphics pipeline creation

use ash::vk;
use std::ffi::CStr;

use crate::resources::ResourceManager;
use crate::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// SPIR-V words validated from a raw byte blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    words: Vec<u32>,
}

impl ShaderBytecode {
    /// Repack little-endian bytes into 32-bit words
    ///
    /// Fails when the blob is empty or not a whole number of words.
    pub fn from_bytes(bytes: &[u8]) -> VulkanResult<Self> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(VulkanError::InvalidShaderBytecode { len: bytes.len() });
        }
        let words = bytes
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        Ok(Self { words })
    }

    /// The SPIR-V words
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// Vertex and fragment bytecode for one pipeline
#[derive(Debug, Clone, Copy)]
pub struct ShaderPair<'a> {
    /// Vertex stage SPIR-V bytes
    pub vertex: &'a [u8],
    /// Fragment stage SPIR-V bytes
    pub fragment: &'a [u8],
}

/// Interleaved vertex layout on binding 0
#[derive(Debug, Clone)]
pub struct VertexLayout {
    /// Bytes per vertex record
    pub stride: u32,
    /// Attributes in location order
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Which faces the rasterizer discards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// Draw both windings
    None,
    /// Discard clockwise-facing triangles
    Back,
}

/// Fixed-function state of a pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Face culling
    pub cull_mode: CullMode,
    /// Depth test against the attachment
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Source-alpha blending
    pub alpha_blending: bool,
    /// Enable depth bias, with factors supplied per draw as dynamic state
    pub dynamic_depth_bias: bool,
}

impl PipelineConfig {
    /// Blended, depth-tested immediate-mode geometry with per-draw depth bias
    pub fn tessellated() -> Self {
        Self {
            cull_mode: CullMode::None,
            depth_test: true,
            depth_write: true,
            alpha_blending: true,
            dynamic_depth_bias: true,
        }
    }

    /// Opaque, back-face culled static geometry
    pub fn static_mesh() -> Self {
        Self {
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            alpha_blending: false,
            dynamic_depth_bias: false,
        }
    }

    /// Dynamic states the pipeline expects to be set at record time
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        let mut states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        if self.dynamic_depth_bias {
            states.push(vk::DynamicState::DEPTH_BIAS);
        }
        states
    }
}

/// Pipeline and its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsPipeline {
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
    /// Layout the descriptor sets bind against
    pub layout: vk::PipelineLayout,
}

impl ResourceManager {
    /// Build a single-subpass graphics pipeline
    ///
    /// Shader modules only live for the duration of this call.
    pub fn create_graphics_pipeline(
        &mut self,
        shaders: ShaderPair<'_>,
        vertex_layout: &VertexLayout,
        set_layouts: &[vk::DescriptorSetLayout],
        render_pass: vk::RenderPass,
        config: &PipelineConfig,
    ) -> VulkanResult<GraphicsPipeline> {
        let vertex_code = ShaderBytecode::from_bytes(shaders.vertex)?;
        let fragment_code = ShaderBytecode::from_bytes(shaders.fragment)?;

        let device = self.device();
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        let layout = self
            .registry
            .register_pipeline_layout(device.create_pipeline_layout(&layout_info)?);

        let vertex_module = device.create_shader_module(vertex_code.words())?;
        let fragment_module = match device.create_shader_module(fragment_code.words()) {
            Ok(module) => module,
            Err(err) => {
                device.destroy_shader_module(vertex_module);
                return Err(err);
            }
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_POINT)
                .build(),
        ];

        let binding_descriptions = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&vertex_layout.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only, the rectangles come from each draw
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = config.dynamic_states();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let cull_mode_flags = match config.cull_mode {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Back => vk::CullModeFlags::BACK,
        };
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_flags)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(config.dynamic_depth_bias);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = if config.alpha_blending {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build()
        };
        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = device.create_graphics_pipeline(&pipeline_info);
        device.destroy_shader_module(vertex_module);
        device.destroy_shader_module(fragment_module);
        let pipeline = self.registry.register_pipeline(pipeline?);

        log::debug!("Created graphics pipeline {pipeline:?} ({} byte vertices)", vertex_layout.stride);
        Ok(GraphicsPipeline { pipeline, layout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockDevice;
    use crate::resources::tests::manager;
    use std::sync::Arc;

    #[test]
    fn test_bytecode_must_be_whole_words() {
        assert_eq!(
            ShaderBytecode::from_bytes(&[0x03, 0x02, 0x23, 0x07, 0x00]),
            Err(VulkanError::InvalidShaderBytecode { len: 5 })
        );
        assert_eq!(
            ShaderBytecode::from_bytes(&[]),
            Err(VulkanError::InvalidShaderBytecode { len: 0 })
        );
    }

    #[test]
    fn test_bytecode_is_little_endian() {
        let code = ShaderBytecode::from_bytes(&[0x03, 0x02, 0x23, 0x07, 0x01, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(code.words(), &[0x0723_0203, 1]);
    }

    #[test]
    fn test_dynamic_states_follow_depth_bias() {
        assert_eq!(PipelineConfig::tessellated().dynamic_states().len(), 3);
        assert_eq!(
            PipelineConfig::static_mesh().dynamic_states(),
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
    }

    #[test]
    fn test_pipeline_creation_frees_shader_modules() {
        let device = Arc::new(MockDevice::new());
        let mut resources = manager(&device);
        let live = device.live_objects();

        let spirv = [0x03, 0x02, 0x23, 0x07];
        let layout = VertexLayout { stride: 12, attributes: vec![] };
        resources
            .create_graphics_pipeline(
                ShaderPair { vertex: &spirv, fragment: &spirv },
                &layout,
                &[],
                vk::RenderPass::null(),
                &PipelineConfig::static_mesh(),
            )
            .unwrap();

        // Pipeline and pipeline layout survive, modules do not
        assert_eq!(device.live_objects(), live + 2);
    }

    #[test]
    fn test_bad_bytecode_creates_nothing() {
        let device = Arc::new(MockDevice::new());
        let mut resources = manager(&device);
        let live = device.live_objects();

        let result = resources.create_graphics_pipeline(
            ShaderPair { vertex: &[1, 2, 3], fragment: &[1, 2, 3, 4] },
            &VertexLayout { stride: 12, attributes: vec![] },
            &[],
            vk::RenderPass::null(),
            &PipelineConfig::tessellated(),
        );
        assert_eq!(result, Err(VulkanError::InvalidShaderBytecode { len: 3 }));
        assert_eq!(device.live_objects(), live);
    }
}
