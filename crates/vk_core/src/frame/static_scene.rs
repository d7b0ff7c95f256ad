//! Static geometry recorded once into a secondary command buffer

use ash::vk;

use crate::backend::GpuDevice;
use crate::pipeline::GraphicsPipeline;
use crate::resources::ResourceManager;
use crate::tess::vertex::{normalize_color, TexturedVertex};
use crate::{VulkanError, VulkanResult};

/// Mesh as handed over by a model loader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticMesh {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex RGBA colour
    pub colors: Vec<[u8; 4]>,
    /// Texture coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl StaticMesh {
    /// Interleave into vertex records, checking the streams line up
    pub fn vertices(&self) -> VulkanResult<Vec<TexturedVertex>> {
        let count = self.positions.len();
        if self.colors.len() != count || self.uvs.len() != count {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Mesh streams differ in length: {count} positions, {} colours, {} uvs",
                    self.colors.len(),
                    self.uvs.len()
                ),
            });
        }
        Ok(self
            .positions
            .iter()
            .zip(&self.colors)
            .zip(&self.uvs)
            .map(|((&position, &color), &uv)| TexturedVertex {
                position,
                color: normalize_color(color),
                uv,
            })
            .collect())
    }
}

/// Device-local vertex and index buffers of an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGeometry {
    /// Interleaved [`TexturedVertex`] records
    pub vertex_buffer: vk::Buffer,
    /// `u32` indices
    pub index_buffer: vk::Buffer,
    /// Number of indices to draw
    pub index_count: u32,
}

impl ResourceManager {
    /// Copy `mesh` into device-local vertex and index buffers
    pub fn upload_static_geometry(&mut self, mesh: &StaticMesh) -> VulkanResult<StaticGeometry> {
        let vertices = mesh.vertices()?;
        if vertices.is_empty() || mesh.indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot upload an empty mesh".to_string(),
            });
        }

        let vertex_buffer = self.upload_device_local(
            bytemuck::cast_slice(&vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = self.upload_device_local(
            bytemuck::cast_slice(&mesh.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        log::debug!(
            "Uploaded static mesh: {} vertices, {} indices",
            vertices.len(),
            mesh.indices.len()
        );
        Ok(StaticGeometry {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    fn upload_device_local(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<vk::Buffer> {
        let size = bytes.len() as vk::DeviceSize;
        let buffer = self.create_buffer(size, usage | vk::BufferUsageFlags::TRANSFER_DST)?;
        let staging = self.create_staging_buffer(bytes)?;

        let device = self.device();
        let copy = self.one_shot().run(&*device, |cb| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            device.cmd_copy_buffer(cb, staging, buffer, &[region]);
            Ok(())
        });
        device.destroy_buffer(staging);
        copy?;
        Ok(buffer)
    }
}

/// Draw parameters baked into a [`StaticScene`]
#[derive(Debug, Clone, Copy)]
pub struct StaticSceneDesc {
    /// Pass the secondary buffer executes inside
    pub render_pass: vk::RenderPass,
    /// Pipeline for the mesh
    pub pipeline: GraphicsPipeline,
    /// Descriptor set bound for the draw
    pub descriptor_set: vk::DescriptorSet,
    /// Dynamic offset of the uniform slot the draw reads its transform from
    pub uniform_offset: u32,
    /// Viewport and scissor size
    pub extent: vk::Extent2D,
}

/// Secondary command buffer replayed unchanged every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticScene {
    command_buffer: vk::CommandBuffer,
}

impl StaticScene {
    /// Record `geometry` once with `RENDER_PASS_CONTINUE`
    pub fn record(resources: &mut ResourceManager, geometry: &StaticGeometry, desc: &StaticSceneDesc) -> VulkanResult<Self> {
        let device = resources.device();
        let pool = device.create_command_pool(resources.queue_family_index(), vk::CommandPoolCreateFlags::empty())?;
        let pool = resources.registry.register_command_pool(pool);
        let command_buffer = device
            .allocate_command_buffers(pool, vk::CommandBufferLevel::SECONDARY, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::api("vkAllocateCommandBuffers", vk::Result::ERROR_UNKNOWN))?;

        let inheritance = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(desc.render_pass)
            .subpass(0)
            .framebuffer(vk::Framebuffer::null());
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
            .inheritance_info(&inheritance);
        device.begin_command_buffer(command_buffer, &begin_info)?;
        record_mesh(&*device, command_buffer, geometry, desc);
        device.end_command_buffer(command_buffer)?;

        log::debug!("Recorded static scene {command_buffer:?} ({} indices)", geometry.index_count);
        Ok(Self { command_buffer })
    }

    /// The recorded secondary buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

fn record_mesh(device: &dyn GpuDevice, cb: vk::CommandBuffer, geometry: &StaticGeometry, desc: &StaticSceneDesc) {
    device.cmd_bind_pipeline(cb, desc.pipeline.pipeline);
    device.cmd_set_viewport(
        cb,
        &vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.extent.width as f32,
            height: desc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
    );
    device.cmd_set_scissor(
        cb,
        &vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: desc.extent,
        },
    );
    device.cmd_bind_vertex_buffer(cb, geometry.vertex_buffer, 0);
    device.cmd_bind_index_buffer(cb, geometry.index_buffer, 0);
    device.cmd_bind_descriptor_set(cb, desc.pipeline.layout, desc.descriptor_set, &[desc.uniform_offset]);
    device.cmd_draw_indexed(cb, geometry.index_count, 0, 0);
}
