//! Device abstraction
//!
//! Every Vulkan entry point the core uses goes through [`GpuDevice`]. The
//! production implementation is [`AshDevice`](super::AshDevice); tests run
//! the same upload and frame code against a recording double.
//!
//! Methods are safe to call: implementations own the `unsafe` blocks around
//! the raw API and convert status codes into [`VulkanError::Api`]. Only the
//! pointer returned by [`GpuDevice::map_memory`] requires `unsafe` at the
//! call site.
//!
//! [`VulkanError::Api`]: crate::VulkanError::Api

use ash::vk;
use crate::VulkanResult;

/// The slice of the Vulkan API consumed by the resource and frame core
pub trait GpuDevice {
    // --- physical device queries ---

    /// Memory heaps and types of the physical device
    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties;

    /// Device limits (uniform offset alignment and friends)
    fn limits(&self) -> vk::PhysicalDeviceLimits;

    /// Format feature support
    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    // --- memory ---

    /// Allocate `size` bytes from the given memory type
    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VulkanResult<vk::DeviceMemory>;

    /// Free a device memory allocation
    fn free_memory(&self, memory: vk::DeviceMemory);

    /// Map a host-visible range; the pointer is valid until [`Self::unmap_memory`]
    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<*mut u8>;

    /// Unmap a previously mapped allocation
    fn unmap_memory(&self, memory: vk::DeviceMemory);

    /// Memory requirements of an image
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    /// Memory requirements of a buffer
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;

    /// Bind memory to an image
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VulkanResult<()>;

    /// Bind memory to a buffer
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VulkanResult<()>;

    /// Layout (offset, row pitch) of a linearly tiled image subresource
    fn image_subresource_layout(&self, image: vk::Image, subresource: vk::ImageSubresource) -> vk::SubresourceLayout;

    // --- object lifetime ---

    /// Create an image
    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image>;
    /// Destroy an image
    fn destroy_image(&self, image: vk::Image);

    /// Create a buffer
    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer>;
    /// Destroy a buffer
    fn destroy_buffer(&self, buffer: vk::Buffer);

    /// Create an image view
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Create a sampler
    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VulkanResult<vk::Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);

    /// Create a render pass
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass>;
    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Create a framebuffer
    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer>;
    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(&self, info: &vk::DescriptorSetLayoutCreateInfo) -> VulkanResult<vk::DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a pipeline layout
    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a single graphics pipeline
    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Create a descriptor pool
    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool>;
    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Create a command pool for a queue family
    fn create_command_pool(&self, queue_family_index: u32, flags: vk::CommandPoolCreateFlags) -> VulkanResult<vk::CommandPool>;
    /// Destroy a command pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    // --- descriptors ---

    /// Allocate one descriptor set with the given layout
    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet>;

    /// Apply descriptor writes
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);

    // --- command buffers ---

    /// Allocate command buffers from a pool
    fn allocate_command_buffers(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>>;

    /// Return command buffers to their pool
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    /// Begin recording
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, info: &vk::CommandBufferBeginInfo) -> VulkanResult<()>;

    /// End recording
    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()>;

    // --- recording ---

    /// Record a pipeline barrier with buffer and image memory barriers
    fn cmd_pipeline_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    );

    /// Copy between buffers
    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);

    /// Copy between images
    fn cmd_copy_image(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    );

    /// Begin a render pass instance
    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo, contents: vk::SubpassContents);

    /// End the current render pass instance
    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);

    /// Execute secondary command buffers from a primary
    fn cmd_execute_commands(&self, buffer: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]);

    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// Bind one vertex buffer at binding 0
    fn cmd_bind_vertex_buffer(&self, buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer, offset: vk::DeviceSize);

    /// Bind a `u32` index buffer
    fn cmd_bind_index_buffer(&self, buffer: vk::CommandBuffer, index_buffer: vk::Buffer, offset: vk::DeviceSize);

    /// Bind one graphics descriptor set at set 0
    fn cmd_bind_descriptor_set(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet, dynamic_offsets: &[u32]);

    /// Set viewport 0
    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport);

    /// Set scissor 0
    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D);

    /// Set depth bias factors
    fn cmd_set_depth_bias(&self, buffer: vk::CommandBuffer, constant_factor: f32, clamp: f32, slope_factor: f32);

    /// Indexed draw of a single instance
    fn cmd_draw_indexed(&self, buffer: vk::CommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32);

    // --- queues and synchronization ---

    /// Submit work to a queue
    fn queue_submit(&self, queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()>;

    /// Block until the queue is idle
    fn queue_wait_idle(&self, queue: vk::Queue) -> VulkanResult<()>;

    /// Block until the whole device is idle
    fn device_wait_idle(&self) -> VulkanResult<()>;

    /// Block until the fence is signaled
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VulkanResult<()>;

    /// Return the fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    // --- presentation ---

    /// Acquire the next presentable image, signalling `semaphore`
    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, timeout: u64, semaphore: vk::Semaphore) -> VulkanResult<u32>;

    /// Queue an image for presentation after `wait_semaphore`
    fn queue_present(&self, queue: vk::Queue, swapchain: vk::SwapchainKHR, image_index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<()>;
}
