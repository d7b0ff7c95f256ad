//! Production [`GpuDevice`] backed by `ash`
//!
//! Owns the logical device, its single graphics/present queue and the
//! swapchain extension loader. Destroys the logical device on drop, so it
//! must outlive every object created through it.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use std::ffi::CStr;

use super::context::PhysicalDeviceInfo;
use super::device::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// Logical device wrapper implementing [`GpuDevice`]
pub struct AshDevice {
    device: ash::Device,
    swapchain_loader: SwapchainLoader,
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    limits: vk::PhysicalDeviceLimits,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
}

impl AshDevice {
    /// Create the logical device with one queue from the selected family
    pub fn new(instance: &ash::Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let queue_priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(physical.queue_family_index)
            .queue_priorities(&queue_priorities)
            .build();

        let extension_names = [SwapchainLoader::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical.features.sampler_anisotropy == vk::TRUE)
            .depth_bias_clamp(physical.features.depth_bias_clamp == vk::TRUE);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_info))
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::from_api("vkCreateDevice"))?
        };
        let queue = unsafe { device.get_device_queue(physical.queue_family_index, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::info!(
            "Created logical device on {}",
            unsafe { CStr::from_ptr(physical.properties.device_name.as_ptr()) }.to_string_lossy()
        );

        Ok(Self {
            device,
            swapchain_loader,
            queue,
            queue_family_index: physical.queue_family_index,
            memory_properties: physical.memory_properties,
            limits: physical.properties.limits,
            instance: instance.clone(),
            physical_device: physical.device,
        })
    }

    /// The graphics/present queue
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Family index of [`Self::queue`]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Raw ash device
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl Drop for AshDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::warn!("Device wait before destruction failed: {err:?}");
            }
            self.device.destroy_device(None);
        }
    }
}

impl GpuDevice for AshDevice {
    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.memory_properties
    }

    fn limits(&self) -> vk::PhysicalDeviceLimits {
        self.limits
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VulkanResult<vk::DeviceMemory> {
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::from_api("vkAllocateMemory"))
        }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<*mut u8> {
        unsafe {
            self.device
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
                .map(|ptr| ptr.cast::<u8>())
                .map_err(VulkanError::from_api("vkMapMemory"))
        }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VulkanResult<()> {
        unsafe {
            self.device
                .bind_image_memory(image, memory, offset)
                .map_err(VulkanError::from_api("vkBindImageMemory"))
        }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VulkanResult<()> {
        unsafe {
            self.device
                .bind_buffer_memory(buffer, memory, offset)
                .map_err(VulkanError::from_api("vkBindBufferMemory"))
        }
    }

    fn image_subresource_layout(&self, image: vk::Image, subresource: vk::ImageSubresource) -> vk::SubresourceLayout {
        unsafe { self.device.get_image_subresource_layout(image, subresource) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image> {
        unsafe {
            self.device
                .create_image(info, None)
                .map_err(VulkanError::from_api("vkCreateImage"))
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer> {
        unsafe {
            self.device
                .create_buffer(info, None)
                .map_err(VulkanError::from_api("vkCreateBuffer"))
        }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView> {
        unsafe {
            self.device
                .create_image_view(info, None)
                .map_err(VulkanError::from_api("vkCreateImageView"))
        }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VulkanResult<vk::Sampler> {
        unsafe {
            self.device
                .create_sampler(info, None)
                .map_err(VulkanError::from_api("vkCreateSampler"))
        }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) }
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe {
            self.device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateSemaphore"))
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe {
            self.device
                .create_fence(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateFence"))
        }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass> {
        unsafe {
            self.device
                .create_render_pass(info, None)
                .map_err(VulkanError::from_api("vkCreateRenderPass"))
        }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer> {
        unsafe {
            self.device
                .create_framebuffer(info, None)
                .map_err(VulkanError::from_api("vkCreateFramebuffer"))
        }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_descriptor_set_layout(&self, info: &vk::DescriptorSetLayoutCreateInfo) -> VulkanResult<vk::DescriptorSetLayout> {
        unsafe {
            self.device
                .create_descriptor_set_layout(info, None)
                .map_err(VulkanError::from_api("vkCreateDescriptorSetLayout"))
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout> {
        unsafe {
            self.device
                .create_pipeline_layout(info, None)
                .map_err(VulkanError::from_api("vkCreatePipelineLayout"))
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe {
            self.device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateShaderModule"))
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(info), None)
                .map_err(|(_, err)| VulkanError::api("vkCreateGraphicsPipelines", err))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::api("vkCreateGraphicsPipelines", vk::Result::ERROR_UNKNOWN))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool> {
        unsafe {
            self.device
                .create_descriptor_pool(info, None)
                .map_err(VulkanError::from_api("vkCreateDescriptorPool"))
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn create_command_pool(&self, queue_family_index: u32, flags: vk::CommandPoolCreateFlags) -> VulkanResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);
        unsafe {
            self.device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateCommandPool"))
        }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::from_api("vkAllocateDescriptorSets"))?
        };
        sets.into_iter()
            .next()
            .ok_or_else(|| VulkanError::api("vkAllocateDescriptorSets", vk::Result::ERROR_UNKNOWN))
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe { self.device.update_descriptor_sets(writes, &[]) }
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(count);
        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::from_api("vkAllocateCommandBuffers"))
        }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, info: &vk::CommandBufferBeginInfo) -> VulkanResult<()> {
        unsafe {
            self.device
                .begin_command_buffer(buffer, info)
                .map_err(VulkanError::from_api("vkBeginCommandBuffer"))
        }
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(buffer)
                .map_err(VulkanError::from_api("vkEndCommandBuffer"))
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                buffer_barriers,
                image_barriers,
            );
        }
    }

    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe { self.device.cmd_copy_buffer(buffer, src, dst, regions) }
    }

    fn cmd_copy_image(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        unsafe {
            self.device
                .cmd_copy_image(buffer, src, src_layout, dst, dst_layout, regions);
        }
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo, contents: vk::SubpassContents) {
        unsafe { self.device.cmd_begin_render_pass(buffer, info, contents) }
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(buffer) }
    }

    fn cmd_execute_commands(&self, buffer: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        unsafe { self.device.cmd_execute_commands(buffer, secondaries) }
    }

    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn cmd_bind_vertex_buffer(&self, buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(buffer, 0, &[vertex_buffer], &[offset]);
        }
    }

    fn cmd_bind_index_buffer(&self, buffer: vk::CommandBuffer, index_buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(buffer, index_buffer, offset, vk::IndexType::UINT32);
        }
    }

    fn cmd_bind_descriptor_set(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet, dynamic_offsets: &[u32]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                dynamic_offsets,
            );
        }
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .cmd_set_viewport(buffer, 0, std::slice::from_ref(viewport));
        }
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .cmd_set_scissor(buffer, 0, std::slice::from_ref(scissor));
        }
    }

    fn cmd_set_depth_bias(&self, buffer: vk::CommandBuffer, constant_factor: f32, clamp: f32, slope_factor: f32) {
        unsafe {
            self.device
                .cmd_set_depth_bias(buffer, constant_factor, clamp, slope_factor);
        }
    }

    fn cmd_draw_indexed(&self, buffer: vk::CommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device
                .cmd_draw_indexed(buffer, index_count, 1, first_index, vertex_offset, 0);
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        unsafe {
            self.device
                .queue_submit(queue, submits, fence)
                .map_err(VulkanError::from_api("vkQueueSubmit"))
        }
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VulkanResult<()> {
        unsafe {
            self.device
                .queue_wait_idle(queue)
                .map_err(VulkanError::from_api("vkQueueWaitIdle"))
        }
    }

    fn device_wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(VulkanError::from_api("vkDeviceWaitIdle"))
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[fence], true, timeout)
                .map_err(VulkanError::from_api("vkWaitForFences"))
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[fence])
                .map_err(VulkanError::from_api("vkResetFences"))
        }
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, timeout: u64, semaphore: vk::Semaphore) -> VulkanResult<u32> {
        let (index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
                .map_err(VulkanError::from_api("vkAcquireNextImageKHR"))?
        };
        if suboptimal {
            log::warn!("Swapchain image {index} acquired but suboptimal for the surface");
        }
        Ok(index)
    }

    fn queue_present(&self, queue: vk::Queue, swapchain: vk::SwapchainKHR, image_index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::from_api("vkQueuePresentKHR"))?
        };
        if suboptimal {
            log::warn!("Presented swapchain image {image_index} is suboptimal for the surface");
        }
        Ok(())
    }
}
