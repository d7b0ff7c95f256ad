//! Recording [`GpuDevice`] double for unit tests
//!
//! Hands out unique fake handles, backs every allocation with host bytes so
//! mapped writes can be inspected, and logs the commands recorded into
//! command buffers and submitted to queues.

use ash::vk::{self, Handle};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// Image barrier as seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrierRecord {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub aspect_mask: vk::ImageAspectFlags,
}

/// Buffer barrier as seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrierRecord {
    pub buffer: vk::Buffer,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub size: vk::DeviceSize,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginCommandBuffer { buffer: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags },
    EndCommandBuffer(vk::CommandBuffer),
    FreeCommandBuffers(Vec<vk::CommandBuffer>),
    PipelineBarrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffers: Vec<BufferBarrierRecord>,
        images: Vec<ImageBarrierRecord>,
    },
    CopyBuffer { src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize },
    CopyImage {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        extent: vk::Extent3D,
    },
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        contents: vk::SubpassContents,
    },
    EndRenderPass,
    ExecuteCommands(Vec<vk::CommandBuffer>),
    BindPipeline(vk::Pipeline),
    BindVertexBuffer { buffer: vk::Buffer, offset: vk::DeviceSize },
    BindIndexBuffer { buffer: vk::Buffer, offset: vk::DeviceSize },
    BindDescriptorSet { set: vk::DescriptorSet, dynamic_offsets: Vec<u32> },
    SetViewport { width: f32, height: f32 },
    SetScissor(vk::Extent2D),
    SetDepthBias { constant: f32, clamp: f32, slope: f32 },
    DrawIndexed { index_count: u32, first_index: u32, vertex_offset: i32 },
    UpdateDescriptorSets(Vec<(u32, vk::DescriptorType)>),
    QueueSubmit {
        command_buffers: Vec<vk::CommandBuffer>,
        wait_semaphores: Vec<vk::Semaphore>,
        wait_stages: Vec<vk::PipelineStageFlags>,
        signal_semaphores: Vec<vk::Semaphore>,
        fence: vk::Fence,
    },
    QueueWaitIdle,
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    AcquireNextImage { semaphore: vk::Semaphore, image_index: u32 },
    QueuePresent { image_index: u32, wait_semaphore: vk::Semaphore },
}

struct MockImage {
    extent: vk::Extent3D,
    format: vk::Format,
    tiling: vk::ImageTiling,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    memory: HashMap<u64, Box<[u8]>>,
    memory_types: HashMap<u64, u32>,
    mapped: HashSet<u64>,
    images: HashMap<u64, MockImage>,
    buffers: HashMap<u64, vk::DeviceSize>,
    live_objects: HashMap<&'static str, usize>,
    allocate_calls: usize,
    free_calls: usize,
    descriptor_sets: usize,
    next_image_index: u32,
    fail_next_acquire: bool,
    type_bits_override: Option<u32>,
    calls: Vec<Call>,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self, kind: &'static str) -> u64 {
        *self.live_objects.entry(kind).or_default() += 1;
        self.handle()
    }

    fn destroy(&mut self, kind: &'static str) {
        let count = self.live_objects.entry(kind).or_default();
        assert!(*count > 0, "destroyed more {kind} objects than were created");
        *count -= 1;
    }
}

/// Recording device double
pub struct MockDevice {
    memory_type_flags: Vec<vk::MemoryPropertyFlags>,
    row_alignment: vk::DeviceSize,
    min_uniform_alignment: vk::DeviceSize,
    depth_formats: Vec<vk::Format>,
    swapchain_images: u32,
    state: Mutex<MockState>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Device-local type 0, host-visible coherent type 1, tight rows
    pub fn new() -> Self {
        Self {
            memory_type_flags: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
            row_alignment: 1,
            min_uniform_alignment: 256,
            depth_formats: vec![vk::Format::D24_UNORM_S8_UINT, vk::Format::D32_SFLOAT],
            swapchain_images: 3,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_memory_types(mut self, flags: Vec<vk::MemoryPropertyFlags>) -> Self {
        self.memory_type_flags = flags;
        self
    }

    /// Override `memoryTypeBits` for every object
    pub fn with_memory_type_bits(self, bits: u32) -> Self {
        self.set_memory_type_bits(bits);
        self
    }

    /// Change `memoryTypeBits` reported for objects from now on
    pub fn set_memory_type_bits(&self, bits: u32) {
        self.state.lock().unwrap().type_bits_override = Some(bits);
    }

    /// Row pitch alignment of linear images
    pub fn with_row_alignment(mut self, alignment: vk::DeviceSize) -> Self {
        self.row_alignment = alignment;
        self
    }

    pub fn with_min_uniform_alignment(mut self, alignment: vk::DeviceSize) -> Self {
        self.min_uniform_alignment = alignment;
        self
    }

    pub fn with_depth_formats(mut self, formats: Vec<vk::Format>) -> Self {
        self.depth_formats = formats;
        self
    }

    /// Fake swapchain handle paired with this device's image count
    pub fn swapchain_images(&self) -> (vk::SwapchainKHR, Vec<vk::Image>) {
        let mut state = self.state.lock().unwrap();
        let swapchain = vk::SwapchainKHR::from_raw(state.handle());
        let images = (0..self.swapchain_images)
            .map(|_| vk::Image::from_raw(state.handle()))
            .collect();
        (swapchain, images)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Make the next `acquire_next_image` report an out-of-date swapchain
    pub fn fail_next_acquire(&self) {
        self.state.lock().unwrap().fail_next_acquire = true;
    }

    /// Number of `allocate_memory` calls that succeeded
    pub fn allocate_calls(&self) -> usize {
        self.state.lock().unwrap().allocate_calls
    }

    pub fn free_calls(&self) -> usize {
        self.state.lock().unwrap().free_calls
    }

    pub fn live_allocations(&self) -> usize {
        self.state.lock().unwrap().memory.len()
    }

    /// Objects created and not yet destroyed, all kinds together
    pub fn live_objects(&self) -> usize {
        self.state.lock().unwrap().live_objects.values().sum()
    }

    pub fn descriptor_sets_allocated(&self) -> usize {
        self.state.lock().unwrap().descriptor_sets
    }

    pub fn memory_type_of(&self, memory: vk::DeviceMemory) -> Option<u32> {
        self.state.lock().unwrap().memory_types.get(&memory.as_raw()).copied()
    }

    /// Copy of an allocation's bytes
    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state.lock().unwrap().memory[&memory.as_raw()].to_vec()
    }

    /// Fill an allocation with a marker byte
    pub fn fill_memory(&self, memory: vk::DeviceMemory, byte: u8) {
        let mut state = self.state.lock().unwrap();
        state.memory.get_mut(&memory.as_raw()).unwrap().fill(byte);
    }

    pub fn is_mapped(&self, memory: vk::DeviceMemory) -> bool {
        self.state.lock().unwrap().mapped.contains(&memory.as_raw())
    }

    fn type_bits(&self, state: &MockState) -> u32 {
        state
            .type_bits_override
            .unwrap_or((1u32 << self.memory_type_flags.len()) - 1)
    }

    fn row_pitch(&self, image: &MockImage) -> vk::DeviceSize {
        let packed = vk::DeviceSize::from(image.extent.width) * bytes_per_texel(image.format);
        if image.tiling == vk::ImageTiling::LINEAR {
            packed.div_ceil(self.row_alignment) * self.row_alignment
        } else {
            packed
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn bytes_per_texel(format: vk::Format) -> vk::DeviceSize {
    match format {
        vk::Format::D16_UNORM => 2,
        vk::Format::D32_SFLOAT_S8_UINT => 8,
        _ => 4,
    }
}

unsafe fn slice_or_empty<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if count == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

impl GpuDevice for MockDevice {
    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: self.memory_type_flags.len() as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (slot, flags) in props.memory_types.iter_mut().zip(&self.memory_type_flags) {
            *slot = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props.memory_heaps[0].size = 1 << 30;
        props
    }

    fn limits(&self) -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            min_uniform_buffer_offset_alignment: self.min_uniform_alignment,
            ..Default::default()
        }
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        let mut props = vk::FormatProperties::default();
        if self.depth_formats.contains(&format) {
            props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        props
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VulkanResult<vk::DeviceMemory> {
        assert!((memory_type_index as usize) < self.memory_type_flags.len());
        let mut state = self.state.lock().unwrap();
        let raw = state.handle();
        state.memory.insert(raw, vec![0u8; size as usize].into_boxed_slice());
        state.memory_types.insert(raw, memory_type_index);
        state.allocate_calls += 1;
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.lock().unwrap();
        assert!(state.memory.remove(&memory.as_raw()).is_some(), "double free of {memory:?}");
        state.mapped.remove(&memory.as_raw());
        state.free_calls += 1;
    }

    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<*mut u8> {
        let mut state = self.state.lock().unwrap();
        let raw = memory.as_raw();
        if !state.mapped.insert(raw) {
            return Err(VulkanError::api("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        let bytes = state
            .memory
            .get_mut(&raw)
            .ok_or_else(|| VulkanError::api("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        let len = bytes.len() as vk::DeviceSize;
        let end = if size == vk::WHOLE_SIZE { len } else { offset + size };
        if offset > len || end > len {
            return Err(VulkanError::api("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        Ok(unsafe { bytes.as_mut_ptr().add(offset as usize) })
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.lock().unwrap();
        assert!(state.mapped.remove(&memory.as_raw()), "unmap of unmapped {memory:?}");
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.state.lock().unwrap();
        let info = &state.images[&image.as_raw()];
        vk::MemoryRequirements {
            size: self.row_pitch(info) * vk::DeviceSize::from(info.extent.height),
            alignment: 256,
            memory_type_bits: self.type_bits(&state),
        }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let state = self.state.lock().unwrap();
        let size = state.buffers[&buffer.as_raw()];
        vk::MemoryRequirements {
            size: size.div_ceil(64) * 64,
            alignment: 64,
            memory_type_bits: self.type_bits(&state),
        }
    }

    fn bind_image_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory, _offset: vk::DeviceSize) -> VulkanResult<()> {
        Ok(())
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory, _offset: vk::DeviceSize) -> VulkanResult<()> {
        Ok(())
    }

    fn image_subresource_layout(&self, image: vk::Image, _subresource: vk::ImageSubresource) -> vk::SubresourceLayout {
        let state = self.state.lock().unwrap();
        let info = &state.images[&image.as_raw()];
        let row_pitch = self.row_pitch(info);
        vk::SubresourceLayout {
            offset: 0,
            size: row_pitch * vk::DeviceSize::from(info.extent.height),
            row_pitch,
            array_pitch: 0,
            depth_pitch: 0,
        }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image> {
        let mut state = self.state.lock().unwrap();
        let raw = state.create("image");
        state.images.insert(
            raw,
            MockImage {
                extent: info.extent,
                format: info.format,
                tiling: info.tiling,
            },
        );
        Ok(vk::Image::from_raw(raw))
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.state.lock().unwrap();
        state.images.remove(&image.as_raw());
        state.destroy("image");
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer> {
        let mut state = self.state.lock().unwrap();
        let raw = state.create("buffer");
        state.buffers.insert(raw, info.size);
        Ok(vk::Buffer::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut state = self.state.lock().unwrap();
        state.buffers.remove(&buffer.as_raw());
        state.destroy("buffer");
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView> {
        Ok(vk::ImageView::from_raw(self.state.lock().unwrap().create("image view")))
    }

    fn destroy_image_view(&self, _view: vk::ImageView) {
        self.state.lock().unwrap().destroy("image view");
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo) -> VulkanResult<vk::Sampler> {
        Ok(vk::Sampler::from_raw(self.state.lock().unwrap().create("sampler")))
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {
        self.state.lock().unwrap().destroy("sampler");
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.state.lock().unwrap().create("semaphore")))
    }

    fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.state.lock().unwrap().destroy("semaphore");
    }

    fn create_fence(&self, _signaled: bool) -> VulkanResult<vk::Fence> {
        Ok(vk::Fence::from_raw(self.state.lock().unwrap().create("fence")))
    }

    fn destroy_fence(&self, _fence: vk::Fence) {
        self.state.lock().unwrap().destroy("fence");
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass> {
        Ok(vk::RenderPass::from_raw(self.state.lock().unwrap().create("render pass")))
    }

    fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.state.lock().unwrap().destroy("render pass");
    }

    fn create_framebuffer(&self, _info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer> {
        Ok(vk::Framebuffer::from_raw(self.state.lock().unwrap().create("framebuffer")))
    }

    fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.state.lock().unwrap().destroy("framebuffer");
    }

    fn create_descriptor_set_layout(&self, _info: &vk::DescriptorSetLayoutCreateInfo) -> VulkanResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(
            self.state.lock().unwrap().create("descriptor set layout"),
        ))
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.state.lock().unwrap().destroy("descriptor set layout");
    }

    fn create_pipeline_layout(&self, _info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout> {
        Ok(vk::PipelineLayout::from_raw(self.state.lock().unwrap().create("pipeline layout")))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.state.lock().unwrap().destroy("pipeline layout");
    }

    fn create_shader_module(&self, _code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        Ok(vk::ShaderModule::from_raw(self.state.lock().unwrap().create("shader module")))
    }

    fn destroy_shader_module(&self, _module: vk::ShaderModule) {
        self.state.lock().unwrap().destroy("shader module");
    }

    fn create_graphics_pipeline(&self, _info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline> {
        Ok(vk::Pipeline::from_raw(self.state.lock().unwrap().create("pipeline")))
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.state.lock().unwrap().destroy("pipeline");
    }

    fn create_descriptor_pool(&self, _info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool> {
        Ok(vk::DescriptorPool::from_raw(self.state.lock().unwrap().create("descriptor pool")))
    }

    fn destroy_descriptor_pool(&self, _pool: vk::DescriptorPool) {
        self.state.lock().unwrap().destroy("descriptor pool");
    }

    fn create_command_pool(&self, _queue_family_index: u32, _flags: vk::CommandPoolCreateFlags) -> VulkanResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.state.lock().unwrap().create("command pool")))
    }

    fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        self.state.lock().unwrap().destroy("command pool");
    }

    fn allocate_descriptor_set(&self, _pool: vk::DescriptorPool, _layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let mut state = self.state.lock().unwrap();
        state.descriptor_sets += 1;
        Ok(vk::DescriptorSet::from_raw(state.handle()))
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        let bindings = writes.iter().map(|w| (w.dst_binding, w.descriptor_type)).collect();
        self.record(Call::UpdateDescriptorSets(bindings));
    }

    fn allocate_command_buffers(&self, _pool: vk::CommandPool, _level: vk::CommandBufferLevel, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock().unwrap();
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.handle()))
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.record(Call::FreeCommandBuffers(buffers.to_vec()));
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, info: &vk::CommandBufferBeginInfo) -> VulkanResult<()> {
        self.record(Call::BeginCommandBuffer { buffer, flags: info.flags });
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.record(Call::EndCommandBuffer(buffer));
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        _buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        let buffers = buffer_barriers
            .iter()
            .map(|b| BufferBarrierRecord {
                buffer: b.buffer,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                size: b.size,
            })
            .collect();
        let images = image_barriers
            .iter()
            .map(|b| ImageBarrierRecord {
                image: b.image,
                old_layout: b.old_layout,
                new_layout: b.new_layout,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                aspect_mask: b.subresource_range.aspect_mask,
            })
            .collect();
        self.record(Call::PipelineBarrier { src_stage, dst_stage, buffers, images });
    }

    fn cmd_copy_buffer(&self, _buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        let size = regions.iter().map(|r| r.size).sum();
        self.record(Call::CopyBuffer { src, dst, size });
    }

    fn cmd_copy_image(
        &self,
        _buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        let extent = regions.first().map(|r| r.extent).unwrap_or_default();
        self.record(Call::CopyImage { src, src_layout, dst, dst_layout, extent });
    }

    fn cmd_begin_render_pass(&self, _buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo, contents: vk::SubpassContents) {
        self.record(Call::BeginRenderPass {
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
            contents,
        });
    }

    fn cmd_end_render_pass(&self, _buffer: vk::CommandBuffer) {
        self.record(Call::EndRenderPass);
    }

    fn cmd_execute_commands(&self, _buffer: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        self.record(Call::ExecuteCommands(secondaries.to_vec()));
    }

    fn cmd_bind_pipeline(&self, _buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(Call::BindPipeline(pipeline));
    }

    fn cmd_bind_vertex_buffer(&self, _buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer, offset: vk::DeviceSize) {
        self.record(Call::BindVertexBuffer { buffer: vertex_buffer, offset });
    }

    fn cmd_bind_index_buffer(&self, _buffer: vk::CommandBuffer, index_buffer: vk::Buffer, offset: vk::DeviceSize) {
        self.record(Call::BindIndexBuffer { buffer: index_buffer, offset });
    }

    fn cmd_bind_descriptor_set(&self, _buffer: vk::CommandBuffer, _layout: vk::PipelineLayout, set: vk::DescriptorSet, dynamic_offsets: &[u32]) {
        self.record(Call::BindDescriptorSet {
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn cmd_set_viewport(&self, _buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        self.record(Call::SetViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn cmd_set_scissor(&self, _buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.record(Call::SetScissor(scissor.extent));
    }

    fn cmd_set_depth_bias(&self, _buffer: vk::CommandBuffer, constant_factor: f32, clamp: f32, slope_factor: f32) {
        self.record(Call::SetDepthBias {
            constant: constant_factor,
            clamp,
            slope: slope_factor,
        });
    }

    fn cmd_draw_indexed(&self, _buffer: vk::CommandBuffer, index_count: u32, first_index: u32, vertex_offset: i32) {
        self.record(Call::DrawIndexed { index_count, first_index, vertex_offset });
    }

    fn queue_submit(&self, _queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        for submit in submits {
            let call = unsafe {
                Call::QueueSubmit {
                    command_buffers: slice_or_empty(submit.p_command_buffers, submit.command_buffer_count).to_vec(),
                    wait_semaphores: slice_or_empty(submit.p_wait_semaphores, submit.wait_semaphore_count).to_vec(),
                    wait_stages: slice_or_empty(submit.p_wait_dst_stage_mask, submit.wait_semaphore_count).to_vec(),
                    signal_semaphores: slice_or_empty(submit.p_signal_semaphores, submit.signal_semaphore_count)
                        .to_vec(),
                    fence,
                }
            };
            self.record(call);
        }
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VulkanResult<()> {
        self.record(Call::QueueWaitIdle);
        Ok(())
    }

    fn device_wait_idle(&self) -> VulkanResult<()> {
        Ok(())
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VulkanResult<()> {
        self.record(Call::WaitForFence(fence));
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        self.record(Call::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(&self, _swapchain: vk::SwapchainKHR, _timeout: u64, semaphore: vk::Semaphore) -> VulkanResult<u32> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_acquire) {
            return Err(VulkanError::api("vkAcquireNextImageKHR", vk::Result::ERROR_OUT_OF_DATE_KHR));
        }
        let image_index = state.next_image_index;
        state.next_image_index = (image_index + 1) % self.swapchain_images;
        state.calls.push(Call::AcquireNextImage { semaphore, image_index });
        Ok(image_index)
    }

    fn queue_present(&self, _queue: vk::Queue, _swapchain: vk::SwapchainKHR, image_index: u32, wait_semaphore: vk::Semaphore) -> VulkanResult<()> {
        self.record(Call::QueuePresent { image_index, wait_semaphore });
        Ok(())
    }
}
