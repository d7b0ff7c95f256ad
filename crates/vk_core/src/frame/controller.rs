//! Per-frame acquire, record, submit and present
//!
//! A frame walks `Idle -> Acquired -> Recording -> Submitted -> Presented`
//! and then starts over at acquire. Only one frame is ever in flight: the
//! acquire step blocks on the fence signalled by the previous submission.

use ash::vk;
use std::fmt;

use super::sync::FrameSync;
use crate::backend::GpuDevice;
use crate::resources::{select_depth_format, ResourceManager};
use crate::{VulkanError, VulkanResult};

/// Swapchain images the controller renders into
#[derive(Debug, Clone)]
pub struct SurfaceTargets {
    /// Swapchain images are acquired from
    pub swapchain: vk::SwapchainKHR,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
    /// Colour format of the images
    pub format: vk::Format,
    /// Size of the images
    pub extent: vk::Extent2D,
}

/// Where the frame currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No frame started yet
    Idle,
    /// Image acquired, nothing recorded
    Acquired,
    /// Primary command buffer open inside the render pass
    Recording,
    /// Work handed to the queue
    Submitted,
    /// Image handed to the presentation engine
    Presented,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Copy from host-staged uniform slots into the device-local uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformUpload {
    /// Host-visible source buffer
    pub src: vk::Buffer,
    /// Device-local uniform buffer read by the vertex stage
    pub dst: vk::Buffer,
    /// Bytes to copy from offset 0
    pub size: vk::DeviceSize,
}

/// Drives one swapchain through the frame state machine
pub struct FrameController {
    swapchain: vk::SwapchainKHR,
    queue: vk::Queue,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    depth_format: vk::Format,
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    sync: FrameSync,
    clear_color: [f32; 4],
    state: FrameState,
    image_index: u32,
    contents: vk::SubpassContents,
}

impl FrameController {
    /// Build the render pass, depth buffer, framebuffers, per-image command
    /// buffers and sync objects for `targets`
    pub fn new(resources: &mut ResourceManager, targets: &SurfaceTargets, clear_color: [f32; 4]) -> VulkanResult<Self> {
        let device = resources.device();
        let depth_format = select_depth_format(&*device)?;

        let render_pass = resources.create_render_pass(targets.format, depth_format)?;
        let depth_image = resources.create_depth_attachment_image(targets.extent, depth_format)?;
        let depth_view = resources.create_image_view(depth_image, depth_format)?;

        let framebuffers = targets
            .images
            .iter()
            .map(|&image| {
                let view = resources.create_image_view(image, targets.format)?;
                resources.create_framebuffer(render_pass, view, depth_view, targets.extent)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let pool = device.create_command_pool(
            resources.queue_family_index(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let pool = resources.registry.register_command_pool(pool);
        let command_buffers =
            device.allocate_command_buffers(pool, vk::CommandBufferLevel::PRIMARY, targets.images.len() as u32)?;

        let sync = FrameSync::new(resources)?;

        log::info!(
            "Frame controller ready: {} images at {}x{}, depth {depth_format:?}",
            targets.images.len(),
            targets.extent.width,
            targets.extent.height
        );

        Ok(Self {
            swapchain: targets.swapchain,
            queue: resources.one_shot().queue,
            extent: targets.extent,
            render_pass,
            depth_format,
            framebuffers,
            command_buffers,
            sync,
            clear_color,
            state: FrameState::Idle,
            image_index: 0,
            contents: vk::SubpassContents::INLINE,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Render pass every pipeline is built against
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Depth attachment format
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Index of the image acquired for the current frame
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Synchronization objects shared by every frame
    pub fn sync(&self) -> FrameSync {
        self.sync
    }

    /// Primary command buffer of the current frame, while recording
    pub fn command_buffer(&self) -> VulkanResult<vk::CommandBuffer> {
        self.expect_state(&[FrameState::Recording], "record into the frame")?;
        Ok(self.command_buffers[self.image_index as usize])
    }

    fn expect_state(&self, allowed: &[FrameState], action: &str) -> VulkanResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(VulkanError::InvalidOperation {
                reason: format!("Cannot {action} while frame is {}", self.state),
            })
        }
    }

    /// Wait for the previous frame, then acquire the next swapchain image
    pub fn acquire(&mut self, device: &dyn GpuDevice) -> VulkanResult<u32> {
        self.expect_state(&[FrameState::Idle, FrameState::Presented], "acquire an image")?;

        device.wait_for_fence(self.sync.in_flight, u64::MAX)?;
        let image_index = device.acquire_next_image(self.swapchain, u64::MAX, self.sync.image_available)?;
        // Unsignal only once a submission is sure to follow
        device.reset_fence(self.sync.in_flight)?;
        self.image_index = image_index;

        self.state = FrameState::Acquired;
        Ok(self.image_index)
    }

    /// Open the image's command buffer and begin the render pass
    ///
    /// When `uniforms` is given, the staged slots are copied into the
    /// device-local uniform buffer ahead of the pass and made visible to
    /// the vertex stage. `contents` selects inline draws or secondary
    /// command buffer execution for the subpass.
    pub fn begin_recording(
        &mut self,
        device: &dyn GpuDevice,
        uniforms: Option<UniformUpload>,
        contents: vk::SubpassContents,
    ) -> VulkanResult<vk::CommandBuffer> {
        self.expect_state(&[FrameState::Acquired], "begin recording")?;

        let cb = self.command_buffers[self.image_index as usize];
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(cb, &begin_info)?;

        if let Some(upload) = uniforms {
            record_uniform_upload(device, cb, upload);
        }

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[self.image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);
        device.cmd_begin_render_pass(cb, &render_pass_info, contents);

        self.contents = contents;
        self.state = FrameState::Recording;
        Ok(cb)
    }

    /// Replay pre-recorded secondary command buffers in the open pass
    pub fn execute_secondary(&self, device: &dyn GpuDevice, secondaries: &[vk::CommandBuffer]) -> VulkanResult<()> {
        let cb = self.command_buffer()?;
        if self.contents != vk::SubpassContents::SECONDARY_COMMAND_BUFFERS {
            return Err(VulkanError::InvalidOperation {
                reason: "Render pass was begun for inline draws".to_string(),
            });
        }
        device.cmd_execute_commands(cb, secondaries);
        Ok(())
    }

    /// Close the pass and submit the frame
    pub fn submit(&mut self, device: &dyn GpuDevice) -> VulkanResult<()> {
        self.expect_state(&[FrameState::Recording], "submit")?;

        let cb = self.command_buffers[self.image_index as usize];
        device.cmd_end_render_pass(cb);
        device.end_command_buffer(cb)?;

        let wait_semaphores = [self.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cb];
        let signal_semaphores = [self.sync.render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        device.queue_submit(self.queue, &[submit_info], self.sync.in_flight)?;

        self.state = FrameState::Submitted;
        Ok(())
    }

    /// Queue the rendered image for presentation
    pub fn present(&mut self, device: &dyn GpuDevice) -> VulkanResult<()> {
        self.expect_state(&[FrameState::Submitted], "present")?;
        device.queue_present(self.queue, self.swapchain, self.image_index, self.sync.render_finished)?;
        self.state = FrameState::Presented;
        Ok(())
    }
}

/// Copy the staged uniform slots and order the copy before vertex shading
pub fn record_uniform_upload(device: &dyn GpuDevice, cb: vk::CommandBuffer, upload: UniformUpload) {
    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: upload.size,
    };
    device.cmd_copy_buffer(cb, upload.src, upload.dst, &[region]);

    let barrier = vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::UNIFORM_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(upload.dst)
        .offset(0)
        .size(upload.size)
        .build();
    device.cmd_pipeline_barrier(
        cb,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::VERTEX_SHADER,
        &[barrier],
        &[],
    );
}
