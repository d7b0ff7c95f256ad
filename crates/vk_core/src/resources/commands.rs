//! One-shot command submission
//!
//! The synchronous escape hatch for setup work: record, submit, wait for
//! the queue to drain, free.

use ash::vk;

use crate::backend::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// Pool and queue used for synchronous setup work
#[derive(Debug, Clone, Copy)]
pub struct OneShotContext {
    /// Pool the transient command buffer comes from
    pub pool: vk::CommandPool,
    /// Queue the work is submitted to
    pub queue: vk::Queue,
}

impl OneShotContext {
    /// Run `record` in a one-time command buffer and block until it finishes
    pub fn run<F>(&self, device: &dyn GpuDevice, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> VulkanResult<()>,
    {
        record_and_run(device, self.pool, self.queue, record)
    }
}

/// Record a primary command buffer, submit it and wait for the queue to idle
///
/// The buffer is begun with `ONE_TIME_SUBMIT` and submitted without
/// semaphores or fence. It is returned to `pool` whether or not recording
/// or submission succeeded.
pub fn record_and_run<F>(
    device: &dyn GpuDevice,
    pool: vk::CommandPool,
    queue: vk::Queue,
    record: F,
) -> VulkanResult<()>
where
    F: FnOnce(vk::CommandBuffer) -> VulkanResult<()>,
{
    let command_buffer = device
        .allocate_command_buffers(pool, vk::CommandBufferLevel::PRIMARY, 1)?
        .into_iter()
        .next()
        .ok_or_else(|| VulkanError::api("vkAllocateCommandBuffers", vk::Result::ERROR_UNKNOWN))?;

    let result = submit_and_wait(device, queue, command_buffer, record);
    device.free_command_buffers(pool, &[command_buffer]);
    result
}

fn submit_and_wait<F>(
    device: &dyn GpuDevice,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    record: F,
) -> VulkanResult<()>
where
    F: FnOnce(vk::CommandBuffer) -> VulkanResult<()>,
{
    let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device.begin_command_buffer(command_buffer, &begin_info)?;

    record(command_buffer)?;

    device.end_command_buffer(command_buffer)?;

    let command_buffers = [command_buffer];
    let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
    device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
    device.queue_wait_idle(queue)
}
