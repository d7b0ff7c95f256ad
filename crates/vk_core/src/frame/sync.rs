//! Frame synchronization objects

use ash::vk;

use crate::resources::ResourceManager;
use crate::VulkanResult;

/// Semaphores and fence reused by every frame
///
/// The handles are owned by the resource registry and live until teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    /// Signalled by acquire, waited on by the frame's submission
    pub image_available: vk::Semaphore,
    /// Signalled by the submission, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signalled when the frame's work completes on the GPU
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    ///
    /// The fence starts signalled so the first acquire does not block.
    pub fn new(resources: &mut ResourceManager) -> VulkanResult<Self> {
        let device = resources.device();
        let image_available = resources.registry.register_semaphore(device.create_semaphore()?);
        let render_finished = resources.registry.register_semaphore(device.create_semaphore()?);
        let in_flight = resources.registry.register_fence(device.create_fence(true)?);

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}
