//! GPU resource management
//!
//! [`ResourceManager`] is the single owner of device memory and of every
//! long-lived object: it bundles the allocator, the shared staging block,
//! the registry and the one-shot submission context, and tears all of them
//! down together when dropped.

pub mod allocator;
pub mod buffer;
pub mod commands;
pub mod descriptor_set;
pub mod image;
pub mod registry;
pub mod staging;
pub mod texture;

pub use allocator::{find_memory_type, Allocation, DeviceAllocator, MemoryTarget};
pub use buffer::{HostBuffer, MappedBuffer};
pub use commands::{record_and_run, OneShotContext};
pub use descriptor_set::{DescriptorKey, DescriptorSetCache, DescriptorSetLayoutBuilder};
pub use image::{aspect_mask_for_format, record_image_layout_transition, select_depth_format, LayoutTransition};
pub use registry::ResourceRegistry;
pub use staging::SharedStagingMemory;
pub use texture::Texture;

use ash::vk;
use std::sync::Arc;

use crate::backend::GpuDevice;
use crate::VulkanResult;

/// Owner of memory and objects for one device
pub struct ResourceManager {
    device: Arc<dyn GpuDevice>,
    /// Fresh device allocations, freed at teardown
    pub allocator: DeviceAllocator,
    /// Reusable block for transient staging objects
    pub staging: SharedStagingMemory,
    /// Handles destroyed at teardown
    pub registry: ResourceRegistry,
    one_shot: OneShotContext,
    queue_family_index: u32,
}

impl ResourceManager {
    /// Set up resource tracking and a transient command pool on `queue`
    pub fn new(device: Arc<dyn GpuDevice>, queue_family_index: u32, queue: vk::Queue) -> VulkanResult<Self> {
        let mut registry = ResourceRegistry::new();
        let pool = registry.register_command_pool(
            device.create_command_pool(queue_family_index, vk::CommandPoolCreateFlags::TRANSIENT)?,
        );

        Ok(Self {
            allocator: DeviceAllocator::new(&*device),
            staging: SharedStagingMemory::new(&*device),
            registry,
            one_shot: OneShotContext { pool, queue },
            queue_family_index,
            device,
        })
    }

    /// Shared handle to the device
    pub fn device(&self) -> Arc<dyn GpuDevice> {
        Arc::clone(&self.device)
    }

    /// Pool and queue for synchronous setup submissions
    pub fn one_shot(&self) -> OneShotContext {
        self.one_shot
    }

    /// Queue family resources are created for
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Wait for the device, then destroy every object and free every allocation
    pub fn destroy_all(&mut self) {
        if let Err(err) = self.device.device_wait_idle() {
            log::error!("Device wait before teardown failed: {err}");
        }
        let device = &*self.device;
        self.registry.destroy_all(device);
        self.staging.release(device);
        self.allocator.deallocate_all(device);
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
