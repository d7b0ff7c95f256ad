//! Shared staging memory
//!
//! One host-visible allocation reused by transient upload objects. Only one
//! staging object may be bound to it at a time; the caller destroys that
//! object before the next upload.

use ash::vk;

use super::allocator::{find_memory_type, Allocation, MemoryTarget};
use crate::backend::GpuDevice;
use crate::VulkanResult;

/// Host-visible, host-coherent: writes need no explicit flush
pub const STAGING_MEMORY_FLAGS: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Reusable allocation for staging images and buffers
#[derive(Debug)]
pub struct SharedStagingMemory {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    current: Option<Allocation>,
}

impl SharedStagingMemory {
    /// Create without committing any memory
    pub fn new(device: &dyn GpuDevice) -> Self {
        Self {
            memory_properties: device.memory_properties(),
            current: None,
        }
    }

    /// Make sure the shared block can back `target` and bind it
    ///
    /// The block is kept when it is at least as large as required and of
    /// the required memory type. Otherwise it is freed and replaced.
    pub fn ensure_allocation(
        &mut self,
        device: &dyn GpuDevice,
        target: impl Into<MemoryTarget>,
    ) -> VulkanResult<vk::DeviceMemory> {
        let target = target.into();
        let requirements = target.requirements(device);
        let memory_type_index = find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            STAGING_MEMORY_FLAGS,
        )?;

        let memory = match self.current {
            Some(current)
                if current.size >= requirements.size && current.memory_type_index == memory_type_index =>
            {
                current.memory
            }
            previous => {
                if let Some(previous) = previous {
                    device.free_memory(previous.memory);
                    self.current = None;
                }
                let memory = device.allocate_memory(requirements.size, memory_type_index)?;
                log::debug!(
                    "Staging memory grown to {} bytes (type {memory_type_index})",
                    requirements.size
                );
                self.current = Some(Allocation {
                    memory,
                    size: requirements.size,
                    memory_type_index,
                });
                memory
            }
        };

        target.bind(device, memory)?;
        Ok(memory)
    }

    /// Current block, if one has been committed
    pub fn current(&self) -> Option<Allocation> {
        self.current
    }

    /// Free the block at teardown
    pub fn release(&mut self, device: &dyn GpuDevice) {
        if let Some(current) = self.current.take() {
            device.free_memory(current.memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockDevice;

    fn buffer(device: &MockDevice, size: vk::DeviceSize) -> vk::Buffer {
        let info = vk::BufferCreateInfo::builder().size(size).build();
        device.create_buffer(&info).unwrap()
    }

    #[test]
    fn test_equal_or_smaller_requests_reuse_the_block() {
        let device = MockDevice::new();
        let mut staging = SharedStagingMemory::new(&device);

        let first = staging.ensure_allocation(&device, buffer(&device, 4096)).unwrap();
        assert_eq!(device.allocate_calls(), 1);

        let again = staging.ensure_allocation(&device, buffer(&device, 4096)).unwrap();
        let smaller = staging.ensure_allocation(&device, buffer(&device, 1000)).unwrap();
        assert_eq!(again, first);
        assert_eq!(smaller, first);
        assert_eq!(device.allocate_calls(), 1);
        assert_eq!(device.free_calls(), 0);

        staging.release(&device);
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_larger_request_replaces_the_block() {
        let device = MockDevice::new();
        let mut staging = SharedStagingMemory::new(&device);

        let small = staging.ensure_allocation(&device, buffer(&device, 256)).unwrap();
        let large = staging.ensure_allocation(&device, buffer(&device, 8192)).unwrap();

        assert_ne!(small, large);
        assert_eq!(device.allocate_calls(), 2);
        assert_eq!(device.free_calls(), 1);
        assert_eq!(device.live_allocations(), 1);
        assert_eq!(staging.current().map(|a| a.size), Some(8192));

        staging.release(&device);
        assert!(staging.current().is_none());
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_different_memory_type_replaces_the_block() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let device = MockDevice::new()
            .with_memory_types(vec![host, host])
            .with_memory_type_bits(0b01);
        let mut staging = SharedStagingMemory::new(&device);

        staging.ensure_allocation(&device, buffer(&device, 512)).unwrap();
        assert_eq!(staging.current().map(|a| a.memory_type_index), Some(0));

        // Same size, but the next object only accepts type 1
        device.set_memory_type_bits(0b10);
        staging.ensure_allocation(&device, buffer(&device, 512)).unwrap();
        assert_eq!(staging.current().map(|a| a.memory_type_index), Some(1));
        assert_eq!(device.allocate_calls(), 2);
        assert_eq!(device.free_calls(), 1);

        staging.release(&device);
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_no_host_visible_type_is_fatal() {
        let device = MockDevice::new().with_memory_types(vec![vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let mut staging = SharedStagingMemory::new(&device);
        let result = staging.ensure_allocation(&device, buffer(&device, 64));
        assert!(matches!(result, Err(crate::VulkanError::NoSuitableMemoryType { .. })));
        assert_eq!(device.allocate_calls(), 0);
    }
}
