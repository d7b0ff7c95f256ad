//! Device memory allocator
//!
//! Every request commits a fresh allocation sized exactly to the object's
//! requirements. Nothing is sub-allocated, reused or freed before
//! [`DeviceAllocator::deallocate_all`] at teardown.

use ash::vk;

use crate::backend::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// A committed memory region owned by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Device memory handle
    pub memory: vk::DeviceMemory,
    /// Size in bytes, equal to the object's required size
    pub size: vk::DeviceSize,
    /// Index into the physical device's memory types
    pub memory_type_index: u32,
}

/// An object that needs memory bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTarget {
    /// Image memory
    Image(vk::Image),
    /// Buffer memory
    Buffer(vk::Buffer),
}

impl MemoryTarget {
    /// Requirements reported by the device for this object
    pub fn requirements(self, device: &dyn GpuDevice) -> vk::MemoryRequirements {
        match self {
            Self::Image(image) => device.image_memory_requirements(image),
            Self::Buffer(buffer) => device.buffer_memory_requirements(buffer),
        }
    }

    /// Bind `memory` at offset 0
    pub fn bind(self, device: &dyn GpuDevice, memory: vk::DeviceMemory) -> VulkanResult<()> {
        match self {
            Self::Image(image) => device.bind_image_memory(image, memory, 0),
            Self::Buffer(buffer) => device.bind_buffer_memory(buffer, memory, 0),
        }
    }
}

impl From<vk::Image> for MemoryTarget {
    fn from(image: vk::Image) -> Self {
        Self::Image(image)
    }
}

impl From<vk::Buffer> for MemoryTarget {
    fn from(buffer: vk::Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

/// Find the first memory type allowed by `type_bits` whose flags contain `required`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(VulkanError::NoSuitableMemoryType {
            type_bits,
            requested: required,
        })
}

/// Append-only allocator released as a whole at teardown
#[derive(Debug)]
pub struct DeviceAllocator {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    allocations: Vec<Allocation>,
}

impl DeviceAllocator {
    /// Create an allocator for the device's memory types
    pub fn new(device: &dyn GpuDevice) -> Self {
        Self {
            memory_properties: device.memory_properties(),
            allocations: Vec::new(),
        }
    }

    /// Memory properties the allocator searches
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Commit memory for an image or buffer
    ///
    /// The memory type is the first one permitted by the object that carries
    /// every flag in `properties`. The returned memory is not yet bound.
    pub fn allocate_memory(
        &mut self,
        device: &dyn GpuDevice,
        target: impl Into<MemoryTarget>,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Allocation> {
        let requirements = target.into().requirements(device);
        let memory_type_index =
            find_memory_type(&self.memory_properties, requirements.memory_type_bits, properties)?;
        let memory = device.allocate_memory(requirements.size, memory_type_index)?;

        let allocation = Allocation {
            memory,
            size: requirements.size,
            memory_type_index,
        };
        self.allocations.push(allocation);
        log::debug!(
            "Allocated {} bytes from memory type {memory_type_index} ({properties:?})",
            requirements.size
        );
        Ok(allocation)
    }

    /// Allocate and bind in one step
    pub fn allocate_and_bind(
        &mut self,
        device: &dyn GpuDevice,
        target: impl Into<MemoryTarget>,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Allocation> {
        let target = target.into();
        let allocation = self.allocate_memory(device, target, properties)?;
        target.bind(device, allocation.memory)?;
        Ok(allocation)
    }

    /// Number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Bytes committed across all live allocations
    pub fn total_bytes(&self) -> vk::DeviceSize {
        self.allocations.iter().map(|a| a.size).sum()
    }

    /// Free every allocation
    ///
    /// Objects bound to this memory must already be destroyed.
    pub fn deallocate_all(&mut self, device: &dyn GpuDevice) {
        log::debug!(
            "Freeing {} allocations ({} bytes)",
            self.allocations.len(),
            self.total_bytes()
        );
        for allocation in self.allocations.drain(..) {
            device.free_memory(allocation.memory);
        }
    }
}
