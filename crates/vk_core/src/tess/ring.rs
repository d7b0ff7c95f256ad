//! Per-frame linear ring of host-visible geometry memory
//!
//! Each draw appends at the current offset; the offset only moves forward
//! until the frame resets it to zero.

use ash::vk;

use crate::backend::GpuDevice;
use crate::resources::{HostBuffer, ResourceManager};
use crate::{VulkanError, VulkanResult};

/// Host-visible buffer written front to back once per frame
#[derive(Debug)]
pub struct RingBuffer {
    name: &'static str,
    inner: HostBuffer,
    offset: vk::DeviceSize,
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes usable as `usage`
    pub fn new(
        resources: &mut ResourceManager,
        name: &'static str,
        capacity: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let inner = resources.create_host_buffer(capacity, usage)?;
        log::debug!("Created {name} ring of {capacity} bytes");
        Ok(Self { name, inner, offset: 0 })
    }

    /// Buffer handle for binding
    pub fn buffer(&self) -> vk::Buffer {
        self.inner.buffer
    }

    /// Next write offset in bytes
    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> vk::DeviceSize {
        self.inner.size
    }

    /// Fail with [`VulkanError::RingOverflow`] if `len` more bytes do not fit
    pub fn check_space(&self, len: vk::DeviceSize) -> VulkanResult<()> {
        let requested = self.offset + len;
        if requested > self.inner.size {
            return Err(VulkanError::RingOverflow {
                ring: self.name,
                requested,
                capacity: self.inner.size,
            });
        }
        Ok(())
    }

    /// Append `bytes` and return the offset they were written at
    pub fn write(&mut self, device: &dyn GpuDevice, bytes: &[u8]) -> VulkanResult<vk::DeviceSize> {
        let len = bytes.len() as vk::DeviceSize;
        self.check_space(len)?;

        let start = self.offset;
        let ptr = device.map_memory(self.inner.memory, start, len)?;
        // SAFETY: the mapping covers exactly `len` bytes
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        device.unmap_memory(self.inner.memory);

        self.offset += len;
        Ok(start)
    }

    /// Rewind to the start for a new frame
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}
