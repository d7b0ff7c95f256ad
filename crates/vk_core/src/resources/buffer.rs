//! Buffer creation: device-local, transient staging and persistently mapped

use ash::vk;
use std::ptr::NonNull;

use super::staging::STAGING_MEMORY_FLAGS;
use super::ResourceManager;
use crate::{VulkanError, VulkanResult};

/// Host-visible buffer together with its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Backing memory, bound at offset 0
    pub memory: vk::DeviceMemory,
    /// Size requested at creation
    pub size: vk::DeviceSize,
}

/// Host-visible buffer that stays mapped for its whole life
#[derive(Debug)]
pub struct MappedBuffer {
    inner: HostBuffer,
    ptr: NonNull<u8>,
}

impl MappedBuffer {
    /// Buffer handle
    pub fn buffer(&self) -> vk::Buffer {
        self.inner.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.inner.size
    }

    /// Backing memory, mapped for the buffer's whole life
    pub fn memory(&self) -> vk::DeviceMemory {
        self.inner.memory
    }

    /// Copy `bytes` into the mapping at `offset`
    pub fn write_bytes(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.inner.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Write of {} bytes at offset {offset} exceeds mapped buffer of {} bytes",
                    bytes.len(),
                    self.inner.size
                ),
            });
        }
        // SAFETY: the mapping spans `size` bytes and `end <= size`
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(offset as usize), bytes.len());
        }
        Ok(())
    }
}

fn buffer_info(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> vk::BufferCreateInfo {
    vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .build()
}

impl ResourceManager {
    /// Device-local buffer, registered and bound
    pub fn create_buffer(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<vk::Buffer> {
        let device = &*self.device;
        let buffer = self.registry.register_buffer(device.create_buffer(&buffer_info(size, usage))?);
        self.allocator
            .allocate_and_bind(device, buffer, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        log::debug!("Created device-local buffer {buffer:?} ({size} bytes, {usage:?})");
        Ok(buffer)
    }

    /// Host-visible buffer with its own allocation, left unmapped
    pub fn create_host_buffer(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<HostBuffer> {
        let device = &*self.device;
        let buffer = self.registry.register_buffer(device.create_buffer(&buffer_info(size, usage))?);
        let allocation = self.allocator.allocate_and_bind(device, buffer, STAGING_MEMORY_FLAGS)?;
        log::debug!("Created host-visible buffer {buffer:?} ({size} bytes, {usage:?})");
        Ok(HostBuffer {
            buffer,
            memory: allocation.memory,
            size,
        })
    }

    /// Transient transfer source holding a copy of `data`
    ///
    /// Backed by the shared staging memory and not registered: destroy it
    /// once the copy out of it has completed.
    pub fn create_staging_buffer(&mut self, data: &[u8]) -> VulkanResult<vk::Buffer> {
        if data.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot stage an empty buffer".to_string(),
            });
        }
        let device = &*self.device;
        let size = data.len() as vk::DeviceSize;
        let buffer = device.create_buffer(&buffer_info(size, vk::BufferUsageFlags::TRANSFER_SRC))?;
        let (memory, ptr) = match self
            .staging
            .ensure_allocation(device, buffer)
            .and_then(|memory| Ok((memory, device.map_memory(memory, 0, size)?)))
        {
            Ok(mapped) => mapped,
            Err(err) => {
                device.destroy_buffer(buffer);
                return Err(err);
            }
        };
        // SAFETY: the mapping spans `size` bytes
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len()) };
        device.unmap_memory(memory);
        Ok(buffer)
    }

    /// Host-visible buffer mapped once and kept mapped for the caller
    pub fn create_permanent_staging_buffer(
        &mut self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<MappedBuffer> {
        let inner = self.create_host_buffer(size, usage)?;
        let ptr = self.device.map_memory(inner.memory, 0, size)?;
        let ptr = NonNull::new(ptr).ok_or_else(|| VulkanError::api("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        Ok(MappedBuffer { inner, ptr })
    }
}
