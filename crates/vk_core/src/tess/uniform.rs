//! Per-draw transform slots addressed by dynamic uniform offsets

use ash::vk;

use crate::foundation::math::{to_column_major, Mat4};
use crate::frame::UniformUpload;
use crate::resources::{MappedBuffer, ResourceManager};
use crate::{VulkanError, VulkanResult};

/// Bytes of one std140 `mat4`
pub const SLOT_PAYLOAD: vk::DeviceSize = 64;

/// Round `value` up to a multiple of `alignment`
pub fn align_up(value: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

/// Fixed pool of MVP slots
///
/// Slots are written into a persistently mapped host buffer and copied to
/// the device-local uniform buffer at the start of each frame.
#[derive(Debug)]
pub struct UniformSlots {
    staging: MappedBuffer,
    device_buffer: vk::Buffer,
    step: vk::DeviceSize,
    capacity: u32,
    next: u32,
}

impl UniformSlots {
    /// Allocate `capacity` slots spaced by the device's uniform offset alignment
    pub fn new(resources: &mut ResourceManager, capacity: u32) -> VulkanResult<Self> {
        let min_alignment = resources.device().limits().min_uniform_buffer_offset_alignment;
        let step = align_up(SLOT_PAYLOAD, min_alignment);
        let size = step * vk::DeviceSize::from(capacity);

        let staging = resources.create_permanent_staging_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        let device_buffer =
            resources.create_buffer(size, vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)?;

        log::debug!("Uniform slots: {capacity} x {step} bytes");
        Ok(Self {
            staging,
            device_buffer,
            step,
            capacity,
            next: 0,
        })
    }

    /// Device-local buffer bound at descriptor binding 0
    pub fn device_buffer(&self) -> vk::Buffer {
        self.device_buffer
    }

    /// Distance between consecutive slots
    pub fn step(&self) -> vk::DeviceSize {
        self.step
    }

    /// Descriptor range of one slot
    pub fn slot_size(&self) -> vk::DeviceSize {
        SLOT_PAYLOAD
    }

    /// Slots consumed this frame
    pub fn used(&self) -> u32 {
        self.next
    }

    /// Fail with [`VulkanError::UniformSlotsExhausted`] if no slot is left
    pub fn check_available(&self) -> VulkanResult<()> {
        if self.next >= self.capacity {
            return Err(VulkanError::UniformSlotsExhausted { capacity: self.capacity });
        }
        Ok(())
    }

    /// Store `matrix` in the next free slot and return its dynamic offset
    pub fn push(&mut self, matrix: &Mat4) -> VulkanResult<u32> {
        self.check_available()?;
        let offset = self.step * vk::DeviceSize::from(self.next);
        let columns = to_column_major(matrix);
        self.staging.write_bytes(offset, bytemuck::cast_slice(&columns))?;
        self.next += 1;
        u32::try_from(offset).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("Uniform offset {offset} does not fit a dynamic offset"),
        })
    }

    /// Copy of the whole slot range for the frame's command buffer
    pub fn upload(&self) -> UniformUpload {
        UniformUpload {
            src: self.staging.buffer(),
            dst: self.device_buffer,
            size: self.staging.size(),
        }
    }

    /// Free every slot for a new frame
    pub fn reset(&mut self) {
        self.next = 0;
    }
}
