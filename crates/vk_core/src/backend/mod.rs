//! Vulkan device layer
//!
//! Context bring-up, the [`GpuDevice`] seam and its `ash` implementation,
//! and swapchain creation.

pub mod ash_device;
pub mod context;
pub mod device;
pub mod swapchain;

#[cfg(test)]
#[allow(missing_docs)]
pub(crate) mod mock;

pub use ash_device::AshDevice;
pub use context::{PhysicalDeviceInfo, VulkanContext};
pub use device::GpuDevice;
pub use swapchain::Swapchain;
