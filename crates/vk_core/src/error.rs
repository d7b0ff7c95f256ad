//! Renderer error types
//!
//! Every failure in this crate is fatal to the renderer: a broken driver, a
//! missing capability or a malformed asset. Errors carry enough context to
//! name the failing operation and are propagated with `?` up to a single
//! top-level handler ([`exit_on_fatal`]) that logs and terminates.

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VulkanError {
    /// A Vulkan entry point returned an error status
    #[error("{operation} failed: {result:?}")]
    Api {
        /// Name of the failing Vulkan entry point
        operation: &'static str,
        /// Status code returned by the driver
        result: vk::Result,
    },

    /// No memory type satisfies both the object's type mask and the requested properties
    #[error("No suitable memory type found (type bits {type_bits:#b}, requested properties {requested:?})")]
    NoSuitableMemoryType {
        /// `memoryTypeBits` reported by the object's requirements
        type_bits: u32,
        /// Property flags the caller asked for
        requested: vk::MemoryPropertyFlags,
    },

    /// No queue family can both render and present
    #[error("No queue family supports graphics and presentation")]
    NoSuitableQueueFamily,

    /// A required instance or device extension is unavailable
    #[error("Required extension not supported: {0}")]
    MissingExtension(String),

    /// The surface does not support an image usage the swapchain needs
    #[error("Surface does not support usage {required:?} (supported: {supported:?})")]
    UnsupportedSurfaceUsage {
        /// Usage flags the swapchain requires
        required: vk::ImageUsageFlags,
        /// Usage flags the surface reports
        supported: vk::ImageUsageFlags,
    },

    /// Shader bytecode is not a whole number of 32-bit words
    #[error("Shader bytecode length {len} is not a multiple of 4")]
    InvalidShaderBytecode {
        /// Length of the rejected blob in bytes
        len: usize,
    },

    /// A per-frame ring buffer would be written past its capacity
    #[error("{ring} ring overflow: {requested} bytes requested at capacity {capacity}")]
    RingOverflow {
        /// Which ring overflowed
        ring: &'static str,
        /// Offset the write would end at
        requested: vk::DeviceSize,
        /// Ring capacity in bytes
        capacity: vk::DeviceSize,
    },

    /// Every uniform slot of the current frame has been consumed
    #[error("Uniform slots exhausted ({capacity} slots per frame)")]
    UniformSlotsExhausted {
        /// Slots available per frame
        capacity: u32,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl VulkanError {
    /// Build an [`VulkanError::Api`] for the named entry point
    pub fn api(operation: &'static str, result: vk::Result) -> Self {
        Self::Api { operation, result }
    }

    /// Shorthand for `map_err` closures around ash calls
    pub fn from_api(operation: &'static str) -> impl Fn(vk::Result) -> Self {
        move |result| Self::api(operation, result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Top-level fatal error handler
///
/// Unwraps a successful result or logs the error and exits the process.
/// Intended for use only at the outermost layer of an application.
pub fn exit_on_fatal<T>(result: VulkanResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            log::error!("Fatal renderer error: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_names_operation_and_code() {
        let err = VulkanError::api("vkAllocateMemory", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let message = err.to_string();
        assert!(message.contains("vkAllocateMemory"));
        assert!(message.contains("ERROR_OUT_OF_DEVICE_MEMORY"));
    }

    #[test]
    fn test_memory_type_error_names_requested_properties() {
        let err = VulkanError::NoSuitableMemoryType {
            type_bits: 0b101,
            requested: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
        };
        let message = err.to_string();
        assert!(message.contains("No suitable memory type"));
        assert!(message.contains("HOST_VISIBLE"));
        assert!(message.contains("0b101"));
    }
}
