//! Vulkan swapchain management
//!
//! Creates the presentable images for a surface. Image views, framebuffers
//! and per-image command buffers are built on top of these images by the
//! frame controller.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use super::{AshDevice, VulkanContext};
use crate::config::PresentModePreference;
use crate::{VulkanError, VulkanResult};

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to the window framebuffer
    pub fn new(
        context: &VulkanContext,
        device: &AshDevice,
        window_extent: vk::Extent2D,
        preferred_mode: PresentModePreference,
    ) -> VulkanResult<Self> {
        let physical_device = context.physical_device().device;
        let surface = context.surface();
        let surface_loader = context.surface_loader();

        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::from_api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::from_api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::from_api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?
        };

        let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        if !caps.supported_usage_flags.contains(usage) {
            return Err(VulkanError::UnsupportedSurfaceUsage {
                required: usage,
                supported: caps.supported_usage_flags,
            });
        }

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, preferred_mode);
        let extent = choose_extent(&caps, window_extent);
        let image_count = choose_image_count(&caps);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = device.swapchain_loader().clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateSwapchainKHR"))?
        };
        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::from_api("vkGetSwapchainImagesKHR"))?
        };

        log::info!(
            "Created swapchain: {} images, {}x{}, {:?}, {:?}",
            images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );

        Ok(Self {
            loader,
            swapchain,
            images,
            format,
            extent,
        })
    }

    /// Raw swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Presentable images, indexed by acquire result
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Surface format of the images
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefers BGRA8 UNORM in sRGB-nonlinear space, else the first format offered
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_UNORM && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))
}

/// Preferred mode if offered, FIFO otherwise (always supported)
pub(crate) fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: PresentModePreference,
) -> vk::PresentModeKHR {
    let wanted = preferred.to_vk();
    if available.contains(&wanted) {
        wanted
    } else {
        log::warn!("Present mode {wanted:?} unavailable, falling back to FIFO");
        vk::PresentModeKHR::FIFO
    }
}

pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window_extent
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window_extent
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_surface_format_prefers_bgra_unorm() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_UNORM);

        let formats = [surface_format(vk::Format::R8G8B8A8_SRGB)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_SRGB);

        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&modes, PresentModePreference::Immediate),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            choose_present_mode(&modes, PresentModePreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_clamped_when_surface_defers_to_window() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 1024, height: 768 },
            ..Default::default()
        };
        let extent = choose_extent(&caps, vk::Extent2D { width: 2000, height: 600 });
        assert_eq!((extent.width, extent.height), (1024, 600));

        let fixed = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 800, height: 600 },
            ..caps
        };
        let extent = choose_extent(&fixed, vk::Extent2D { width: 2000, height: 600 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_image_count_respects_maximum() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);

        let capped = vk::SurfaceCapabilitiesKHR { max_image_count: 2, ..caps };
        assert_eq!(choose_image_count(&capped), 2);
    }
}
