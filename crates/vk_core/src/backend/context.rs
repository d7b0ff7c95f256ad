//! Instance and GPU bring-up for one window
//!
//! Instance, optional validation messenger, window surface and physical
//! device selection. The logical device is created from here as an
//! [`AshDevice`](super::AshDevice).

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{c_char, CStr, CString};

use super::AshDevice;
use crate::config::RendererConfig;
use crate::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Instance, surface and selected GPU, destroyed in reverse order on drop
pub struct VulkanContext {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
}

impl VulkanContext {
    /// Bring up Vulkan for a window
    pub fn new<W>(config: &RendererConfig, window: &W) -> VulkanResult<Self>
    where
        W: HasRawWindowHandle + HasRawDisplayHandle,
    {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let engine_name = CString::new("vk_core")
            .map_err(|_| VulkanError::InitializationFailed("Engine name contains a NUL byte".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .map_err(VulkanError::from_api("vkEnumerateInstanceExtensionProperties"))?
                .to_vec();

        let validation = config.validation_enabled() && Self::validation_layer_available(&entry)?;
        if config.validation_enabled() && !validation {
            log::warn!("Validation requested but {} is not installed", VALIDATION_LAYER.to_string_lossy());
        }

        let mut layers: Vec<*const c_char> = Vec::new();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::from_api("vkCreateInstance"))?
        };
        log::info!("Created Vulkan instance for '{}' (validation: {validation})", config.application_name);

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = setup_debug_messenger(&debug_utils)?;
            Some((debug_utils, messenger))
        } else {
            None
        };

        let surface_loader = Surface::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
            .map_err(VulkanError::from_api("vkCreateSurfaceKHR"))?
        };

        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance, surface, &surface_loader)?;

        Ok(Self {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
            physical_device,
        })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::from_api("vkEnumerateInstanceLayerProperties"))?;
        Ok(layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    /// Create the logical device on the selected GPU
    pub fn create_device(&self) -> VulkanResult<AshDevice> {
        AshDevice::new(&self.instance, &self.physical_device)
    }

    /// Loaded Vulkan library
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance the surface and device hang off
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// `VK_KHR_surface` function table
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// The GPU chosen at bring-up
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .map_err(VulkanError::from_api("vkCreateDebugUtilsMessengerEXT"))
    }
}

/// Routes validation messages into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// GPU picked for rendering, with what was queried about it
pub struct PhysicalDeviceInfo {
    /// Handle the logical device is created from
    pub device: vk::PhysicalDevice,
    /// Name, type and limits such as uniform offset alignment
    pub properties: vk::PhysicalDeviceProperties,
    /// Optional features reported by the driver
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Family used for both graphics and presentation
    pub queue_family_index: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first GPU that can render and present to `surface`
    ///
    /// When no device qualifies, the reason the last candidate was rejected
    /// is returned.
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::from_api("vkEnumeratePhysicalDevices"))?
        };

        let mut rejection = VulkanError::InitializationFailed("No Vulkan devices present".to_string());
        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!(
                        "Selected GPU: {}",
                        unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()) }.to_string_lossy()
                    );
                    return Ok(info);
                }
                Err(err) => {
                    log::debug!("Rejected physical device {device:?}: {err}");
                    rejection = err;
                }
            }
        }

        Err(rejection)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_family_index = find_queue_family(&queue_families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(VulkanError::from_api("vkGetPhysicalDeviceSurfaceSupportKHR"))
        })?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::from_api("vkEnumerateDeviceExtensionProperties"))?
        };
        let available: Vec<&CStr> = extensions
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();
        require_extension(&available, SwapchainLoader::name())?;

        Ok(Self {
            device,
            properties,
            features,
            memory_properties,
            queue_family_index,
        })
    }
}

/// First queue family with graphics support that can also present
pub(crate) fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> VulkanResult<bool>,
) -> VulkanResult<u32> {
    for (index, family) in (0u32..).zip(families) {
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && supports_present(index)? {
            return Ok(index);
        }
    }
    Err(VulkanError::NoSuitableQueueFamily)
}

fn require_extension(available: &[&CStr], required: &CStr) -> VulkanResult<()> {
    if available.contains(&required) {
        Ok(())
    } else {
        Err(VulkanError::MissingExtension(required.to_string_lossy().into_owned()))
    }
}
