//! Image creation and layout transitions

use ash::vk;

use super::ResourceManager;
use crate::backend::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 4] = [
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D16_UNORM,
];

/// Format of every texture and staging image
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Aspect bits a barrier or view must use for `format`
pub fn aspect_mask_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// First candidate usable as an optimally tiled depth attachment
pub fn select_depth_format(device: &dyn GpuDevice) -> VulkanResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| {
            device
                .format_properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| VulkanError::InitializationFailed("No supported depth attachment format".to_string()))
}

/// Access masks and stages on both sides of a layout change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Layout the image is in
    pub old_layout: vk::ImageLayout,
    /// Layout the image moves to
    pub new_layout: vk::ImageLayout,
    /// Writes that must be available before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the transition
    pub dst_access: vk::AccessFlags,
    /// Stage producing the prior accesses
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming the new layout
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Derive masks and stages from how each layout is used
    pub fn between(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        let (src_access, src_stage) = layout_usage(old_layout);
        let (dst_access, dst_stage) = layout_usage(new_layout);
        Self {
            old_layout,
            new_layout,
            src_access,
            dst_access,
            src_stage,
            dst_stage,
        }
    }
}

fn layout_usage(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::PREINITIALIZED => (vk::AccessFlags::HOST_WRITE, vk::PipelineStageFlags::HOST),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER)
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// Record one image barrier moving every mip/layer of `image` to a new layout
pub fn record_image_layout_transition(
    device: &dyn GpuDevice,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    format: vk::Format,
    transition: LayoutTransition,
) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(transition.old_layout)
        .new_layout(transition.new_layout)
        .src_access_mask(transition.src_access)
        .dst_access_mask(transition.dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(full_range(format))
        .build();

    device.cmd_pipeline_barrier(
        command_buffer,
        transition.src_stage,
        transition.dst_stage,
        &[],
        &[barrier],
    );
}

/// Single-mip, single-layer range covering the format's aspects
pub fn full_range(format: vk::Format) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask_for_format(format),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Copy `rows` packed rows into a destination with `row_pitch` stride
///
/// Returns the number of copies made: one when the pitch equals the packed
/// row size, otherwise one per row. Bytes between the end of a row and the
/// pitch boundary are not touched.
pub fn copy_rows(dst: &mut [u8], row_pitch: usize, src: &[u8], row_bytes: usize, rows: usize) -> usize {
    if row_pitch == row_bytes {
        let len = row_bytes * rows;
        dst[..len].copy_from_slice(&src[..len]);
        return 1;
    }

    for (row, packed) in src.chunks_exact(row_bytes).take(rows).enumerate() {
        let start = row * row_pitch;
        dst[start..start + row_bytes].copy_from_slice(packed);
    }
    rows
}

/// RGB pixels widened to RGBA with opaque alpha
pub fn expand_rgb_to_rgba(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(3)
        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 0xFF])
        .collect()
}

/// Check a caller's pixel buffer and return it as tightly packed RGBA
pub(crate) fn rgba_pixels(pixels: &[u8], width: u32, height: u32, bytes_per_pixel: u32) -> VulkanResult<std::borrow::Cow<'_, [u8]>> {
    if bytes_per_pixel != 3 && bytes_per_pixel != 4 {
        return Err(VulkanError::InvalidOperation {
            reason: format!("Unsupported pixel size {bytes_per_pixel}, expected 3 or 4 bytes"),
        });
    }
    let expected = width as usize * height as usize * bytes_per_pixel as usize;
    if pixels.len() != expected || expected == 0 {
        return Err(VulkanError::InvalidOperation {
            reason: format!(
                "Pixel buffer holds {} bytes, {width}x{height} at {bytes_per_pixel} bpp needs {expected}",
                pixels.len()
            ),
        });
    }
    if bytes_per_pixel == 3 {
        Ok(std::borrow::Cow::Owned(expand_rgb_to_rgba(pixels)))
    } else {
        Ok(std::borrow::Cow::Borrowed(pixels))
    }
}

fn image_info(
    extent: vk::Extent2D,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    initial_layout: vk::ImageLayout,
) -> vk::ImageCreateInfo {
    vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(tiling)
        .initial_layout(initial_layout)
        .usage(usage)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .build()
}

impl ResourceManager {
    /// Device-local, optimally tiled image that can be sampled and copied into
    pub fn create_texture(&mut self, extent: vk::Extent2D, format: vk::Format) -> VulkanResult<vk::Image> {
        let info = image_info(
            extent,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageLayout::UNDEFINED,
        );
        self.create_device_local_image(&info)
    }

    /// Device-local depth/stencil attachment
    pub fn create_depth_attachment_image(&mut self, extent: vk::Extent2D, format: vk::Format) -> VulkanResult<vk::Image> {
        let info = image_info(
            extent,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageLayout::UNDEFINED,
        );
        self.create_device_local_image(&info)
    }

    fn create_device_local_image(&mut self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image> {
        let device = &*self.device;
        let image = self.registry.register_image(device.create_image(info)?);
        self.allocator
            .allocate_and_bind(device, image, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        log::debug!(
            "Created {}x{} {:?} image {image:?}",
            info.extent.width,
            info.extent.height,
            info.format
        );
        Ok(image)
    }

    /// Linear, preinitialized transfer source filled with `pixels`
    ///
    /// Backed by the shared staging memory, so the returned image must be
    /// destroyed before the next staging upload. It is not registered.
    pub fn create_staging_texture(
        &mut self,
        extent: vk::Extent2D,
        pixels: &[u8],
        bytes_per_pixel: u32,
    ) -> VulkanResult<vk::Image> {
        let rgba = rgba_pixels(pixels, extent.width, extent.height, bytes_per_pixel)?;
        let device = &*self.device;

        let info = image_info(
            extent,
            TEXTURE_FORMAT,
            vk::ImageTiling::LINEAR,
            vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageLayout::PREINITIALIZED,
        );
        let image = device.create_image(&info)?;
        let layout = device.image_subresource_layout(
            image,
            vk::ImageSubresource {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                array_layer: 0,
            },
        );

        let (memory, ptr) = match self
            .staging
            .ensure_allocation(device, image)
            .and_then(|memory| Ok((memory, device.map_memory(memory, layout.offset, layout.size)?)))
        {
            Ok(mapped) => mapped,
            Err(err) => {
                device.destroy_image(image);
                return Err(err);
            }
        };
        // SAFETY: the mapping covers `layout.size` bytes and stays valid until unmap
        let mapped = unsafe { std::slice::from_raw_parts_mut(ptr, layout.size as usize) };
        let row_bytes = extent.width as usize * 4;
        copy_rows(mapped, layout.row_pitch as usize, &rgba, row_bytes, extent.height as usize);
        device.unmap_memory(memory);

        Ok(image)
    }

    /// Image view over the whole image
    pub fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(full_range(format));
        let view = self.device.create_image_view(&info)?;
        Ok(self.registry.register_image_view(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockDevice};
    use crate::resources::tests::manager;
    use std::sync::Arc;

    #[test]
    fn test_aspect_mask_by_format_class() {
        let both = vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL;
        assert_eq!(aspect_mask_for_format(vk::Format::D24_UNORM_S8_UINT), both);
        assert_eq!(aspect_mask_for_format(vk::Format::D32_SFLOAT_S8_UINT), both);
        assert_eq!(aspect_mask_for_format(vk::Format::D16_UNORM_S8_UINT), both);
        assert_eq!(aspect_mask_for_format(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask_for_format(vk::Format::D16_UNORM), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask_for_format(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(aspect_mask_for_format(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect_mask_for_format(vk::Format::B8G8R8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_transition_barrier_uses_format_aspect() {
        let device = MockDevice::new();
        let image = device.create_image(&vk::ImageCreateInfo::default()).unwrap();
        let cb = vk::CommandBuffer::null();

        let transition = LayoutTransition::between(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        );
        record_image_layout_transition(&device, cb, image, vk::Format::D24_UNORM_S8_UINT, transition);

        match &device.calls()[..] {
            [Call::PipelineBarrier { src_stage, dst_stage, images, buffers }] => {
                assert!(buffers.is_empty());
                assert_eq!(*src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
                assert_eq!(*dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
                assert_eq!(images.len(), 1);
                assert_eq!(
                    images[0].aspect_mask,
                    vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
                );
                assert_eq!(images[0].src_access, vk::AccessFlags::empty());
                assert!(images[0].dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
            }
            other => panic!("unexpected calls {other:?}"),
        }
    }

    #[test]
    fn test_upload_transitions_have_matching_masks() {
        let to_dst = LayoutTransition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_read = LayoutTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let staging = LayoutTransition::between(
            vk::ImageLayout::PREINITIALIZED,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        assert_eq!(staging.src_access, vk::AccessFlags::HOST_WRITE);
        assert_eq!(staging.dst_access, vk::AccessFlags::TRANSFER_READ);
    }

    #[test]
    fn test_row_copy_contiguous_when_pitch_is_packed() {
        let src: Vec<u8> = (0..48).collect();
        let mut dst = vec![0xAA; 48];
        let copies = copy_rows(&mut dst, 16, &src, 16, 3);
        assert_eq!(copies, 1);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_row_copy_leaves_padding_untouched() {
        let (width, height, bpp, pitch) = (3usize, 4usize, 4usize, 16usize);
        let row_bytes = width * bpp;
        let src: Vec<u8> = (0..(row_bytes * height) as u8).collect();
        let mut dst = vec![0xAA; pitch * height];

        let copies = copy_rows(&mut dst, pitch, &src, row_bytes, height);
        assert_eq!(copies, height);

        for row in 0..height {
            let line = &dst[row * pitch..(row + 1) * pitch];
            assert_eq!(&line[..row_bytes], &src[row * row_bytes..(row + 1) * row_bytes]);
            assert!(line[row_bytes..].iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn test_rgb_expands_with_opaque_alpha() {
        assert_eq!(expand_rgb_to_rgba(&[1, 2, 3, 4, 5, 6]), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_pixel_buffer_size_is_checked() {
        assert!(rgba_pixels(&[0; 15], 2, 2, 4).is_err());
        assert!(rgba_pixels(&[0; 16], 2, 2, 2).is_err());
        assert_eq!(rgba_pixels(&[0; 12], 2, 2, 3).unwrap().len(), 16);
    }

    #[test]
    fn test_depth_format_preference_order() {
        let device = MockDevice::new().with_depth_formats(vec![vk::Format::D16_UNORM, vk::Format::D32_SFLOAT]);
        assert_eq!(select_depth_format(&device), Ok(vk::Format::D32_SFLOAT));

        let device = MockDevice::new().with_depth_formats(vec![]);
        assert!(select_depth_format(&device).is_err());
    }

    #[test]
    fn test_staging_texture_respects_row_pitch() {
        let device = Arc::new(MockDevice::new().with_row_alignment(64));
        let mut resources = manager(&device);

        let extent = vk::Extent2D { width: 5, height: 3 };
        let pixels: Vec<u8> = (0..60).collect();
        let image = resources.create_staging_texture(extent, &pixels, 4).unwrap();

        let memory = resources.staging.current().unwrap().memory;
        assert!(!device.is_mapped(memory));
        let bytes = device.memory_contents(memory);
        assert_eq!(bytes.len(), 64 * 3);
        for row in 0..3 {
            assert_eq!(&bytes[row * 64..row * 64 + 20], &pixels[row * 20..(row + 1) * 20]);
            assert!(bytes[row * 64 + 20..(row + 1) * 64].iter().all(|&b| b == 0));
        }

        device.destroy_image(image);
    }

    #[test]
    fn test_staging_texture_destroyed_when_map_fails() {
        let device = Arc::new(MockDevice::new());
        let mut resources = manager(&device);
        let extent = vk::Extent2D { width: 4, height: 4 };
        let first = resources.create_staging_texture(extent, &[1; 64], 4).unwrap();
        device.destroy_image(first);
        let memory = resources.staging.current().unwrap().memory;

        // Holding the mapping makes the next map of the shared block fail
        device.map_memory(memory, 0, vk::WHOLE_SIZE).unwrap();
        let live = device.live_objects();
        assert!(resources.create_staging_texture(extent, &[2; 64], 4).is_err());
        assert_eq!(device.live_objects(), live);
        device.unmap_memory(memory);
    }

    #[test]
    fn test_device_local_images_are_registered_and_bound() {
        let device = Arc::new(MockDevice::new());
        let mut resources = manager(&device);
        let before = resources.registry.len();

        let extent = vk::Extent2D { width: 64, height: 64 };
        resources.create_texture(extent, TEXTURE_FORMAT).unwrap();
        resources
            .create_depth_attachment_image(extent, vk::Format::D24_UNORM_S8_UINT)
            .unwrap();

        assert_eq!(resources.registry.len(), before + 2);
        assert_eq!(resources.allocator.allocation_count(), 2);
        // 64x64 RGBA plus 64x64 packed depth/stencil, both in the device-local type
        assert_eq!(resources.allocator.total_bytes(), 2 * 64 * 64 * 4);
    }
}
