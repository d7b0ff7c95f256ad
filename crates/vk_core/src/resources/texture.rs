//! Texture upload
//!
//! Pixels go through a linear staging image into an optimally tiled,
//! device-local texture in a single synchronous submission.

use ash::vk;

use super::image::{record_image_layout_transition, LayoutTransition, TEXTURE_FORMAT};
use super::ResourceManager;
use crate::VulkanResult;

/// A sampled texture ready for descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    /// Device-local image in `SHADER_READ_ONLY_OPTIMAL`
    pub image: vk::Image,
    /// Full-image view
    pub view: vk::ImageView,
    /// Sampler used with the view
    pub sampler: vk::Sampler,
    /// Size in pixels
    pub extent: vk::Extent2D,
    /// Pixel format
    pub format: vk::Format,
}

impl ResourceManager {
    /// Upload 3- or 4-byte pixels and build a sampled texture
    ///
    /// Blocks until the copy has completed. The staging image is destroyed
    /// before returning, so its shared memory is free for the next upload.
    pub fn upload_texture(&mut self, pixels: &[u8], width: u32, height: u32, bytes_per_pixel: u32) -> VulkanResult<Texture> {
        let extent = vk::Extent2D { width, height };
        let staging = self.create_staging_texture(extent, pixels, bytes_per_pixel)?;
        let image = self.create_texture(extent, TEXTURE_FORMAT)?;

        let device = &*self.device;
        let upload = self.one_shot.run(device, |cb| {
            record_image_layout_transition(
                device,
                cb,
                staging,
                TEXTURE_FORMAT,
                LayoutTransition::between(vk::ImageLayout::PREINITIALIZED, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            );
            record_image_layout_transition(
                device,
                cb,
                image,
                TEXTURE_FORMAT,
                LayoutTransition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            );

            let layers = vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            };
            let region = vk::ImageCopy {
                src_subresource: layers,
                src_offset: vk::Offset3D::default(),
                dst_subresource: layers,
                dst_offset: vk::Offset3D::default(),
                extent: vk::Extent3D { width, height, depth: 1 },
            };
            device.cmd_copy_image(
                cb,
                staging,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            record_image_layout_transition(
                device,
                cb,
                image,
                TEXTURE_FORMAT,
                LayoutTransition::between(
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
            );
            Ok(())
        });
        device.destroy_image(staging);
        upload?;

        let view = self.create_image_view(image, TEXTURE_FORMAT)?;
        let sampler = self.create_sampler()?;

        log::debug!("Uploaded {width}x{height} texture {image:?}");
        Ok(Texture {
            image,
            view,
            sampler,
            extent,
            format: TEXTURE_FORMAT,
        })
    }

    /// Linear, repeating sampler
    pub fn create_sampler(&mut self) -> VulkanResult<vk::Sampler> {
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(0.0);
        let sampler = self.device.create_sampler(&info)?;
        Ok(self.registry.register_sampler(sampler))
    }
}
