//! Render pass and framebuffer creation

use ash::vk;

use crate::resources::ResourceManager;
use crate::VulkanResult;

impl ResourceManager {
    /// Forward pass with one colour and one depth attachment
    ///
    /// Both attachments are cleared on load. Colour is stored and handed to
    /// the presentation engine; depth is discarded after the pass.
    pub fn create_render_pass(&mut self, color_format: vk::Format, depth_format: vk::Format) -> VulkanResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let attachments = [color_attachment, depth_attachment];

        let color_attachment_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_attachment_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build();
        let subpasses = [subpass];

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
            .build();
        let dependencies = [dependency];

        let info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = self.device().create_render_pass(&info)?;
        log::debug!("Created render pass {render_pass:?} ({color_format:?} + {depth_format:?})");
        Ok(self.registry.register_render_pass(render_pass))
    }

    /// Framebuffer over a colour view and the shared depth view
    pub fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        let attachments = [color_view, depth_view];
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = self.device().create_framebuffer(&info)?;
        Ok(self.registry.register_framebuffer(framebuffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockDevice;
    use crate::resources::tests::manager;
    use std::sync::Arc;

    #[test]
    fn test_render_pass_and_framebuffer_are_registered() {
        let device = Arc::new(MockDevice::new());
        let mut resources = manager(&device);
        let registered = resources.registry.len();

        let render_pass = resources
            .create_render_pass(vk::Format::B8G8R8A8_UNORM, vk::Format::D24_UNORM_S8_UINT)
            .unwrap();
        resources
            .create_framebuffer(
                render_pass,
                vk::ImageView::null(),
                vk::ImageView::null(),
                vk::Extent2D { width: 800, height: 600 },
            )
            .unwrap();

        assert_eq!(resources.registry.len(), registered + 2);
        drop(resources);
        assert_eq!(device.live_objects(), 0);
    }
}
