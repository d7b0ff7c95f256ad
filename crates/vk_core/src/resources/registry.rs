//! Resource registry
//!
//! Every long-lived Vulkan object created during a session is recorded here
//! and destroyed in one pass at shutdown. There is no individual release:
//! the lists only grow until [`ResourceRegistry::destroy_all`].

use ash::vk;

use crate::backend::GpuDevice;

/// Append-only handle lists, one per object category
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    pipelines: Vec<vk::Pipeline>,
    pipeline_layouts: Vec<vk::PipelineLayout>,
    shader_modules: Vec<vk::ShaderModule>,
    framebuffers: Vec<vk::Framebuffer>,
    render_passes: Vec<vk::RenderPass>,
    descriptor_pools: Vec<vk::DescriptorPool>,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    image_views: Vec<vk::ImageView>,
    samplers: Vec<vk::Sampler>,
    images: Vec<vk::Image>,
    buffers: Vec<vk::Buffer>,
    semaphores: Vec<vk::Semaphore>,
    fences: Vec<vk::Fence>,
    command_pools: Vec<vk::CommandPool>,
}

macro_rules! register_fns {
    ($($fn_name:ident => $field:ident : $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Track a `", stringify!($ty), "` for shutdown and hand it back")]
            pub fn $fn_name(&mut self, handle: $ty) -> $ty {
                self.$field.push(handle);
                handle
            }
        )*
    };
}

impl ResourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    register_fns! {
        register_pipeline => pipelines: vk::Pipeline,
        register_pipeline_layout => pipeline_layouts: vk::PipelineLayout,
        register_shader_module => shader_modules: vk::ShaderModule,
        register_framebuffer => framebuffers: vk::Framebuffer,
        register_render_pass => render_passes: vk::RenderPass,
        register_descriptor_pool => descriptor_pools: vk::DescriptorPool,
        register_descriptor_set_layout => descriptor_set_layouts: vk::DescriptorSetLayout,
        register_image_view => image_views: vk::ImageView,
        register_sampler => samplers: vk::Sampler,
        register_image => images: vk::Image,
        register_buffer => buffers: vk::Buffer,
        register_semaphore => semaphores: vk::Semaphore,
        register_fence => fences: vk::Fence,
        register_command_pool => command_pools: vk::CommandPool,
    }

    /// Total number of tracked handles
    pub fn len(&self) -> usize {
        self.pipelines.len()
            + self.pipeline_layouts.len()
            + self.shader_modules.len()
            + self.framebuffers.len()
            + self.render_passes.len()
            + self.descriptor_pools.len()
            + self.descriptor_set_layouts.len()
            + self.image_views.len()
            + self.samplers.len()
            + self.images.len()
            + self.buffers.len()
            + self.semaphores.len()
            + self.fences.len()
            + self.command_pools.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every tracked object, dependents before their dependencies
    ///
    /// The device must be idle. Memory is not freed here; that belongs to the
    /// allocator and must happen afterwards.
    pub fn destroy_all(&mut self, device: &dyn GpuDevice) {
        let total = self.len();

        for pipeline in self.pipelines.drain(..) {
            device.destroy_pipeline(pipeline);
        }
        for layout in self.pipeline_layouts.drain(..) {
            device.destroy_pipeline_layout(layout);
        }
        for module in self.shader_modules.drain(..) {
            device.destroy_shader_module(module);
        }
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
        for render_pass in self.render_passes.drain(..) {
            device.destroy_render_pass(render_pass);
        }
        for pool in self.descriptor_pools.drain(..) {
            device.destroy_descriptor_pool(pool);
        }
        for layout in self.descriptor_set_layouts.drain(..) {
            device.destroy_descriptor_set_layout(layout);
        }
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view);
        }
        for sampler in self.samplers.drain(..) {
            device.destroy_sampler(sampler);
        }
        for image in self.images.drain(..) {
            device.destroy_image(image);
        }
        for buffer in self.buffers.drain(..) {
            device.destroy_buffer(buffer);
        }
        for semaphore in self.semaphores.drain(..) {
            device.destroy_semaphore(semaphore);
        }
        for fence in self.fences.drain(..) {
            device.destroy_fence(fence);
        }
        for pool in self.command_pools.drain(..) {
            device.destroy_command_pool(pool);
        }

        log::debug!("Destroyed {total} registered Vulkan objects");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockDevice;

    #[test]
    fn test_destroy_all_releases_every_category() {
        let device = MockDevice::new();
        let mut registry = ResourceRegistry::new();

        let info = vk::BufferCreateInfo::builder().size(64).build();
        registry.register_buffer(device.create_buffer(&info).unwrap());
        registry.register_semaphore(device.create_semaphore().unwrap());
        registry.register_fence(device.create_fence(true).unwrap());
        registry.register_sampler(device.create_sampler(&vk::SamplerCreateInfo::default()).unwrap());
        registry.register_command_pool(device.create_command_pool(0, vk::CommandPoolCreateFlags::empty()).unwrap());
        assert_eq!(registry.len(), 5);
        assert_eq!(device.live_objects(), 5);

        registry.destroy_all(&device);
        assert!(registry.is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_register_returns_same_handle() {
        let device = MockDevice::new();
        let mut registry = ResourceRegistry::new();
        let semaphore = device.create_semaphore().unwrap();
        assert_eq!(registry.register_semaphore(semaphore), semaphore);
        registry.destroy_all(&device);
    }
}
