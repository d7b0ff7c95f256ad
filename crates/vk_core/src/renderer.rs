//! Top-level renderer
//!
//! [`RendererCore`] owns every device resource and drives frames through a
//! [`GpuDevice`]; [`Renderer`] adds the instance, surface, logical device and
//! swapchain needed to run it against a real window.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;

use crate::backend::{AshDevice, GpuDevice, Swapchain, VulkanContext};
use crate::config::RendererConfig;
use crate::frame::{FrameController, FrameState, StaticMesh, StaticScene, StaticSceneDesc, SurfaceTargets};
use crate::pipeline::{GraphicsPipeline, PipelineConfig, ShaderPair};
use crate::resources::{ResourceManager, Texture};
use crate::tess::{PassParams, Projection, ShadingStages, TessBatch, TessShaders, TessUploader, TexturedVertex};
use crate::{VulkanError, VulkanResult};

/// SPIR-V for every pipeline the renderer builds
#[derive(Debug, Clone, Copy)]
pub struct RendererShaders<'a> {
    /// Immediate-mode pipelines
    pub tess: TessShaders<'a>,
    /// Static mesh pipeline
    pub static_mesh: ShaderPair<'a>,
}

/// Device resources and per-frame state, independent of window and instance
pub struct RendererCore {
    frame: FrameController,
    tess: TessUploader,
    static_pipeline: GraphicsPipeline,
    static_scene: Option<StaticScene>,
    resources: ResourceManager,
}

impl RendererCore {
    /// Build resources, frame controller and pipelines for `targets`
    pub fn new(
        device: Arc<dyn GpuDevice>,
        queue_family_index: u32,
        queue: vk::Queue,
        targets: &SurfaceTargets,
        config: &RendererConfig,
        shaders: RendererShaders<'_>,
    ) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|err| VulkanError::InitializationFailed(err.to_string()))?;

        let mut resources = ResourceManager::new(device, queue_family_index, queue)?;
        let frame = FrameController::new(&mut resources, targets, config.clear_color)?;
        let tess = TessUploader::new(&mut resources, config, frame.render_pass(), shaders.tess)?;
        let static_pipeline = resources.create_graphics_pipeline(
            shaders.static_mesh,
            &TexturedVertex::layout(),
            &[tess.descriptor_layout(ShadingStages::Single)],
            frame.render_pass(),
            &PipelineConfig::static_mesh(),
        )?;

        log::info!("Renderer core initialized");
        Ok(Self {
            frame,
            tess,
            static_pipeline,
            static_scene: None,
            resources,
        })
    }

    /// Resource owner, for uploads and object creation outside the frame path
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// Current frame lifecycle state
    pub fn frame_state(&self) -> FrameState {
        self.frame.state()
    }

    /// Swapchain extent frames render at
    pub fn extent(&self) -> vk::Extent2D {
        self.frame.extent()
    }

    /// Immediate-mode uploader, for inspecting ring and cache usage
    pub fn tess(&self) -> &TessUploader {
        &self.tess
    }

    /// Upload 3- or 4-byte pixels into a sampled texture
    pub fn upload_texture(&mut self, pixels: &[u8], width: u32, height: u32, bytes_per_pixel: u32) -> VulkanResult<Texture> {
        self.resources.upload_texture(pixels, width, height, bytes_per_pixel)
    }

    /// Acquire an image and open the frame for immediate-mode draws
    pub fn begin_frame(&mut self) -> VulkanResult<()> {
        let device = self.resources.device();
        self.frame.acquire(&*device)?;
        self.tess.reset_frame();
        self.frame.begin_recording(
            &*device,
            Some(self.tess.uniform_upload()),
            vk::SubpassContents::INLINE,
        )?;
        Ok(())
    }

    /// Record one tessellated draw into the open frame
    pub fn draw_tess(
        &mut self,
        batch: &TessBatch<'_>,
        stages: ShadingStages,
        textures: &[Texture],
        projection: &Projection,
        pass: &PassParams,
    ) -> VulkanResult<()> {
        let cb = self.frame.command_buffer()?;
        let device = self.resources.device();
        self.tess.draw(&*device, cb, batch, stages, textures, projection, pass)
    }

    /// Submit and present the open frame
    pub fn end_frame(&mut self) -> VulkanResult<()> {
        let device = self.resources.device();
        self.frame.submit(&*device)?;
        self.frame.present(&*device)
    }

    /// Upload `mesh` and pre-record it for [`Self::draw_static_frame`]
    pub fn load_static_scene(&mut self, mesh: &StaticMesh, texture: Texture) -> VulkanResult<()> {
        let geometry = self.resources.upload_static_geometry(mesh)?;
        let device = self.resources.device();
        let descriptor_set = self.tess.descriptors_mut().get_or_create(&*device, &[texture])?;

        let desc = StaticSceneDesc {
            render_pass: self.frame.render_pass(),
            pipeline: self.static_pipeline,
            descriptor_set,
            uniform_offset: 0,
            extent: self.frame.extent(),
        };
        self.static_scene = Some(StaticScene::record(&mut self.resources, &geometry, &desc)?);
        Ok(())
    }

    /// Render one whole frame by replaying the static scene with `projection`
    pub fn draw_static_frame(&mut self, projection: &Projection) -> VulkanResult<()> {
        let scene = self.static_scene.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "No static scene loaded".to_string(),
        })?;
        let device = self.resources.device();

        self.frame.acquire(&*device)?;
        self.tess.reset_frame();
        // The scene was recorded against the first slot
        self.tess.uniforms_mut().push(&projection.matrix())?;
        self.frame.begin_recording(
            &*device,
            Some(self.tess.uniform_upload()),
            vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        )?;
        self.frame.execute_secondary(&*device, &[scene.command_buffer()])?;
        self.frame.submit(&*device)?;
        self.frame.present(&*device)
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.resources.device().device_wait_idle()
    }
}

/// Renderer bound to a window
///
/// Field order is drop order: device resources go first, then the
/// swapchain, the logical device and finally surface and instance.
pub struct Renderer {
    core: RendererCore,
    swapchain: Swapchain,
    device: Arc<AshDevice>,
    context: VulkanContext,
}

impl Renderer {
    /// Bring up Vulkan for `window` and build the renderer core
    pub fn new<W>(
        window: &W,
        framebuffer_size: (u32, u32),
        config: &RendererConfig,
        shaders: RendererShaders<'_>,
    ) -> VulkanResult<Self>
    where
        W: HasRawWindowHandle + HasRawDisplayHandle,
    {
        let context = VulkanContext::new(config, window)?;
        let device = Arc::new(context.create_device()?);
        let window_extent = vk::Extent2D {
            width: framebuffer_size.0,
            height: framebuffer_size.1,
        };
        let swapchain = Swapchain::new(&context, &device, window_extent, config.present_mode)?;

        let targets = SurfaceTargets {
            swapchain: swapchain.handle(),
            images: swapchain.images().to_vec(),
            format: swapchain.format().format,
            extent: swapchain.extent(),
        };
        let core = RendererCore::new(
            device.clone(),
            device.queue_family_index(),
            device.queue(),
            &targets,
            config,
            shaders,
        )?;

        Ok(Self {
            core,
            swapchain,
            device,
            context,
        })
    }

    /// Frame and resource operations
    pub fn core(&mut self) -> &mut RendererCore {
        &mut self.core
    }

    /// Vulkan instance, surface and physical device
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Logical device
    pub fn device(&self) -> &AshDevice {
        &self.device
    }

    /// Swapchain images are presented from
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}
