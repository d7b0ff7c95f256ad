//! # vk_core
//!
//! Vulkan resource, upload and frame management for an immediate-mode
//! tessellation renderer.
//!
//! ## Features
//!
//! - **Device memory**: exact-size allocations kept until teardown, plus one
//!   reusable staging block for uploads
//! - **Resource registry**: every long-lived object destroyed in one pass
//! - **Uploads**: textures through linear staging images, static geometry
//!   through staging buffers
//! - **Frames**: acquire, record, submit and present with one frame in flight
//! - **Tessellation path**: per-frame vertex/index rings, dynamic uniform
//!   slots and a descriptor cache keyed by texture identity
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_core::prelude::*;
//!
//! fn frame(renderer: &mut RendererCore, texture: Texture, batch: &TessBatch<'_>) -> VulkanResult<()> {
//!     let pass = PassParams::full(renderer.extent());
//!     let projection = Projection::Orthographic { width: 800.0, height: 600.0 };
//!
//!     renderer.begin_frame()?;
//!     renderer.draw_tess(batch, ShadingStages::Single, &[texture], &projection, &pass)?;
//!     renderer.end_frame()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod error;
pub mod foundation;
pub mod frame;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod tess;

pub use error::{exit_on_fatal, VulkanError, VulkanResult};
pub use renderer::{Renderer, RendererCore, RendererShaders};

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, PresentModePreference, RendererConfig},
        exit_on_fatal,
        foundation::math::{Mat4, Vec3},
        frame::{FrameState, StaticMesh},
        pipeline::ShaderPair,
        resources::Texture,
        tess::{DepthBias, PassParams, Projection, ShadingStages, TessBatch, TessShaders},
        Renderer, RendererCore, RendererShaders, VulkanError, VulkanResult,
    };
}
