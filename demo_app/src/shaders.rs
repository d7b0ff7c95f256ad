//! SPIR-V loading for the demo pipelines
//!
//! `build.rs` compiles `resources/shaders` into `target/shaders`, so the
//! demos are expected to run from the workspace root.

use std::path::{Path, PathBuf};

use vk_core::pipeline::ShaderPair;
use vk_core::tess::TessShaders;
use vk_core::{RendererShaders, VulkanError, VulkanResult};

/// Default location of the compiled shaders
pub const SHADER_DIR: &str = "target/shaders";

/// Compiled vertex and fragment stages of one program
pub struct ShaderProgram {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
}

impl ShaderProgram {
    fn load(dir: &Path, name: &str) -> VulkanResult<Self> {
        Ok(Self {
            vertex: read_spirv(dir.join(format!("{name}_vert.spv")))?,
            fragment: read_spirv(dir.join(format!("{name}_frag.spv")))?,
        })
    }

    fn pair(&self) -> ShaderPair<'_> {
        ShaderPair {
            vertex: &self.vertex,
            fragment: &self.fragment,
        }
    }
}

/// Every program the renderer needs
pub struct ShaderSet {
    tess_single: ShaderProgram,
    tess_multi: ShaderProgram,
    static_mesh: ShaderProgram,
}

impl ShaderSet {
    /// Load from `VK_CORE_SHADER_DIR`, falling back to [`SHADER_DIR`]
    pub fn load() -> VulkanResult<Self> {
        let dir = std::env::var_os("VK_CORE_SHADER_DIR").map_or_else(|| PathBuf::from(SHADER_DIR), PathBuf::from);
        Self::load_from(&dir)
    }

    /// Load `tess_single`, `tess_multi` and `static_mesh` from `dir`
    pub fn load_from(dir: &Path) -> VulkanResult<Self> {
        log::info!("Loading shaders from {}", dir.display());
        Ok(Self {
            tess_single: ShaderProgram::load(dir, "tess_single")?,
            tess_multi: ShaderProgram::load(dir, "tess_multi")?,
            static_mesh: ShaderProgram::load(dir, "static_mesh")?,
        })
    }

    /// Borrowed view handed to the renderer
    pub fn renderer_shaders(&self) -> RendererShaders<'_> {
        RendererShaders {
            tess: TessShaders {
                single: self.tess_single.pair(),
                multi: self.tess_multi.pair(),
            },
            static_mesh: self.static_mesh.pair(),
        }
    }
}

fn read_spirv(path: PathBuf) -> VulkanResult<Vec<u8>> {
    std::fs::read(&path).map_err(|e| {
        VulkanError::InitializationFailed(format!(
            "Failed to read shader {}: {e} (set VULKAN_SDK and rebuild to compile shaders)",
            path.display()
        ))
    })
}
