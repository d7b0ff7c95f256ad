//! Shared window and shader plumbing for the `vk_core` demos

pub mod shaders;
pub mod window;

pub use shaders::ShaderSet;
pub use window::{Window, WindowError};
