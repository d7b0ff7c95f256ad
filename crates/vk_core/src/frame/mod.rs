//! Frame lifecycle
//!
//! Render pass and framebuffers, synchronization objects, the per-frame
//! state machine and the pre-recorded static scene path.

pub mod controller;
pub mod render_pass;
pub mod static_scene;
pub mod sync;

pub use controller::{record_uniform_upload, FrameController, FrameState, SurfaceTargets, UniformUpload};
pub use static_scene::{StaticGeometry, StaticMesh, StaticScene, StaticSceneDesc};
pub use sync::FrameSync;
