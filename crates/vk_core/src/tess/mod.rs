//! Immediate-mode tessellation draw path
//!
//! Batches produced by the geometry layer are streamed through per-frame
//! vertex and index rings and drawn with one or two texture stages.

pub mod ring;
pub mod uniform;
pub mod uploader;
pub mod vertex;

pub use ring::RingBuffer;
pub use uniform::UniformSlots;
pub use uploader::{DepthBias, PassParams, Projection, ShadingStages, TessShaders, TessUploader};
pub use vertex::{DualTexturedVertex, TessBatch, TexturedVertex};
