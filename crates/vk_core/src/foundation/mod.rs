//! Foundation module - Core utilities and types
//!
//! - Math types shared by the upload and frame code
//! - Logging utilities

pub mod logging;
pub mod math;
