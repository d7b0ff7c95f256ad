//! Renderer configuration
//!
//! Configuration for the Vulkan core: application metadata, debug features and
//! the fixed per-frame capacities of the tessellation path. Files may be
//! written as TOML or RON; the format is chosen by extension.

use ash::vk;
use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Presentation mode preference, mapped onto `vk::PresentModeKHR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Vsync, always available
    Fifo,
    /// Low-latency triple buffering
    Mailbox,
    /// No vsync
    Immediate,
}

impl PresentModePreference {
    /// Vulkan present mode for this preference
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Size of each tessellation ring (vertex and index) in bytes
pub const DEFAULT_RING_BYTES: u64 = 16 * 1024 * 1024;

/// Uniform slots available to draws within one frame
pub const DEFAULT_UNIFORM_SLOTS: u32 = 1024;

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan core, including application metadata,
/// debug features and per-frame buffer capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Preferred presentation mode, falls back to FIFO when unsupported
    pub present_mode: PresentModePreference,
    /// Colour the swapchain image is cleared to at the start of every frame
    pub clear_color: [f32; 4],
    /// Capacity of the tessellation vertex ring in bytes
    pub vertex_ring_bytes: u64,
    /// Capacity of the tessellation index ring in bytes
    pub index_ring_bytes: u64,
    /// Number of uniform slots available to draws in one frame
    pub uniform_slots: u32,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            enable_validation: None,
            present_mode: PresentModePreference::Fifo,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vertex_ring_bytes: DEFAULT_RING_BYTES,
            index_ring_bytes: DEFAULT_RING_BYTES,
            uniform_slots: DEFAULT_UNIFORM_SLOTS,
        }
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the preferred present mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Set the frame clear colour
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set ring capacities in bytes
    pub fn with_ring_capacity(mut self, vertex_bytes: u64, index_bytes: u64) -> Self {
        self.vertex_ring_bytes = vertex_bytes;
        self.index_ring_bytes = index_bytes;
        self
    }

    /// Set the number of uniform slots per frame
    pub fn with_uniform_slots(mut self, slots: u32) -> Self {
        self.uniform_slots = slots;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }
        if self.vertex_ring_bytes == 0 || self.index_ring_bytes == 0 {
            return Err(ConfigError::Invalid("Ring capacities must be non-zero".to_string()));
        }
        if self.index_ring_bytes % 4 != 0 {
            return Err(ConfigError::Invalid("Index ring capacity must hold whole u32 indices".to_string()));
        }
        if self.uniform_slots == 0 {
            return Err(ConfigError::Invalid("At least one uniform slot is required".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("vk_core application")
    }
}

impl Config for RendererConfig {}
