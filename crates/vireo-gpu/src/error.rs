//! GPU error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant is fatal to the caller; nothing here is retried.
#[derive(Error, Debug)]
pub enum GpuError {
    /// The Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance creation was rejected.
    #[error("Failed to create instance: {0}")]
    InstanceCreation(vk::Result),

    /// Validation was requested but the layer is not installed.
    #[error("Validation layers requested, but not available")]
    ValidationLayersUnavailable,

    /// Debug messenger creation failed.
    #[error("Failed to set up debug messenger: {0}")]
    DebugMessenger(vk::Result),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// No physical device is visible to the instance.
    #[error("Failed to find GPUs with Vulkan support")]
    NoDevice,

    /// Every enumerated device scored zero.
    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    /// A queue role needed after selection has no family.
    #[error("No queue family resolved for {0}")]
    MissingQueueFamily(&'static str),

    /// Logical device creation was rejected.
    #[error("Failed to create logical device: {0}")]
    LogicalDeviceCreation(vk::Result),

    /// A capability or support query failed.
    #[error("Device query failed: {0}")]
    Query(vk::Result),

    /// Swapchain creation was rejected.
    #[error("Failed to create swap chain: {0}")]
    SwapchainCreation(vk::Result),

    /// Image view creation was rejected.
    #[error("Failed to create image views: {0}")]
    ImageViewCreation(vk::Result),

    /// Render pass creation was rejected.
    #[error("Failed to create render pass: {0}")]
    RenderPassCreation(vk::Result),

    /// Shader file could not be read.
    #[error("Failed to read shader {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shader module creation failed.
    #[error("Failed to create shader module: {0}")]
    ShaderModule(String),

    /// Pipeline or pipeline layout creation was rejected.
    #[error("Failed to create graphics pipeline: {0}")]
    PipelineCreation(vk::Result),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
