//! Device selection, presentation negotiation and pipeline setup over Vulkan.
//!
//! This crate provides:
//! - Physical device scoring and selection
//! - Queue family resolution
//! - Surface capability negotiation (format, present mode, extent)
//! - Swapchain and image view construction
//! - Render pass and graphics pipeline creation
//!
//! Setup runs once, in order: [`device::select_physical_device`], then
//! [`device::create_logical_device`], then [`swapchain::Swapchain`], then
//! [`pipeline::GraphicsPipeline`]. Teardown runs in reverse.

pub mod capabilities;
pub mod config;
pub mod device;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use capabilities::{DeviceCandidate, GpuVendor};
pub use config::GpuConfig;
pub use device::{create_logical_device, rate_device, select_physical_device, Device, SelectedDevice};
pub use error::{GpuError, Result};
pub use instance::Instance;
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use query::{DeviceQuery, VulkanQuery};
pub use queue::{find_queue_families, QueueFamilyIndices, Queues};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{ImageViewFactory, PresentationConfig, Swapchain};
