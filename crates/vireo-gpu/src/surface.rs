//! Surface management and capability negotiation.
//!
//! Provides the Vulkan surface for a window, hiding the raw-window-handle
//! plumbing from application code, and the per-device capability snapshot
//! that presentation setup is negotiated from.

use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::query::DeviceQuery;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Surface context for windowed rendering.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The window must outlive the returned surface.
    pub unsafe fn from_window<W>(instance: &Instance, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        let surface = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        Ok(Self {
            surface,
            surface_loader,
        })
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// No swapchain created for this surface may still exist.
    pub unsafe fn destroy(&mut self) {
        if self.surface != vk::SurfaceKHR::null() {
            unsafe { self.surface_loader.destroy_surface(self.surface, None) };
            self.surface = vk::SurfaceKHR::null();
        }
    }
}

/// Snapshot of what a device can do with a surface.
///
/// Taken fresh whenever presentation is negotiated. It is only meaningful
/// for the device and surface it was queried with.
#[derive(Debug, Clone)]
pub struct SurfaceCapabilities {
    /// Image count, extent and transform limits.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported formats in the order the platform reports them.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilities {
    /// Query the capability snapshot for a device and surface.
    pub fn query(
        query: &impl DeviceQuery,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: query.surface_capabilities(physical_device, surface)?,
            formats: query.surface_formats(physical_device, surface)?,
            present_modes: query.present_modes(physical_device, surface)?,
        })
    }

    /// Whether a swapchain can be built at all: at least one format and one
    /// present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}
