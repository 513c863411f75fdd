//! Read-only device and surface queries.
//!
//! Device selection and presentation negotiation only ever read from the
//! driver. Everything they read goes through [`DeviceQuery`], so the ranking
//! and negotiation rules can be exercised without a GPU.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashSet;

/// Read-only view of physical devices and their surface support.
pub trait DeviceQuery {
    /// All physical devices visible to the instance, in driver order.
    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;

    /// Reported device properties.
    fn properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties;

    /// Reported feature bits.
    fn features(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures;

    /// Queue families in index order.
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    /// Names of the supported device extensions.
    fn extensions(&self, device: vk::PhysicalDevice) -> Result<HashSet<String>>;

    /// Whether `family` can present to `surface`.
    fn present_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool>;

    /// Surface capability limits.
    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR>;

    /// Supported (format, color space) pairs in reported order.
    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>>;

    /// Supported present modes.
    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>>;
}

/// [`DeviceQuery`] backed by a live instance.
pub struct VulkanQuery<'a> {
    instance: &'a ash::Instance,
    surface_loader: &'a ash::khr::surface::Instance,
}

impl<'a> VulkanQuery<'a> {
    /// Wrap an instance and its surface loader.
    ///
    /// # Safety
    /// Both must stay valid for the lifetime of the query, and every handle
    /// passed to its methods must come from `instance`.
    pub unsafe fn new(
        instance: &'a ash::Instance,
        surface_loader: &'a ash::khr::surface::Instance,
    ) -> Self {
        Self {
            instance,
            surface_loader,
        }
    }
}

impl DeviceQuery for VulkanQuery<'_> {
    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        // SAFETY: instance validity is guaranteed by the constructor contract.
        unsafe { self.instance.enumerate_physical_devices() }.map_err(GpuError::Query)
    }

    fn properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        unsafe { self.instance.get_physical_device_properties(device) }
    }

    fn features(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        unsafe { self.instance.get_physical_device_features(device) }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn extensions(&self, device: vk::PhysicalDevice) -> Result<HashSet<String>> {
        let properties = unsafe {
            self.instance
                .enumerate_device_extension_properties(device)
        }
        .map_err(GpuError::Query)?;

        Ok(properties
            .iter()
            .filter_map(|ext| {
                ext.extension_name_as_c_str()
                    .ok()
                    .and_then(|name| name.to_str().ok())
                    .map(String::from)
            })
            .collect())
    }

    fn present_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, family, surface)
        }
        .map_err(GpuError::Query)
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(device, surface)
        }
        .map_err(GpuError::Query)
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(device, surface)
        }
        .map_err(GpuError::Query)
    }

    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(device, surface)
        }
        .map_err(GpuError::Query)
    }
}
