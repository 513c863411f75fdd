//! Physical device capability snapshots.

use crate::error::Result;
use crate::query::DeviceQuery;
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// What one physical device reports about itself.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Device handle; queried, never owned.
    pub handle: vk::PhysicalDevice,
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Discrete, integrated, virtual, CPU or other.
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Largest supported 2D image side.
    pub max_image_dimension_2d: u32,

    // Features the pipeline depends on. Geometry shaders are not available
    // through Metal, so tessellation stands in for them.
    pub supports_tessellation_shader: bool,
    pub supports_sample_rate_shading: bool,

    // Available extensions
    pub available_extensions: HashSet<String>,
}

impl DeviceCandidate {
    /// Snapshot a physical device.
    pub fn query(query: &impl DeviceQuery, handle: vk::PhysicalDevice) -> Result<Self> {
        let properties = query.properties(handle);
        let features = query.features(handle);

        let device_name = properties
            .device_name_as_c_str()
            .map_or_else(|_| String::from("<unnamed>"), |name| name.to_string_lossy().into_owned());

        Ok(Self {
            handle,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            supports_tessellation_shader: features.tessellation_shader == vk::TRUE,
            supports_sample_rate_shading: features.sample_rate_shading == vk::TRUE,
            available_extensions: query.extensions(handle)?,
        })
    }

    /// True if every extension in `required` is exposed, matched by exact name.
    pub fn supports_extensions(&self, required: &[&CStr]) -> bool {
        required.iter().all(|ext| {
            ext.to_str()
                .is_ok_and(|name| self.available_extensions.contains(name))
        })
    }

    /// True if the features the pipeline needs are all present.
    pub fn supports_required_features(&self) -> bool {
        self.supports_tessellation_shader && self.supports_sample_rate_shading
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - max 2D image {}",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.max_image_dimension_2d,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::mock::{handle, MockDevice, MockQuery};

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x106B), GpuVendor::Apple);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn snapshot_reads_limits_and_features() {
        let mut device = MockDevice::suitable(vk::PhysicalDeviceType::INTEGRATED_GPU, 8192);
        device.properties.vendor_id = 0x8086;
        device.features.sample_rate_shading = vk::FALSE;
        let query = MockQuery::new(vec![device]);

        let candidate = DeviceCandidate::query(&query, handle(0)).unwrap();
        assert_eq!(candidate.vendor, GpuVendor::Intel);
        assert_eq!(candidate.device_type, vk::PhysicalDeviceType::INTEGRATED_GPU);
        assert_eq!(candidate.max_image_dimension_2d, 8192);
        assert!(candidate.supports_tessellation_shader);
        assert!(!candidate.supports_required_features());
    }

    #[test]
    fn extension_match_is_exact() {
        let mut device = MockDevice::suitable(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        device.extensions = ["VK_KHR_swapchain_mutable_format".to_string()]
            .into_iter()
            .collect();
        let query = MockQuery::new(vec![device]);

        let candidate = DeviceCandidate::query(&query, handle(0)).unwrap();
        assert!(!candidate.supports_extensions(&[ash::khr::swapchain::NAME]));
        assert!(candidate.supports_extensions(&[c"VK_KHR_swapchain_mutable_format"]));
        assert!(candidate.supports_extensions(&[]));
    }
}
