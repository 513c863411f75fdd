//! Process-wide GPU configuration.
//!
//! Built once at startup and passed by reference to every component that
//! needs to know about validation or the portability layer.

use std::ffi::CStr;

/// Name of the Khronos validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Device extension MoltenVK requires when it is the active driver.
pub const PORTABILITY_SUBSET: &CStr = c"VK_KHR_portability_subset";

/// GPU configuration.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable validation layers and the debug messenger.
    pub enable_validation: bool,
    /// Running on top of a portability implementation (MoltenVK).
    pub portability: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            app_name: "Hello Triangle".to_string(),
            enable_validation: cfg!(debug_assertions),
            portability: cfg!(target_os = "macos"),
        }
    }
}

impl GpuConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Enable or disable the portability extensions.
    #[must_use]
    pub fn portability(mut self, enable: bool) -> Self {
        self.portability = enable;
        self
    }

    /// Device extensions every candidate must expose.
    pub fn required_device_extensions(&self) -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }

    /// Device extensions enabled on the logical device: the required ones,
    /// plus the portability subset when the portability flag is set.
    ///
    /// The subset is not part of suitability; only the enabled list names it.
    pub fn enabled_device_extensions(&self) -> Vec<&'static CStr> {
        let mut extensions = self.required_device_extensions();
        if self.portability {
            extensions.push(PORTABILITY_SUBSET);
        }
        extensions
    }

    /// Instance extensions needed on top of the window-system ones.
    pub fn extra_instance_extensions(&self) -> Vec<&'static CStr> {
        let mut extensions = Vec::new();
        if self.enable_validation {
            extensions.push(ash::ext::debug_utils::NAME);
        }
        if self.portability {
            extensions.push(ash::khr::portability_enumeration::NAME);
            extensions.push(ash::khr::get_physical_device_properties2::NAME);
        }
        extensions
    }

    /// Layers to enable on the instance and device.
    pub fn layers(&self) -> Vec<&'static CStr> {
        if self.enable_validation {
            vec![VALIDATION_LAYER]
        } else {
            Vec::new()
        }
    }
}
