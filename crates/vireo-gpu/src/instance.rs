//! Vulkan instance creation.

use crate::config::{GpuConfig, VALIDATION_LAYER};
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};

/// Vulkan entry, instance and optional debug messenger.
pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    destroyed: bool,
}

impl Instance {
    /// Load Vulkan and create an instance able to present to `display`.
    pub fn new(config: &GpuConfig, display: RawDisplayHandle) -> Result<Self> {
        // SAFETY: the loaded library is kept alive in `entry` for as long as
        // the instance exists.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        if config.enable_validation && !validation_layer_available(&entry)? {
            return Err(GpuError::ValidationLayersUnavailable);
        }

        let app_name = CString::new(config.app_name.as_str())
            .unwrap_or_else(|_| CString::from(c"Hello Triangle"));

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extension_names: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(display)
                .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?
                .to_vec();
        extension_names.extend(
            config
                .extra_instance_extensions()
                .iter()
                .map(|ext| ext.as_ptr()),
        );

        let layers = config.layers();
        let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_flags = if config.portability {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut debug_info = debug_messenger_info();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        // Chained so that instance creation and destruction are also covered.
        if config.enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        // SAFETY: every pointer in create_info outlives this call.
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(GpuError::InstanceCreation)?;

        let debug = if config.enable_validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            // SAFETY: instance was created with VK_EXT_debug_utils enabled.
            match unsafe { loader.create_debug_utils_messenger(&debug_messenger_info(), None) } {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    // SAFETY: nothing else was created from this instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(GpuError::DebugMessenger(e));
                }
            }
        } else {
            None
        };

        tracing::debug!(
            validation = config.enable_validation,
            portability = config.portability,
            "Vulkan instance created"
        );

        Ok(Self {
            entry,
            instance,
            debug,
            destroyed: false,
        })
    }

    /// The Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The instance handle and function table.
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Destroy the debug messenger and the instance. Later calls do nothing.
    ///
    /// # Safety
    /// Every object created from this instance must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        if let Some((loader, messenger)) = self.debug.take() {
            if messenger != vk::DebugUtilsMessengerEXT::null() {
                unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
            }
        }
        if !self.destroyed {
            unsafe { self.instance.destroy_instance(None) };
            self.destroyed = true;
        }
    }
}

/// Whether the Khronos validation layer is installed.
fn validation_layer_available(entry: &ash::Entry) -> Result<bool> {
    // SAFETY: entry is a live loader.
    let layers =
        unsafe { entry.enumerate_instance_layer_properties() }.map_err(GpuError::Query)?;

    Ok(layers
        .iter()
        .any(|props| props.layer_name_as_c_str() == Ok(VALIDATION_LAYER)))
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Forwards validation output to `tracing`. Only warnings and errors are
/// reported.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the loader guarantees the callback data is valid for the call.
    let message = match unsafe { p_callback_data.as_ref() } {
        Some(data) if !data.p_message.is_null() => {
            unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
        }
        _ => Cow::Borrowed("<no message>"),
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vireo_gpu::validation", kind = ?message_type, "{message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vireo_gpu::validation", kind = ?message_type, "{message}");
    }

    vk::FALSE
}
