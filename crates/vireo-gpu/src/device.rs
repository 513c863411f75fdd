//! Physical device selection and logical device creation.

use crate::capabilities::DeviceCandidate;
use crate::config::GpuConfig;
use crate::error::{GpuError, Result};
use crate::query::DeviceQuery;
use crate::queue::{find_queue_families, queue_create_infos, QueueFamilyIndices, Queues};
use crate::surface::SurfaceCapabilities;
use ash::vk;
use std::ffi::c_char;

/// Score bonus for discrete GPUs.
pub const DISCRETE_GPU_BONUS: u32 = 1000;

/// The physical device picked at startup and its resolved queue families.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub candidate: DeviceCandidate,
    pub queue_families: QueueFamilyIndices,
    pub score: u32,
}

impl SelectedDevice {
    /// The physical device handle.
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.candidate.handle
    }
}

/// Rank a physical device. Zero means unusable.
///
/// A device scores zero unless its queue families are complete, it exposes
/// every required extension (the portability subset is not one of them), it has at least one surface format and present
/// mode for `surface` (when given), and it supports tessellation shaders and
/// sample rate shading. Otherwise the score is the discrete GPU bonus (if
/// discrete) plus the largest supported 2D image dimension.
pub fn rate_device(
    query: &impl DeviceQuery,
    candidate: &DeviceCandidate,
    surface: Option<vk::SurfaceKHR>,
    config: &GpuConfig,
) -> Result<u32> {
    let indices = find_queue_families(query, candidate.handle, surface)?;
    if !indices.is_complete() {
        return Ok(0);
    }

    if !candidate.supports_extensions(&config.required_device_extensions()) {
        return Ok(0);
    }

    if let Some(surface) = surface {
        let support = SurfaceCapabilities::query(query, candidate.handle, surface)?;
        if !support.is_adequate() {
            return Ok(0);
        }
    }

    if !candidate.supports_required_features() {
        return Ok(0);
    }

    let bonus = if candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        DISCRETE_GPU_BONUS
    } else {
        0
    };

    // The image limit is driver-reported; clamp rather than wrap.
    Ok(bonus.saturating_add(candidate.max_image_dimension_2d))
}

/// Pick the best physical device.
///
/// The strictly highest score wins, so ties go to the device enumerated
/// first. Fails with [`GpuError::NoDevice`] if nothing is enumerated and
/// [`GpuError::NoSuitableDevice`] if every device scores zero.
pub fn select_physical_device(
    query: &impl DeviceQuery,
    surface: Option<vk::SurfaceKHR>,
    config: &GpuConfig,
) -> Result<SelectedDevice> {
    let devices = query.physical_devices()?;
    if devices.is_empty() {
        return Err(GpuError::NoDevice);
    }

    let mut best: Option<(DeviceCandidate, u32)> = None;

    for device in devices {
        let candidate = DeviceCandidate::query(query, device)?;
        let score = rate_device(query, &candidate, surface, config)?;
        tracing::debug!(device = %candidate.device_name, score, "Rated physical device");

        if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
            best = Some((candidate, score));
        }
    }

    let (candidate, score) = match best {
        Some((candidate, score)) if score > 0 => (candidate, score),
        _ => return Err(GpuError::NoSuitableDevice),
    };

    let queue_families = find_queue_families(query, candidate.handle, surface)?;
    tracing::info!("Selected GPU: {}", candidate.summary());

    Ok(SelectedDevice {
        candidate,
        queue_families,
        score,
    })
}

/// Logical device and its queues.
pub struct Device {
    device: ash::Device,
    queues: Queues,
    queue_families: QueueFamilyIndices,
    destroyed: bool,
}

impl Device {
    /// Get the Vulkan device handle.
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Graphics and present queues.
    pub fn queues(&self) -> Queues {
        self.queues
    }

    /// Queue families the device was created with.
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Destroy the logical device. Later calls do nothing.
    ///
    /// # Safety
    /// Every object created from the device must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        if !self.destroyed && self.device.handle() != vk::Device::null() {
            unsafe { self.device.destroy_device(None) };
        }
        self.destroyed = true;
    }
}

/// Create the logical device for the selected physical device.
///
/// One queue is requested per distinct queue family, all at priority 1.0.
///
/// # Safety
/// `instance` must be the instance `selected` was enumerated from.
pub unsafe fn create_logical_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
    config: &GpuConfig,
) -> Result<Device> {
    let indices = selected.queue_families;
    let priority = [1.0_f32];
    let queue_infos = queue_create_infos(&indices, &priority);

    let extensions = config.enabled_device_extensions();
    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Device layers are ignored by current loaders but older ones still read them.
    let layers = config.layers();
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    #[allow(deprecated)]
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(selected.handle(), &create_info, None) }
        .map_err(GpuError::LogicalDeviceCreation)?;

    let queues = match unsafe { Queues::retrieve(&device, &indices) } {
        Ok(queues) => queues,
        Err(e) => {
            unsafe { device.destroy_device(None) };
            return Err(e);
        }
    };

    tracing::debug!(
        queue_families = ?indices.unique_families(),
        "Logical device created"
    );

    Ok(Device {
        device,
        queues,
        queue_families: indices,
        destroyed: false,
    })
}
