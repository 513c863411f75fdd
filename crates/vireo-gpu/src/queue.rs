//! Queue family resolution.

use crate::error::{GpuError, Result};
use crate::query::DeviceQuery;
use ash::vk;

/// Queue family index for each role the renderer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    /// False when no surface is involved; only graphics is needed then.
    pub requires_present: bool,
}

impl QueueFamilyIndices {
    /// True once every required role has a family.
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && (!self.requires_present || self.present.is_some())
    }

    /// Graphics family, or an error if it never resolved.
    pub fn graphics_family(&self) -> Result<u32> {
        self.graphics.ok_or(GpuError::MissingQueueFamily("graphics"))
    }

    /// Present family, or an error if it never resolved.
    pub fn present_family(&self) -> Result<u32> {
        self.present.ok_or(GpuError::MissingQueueFamily("present"))
    }

    /// Distinct resolved families in ascending order.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// Find graphics and present families for a device.
///
/// Families are scanned in index order and the first match wins for each
/// role independently, so one family can end up serving both. Passing no
/// surface resolves graphics only. An incomplete result is not an error.
pub fn find_queue_families(
    query: &impl DeviceQuery,
    physical_device: vk::PhysicalDevice,
    surface: Option<vk::SurfaceKHR>,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices {
        graphics: None,
        present: None,
        requires_present: surface.is_some(),
    };

    for (i, family) in query.queue_families(physical_device).iter().enumerate() {
        let i = i as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }

        if let Some(surface) = surface {
            if indices.present.is_none() && query.present_support(physical_device, i, surface)? {
                indices.present = Some(i);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// One create info per distinct family, each asking for a single queue.
///
/// `priority` must outlive the returned infos.
pub fn queue_create_infos<'a>(
    indices: &QueueFamilyIndices,
    priority: &'a [f32; 1],
) -> Vec<vk::DeviceQueueCreateInfo<'a>> {
    indices
        .unique_families()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(priority)
        })
        .collect()
}

/// Queue handles fetched from the logical device.
#[derive(Debug, Clone, Copy)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

impl Queues {
    /// Fetch queue 0 of the graphics and present families.
    ///
    /// Without a present family the graphics queue doubles as present.
    ///
    /// # Safety
    /// `device` must have been created with a queue in each resolved family.
    pub unsafe fn retrieve(device: &ash::Device, indices: &QueueFamilyIndices) -> Result<Self> {
        let graphics_family = indices.graphics_family()?;
        let present_family = indices.present.unwrap_or(graphics_family);

        Ok(Self {
            graphics: unsafe { device.get_device_queue(graphics_family, 0) },
            present: unsafe { device.get_device_queue(present_family, 0) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::mock::{family, handle, surface, MockDevice, MockQuery};

    fn device_with(families: Vec<vk::QueueFamilyProperties>, present: Vec<u32>) -> MockQuery {
        let mut device = MockDevice::suitable(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        device.queue_families = families;
        device.present_families = present;
        MockQuery::new(vec![device])
    }

    #[test]
    fn combined_family_serves_both_roles() {
        let query = device_with(vec![family(vk::QueueFlags::GRAPHICS)], vec![0]);
        let indices = find_queue_families(&query, handle(0), Some(surface())).unwrap();

        assert!(indices.is_complete());
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn separate_families_resolve_independently() {
        let query = device_with(
            vec![
                family(vk::QueueFlags::TRANSFER),
                family(vk::QueueFlags::GRAPHICS),
                family(vk::QueueFlags::COMPUTE),
            ],
            vec![2],
        );
        let indices = find_queue_families(&query, handle(0), Some(surface())).unwrap();

        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(2));
        assert_eq!(indices.unique_families(), vec![1, 2]);
    }

    #[test]
    fn earliest_index_wins() {
        // A combined family shows up after separate ones; the earlier
        // separate families still win.
        let query = device_with(
            vec![
                family(vk::QueueFlags::COMPUTE),
                family(vk::QueueFlags::GRAPHICS),
                family(vk::QueueFlags::GRAPHICS),
            ],
            vec![0, 2],
        );
        let indices = find_queue_families(&query, handle(0), Some(surface())).unwrap();

        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn no_capable_family_is_incomplete() {
        let query = device_with(
            vec![
                family(vk::QueueFlags::COMPUTE),
                family(vk::QueueFlags::TRANSFER),
            ],
            vec![],
        );
        let indices = find_queue_families(&query, handle(0), Some(surface())).unwrap();

        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
        assert!(matches!(
            indices.graphics_family(),
            Err(GpuError::MissingQueueFamily("graphics"))
        ));
    }

    #[test]
    fn graphics_without_present_is_incomplete() {
        let query = device_with(vec![family(vk::QueueFlags::GRAPHICS)], vec![]);
        let indices = find_queue_families(&query, handle(0), Some(surface())).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn headless_needs_graphics_only() {
        let query = device_with(vec![family(vk::QueueFlags::GRAPHICS)], vec![]);
        let indices = find_queue_families(&query, handle(0), None).unwrap();

        assert!(indices.is_complete());
        assert_eq!(indices.present, None);
    }

    #[test]
    fn present_query_failure_propagates() {
        let mut query = device_with(vec![family(vk::QueueFlags::GRAPHICS)], vec![0]);
        query.fail_surface_queries = true;

        let result = find_queue_families(&query, handle(0), Some(surface()));
        assert!(matches!(result, Err(GpuError::Query(_))));
    }

    #[test]
    fn one_create_info_per_distinct_family() {
        let priority = [1.0_f32];

        let shared = QueueFamilyIndices {
            graphics: Some(3),
            present: Some(3),
            requires_present: true,
        };
        let infos = queue_create_infos(&shared, &priority);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 3);
        assert_eq!(infos[0].queue_count, 1);

        let split = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(1),
            requires_present: true,
        };
        let infos = queue_create_infos(&split, &priority);
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().all(|info| info.queue_count == 1));
    }
}
