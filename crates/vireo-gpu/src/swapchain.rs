//! Swapchain negotiation and management.

use crate::error::{GpuError, Result};
use crate::queue::QueueFamilyIndices;
use crate::surface::SurfaceCapabilities;
use ash::vk;

/// The concrete presentation settings chosen for a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationConfig {
    pub extent: vk::Extent2D,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl PresentationConfig {
    /// Choose format, present mode and extent from a capability snapshot.
    ///
    /// `framebuffer` is the window's size in pixels; it is only used when the
    /// surface leaves the extent up to the application.
    pub fn negotiate(support: &SurfaceCapabilities, framebuffer: (u32, u32)) -> Result<Self> {
        // Devices without formats never pass selection; this is the same
        // outcome the driver would give for an unusable surface.
        let surface_format = select_surface_format(&support.formats)
            .ok_or(GpuError::SwapchainCreation(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;

        Ok(Self {
            extent: choose_extent(&support.capabilities, framebuffer),
            surface_format,
            present_mode: select_present_mode(&support.present_modes),
        })
    }
}

/// Select the surface format.
///
/// Prefers 8-bit BGRA sRGB in the sRGB non-linear color space, otherwise the
/// first format the platform lists. `None` only for an empty list.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Select the present mode: mailbox when available, otherwise FIFO, which
/// every implementation must support.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// A current extent of `u32::MAX` means the surface takes its size from the
/// swapchain, so the framebuffer size is clamped into the supported range.
/// Any other current extent is used as is.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    (width, height): (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Number of images to request: one more than the minimum, capped by the
/// maximum when there is one (zero means unbounded).
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// Sharing mode and family list for swapchain images.
///
/// Images are shared concurrently only when graphics and presentation use
/// different families.
pub fn sharing_mode(indices: &QueueFamilyIndices) -> Result<(vk::SharingMode, Vec<u32>)> {
    let graphics = indices.graphics_family()?;
    let present = indices.present_family()?;

    if graphics == present {
        Ok((vk::SharingMode::EXCLUSIVE, Vec::new()))
    } else {
        Ok((vk::SharingMode::CONCURRENT, vec![graphics, present]))
    }
}

/// Creates and destroys image views.
///
/// Implemented for `ash::Device`; split out so view bookkeeping can be
/// checked without a driver.
pub trait ImageViewFactory {
    /// # Safety
    /// `info` must describe an image owned by this device.
    unsafe fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> ash::prelude::VkResult<vk::ImageView>;

    /// # Safety
    /// `view` must have been created by this factory and be unused.
    unsafe fn destroy_image_view(&self, view: vk::ImageView);
}

impl ImageViewFactory for ash::Device {
    unsafe fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> ash::prelude::VkResult<vk::ImageView> {
        unsafe { ash::Device::create_image_view(self, info, None) }
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { ash::Device::destroy_image_view(self, view, None) };
    }
}

/// Swapchain wrapper.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub config: PresentationConfig,
}

impl Swapchain {
    /// Create a new swapchain and fetch its images.
    ///
    /// Image views are created separately by [`Swapchain::create_image_views`].
    ///
    /// # Safety
    /// All handles must be valid and `indices` must belong to the device
    /// `swapchain_loader` was created for.
    pub unsafe fn new(
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        support: &SurfaceCapabilities,
        config: PresentationConfig,
        indices: &QueueFamilyIndices,
    ) -> Result<Self> {
        let capabilities = &support.capabilities;
        let (sharing, queue_families) = sharing_mode(indices)?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count(capabilities))
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing)
            .queue_family_indices(&queue_families)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(GpuError::SwapchainCreation)?;

        // The driver may hand back more images than requested.
        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(GpuError::Query(e));
            }
        };

        tracing::info!(
            "Swapchain created: {}x{} ({} images, {:?}, {:?})",
            config.extent.width,
            config.extent.height,
            images.len(),
            config.surface_format.format,
            config.present_mode,
        );

        Ok(Self {
            swapchain,
            images,
            image_views: Vec::new(),
            config,
        })
    }

    /// Create one color view per swapchain image.
    ///
    /// Each view is recorded as soon as it exists. On failure the views made
    /// so far stay in `image_views`; [`Swapchain::destroy_image_views`] still
    /// has to be called.
    ///
    /// # Safety
    /// `device` must own the swapchain's images.
    pub unsafe fn create_image_views(&mut self, device: &impl ImageViewFactory) -> Result<()> {
        self.image_views.reserve(self.images.len());

        for &image in &self.images[self.image_views.len()..] {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.config.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            let view = unsafe { device.create_image_view(&view_info) }
                .map_err(GpuError::ImageViewCreation)?;
            self.image_views.push(view);
        }

        Ok(())
    }

    /// Destroy every image view individually.
    ///
    /// # Safety
    /// The views must not be in use.
    pub unsafe fn destroy_image_views(&mut self, device: &impl ImageViewFactory) {
        for view in self.image_views.drain(..) {
            if view != vk::ImageView::null() {
                unsafe { device.destroy_image_view(view) };
            }
        }
    }

    /// Destroy the swapchain. Its images go with it.
    ///
    /// # Safety
    /// Image views must already be destroyed and the swapchain must not be
    /// in use.
    pub unsafe fn destroy(&mut self, swapchain_loader: &ash::khr::swapchain::Device) {
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { swapchain_loader.destroy_swapchain(self.swapchain, None) };
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::{Cell, RefCell};

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn any_extent_caps(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn prefers_bgra_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&formats), Some(formats[1]));
    }

    #[test]
    fn preferred_format_needs_matching_color_space() {
        let formats = [
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&formats), Some(formats[0]));
    }

    #[test]
    fn falls_back_to_first_format_every_time() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let first = select_surface_format(&formats);
        let second = select_surface_format(&formats);
        assert_eq!(first, Some(formats[0]));
        assert_eq!(first, second);
        assert_eq!(select_surface_format(&[]), None);
    }

    #[test]
    fn present_mode_selection() {
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn any_extent_uses_framebuffer() {
        let caps = any_extent_caps((1, 1), (4096, 4096));
        assert_eq!(
            choose_extent(&caps, (1920, 1080)),
            vk::Extent2D {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn any_extent_clamps_each_axis() {
        let caps = any_extent_caps((1, 1), (4096, 4096));
        assert_eq!(
            choose_extent(&caps, (8000, 8000)),
            vk::Extent2D {
                width: 4096,
                height: 4096
            }
        );

        let caps = any_extent_caps((64, 64), (4096, 2048));
        assert_eq!(
            choose_extent(&caps, (10, 3000)),
            vk::Extent2D {
                width: 64,
                height: 2048
            }
        );
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        assert_eq!(
            choose_extent(&caps, (1920, 1080)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn image_count_respects_maximum() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(image_count(&caps), 3);

        caps.max_image_count = 8;
        assert_eq!(image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(image_count(&caps), 2);
    }

    #[test]
    fn sharing_mode_follows_families() {
        let shared = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
            requires_present: true,
        };
        assert_eq!(
            sharing_mode(&shared).unwrap(),
            (vk::SharingMode::EXCLUSIVE, vec![])
        );

        let split = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(2),
            requires_present: true,
        };
        assert_eq!(
            sharing_mode(&split).unwrap(),
            (vk::SharingMode::CONCURRENT, vec![0, 2])
        );

        let headless = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
            requires_present: false,
        };
        assert!(matches!(
            sharing_mode(&headless),
            Err(GpuError::MissingQueueFamily("present"))
        ));
    }

    #[test]
    fn negotiate_combines_choices() {
        let support = SurfaceCapabilities {
            capabilities: any_extent_caps((1, 1), (4096, 4096)),
            formats: vec![format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };

        let config = PresentationConfig::negotiate(&support, (800, 600)).unwrap();
        assert_eq!(config.extent.width, 800);
        assert_eq!(config.extent.height, 600);
        assert_eq!(config.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);

        let empty = SurfaceCapabilities {
            formats: Vec::new(),
            ..support
        };
        assert!(PresentationConfig::negotiate(&empty, (800, 600)).is_err());
    }

    /// Hands out sequential view handles and records what gets destroyed.
    #[derive(Default)]
    struct CountingViews {
        created: Cell<u64>,
        fail_at: Option<u64>,
        destroyed: RefCell<Vec<vk::ImageView>>,
        formats: RefCell<Vec<vk::Format>>,
    }

    impl ImageViewFactory for CountingViews {
        unsafe fn create_image_view(
            &self,
            info: &vk::ImageViewCreateInfo<'_>,
        ) -> ash::prelude::VkResult<vk::ImageView> {
            let next = self.created.get() + 1;
            if self.fail_at == Some(next) {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
            assert_eq!(info.subresource_range.level_count, 1);
            assert_eq!(info.subresource_range.layer_count, 1);
            assert_eq!(info.components.r, vk::ComponentSwizzle::IDENTITY);
            self.formats.borrow_mut().push(info.format);
            self.created.set(next);
            Ok(vk::ImageView::from_raw(next))
        }

        unsafe fn destroy_image_view(&self, view: vk::ImageView) {
            self.destroyed.borrow_mut().push(view);
        }
    }

    fn swapchain_with(images: usize) -> Swapchain {
        Swapchain {
            swapchain: vk::SwapchainKHR::null(),
            images: (1..=images as u64).map(vk::Image::from_raw).collect(),
            image_views: Vec::new(),
            config: PresentationConfig {
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                surface_format: format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                present_mode: vk::PresentModeKHR::FIFO,
            },
        }
    }

    #[test]
    fn one_view_per_image() {
        let views = CountingViews::default();
        let mut swapchain = swapchain_with(4);

        unsafe { swapchain.create_image_views(&views) }.unwrap();
        assert_eq!(swapchain.image_views.len(), swapchain.images.len());
        assert!(views
            .formats
            .borrow()
            .iter()
            .all(|f| *f == vk::Format::B8G8R8A8_SRGB));

        unsafe { swapchain.destroy_image_views(&views) };
        assert_eq!(views.destroyed.borrow().len(), 4);
        assert!(swapchain.image_views.is_empty());
    }

    #[test]
    fn views_are_destroyed_individually() {
        let views = CountingViews::default();
        let mut swapchain = swapchain_with(3);
        unsafe { swapchain.create_image_views(&views) }.unwrap();

        let middle = swapchain.image_views.remove(1);
        unsafe { views.destroy_image_view(middle) };
        assert_eq!(*views.destroyed.borrow(), vec![middle]);
        assert_eq!(swapchain.image_views.len(), 2);

        unsafe { swapchain.destroy_image_views(&views) };
        let destroyed = views.destroyed.borrow();
        assert_eq!(destroyed.len(), 3);
        assert!(destroyed.contains(&vk::ImageView::from_raw(1)));
        assert!(destroyed.contains(&vk::ImageView::from_raw(3)));
    }

    #[test]
    fn failed_view_keeps_earlier_ones_for_teardown() {
        let views = CountingViews {
            fail_at: Some(3),
            ..Default::default()
        };
        let mut swapchain = swapchain_with(4);

        let result = unsafe { swapchain.create_image_views(&views) };
        assert!(matches!(
            result,
            Err(GpuError::ImageViewCreation(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));
        assert_eq!(swapchain.image_views.len(), 2);

        unsafe { swapchain.destroy_image_views(&views) };
        assert_eq!(views.destroyed.borrow().len(), 2);
    }

    #[test]
    fn null_views_are_skipped() {
        let views = CountingViews::default();
        let mut swapchain = swapchain_with(2);
        swapchain.image_views = vec![vk::ImageView::null(), vk::ImageView::from_raw(7)];

        unsafe { swapchain.destroy_image_views(&views) };
        assert_eq!(*views.destroyed.borrow(), vec![vk::ImageView::from_raw(7)]);
    }
}
