//! Vulkan objects backing the window, created and destroyed as one unit.

use ash::vk;
use tracing::{info, warn};
use vireo_gpu::render_pass::{create_render_pass, destroy_render_pass};
use vireo_gpu::shader::load_shader;
use vireo_gpu::{
    create_logical_device, select_physical_device, Device, GraphicsPipeline,
    GraphicsPipelineConfig, Instance, PresentationConfig, SurfaceCapabilities, SurfaceContext,
    Swapchain, VulkanQuery,
};
use winit::window::Window;

use crate::runner::AppConfig;

/// Owns every Vulkan object the application creates.
///
/// Fields after `instance` are filled in setup order. Anything still `None`
/// (or null) was never created and is skipped on teardown.
pub struct Renderer {
    instance: Instance,
    surface: Option<SurfaceContext>,
    device: Option<Device>,
    swapchain_loader: Option<ash::khr::swapchain::Device>,
    swapchain: Option<Swapchain>,
    render_pass: vk::RenderPass,
    pipeline: Option<GraphicsPipeline>,
}

impl Renderer {
    /// Bring up the device, swapchain and pipeline for `window`.
    ///
    /// On failure everything created so far is destroyed before returning.
    pub fn new(window: &Window, config: &AppConfig) -> anyhow::Result<Self> {
        let display = vireo_platform::raw_display_handle(window)?;
        let instance = Instance::new(&config.gpu, display)?;

        let mut renderer = Self {
            instance,
            surface: None,
            device: None,
            swapchain_loader: None,
            swapchain: None,
            render_pass: vk::RenderPass::null(),
            pipeline: None,
        };

        if let Err(e) = renderer.init(window, config) {
            // SAFETY: nothing has been submitted to the device.
            unsafe { renderer.destroy() };
            return Err(e);
        }

        Ok(renderer)
    }

    fn init(&mut self, window: &Window, config: &AppConfig) -> anyhow::Result<()> {
        // SAFETY: the runner drops the renderer before the window.
        let surface = self
            .surface
            .insert(unsafe { SurfaceContext::from_window(&self.instance, window)? });

        // SAFETY: the loader was created from this instance and both live in `self`.
        let query = unsafe { VulkanQuery::new(self.instance.handle(), &surface.surface_loader) };
        let selected = select_physical_device(&query, Some(surface.surface), &config.gpu)?;

        // SAFETY: `selected` was enumerated from this instance.
        let device = self.device.insert(unsafe {
            create_logical_device(self.instance.handle(), &selected, &config.gpu)?
        });

        let swapchain_loader = self.swapchain_loader.insert(ash::khr::swapchain::Device::new(
            self.instance.handle(),
            device.handle(),
        ));

        let support = SurfaceCapabilities::query(&query, selected.handle(), surface.surface)?;
        let presentation =
            PresentationConfig::negotiate(&support, vireo_platform::framebuffer_size(window))?;

        // SAFETY: loader, surface and queue families all belong to `device`.
        let swapchain = self.swapchain.insert(unsafe {
            Swapchain::new(
                swapchain_loader,
                surface.surface,
                &support,
                presentation,
                device.queue_families(),
            )?
        });
        unsafe { swapchain.create_image_views(device.handle())? };

        self.render_pass =
            unsafe { create_render_pass(device.handle(), swapchain.config.surface_format.format)? };

        let vertex = load_shader(config.shader_dir.join("vert.spv"))?;
        let fragment = load_shader(config.shader_dir.join("frag.spv"))?;
        self.pipeline = Some(unsafe {
            GraphicsPipeline::new(
                device.handle(),
                self.render_pass,
                &GraphicsPipelineConfig::default(),
                &vertex,
                &fragment,
            )?
        });

        info!(
            "Renderer ready on {} ({} swapchain images)",
            selected.candidate.device_name,
            swapchain.image_views.len()
        );

        Ok(())
    }

    /// Destroy everything in reverse creation order. Safe to call twice.
    ///
    /// # Safety
    /// No work may be pending on the device and the window must still exist.
    pub unsafe fn destroy(&mut self) {
        if let Some(device) = &self.device {
            let handle = device.handle();
            if let Err(e) = unsafe { handle.device_wait_idle() } {
                warn!("Failed to wait idle: {e}");
            }

            if let Some(pipeline) = &mut self.pipeline {
                unsafe { pipeline.destroy(handle) };
            }
            unsafe { destroy_render_pass(handle, &mut self.render_pass) };

            if let Some(swapchain) = &mut self.swapchain {
                unsafe { swapchain.destroy_image_views(handle) };
                if let Some(loader) = &self.swapchain_loader {
                    unsafe { swapchain.destroy(loader) };
                }
            }
        }
        self.pipeline = None;
        self.swapchain = None;
        self.swapchain_loader = None;

        if let Some(device) = &mut self.device {
            unsafe { device.destroy() };
        }
        if let Some(surface) = &mut self.surface {
            unsafe { surface.destroy() };
        }
        unsafe { self.instance.destroy() };
    }
}
