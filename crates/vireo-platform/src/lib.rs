//! Platform abstraction for the Vireo renderer.
//!
//! Provides window creation via winit and the two things the renderer needs
//! from a window: its display handle and its framebuffer size.

use raw_window_handle::{HasDisplayHandle, RawDisplayHandle};
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Window handle unavailable: {0}")]
    Handle(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

impl PlatformConfig {
    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Create the application window.
pub fn create_window(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Result<Window> {
    let attributes = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable);

    let window = event_loop
        .create_window(attributes)
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

    tracing::debug!(
        "Window created: {}x{} \"{}\"",
        config.width,
        config.height,
        config.title
    );

    Ok(window)
}

/// Raw display handle for instance extension discovery.
pub fn raw_display_handle(window: &Window) -> Result<RawDisplayHandle> {
    window
        .display_handle()
        .map(|handle| handle.as_raw())
        .map_err(|e| PlatformError::Handle(e.to_string()))
}

/// Current framebuffer size in pixels.
pub fn framebuffer_size(window: &Window) -> (u32, u32) {
    clamp_framebuffer(window.inner_size())
}

/// A minimized window reports zero; the renderer needs at least one pixel.
fn clamp_framebuffer(size: PhysicalSize<u32>) -> (u32, u32) {
    (size.width.max(1), size.height.max(1))
}
