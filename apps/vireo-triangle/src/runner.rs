//! Application runner and event loop.

use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vireo_gpu::GpuConfig;
use vireo_platform::PlatformConfig;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::renderer::Renderer;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window settings.
    pub platform: PlatformConfig,
    /// Instance and device settings.
    pub gpu: GpuConfig,
    /// Directory holding `vert.spv` and `frag.spv`.
    pub shader_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            gpu: GpuConfig::default(),
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

impl AppConfig {
    /// Set the shader directory.
    #[must_use]
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.gpu = self.gpu.validation(validation);
        self
    }
}

/// Run the application until the window is closed.
///
/// Initializes logging, then creates the window and renderer once the event
/// loop resumes. A setup failure stops the loop and is returned here.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.platform.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        state: None,
        failure: None,
    };

    event_loop.run_app(&mut runner)?;

    // Covers loop exits that skipped CloseRequested.
    if let Some(mut state) = runner.state.take() {
        state.cleanup();
    }

    match runner.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct AppRunner {
    config: AppConfig,
    state: Option<AppState>,
    failure: Option<anyhow::Error>,
}

/// Live window and everything built on it.
struct AppState {
    renderer: Renderer,
    // The surface presents to this window.
    _window: Window,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.failure.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            info!("Close requested");
            if let Some(mut state) = self.state.take() {
                state.cleanup();
            }
            event_loop.exit();
        }
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window = vireo_platform::create_window(event_loop, &self.config.platform)?;
        let renderer = Renderer::new(&window, &self.config)?;
        Ok(AppState {
            renderer,
            _window: window,
        })
    }
}

impl AppState {
    fn cleanup(&mut self) {
        info!("Starting cleanup...");
        // SAFETY: nothing has been submitted, and the window outlives this call.
        unsafe { self.renderer.destroy() };
        info!("Cleanup complete");
    }
}
