//! Vireo Triangle
//!
//! Opens a window and brings up everything needed to draw into it: physical
//! device selection, logical device, swapchain, image views, render pass and
//! graphics pipeline. Nothing is drawn yet; the loop only pumps window events.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vireo-triangle
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `VIREO_SHADER_DIR`: Directory holding `vert.spv` and `frag.spv`
//!   (default: `shaders`)

mod renderer;
mod runner;

use crate::runner::{run_app, AppConfig};

const SHADER_DIR_VAR: &str = "VIREO_SHADER_DIR";

fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::default();
    if let Some(dir) = std::env::var_os(SHADER_DIR_VAR) {
        config = config.with_shader_dir(dir);
    }

    run_app(config)
}
