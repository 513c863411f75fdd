//! Shader binaries.

use crate::error::{GpuError, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// Read a compiled shader from disk.
pub fn load_shader(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Reinterpret SPIR-V bytes as words, fixing alignment and endianness.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| GpuError::ShaderModule(e.to_string()))
}

/// Create a shader module from SPIR-V bytes.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_shader_module(device: &ash::Device, bytes: &[u8]) -> Result<vk::ShaderModule> {
    let code = spirv_words(bytes)?;
    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| GpuError::ShaderModule(e.to_string()))
}
