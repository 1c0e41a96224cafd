//! Shader loading: one vertex + one fragment WGSL file per pass.

use std::path::{Path, PathBuf};

use super::context::GpuContext;

/// A pass's pair of compiled shader stages.
///
/// Both stages are created inside a validation error scope so a compile
/// failure surfaces as an error naming the offending file rather than a
/// later device panic.
pub struct ShaderPipe {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

impl ShaderPipe {
    /// Load and compile a vertex/fragment pair from the `shaders/` directory.
    pub fn new(ctx: &GpuContext, vs_name: &str, fs_name: &str) -> Result<Self, String> {
        let vertex = compile(ctx, vs_name)?;
        let fragment = compile(ctx, fs_name)?;
        Ok(Self { vertex, fragment })
    }
}

fn compile(ctx: &GpuContext, name: &str) -> Result<wgpu::ShaderModule, String> {
    let path = find_shader(name)?;
    let source = std::fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read shader {}: {}", path.display(), e))?;

    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = ctx
        .device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
    if let Some(error) = pollster::block_on(ctx.device.pop_error_scope()) {
        return Err(format!("Shader {} failed to compile: {}", path.display(), error));
    }
    Ok(module)
}

/// Resolve a shader file against the project root: `shaders/` next to the
/// working directory, or one level up when launched from a subdirectory.
fn find_shader(name: &str) -> Result<PathBuf, String> {
    for base in ["shaders", "../shaders"] {
        let path = Path::new(base).join(name);
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(format!("Shader file not found: shaders/{}", name))
}
