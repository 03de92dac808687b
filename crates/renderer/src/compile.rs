use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use wgpu::naga::ShaderStage;

/// Mosaic effect shipped with the binary; used whenever no shader file
/// is supplied on the command line.
const DEFAULT_FRAGMENT: &str = include_str!("../shaders/mosaic.frag");

/// Reads the effect fragment shader, falling back to the bundled one.
pub(crate) fn load_fragment_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader at {}", path.display())),
        None => Ok(DEFAULT_FRAGMENT.to_string()),
    }
}

/// Compiles the static full-screen quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    create_module_checked(
        device,
        "fullscreen quad vertex",
        ShaderStage::Vertex,
        Cow::Borrowed(VERTEX_SHADER_GLSL),
    )
}

/// Wraps the user effect shader with our prologue/epilogue and compiles
/// it as GLSL through naga.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    let wrapped = wrap_effect_fragment(source);
    create_module_checked(
        device,
        "effect fragment",
        ShaderStage::Fragment,
        Cow::Owned(wrapped),
    )
}

/// Creates a shader module under a validation error scope so compile
/// diagnostics can be surfaced with the failing stage named.
fn create_module_checked(
    device: &wgpu::Device,
    label: &str,
    stage: ShaderStage,
    shader: Cow<'_, str>,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader,
            stage,
            defines: Default::default(),
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        tracing::error!(stage = ?stage, error = %error, "shader failed to compile");
        anyhow::bail!("{label} shader failed to compile: {error}");
    }
    Ok(module)
}

/// Produces a self-contained GLSL fragment shader from raw effect code.
///
/// Steps performed:
///
/// 1. Strip `#version` directives and the uniform/sampler declarations
///    the prologue itself supplies, so effect files can stand alone as
///    valid GLSL for editors.
/// 2. Prepend [`HEADER`] which declares the uniform block, the source
///    sampler binding, and macro aliases for both.
/// 3. Append [`FOOTER`] which calls `mainImage` with the interpolated
///    quad coordinate and writes to `outColor`.
fn wrap_effect_fragment(source: &str) -> String {
    let mut sanitized = String::new();
    let mut skipped_version = false;
    for line in source.lines() {
        if !skipped_version && line.trim_start().starts_with("#version") {
            skipped_version = true;
            continue;
        }
        let trimmed = line.trim_start();
        let should_skip_uniform = trimmed.starts_with("uniform ")
            && (trimmed.contains("u_tile_scale")
                || trimmed.contains("u_scale")
                || trimmed.contains("u_rotation")
                || trimmed.contains("u_image_texture"));
        if should_skip_uniform {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    format!("{HEADER}\n#line 1\n{sanitized}{FOOTER}")
}

/// GLSL prologue injected ahead of every effect fragment shader.
///
/// The uniform block layout must match `EffectUniforms` in
/// `gpu/uniforms.rs`, and the name->offset table in `registry.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform EffectParams {
    float _u_tile_scale;
    float _u_scale;
    float _u_rotation;
    float _padding0;
} ubo;

// Map the effect uniform names onto our UBO fields via macros to avoid
// name clashes with the stripped declarations.
#define u_tile_scale ubo._u_tile_scale
#define u_scale ubo._u_scale
#define u_rotation ubo._u_rotation

layout(set = 1, binding = 0) uniform texture2D camtile_source_texture;
layout(set = 1, binding = 1) uniform sampler camtile_source_sampler;

#define u_image_texture sampler2D(camtile_source_texture, camtile_source_sampler)
";

/// GLSL epilogue that delegates to `mainImage`.
const FOOTER: &str = r"void main() {
    vec4 color = vec4(0.0);
    mainImage(color, v_uv);
    outColor = color;
}
";

/// Minimal full-screen quad vertex shader: a 4-vertex triangle strip
/// generated from the vertex index, no vertex buffer. `v_uv` has its
/// origin at the top-left so uploaded frames need no row flip.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[4] = vec2[4](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_strips_effect_uniforms() {
        let source = r#"
            #version 300 es
            uniform float u_tile_scale;
            uniform float u_rotation;
            uniform sampler2D u_image_texture;
            void mainImage(out vec4 fragColor, in vec2 uv) {
                fragColor = vec4(uv, 0.0, 1.0);
            }
        "#;

        let wrapped = wrap_effect_fragment(source);
        assert!(!wrapped.contains("uniform float u_tile_scale"));
        assert!(!wrapped.contains("uniform sampler2D u_image_texture"));
        assert!(wrapped.contains("mainImage"));
        assert!(wrapped.contains("void main()"));
    }

    #[test]
    fn wrap_keeps_unrelated_declarations() {
        let source = "uniform float u_custom;\nvoid mainImage(out vec4 c, in vec2 uv) {}\n";
        let wrapped = wrap_effect_fragment(source);
        assert!(wrapped.contains("uniform float u_custom;"));
    }

    #[test]
    fn bundled_effect_declares_the_entry_point() {
        assert!(DEFAULT_FRAGMENT.contains("void mainImage"));
        let wrapped = wrap_effect_fragment(DEFAULT_FRAGMENT);
        assert!(wrapped.starts_with("#version 450"));
    }
}
