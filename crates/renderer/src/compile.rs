use std::borrow::Cow;
use std::fmt::Write as _;

use scheduler::PipelineError;
use wgpu::naga::front::glsl;
use wgpu::naga::ShaderStage;

use crate::filters;

/// A compiled stage plus the bindings naga found while parsing it.
pub(crate) struct Shader {
    pub module: wgpu::ShaderModule,
    pub bindings: Vec<ReflectedBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
}

/// Drops a leading byte-order mark and whitespace so `#version` is the first token.
pub(crate) fn preprocess_source(source: &str) -> &str {
    source.trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace())
}

/// Parses `source` with naga for diagnostics and reflection, then hands it to
/// wgpu inside a validation error scope.
pub(crate) fn compile(
    device: &wgpu::Device,
    program: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<Shader, PipelineError> {
    let source = preprocess_source(source);
    let build_error = |log: String| PipelineError::ShaderBuild {
        program: program.to_string(),
        log,
    };

    if !source.starts_with("#version") {
        return Err(build_error(
            "shader source must begin with a #version directive".into(),
        ));
    }

    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| build_error(errors.to_string()))?;
    let bindings = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            var.binding.as_ref().map(|binding| ReflectedBinding {
                name: var.name.clone(),
                group: binding.group,
                binding: binding.binding,
            })
        })
        .collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(build_error(err.to_string()));
    }

    Ok(Shader { module, bindings })
}

/// Full-screen quad vertex stage; the geometry supplies both attributes.
pub(crate) const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texCoord;
layout(location = 0) out vec2 v_texCoord;

void main() {
    v_texCoord = a_texCoord;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

pub(crate) const GRAYSCALE_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_texCoord;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D u_image;
layout(set = 0, binding = 1) uniform sampler u_image_sampler;

void main() {
    vec3 rgb = texture(sampler2D(u_image, u_image_sampler), v_texCoord).rgb;
    float luma = dot(rgb, vec3(0.299, 0.587, 0.114));
    outColor = vec4(vec3(luma), 1.0);
}
";

pub(crate) const DIFFERENCE_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_texCoord;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D u_imageA;
layout(set = 0, binding = 1) uniform sampler u_imageA_sampler;
layout(set = 0, binding = 2) uniform texture2D u_imageB;
layout(set = 0, binding = 3) uniform sampler u_imageB_sampler;

void main() {
    vec3 a = texture(sampler2D(u_imageA, u_imageA_sampler), v_texCoord).rgb;
    vec3 b = texture(sampler2D(u_imageB, u_imageB_sampler), v_texCoord).rgb;
    outColor = vec4(abs(a - b), 1.0);
}
";

/// Offscreen and surface targets store row 0 at the top, so sampling with a
/// flipped `v` keeps texel rows in storage order.
pub(crate) const COPY_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_texCoord;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D u_image;
layout(set = 0, binding = 1) uniform sampler u_image_sampler;

void main() {
    vec2 uv = vec2(v_texCoord.x, 1.0 - v_texCoord.y);
    outColor = texture(sampler2D(u_image, u_image_sampler), uv);
}
";

/// Generates the Laplacian-of-Gaussian stage from [`filters::LOG_KERNEL`].
pub(crate) fn laplacian_shader_glsl() -> String {
    let mut source = String::from(
        r"#version 450
layout(location = 0) in vec2 v_texCoord;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D u_image;
layout(set = 0, binding = 1) uniform sampler u_image_sampler;
layout(std140, set = 0, binding = 2) uniform Resolution {
    vec2 u_resolution;
} params;

vec3 tap(vec2 offset) {
    vec2 texel = 1.0 / params.u_resolution;
    return texture(sampler2D(u_image, u_image_sampler), v_texCoord + offset * texel).rgb;
}

void main() {
    vec3 sum = vec3(0.0);
",
    );
    for (dx, dy, weight) in filters::log_taps() {
        // Texture rows run bottom-up, so image `dy` maps to `-dy` in v.
        let _ = writeln!(
            source,
            "    sum += {weight:.1} * tap(vec2({:.1}, {:.1}));",
            dx as f32,
            -dy as f32
        );
    }
    source.push_str("    outColor = vec4(abs(sum), 1.0);\n}\n");
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_strips_bom_and_leading_whitespace() {
        let raw = "\u{feff}\n  \t#version 450\nvoid main() {}\n";
        assert!(preprocess_source(raw).starts_with("#version 450"));
        assert_eq!(preprocess_source("#version 450"), "#version 450");
    }

    #[test]
    fn laplacian_source_has_one_line_per_tap() {
        let source = laplacian_shader_glsl();
        assert_eq!(source.matches("sum += ").count(), 13);
        assert!(source.contains("sum += 16.0 * tap(vec2(0.0, 0.0));"));
        assert!(source.contains("sum += -1.0 * tap(vec2(0.0, 2.0));"));
    }

    fn reflect(source: &str, stage: ShaderStage) -> Vec<ReflectedBinding> {
        let module = glsl::Frontend::default()
            .parse(&glsl::Options::from(stage), preprocess_source(source))
            .expect("shader parses");
        module
            .global_variables
            .iter()
            .filter_map(|(_, var)| {
                var.binding.as_ref().map(|binding| ReflectedBinding {
                    name: var.name.clone(),
                    group: binding.group,
                    binding: binding.binding,
                })
            })
            .collect()
    }

    #[test]
    fn bundled_shaders_parse_with_naga() {
        reflect(VERTEX_SHADER_GLSL, ShaderStage::Vertex);
        for source in [
            GRAYSCALE_SHADER_GLSL,
            DIFFERENCE_SHADER_GLSL,
            COPY_SHADER_GLSL,
        ] {
            let bindings = reflect(source, ShaderStage::Fragment);
            assert!(bindings.iter().any(|b| b.binding == 0));
            assert!(bindings.iter().any(|b| b.binding == 1));
        }
        let laplacian = reflect(&laplacian_shader_glsl(), ShaderStage::Fragment);
        assert!(laplacian.iter().any(|b| b.binding == 2));
    }

    #[test]
    fn difference_shader_exposes_both_images() {
        let bindings = reflect(DIFFERENCE_SHADER_GLSL, ShaderStage::Fragment);
        let names: Vec<_> = bindings.iter().filter_map(|b| b.name.as_deref()).collect();
        assert!(names.contains(&"u_imageA"));
        assert!(names.contains(&"u_imageB"));
    }
}
