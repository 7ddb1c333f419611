use std::collections::HashMap;
use std::fmt;

use scheduler::PipelineError;
use wgpu::naga::ShaderStage;

use crate::compile::{self, Shader};

use super::resources::{QuadGeometry, Texture, CANVAS_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ProgramKind {
    Grayscale,
    Difference,
    LaplacianOfGaussian,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Texture,
    Sampler,
    Buffer,
}

/// A uniform the fragment stage must declare, plus which draw input feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniformSlot {
    pub name: &'static str,
    pub binding: u32,
    pub kind: UniformKind,
    /// Index into the textures passed to [`Program::bind_group`].
    pub input: usize,
}

const fn slot(name: &'static str, binding: u32, kind: UniformKind, input: usize) -> UniformSlot {
    UniformSlot {
        name,
        binding,
        kind,
        input,
    }
}

const SINGLE_IMAGE: &[UniformSlot] = &[
    slot("u_image", 0, UniformKind::Texture, 0),
    slot("u_image_sampler", 1, UniformKind::Sampler, 0),
];

const TWO_IMAGES: &[UniformSlot] = &[
    slot("u_imageA", 0, UniformKind::Texture, 0),
    slot("u_imageA_sampler", 1, UniformKind::Sampler, 0),
    slot("u_imageB", 2, UniformKind::Texture, 1),
    slot("u_imageB_sampler", 3, UniformKind::Sampler, 1),
];

const IMAGE_WITH_RESOLUTION: &[UniformSlot] = &[
    slot("u_image", 0, UniformKind::Texture, 0),
    slot("u_image_sampler", 1, UniformKind::Sampler, 0),
    slot("u_resolution", 2, UniformKind::Buffer, 0),
];

impl ProgramKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ProgramKind::Grayscale => "grayscale",
            ProgramKind::Difference => "difference",
            ProgramKind::LaplacianOfGaussian => "laplacian-of-gaussian",
            ProgramKind::Copy => "copy",
        }
    }

    fn fragment_source(self) -> String {
        match self {
            ProgramKind::Grayscale => compile::GRAYSCALE_SHADER_GLSL.to_string(),
            ProgramKind::Difference => compile::DIFFERENCE_SHADER_GLSL.to_string(),
            ProgramKind::LaplacianOfGaussian => compile::laplacian_shader_glsl(),
            ProgramKind::Copy => compile::COPY_SHADER_GLSL.to_string(),
        }
    }

    pub(crate) fn uniforms(self) -> &'static [UniformSlot] {
        match self {
            ProgramKind::Grayscale | ProgramKind::Copy => SINGLE_IMAGE,
            ProgramKind::Difference => TWO_IMAGES,
            ProgramKind::LaplacianOfGaussian => IMAGE_WITH_RESOLUTION,
        }
    }

    /// Number of textures a draw with this program samples.
    pub(crate) fn image_count(self) -> usize {
        self.uniforms()
            .iter()
            .filter(|slot| slot.kind == UniformKind::Texture)
            .count()
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniformLocation {
    pub binding: u32,
    pub kind: UniformKind,
}

/// A linked pipeline with its uniform locations resolved once at link time.
pub(crate) struct Program {
    kind: ProgramKind,
    pub pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: HashMap<&'static str, UniformLocation>,
}

impl Program {
    pub(crate) fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub(crate) fn location(&self, name: &str) -> Result<UniformLocation, PipelineError> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::ShaderBuild {
                program: self.kind.to_string(),
                log: format!("uniform `{name}` was not resolved"),
            })
    }

    /// Binds `images` (and the resolution buffer, when the program reads one)
    /// to the cached uniform locations.
    pub(crate) fn bind_group(
        &self,
        device: &wgpu::Device,
        images: &[&Texture],
        resolution: Option<&wgpu::Buffer>,
    ) -> Result<wgpu::BindGroup, PipelineError> {
        let missing = |what: String| PipelineError::ShaderBuild {
            program: self.kind.to_string(),
            log: what,
        };

        let mut entries = Vec::with_capacity(self.kind.uniforms().len());
        for slot in self.kind.uniforms() {
            let location = self.location(slot.name)?;
            let resource = match location.kind {
                UniformKind::Texture | UniformKind::Sampler => {
                    let image = images
                        .get(slot.input)
                        .ok_or_else(|| missing(format!("no image bound for `{}`", slot.name)))?;
                    if location.kind == UniformKind::Texture {
                        wgpu::BindingResource::TextureView(&image.view)
                    } else {
                        wgpu::BindingResource::Sampler(&image.sampler)
                    }
                }
                UniformKind::Buffer => resolution
                    .ok_or_else(|| missing(format!("no buffer bound for `{}`", slot.name)))?
                    .as_entire_binding(),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: location.binding,
                resource,
            });
        }

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.kind.label()),
            layout: &self.bind_group_layout,
            entries: &entries,
        }))
    }
}

fn layout_entry(slot: &UniformSlot) -> wgpu::BindGroupLayoutEntry {
    let ty = match slot.kind {
        UniformKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        UniformKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        UniformKind::Buffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    }
}

/// Resolves every declared uniform against the bindings naga reflected from
/// the fragment stage. A missing declaration fails the link.
fn resolve_uniforms(
    kind: ProgramKind,
    fragment: &Shader,
) -> Result<HashMap<&'static str, UniformLocation>, PipelineError> {
    kind.uniforms()
        .iter()
        .map(|slot| {
            fragment
                .bindings
                .iter()
                .find(|reflected| reflected.group == 0 && reflected.binding == slot.binding)
                .map(|_| {
                    (
                        slot.name,
                        UniformLocation {
                            binding: slot.binding,
                            kind: slot.kind,
                        },
                    )
                })
                .ok_or_else(|| PipelineError::ShaderBuild {
                    program: kind.to_string(),
                    log: format!(
                        "uniform `{}` (binding {}) is not declared by the fragment stage",
                        slot.name, slot.binding
                    ),
                })
        })
        .collect()
}

/// Links a vertex and fragment stage into a full-screen quad pipeline that
/// renders into `format`.
pub(crate) fn link(
    device: &wgpu::Device,
    kind: ProgramKind,
    vertex: &Shader,
    fragment: &Shader,
    format: wgpu::TextureFormat,
) -> Result<Program, PipelineError> {
    let uniforms = resolve_uniforms(kind, fragment)?;
    let layout_entries: Vec<_> = kind.uniforms().iter().map(layout_entry).collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(kind.label()),
        entries: &layout_entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(kind.label()),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(kind.label()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex.module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[QuadGeometry::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment.module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(PipelineError::ShaderBuild {
            program: kind.to_string(),
            log: err.to_string(),
        });
    }

    Ok(Program {
        kind,
        pipeline,
        bind_group_layout,
        uniforms,
    })
}

/// Programs built for one context. Built once at startup, never recompiled.
pub(crate) struct ProgramRegistry {
    vertex: Shader,
    programs: HashMap<ProgramKind, Program>,
}

impl ProgramRegistry {
    pub(crate) fn build(device: &wgpu::Device, kinds: &[ProgramKind]) -> Result<Self, PipelineError> {
        let vertex = compile::compile(device, "vertex", compile::VERTEX_SHADER_GLSL, ShaderStage::Vertex)?;
        let mut registry = Self {
            vertex,
            programs: HashMap::with_capacity(kinds.len()),
        };
        for &kind in kinds {
            let program = registry.build_program(device, kind, CANVAS_FORMAT)?;
            registry.programs.insert(kind, program);
        }
        Ok(registry)
    }

    /// Compiles and links `kind` against the shared vertex stage for an
    /// arbitrary colour format, such as a window surface.
    pub(crate) fn build_program(
        &self,
        device: &wgpu::Device,
        kind: ProgramKind,
        format: wgpu::TextureFormat,
    ) -> Result<Program, PipelineError> {
        let fragment = compile::compile(
            device,
            kind.label(),
            &kind.fragment_source(),
            ShaderStage::Fragment,
        )?;
        let program = link(device, kind, &self.vertex, &fragment, format)?;
        tracing::debug!(program = %kind, ?format, "linked shader program");
        Ok(program)
    }

    pub(crate) fn get(&self, kind: ProgramKind) -> Result<&Program, PipelineError> {
        self.programs
            .get(&kind)
            .ok_or_else(|| PipelineError::ShaderBuild {
                program: kind.to_string(),
                log: "program was not built for this context".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_uniforms_match_generated_sources() {
        for kind in [
            ProgramKind::Grayscale,
            ProgramKind::Difference,
            ProgramKind::LaplacianOfGaussian,
            ProgramKind::Copy,
        ] {
            let source = kind.fragment_source();
            for slot in kind.uniforms() {
                let needle = format!("binding = {}", slot.binding);
                assert!(source.contains(&needle), "{kind} lacks {}", slot.name);
            }
        }
    }

    #[test]
    fn image_counts() {
        assert_eq!(ProgramKind::Grayscale.image_count(), 1);
        assert_eq!(ProgramKind::Difference.image_count(), 2);
        assert_eq!(ProgramKind::LaplacianOfGaussian.image_count(), 1);
        assert_eq!(ProgramKind::Copy.image_count(), 1);
    }

    #[test]
    fn bindings_are_unique_per_program() {
        for kind in [ProgramKind::Difference, ProgramKind::LaplacianOfGaussian] {
            let mut seen: Vec<u32> = kind.uniforms().iter().map(|s| s.binding).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), kind.uniforms().len());
        }
    }
}
