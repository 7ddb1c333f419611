use bytemuck::{Pod, Zeroable};
use scheduler::{Dimensions, PipelineError, TargetKind};
use wgpu::util::DeviceExt;

/// Storage format for every input, reference and canvas texture.
pub(crate) const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub dims: Dimensions,
}

/// Allocates an RGBA8 texture sized exactly to `dims`, sampled with
/// clamp-to-edge and linear filtering. Contents are undefined.
pub(crate) fn create_texture(
    device: &wgpu::Device,
    target: TargetKind,
    dims: Dimensions,
    label: &str,
) -> Result<Texture, PipelineError> {
    let max_dimension = device.limits().max_texture_dimension_2d;
    if dims.width > max_dimension || dims.height > max_dimension {
        return Err(PipelineError::ResourceExhausted {
            target,
            reason: format!("{label} needs {dims} but the device limit is {max_dimension}px"),
        });
    }

    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: dims.width.max(1),
            height: dims.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(PipelineError::ResourceExhausted {
            target,
            reason: format!("{label}: {err}"),
        });
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    Ok(Texture {
        texture,
        view,
        sampler,
        dims,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

struct Attachment {
    view: wgpu::TextureView,
    dims: Dimensions,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
}

/// Offscreen draw destination. The attachment is bound per use.
pub(crate) struct Framebuffer {
    label: String,
    attachment: Option<Attachment>,
}

impl Framebuffer {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            attachment: None,
        }
    }

    pub(crate) fn attach(&mut self, texture: &Texture) {
        self.attachment = Some(Attachment {
            view: texture.view.clone(),
            dims: texture.dims,
            format: texture.texture.format(),
            usage: texture.texture.usage(),
        });
    }

    pub(crate) fn detach(&mut self) {
        self.attachment = None;
    }

    pub(crate) fn status(&self) -> FramebufferStatus {
        let Some(attachment) = &self.attachment else {
            return FramebufferStatus::Incomplete(format!("{} has no colour attachment", self.label));
        };
        if !attachment.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            return FramebufferStatus::Incomplete(format!(
                "{} attachment is not renderable",
                self.label
            ));
        }
        if attachment.format != CANVAS_FORMAT {
            return FramebufferStatus::Incomplete(format!(
                "{} attachment format {:?} is not {:?}",
                self.label, attachment.format, CANVAS_FORMAT
            ));
        }
        if attachment.dims.width == 0 || attachment.dims.height == 0 {
            return FramebufferStatus::Incomplete(format!(
                "{} attachment has zero size",
                self.label
            ));
        }
        FramebufferStatus::Complete
    }

    /// The attachment view, or why it cannot be drawn to.
    pub(crate) fn complete_view(&self) -> Result<&wgpu::TextureView, PipelineError> {
        match (self.status(), &self.attachment) {
            (FramebufferStatus::Complete, Some(attachment)) => Ok(&attachment.view),
            (FramebufferStatus::Incomplete(reason), _) => {
                Err(PipelineError::FramebufferIncomplete { reason })
            }
            (FramebufferStatus::Complete, None) => Err(PipelineError::FramebufferIncomplete {
                reason: format!("{} has no colour attachment", self.label),
            }),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

const fn vertex(x: f32, y: f32, u: f32, v: f32) -> QuadVertex {
    QuadVertex {
        position: [x, y],
        tex_coord: [u, v],
    }
}

/// Two triangles covering clip space; `(0, 0)` texcoord sits bottom-left.
pub(crate) const QUAD_VERTICES: [QuadVertex; 6] = [
    vertex(-1.0, -1.0, 0.0, 0.0),
    vertex(1.0, -1.0, 1.0, 0.0),
    vertex(-1.0, 1.0, 0.0, 1.0),
    vertex(-1.0, 1.0, 0.0, 1.0),
    vertex(1.0, -1.0, 1.0, 0.0),
    vertex(1.0, 1.0, 1.0, 1.0),
];

pub(crate) struct QuadGeometry {
    pub buffer: wgpu::Buffer,
}

impl QuadGeometry {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub(crate) fn new(device: &wgpu::Device, label: &str) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { buffer }
    }

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    pub(crate) fn vertex_count(&self) -> u32 {
        QUAD_VERTICES.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unattached_framebuffer_is_incomplete() {
        let framebuffer = Framebuffer::new("delay framebuffer");
        assert!(matches!(
            framebuffer.status(),
            FramebufferStatus::Incomplete(reason) if reason.contains("no colour attachment")
        ));
        assert!(matches!(
            framebuffer.complete_view(),
            Err(PipelineError::FramebufferIncomplete { .. })
        ));
    }

    #[test]
    fn quad_covers_clip_space_with_bottom_left_origin() {
        assert_eq!(QUAD_VERTICES.len(), 6);
        let origin = QUAD_VERTICES
            .iter()
            .find(|v| v.position == [-1.0, -1.0])
            .unwrap();
        assert_eq!(origin.tex_coord, [0.0, 0.0]);
        for v in &QUAD_VERTICES {
            assert_eq!(v.tex_coord[0], (v.position[0] + 1.0) / 2.0);
            assert_eq!(v.tex_coord[1], (v.position[1] + 1.0) / 2.0);
        }
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }
}
