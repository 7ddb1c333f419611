use scheduler::{Dimensions, Frame, PipelineError, TargetKind};
use winit::dpi::PhysicalSize;

use super::blit;
use super::context::GpuContext;
use super::programs::{Program, ProgramKind, ProgramRegistry};
use super::resources::{self, Framebuffer, FramebufferStatus, QuadGeometry, Texture};
use super::uniforms::ResolutionUniform;

/// Textures a draw can sample from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Input,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    Canvas,
    /// The offscreen framebuffer with whatever is attached to it.
    Framebuffer,
}

/// One output of the pipeline: its own context, programs, quad and textures.
pub(crate) struct RenderTarget {
    kind: TargetKind,
    context: GpuContext,
    registry: ProgramRegistry,
    present_program: Option<Program>,
    quad: QuadGeometry,
    resolution: wgpu::Buffer,
    input: Texture,
    reference: Option<Texture>,
    canvas: Texture,
    readback: wgpu::Buffer,
    framebuffer: Framebuffer,
    dims: Dimensions,
}

impl RenderTarget {
    pub(crate) fn new(
        kind: TargetKind,
        context: GpuContext,
        programs: &[ProgramKind],
        with_reference: bool,
    ) -> Result<Self, PipelineError> {
        let device = &context.device;
        let registry = ProgramRegistry::build(device, programs)?;
        let present_program = context
            .surface_format()
            .map(|format| registry.build_program(device, ProgramKind::Copy, format))
            .transpose()?;

        let quad = QuadGeometry::new(device, &format!("{kind} quad"));
        let resolution = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("resolution uniform"),
            size: ResolutionUniform::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let dims = Dimensions::PLACEHOLDER;
        let input = resources::create_texture(device, kind, dims, &format!("{kind} input"))?;
        let canvas = resources::create_texture(device, kind, dims, &format!("{kind} canvas"))?;
        let readback = blit::readback_buffer(device, dims, &format!("{kind} readback"));
        let reference = with_reference
            .then(|| resources::create_texture(device, kind, dims, &format!("{kind} reference")))
            .transpose()?;
        context.queue.write_buffer(
            &resolution,
            0,
            bytemuck::bytes_of(&ResolutionUniform::new(dims)),
        );

        Ok(Self {
            kind,
            registry,
            present_program,
            quad,
            resolution,
            input,
            reference,
            canvas,
            readback,
            framebuffer: Framebuffer::new(format!("{kind} framebuffer")),
            dims,
            context,
        })
    }

    pub(crate) fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Recreates every texture at `dims`; unchanged dimensions are a no-op.
    pub(crate) fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError> {
        if dims == self.dims {
            return Ok(());
        }
        let device = &self.context.device;
        let kind = self.kind;
        self.framebuffer.detach();
        self.input = resources::create_texture(device, kind, dims, &format!("{kind} input"))?;
        self.canvas = resources::create_texture(device, kind, dims, &format!("{kind} canvas"))?;
        self.readback = blit::readback_buffer(device, dims, &format!("{kind} readback"));
        if self.reference.is_some() {
            self.reference = Some(resources::create_texture(
                device,
                kind,
                dims,
                &format!("{kind} reference"),
            )?);
        }
        self.context.queue.write_buffer(
            &self.resolution,
            0,
            bytemuck::bytes_of(&ResolutionUniform::new(dims)),
        );
        tracing::debug!(render_target = %kind, from = %self.dims, to = %dims, "resized textures");
        self.dims = dims;
        Ok(())
    }

    pub(crate) fn upload(&self, frame: &Frame) -> Result<(), PipelineError> {
        blit::upload_frame(&self.context.queue, &self.input, frame, self.kind)
    }

    fn texture(&self, slot: Slot) -> Result<&Texture, PipelineError> {
        match slot {
            Slot::Input => Ok(&self.input),
            Slot::Reference => {
                self.reference
                    .as_ref()
                    .ok_or_else(|| PipelineError::FramebufferIncomplete {
                        reason: format!("{} target keeps no reference texture", self.kind),
                    })
            }
        }
    }

    /// One full-screen quad draw of `program` sampling `inputs` in order.
    pub(crate) fn draw(
        &self,
        program: ProgramKind,
        inputs: &[Slot],
        destination: Destination,
    ) -> Result<(), PipelineError> {
        let program = self.registry.get(program)?;
        debug_assert_eq!(inputs.len(), program.kind().image_count());
        let images = inputs
            .iter()
            .map(|slot| self.texture(*slot))
            .collect::<Result<Vec<_>, _>>()?;
        let bind_group = program.bind_group(&self.context.device, &images, Some(&self.resolution))?;
        let view = match destination {
            Destination::Canvas => &self.canvas.view,
            Destination::Framebuffer => self.framebuffer.complete_view()?,
        };
        draw_quad(&self.context, program, &bind_group, &self.quad, view);
        Ok(())
    }

    pub(crate) fn read_canvas(&self) -> Result<Frame, PipelineError> {
        blit::read_texture(
            &self.context.device,
            &self.context.queue,
            &self.canvas,
            &self.readback,
            self.kind,
        )
    }

    /// Copies the input texture into the reference through the framebuffer.
    pub(crate) fn refresh_reference(&mut self) -> Result<(), PipelineError> {
        match self.reference.as_ref() {
            Some(reference) => self.framebuffer.attach(reference),
            None => self.framebuffer.detach(),
        }
        if let FramebufferStatus::Incomplete(reason) = self.framebuffer.status() {
            return Err(PipelineError::FramebufferIncomplete { reason });
        }
        self.draw(ProgramKind::Copy, &[Slot::Input], Destination::Framebuffer)
    }

    /// Blits the canvas to the window surface. Headless targets keep the
    /// canvas only.
    pub(crate) fn present(&mut self) -> Result<(), PipelineError> {
        let Some(program) = self.present_program.as_ref() else {
            return Ok(());
        };
        let Some(frame) = self.context.acquire_frame()? else {
            return Ok(());
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = program.bind_group(&self.context.device, &[&self.canvas], None)?;
        draw_quad(&self.context, program, &bind_group, &self.quad, &view);
        frame.present();
        Ok(())
    }

    pub(crate) fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.context.resize_surface(size);
    }
}

fn draw_quad(
    context: &GpuContext,
    program: &Program,
    bind_group: &wgpu::BindGroup,
    quad: &QuadGeometry,
    view: &wgpu::TextureView,
) {
    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(program.kind().label()),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.kind().label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, quad.buffer.slice(..));
        pass.draw(0..quad.vertex_count(), 0..1);
    }
    context.queue.submit(Some(encoder.finish()));
}
