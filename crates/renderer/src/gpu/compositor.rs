use std::sync::Arc;

use scheduler::{Compositor, Dimensions, Frame, PipelineError, TargetKind};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::context::{self, AdapterProfile, GpuContext, GpuOptions};
use super::programs::ProgramKind;
use super::target::{Destination, RenderTarget, Slot};

type SurfaceSlot = Option<(wgpu::Surface<'static>, PhysicalSize<u32>)>;

/// wgpu implementation of [`Compositor`]: three render targets, each with
/// its own device, sharing one adapter.
pub struct GpuCompositor {
    profile: AdapterProfile,
    grayscale: RenderTarget,
    motion: RenderTarget,
    edge: RenderTarget,
    dims: Dimensions,
    _instance: wgpu::Instance,
}

impl GpuCompositor {
    /// Offscreen compositor; canvases are only reachable through readback.
    pub fn headless(options: &GpuOptions) -> Result<Self, PipelineError> {
        let instance = context::create_instance();
        let (adapter, profile) = context::select_adapter(&instance, options, None)?;
        Self::assemble(instance, &adapter, profile, [None, None, None], options)
    }

    /// Compositor presenting to `windows`, ordered as [`TargetKind::ALL`].
    pub fn windowed(options: &GpuOptions, windows: [Arc<Window>; 3]) -> Result<Self, PipelineError> {
        let instance = context::create_instance();
        let mut surfaces = Vec::with_capacity(windows.len());
        for (kind, window) in TargetKind::ALL.into_iter().zip(windows) {
            let size = window.inner_size();
            let surface = instance.create_surface(window).map_err(|err| {
                PipelineError::ContextUnavailable {
                    context: kind.to_string(),
                    reason: err.to_string(),
                }
            })?;
            surfaces.push(Some((surface, size)));
        }

        let primary = surfaces
            .first()
            .and_then(|slot| slot.as_ref())
            .map(|(surface, _)| surface);
        let (adapter, profile) = context::select_adapter(&instance, options, primary)?;

        let surfaces: [SurfaceSlot; 3] =
            surfaces
                .try_into()
                .map_err(|_| PipelineError::ContextUnavailable {
                    context: "window".into(),
                    reason: "expected one window per target".into(),
                })?;
        Self::assemble(instance, &adapter, profile, surfaces, options)
    }

    fn assemble(
        instance: wgpu::Instance,
        adapter: &wgpu::Adapter,
        profile: AdapterProfile,
        surfaces: [SurfaceSlot; 3],
        options: &GpuOptions,
    ) -> Result<Self, PipelineError> {
        let [grayscale_surface, motion_surface, edge_surface] = surfaces;
        let context = |kind, surface| GpuContext::new(adapter, kind, surface, options);

        let grayscale = RenderTarget::new(
            TargetKind::Grayscale,
            context(TargetKind::Grayscale, grayscale_surface)?,
            &[ProgramKind::Grayscale],
            false,
        )?;
        let motion = RenderTarget::new(
            TargetKind::Motion,
            context(TargetKind::Motion, motion_surface)?,
            &[ProgramKind::Difference, ProgramKind::Copy],
            true,
        )?;
        let edge = RenderTarget::new(
            TargetKind::Edge,
            context(TargetKind::Edge, edge_surface)?,
            &[ProgramKind::LaplacianOfGaussian],
            false,
        )?;

        tracing::info!(
            adapter = %profile.name,
            backend = ?profile.backend,
            "GPU compositor ready"
        );
        Ok(Self {
            profile,
            grayscale,
            motion,
            edge,
            dims: Dimensions::PLACEHOLDER,
            _instance: instance,
        })
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.profile
    }

    /// Reconfigures a window surface; canvases keep the frame size.
    pub fn resize_surface(&mut self, target: TargetKind, size: PhysicalSize<u32>) {
        self.target_mut(target).resize_surface(size);
    }

    fn target(&self, target: TargetKind) -> &RenderTarget {
        match target {
            TargetKind::Grayscale => &self.grayscale,
            TargetKind::Motion => &self.motion,
            TargetKind::Edge => &self.edge,
        }
    }

    fn target_mut(&mut self, target: TargetKind) -> &mut RenderTarget {
        match target {
            TargetKind::Grayscale => &mut self.grayscale,
            TargetKind::Motion => &mut self.motion,
            TargetKind::Edge => &mut self.edge,
        }
    }
}

impl Compositor for GpuCompositor {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn target_dimensions(&self, target: TargetKind) -> Dimensions {
        self.target(target).dimensions()
    }

    fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError> {
        if dims == self.dims {
            return Ok(());
        }
        for kind in TargetKind::ALL {
            self.target_mut(kind).resize(dims)?;
        }
        self.dims = dims;
        Ok(())
    }

    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.grayscale.upload(frame)?;
        self.motion.upload(frame)
    }

    fn render_grayscale(&mut self) -> Result<(), PipelineError> {
        self.grayscale
            .draw(ProgramKind::Grayscale, &[Slot::Input], Destination::Canvas)
    }

    fn render_difference(&mut self) -> Result<(), PipelineError> {
        self.motion.draw(
            ProgramKind::Difference,
            &[Slot::Input, Slot::Reference],
            Destination::Canvas,
        )
    }

    fn read_pixels(&mut self, target: TargetKind) -> Result<Frame, PipelineError> {
        self.target(target).read_canvas()
    }

    fn render_edges(&mut self, input: &Frame) -> Result<(), PipelineError> {
        self.edge.upload(input)?;
        self.edge.draw(
            ProgramKind::LaplacianOfGaussian,
            &[Slot::Input],
            Destination::Canvas,
        )
    }

    fn refresh_reference(&mut self) -> Result<(), PipelineError> {
        self.motion.refresh_reference()
    }

    /// Presents every target, reporting the first failure.
    fn present(&mut self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for kind in TargetKind::ALL {
            if let Err(err) = self.target_mut(kind).present() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
