use crate::error::PipelineError;
use crate::frame::{Dimensions, Frame};
use crate::mode::TargetKind;

/// The per-tick operations a rendering backend must provide.
///
/// Every method acts on the current frame size. The scheduler guarantees
/// `resize` is called before any other operation on a tick whose frame size
/// differs from [`Compositor::dimensions`].
pub trait Compositor {
    /// Size shared by all targets.
    fn dimensions(&self) -> Dimensions;

    fn target_dimensions(&self, target: TargetKind) -> Dimensions;

    /// Recreates every texture at `dims`. Unchanged dimensions are a no-op.
    fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError>;

    /// Uploads the producer frame as "current" for the grayscale and motion targets.
    /// A frame whose size differs from [`Compositor::dimensions`] is rejected
    /// with [`PipelineError::FrameSizeMismatch`] and nothing is uploaded.
    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PipelineError>;

    fn render_grayscale(&mut self) -> Result<(), PipelineError>;

    /// Draws `|current - reference|` to the motion canvas.
    fn render_difference(&mut self) -> Result<(), PipelineError>;

    /// Blocking readback of a target's canvas, rows top-first.
    fn read_pixels(&mut self, target: TargetKind) -> Result<Frame, PipelineError>;

    /// Uploads `input` to the edge target and runs the Laplacian-of-Gaussian pass.
    /// Size mismatches are rejected the same way as [`Compositor::upload_frame`].
    fn render_edges(&mut self, input: &Frame) -> Result<(), PipelineError>;

    /// Copies current into the delayed reference through an offscreen target.
    fn refresh_reference(&mut self) -> Result<(), PipelineError>;

    fn present(&mut self) -> Result<(), PipelineError>;
}

impl<C: Compositor + ?Sized> Compositor for Box<C> {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn target_dimensions(&self, target: TargetKind) -> Dimensions {
        (**self).target_dimensions(target)
    }

    fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError> {
        (**self).resize(dims)
    }

    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        (**self).upload_frame(frame)
    }

    fn render_grayscale(&mut self) -> Result<(), PipelineError> {
        (**self).render_grayscale()
    }

    fn render_difference(&mut self) -> Result<(), PipelineError> {
        (**self).render_difference()
    }

    fn read_pixels(&mut self, target: TargetKind) -> Result<Frame, PipelineError> {
        (**self).read_pixels(target)
    }

    fn render_edges(&mut self, input: &Frame) -> Result<(), PipelineError> {
        (**self).render_edges(input)
    }

    fn refresh_reference(&mut self) -> Result<(), PipelineError> {
        (**self).refresh_reference()
    }

    fn present(&mut self) -> Result<(), PipelineError> {
        (**self).present()
    }
}
