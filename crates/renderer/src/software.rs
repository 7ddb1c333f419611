use scheduler::{Compositor, Dimensions, Frame, PipelineError, TargetKind};

use crate::filters;

/// CPU compositor built on [`crate::filters`].
///
/// Mirrors the GPU pipeline texture-for-texture, which makes it the oracle
/// for tests and a fallback for machines without a usable adapter.
pub struct SoftwareCompositor {
    dims: Dimensions,
    current: Frame,
    reference: Frame,
    grayscale: Frame,
    motion: Frame,
    edge_input: Frame,
    edge: Frame,
    presented: u64,
}

impl Default for SoftwareCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareCompositor {
    pub fn new() -> Self {
        let dims = Dimensions::PLACEHOLDER;
        let blank = blank(dims);
        Self {
            dims,
            current: blank.clone(),
            reference: blank.clone(),
            grayscale: blank.clone(),
            motion: blank.clone(),
            edge_input: blank.clone(),
            edge: blank,
            presented: 0,
        }
    }

    pub fn canvas(&self, target: TargetKind) -> &Frame {
        match target {
            TargetKind::Grayscale => &self.grayscale,
            TargetKind::Motion => &self.motion,
            TargetKind::Edge => &self.edge,
        }
    }

    pub fn reference(&self) -> &Frame {
        &self.reference
    }

    pub fn edge_input(&self) -> &Frame {
        &self.edge_input
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn check_size(&self, target: TargetKind, frame: &Frame) -> Result<(), PipelineError> {
        if frame.dimensions() == self.dims {
            Ok(())
        } else {
            Err(PipelineError::FrameSizeMismatch {
                target,
                frame: frame.dimensions(),
                expected: self.dims,
            })
        }
    }
}

fn blank(dims: Dimensions) -> Frame {
    Frame::solid(dims.width, dims.height, [0, 0, 0, 0])
}

impl Compositor for SoftwareCompositor {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn target_dimensions(&self, target: TargetKind) -> Dimensions {
        self.canvas(target).dimensions()
    }

    fn resize(&mut self, dims: Dimensions) -> Result<(), PipelineError> {
        if dims == self.dims {
            return Ok(());
        }
        let fresh = blank(dims);
        self.current = fresh.clone();
        self.reference = fresh.clone();
        self.grayscale = fresh.clone();
        self.motion = fresh.clone();
        self.edge_input = fresh.clone();
        self.edge = fresh;
        self.dims = dims;
        Ok(())
    }

    fn upload_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.check_size(TargetKind::Grayscale, frame)?;
        self.current.clone_from(frame);
        Ok(())
    }

    fn render_grayscale(&mut self) -> Result<(), PipelineError> {
        self.grayscale = filters::grayscale(&self.current);
        Ok(())
    }

    fn render_difference(&mut self) -> Result<(), PipelineError> {
        if let Some(motion) = filters::difference(&self.current, &self.reference) {
            self.motion = motion;
        }
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetKind) -> Result<Frame, PipelineError> {
        Ok(self.canvas(target).clone())
    }

    fn render_edges(&mut self, input: &Frame) -> Result<(), PipelineError> {
        self.check_size(TargetKind::Edge, input)?;
        self.edge_input.clone_from(input);
        self.edge = filters::laplacian_of_gaussian(input);
        Ok(())
    }

    fn refresh_reference(&mut self) -> Result<(), PipelineError> {
        self.reference.clone_from(&self.current);
        Ok(())
    }

    fn present(&mut self) -> Result<(), PipelineError> {
        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_reallocates_every_target() {
        let mut compositor = SoftwareCompositor::new();
        compositor.resize(Dimensions::new(6, 4)).unwrap();
        for target in TargetKind::ALL {
            assert_eq!(compositor.target_dimensions(target), Dimensions::new(6, 4));
        }
        assert_eq!(compositor.reference().dimensions(), Dimensions::new(6, 4));
    }

    #[test]
    fn reference_follows_refresh_only() {
        let mut compositor = SoftwareCompositor::new();
        compositor.resize(Dimensions::new(2, 2)).unwrap();
        compositor
            .upload_frame(&Frame::solid(2, 2, [100, 0, 0, 255]))
            .unwrap();
        compositor.refresh_reference().unwrap();
        compositor
            .upload_frame(&Frame::solid(2, 2, [40, 0, 0, 255]))
            .unwrap();
        compositor.render_difference().unwrap();
        assert_eq!(
            compositor.canvas(TargetKind::Motion).pixel(1, 1),
            [60, 0, 0, 255]
        );
    }

    #[test]
    fn mismatched_frames_are_rejected_without_touching_current() {
        let mut compositor = SoftwareCompositor::new();
        compositor.resize(Dimensions::new(4, 4)).unwrap();
        compositor
            .upload_frame(&Frame::solid(4, 4, [200, 200, 200, 255]))
            .unwrap();

        let err = compositor
            .upload_frame(&Frame::solid(8, 8, [0, 0, 0, 255]))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FrameSizeMismatch { target: TargetKind::Grayscale, .. }
        ));
        compositor.render_grayscale().unwrap();
        let gray = compositor.canvas(TargetKind::Grayscale);
        assert_eq!(gray.dimensions(), Dimensions::new(4, 4));
        assert!(gray.pixel(0, 0)[0] >= 199, "current frame was replaced");

        let err = compositor
            .render_edges(&Frame::solid(8, 8, [0, 0, 0, 255]))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FrameSizeMismatch { target: TargetKind::Edge, .. }
        ));
    }
}
