use bytemuck::{Pod, Zeroable};
use scheduler::Dimensions;

/// std140 mirror of the `Resolution` block in the Laplacian-of-Gaussian stage.
///
/// `vec2` occupies 8 bytes; the trailing pad keeps the buffer at the 16-byte
/// granularity uniform bindings expect.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub(crate) struct ResolutionUniform {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

impl ResolutionUniform {
    pub(crate) const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub(crate) fn new(dims: Dimensions) -> Self {
        Self {
            resolution: [dims.width as f32, dims.height as f32],
            _padding: [0.0; 2],
        }
    }
}
