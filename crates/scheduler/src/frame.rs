use std::fmt;
use std::time::Instant;

/// Pixel size shared by frames and render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const PLACEHOLDER: Dimensions = Dimensions {
        width: 1,
        height: 1,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn byte_len(&self) -> usize {
        self.pixel_count() * Frame::BYTES_PER_PIXEL
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero (got {0})")]
    EmptyDimensions(Dimensions),
    #[error("frame {dims} expects {expected} bytes of RGBA8, got {actual}")]
    LengthMismatch {
        dims: Dimensions,
        expected: usize,
        actual: usize,
    },
}

/// A decoded RGBA8 image, rows stored top-first.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    dims: Dimensions,
    pixels: Vec<u8>,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let dims = Dimensions::new(width, height);
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions(dims));
        }
        let expected = dims.byte_len();
        if pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                dims,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { dims, pixels })
    }

    /// Fills every pixel with one colour. Zero dimensions are clamped to 1.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let dims = Dimensions::new(width.max(1), height.max(1));
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(dims.byte_len())
            .collect();
        Self { dims, pixels }
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Returns the RGBA value at `(x, y)`, with `y = 0` the top row.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.dims.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[offset..offset + Self::BYTES_PER_PIXEL]);
        out
    }

    /// Largest absolute per-channel difference over RGB, ignoring alpha.
    pub fn max_rgb_delta(&self, other: &Frame) -> Option<u8> {
        if self.dims != other.dims {
            return None;
        }
        let delta = self
            .pixels
            .chunks_exact(Self::BYTES_PER_PIXEL)
            .zip(other.pixels.chunks_exact(Self::BYTES_PER_PIXEL))
            .flat_map(|(a, b)| (0..3).map(move |c| a[c].abs_diff(b[c])))
            .max()
            .unwrap_or(0);
        Some(delta)
    }

    /// Largest RGB channel value anywhere in the frame.
    pub fn max_rgb(&self) -> u8 {
        self.pixels
            .chunks_exact(Self::BYTES_PER_PIXEL)
            .flat_map(|px| px[..3].iter().copied())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("dims", &self.dims)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// How much media the producer has buffered. Ordered from least to most.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Readiness {
    #[default]
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

impl Readiness {
    /// Frames are consumed only once the producer reports `EnoughData`.
    pub fn can_render(self) -> bool {
        self >= Readiness::EnoughData
    }
}

/// Upstream producer of decoded frames.
pub trait FrameSource {
    /// Lets the producer advance to whatever frame is current at `now`.
    fn poll(&mut self, _now: Instant) {}

    fn readiness(&self) -> Readiness;

    fn current_frame(&self) -> Option<&Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn poll(&mut self, now: Instant) {
        (**self).poll(now)
    }

    fn readiness(&self) -> Readiness {
        (**self).readiness()
    }

    fn current_frame(&self) -> Option<&Frame> {
        (**self).current_frame()
    }
}
