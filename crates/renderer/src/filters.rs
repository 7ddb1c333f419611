//! CPU reference implementations of the four filter passes.
//!
//! These define the math the GLSL programs must reproduce (up to 8-bit
//! rounding) and back the software compositor. Channel values are treated
//! as normalised floats in `[0, 1]`, outputs are rounded to the nearest
//! 8-bit value and written with alpha fixed at 255.

use scheduler::Frame;

/// Rec. 601 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Laplacian-of-Gaussian approximation. Rows are `dy = -2..=2`, columns `dx = -2..=2`.
pub const LOG_KERNEL: [[i32; 5]; 5] = [
    [0, 0, -1, 0, 0],
    [0, -1, -2, -1, 0],
    [-1, -2, 16, -2, -1],
    [0, -1, -2, -1, 0],
    [0, 0, -1, 0, 0],
];

const LOG_RADIUS: i32 = 2;

/// Non-zero kernel taps as `(dx, dy, weight)`.
pub fn log_taps() -> impl Iterator<Item = (i32, i32, f32)> {
    LOG_KERNEL.iter().enumerate().flat_map(|(row, weights)| {
        weights
            .iter()
            .enumerate()
            .filter(|(_, weight)| **weight != 0)
            .map(move |(col, weight)| {
                (
                    col as i32 - LOG_RADIUS,
                    row as i32 - LOG_RADIUS,
                    *weight as f32,
                )
            })
    })
}

fn to_unorm(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn channel(value: u8) -> f32 {
    value as f32 / 255.0
}

pub fn grayscale(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    for px in out.pixels_mut().chunks_exact_mut(Frame::BYTES_PER_PIXEL) {
        let luma = LUMA_WEIGHTS[0] * channel(px[0])
            + LUMA_WEIGHTS[1] * channel(px[1])
            + LUMA_WEIGHTS[2] * channel(px[2]);
        let value = to_unorm(luma);
        px[..3].fill(value);
        px[3] = 255;
    }
    out
}

/// Per-channel `|a - b|`. Returns `None` when the frames differ in size.
pub fn difference(a: &Frame, b: &Frame) -> Option<Frame> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let mut out = a.clone();
    for (dst, src) in out
        .pixels_mut()
        .chunks_exact_mut(Frame::BYTES_PER_PIXEL)
        .zip(b.pixels().chunks_exact(Frame::BYTES_PER_PIXEL))
    {
        for c in 0..3 {
            dst[c] = dst[c].abs_diff(src[c]);
        }
        dst[3] = 255;
    }
    Some(out)
}

/// Convolves with [`LOG_KERNEL`], clamping samples to the frame edge, and
/// writes the absolute response.
pub fn laplacian_of_gaussian(frame: &Frame) -> Frame {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    let taps: Vec<_> = log_taps().collect();
    let mut out = frame.clone();
    let pixels = out.pixels_mut();

    for y in 0..height {
        for x in 0..width {
            let mut sum = [0.0f32; 3];
            for &(dx, dy, weight) in &taps {
                let sx = (x + dx).clamp(0, width - 1) as u32;
                let sy = (y + dy).clamp(0, height - 1) as u32;
                let sample = frame.pixel(sx, sy);
                for c in 0..3 {
                    sum[c] += weight * channel(sample[c]);
                }
            }
            let offset = (y as usize * width as usize + x as usize) * Frame::BYTES_PER_PIXEL;
            for c in 0..3 {
                pixels[offset + c] = to_unorm(sum[c].abs());
            }
            pixels[offset + 3] = 255;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    ((x + y) * 7 % 256) as u8,
                    200,
                ]);
            }
        }
        Frame::new(width, height, pixels).unwrap()
    }

    #[test]
    fn kernel_is_zero_sum() {
        let total: i32 = LOG_KERNEL.iter().flatten().sum();
        assert_eq!(total, 0);
        let taps: f32 = log_taps().map(|(_, _, w)| w).sum();
        assert_eq!(taps, 0.0);
        assert_eq!(log_taps().count(), 13);
    }

    #[test]
    fn flat_input_has_no_edges() {
        let frame = Frame::solid(7, 5, [90, 140, 33, 255]);
        let edges = laplacian_of_gaussian(&frame);
        assert_eq!(edges.max_rgb(), 0);
        assert!(edges.pixels().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn grayscale_is_idempotent() {
        let once = grayscale(&gradient(9, 6));
        let twice = grayscale(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn grayscale_writes_equal_channels_and_opaque_alpha() {
        let gray = grayscale(&gradient(4, 4));
        for px in gray.pixels().chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
        }
        let white = grayscale(&Frame::solid(1, 1, [255, 255, 255, 0]));
        assert_eq!(white.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn difference_is_symmetric() {
        let a = gradient(5, 5);
        let b = grayscale(&a);
        assert_eq!(difference(&a, &b), difference(&b, &a));
        assert_eq!(difference(&a, &a).unwrap().max_rgb(), 0);
        assert!(difference(&a, &gradient(4, 5)).is_none());
    }

    #[test]
    fn isolated_point_hits_centre_weight() {
        let mut frame = Frame::solid(5, 5, [0, 0, 0, 255]);
        let offset = (2 * 5 + 2) * 4;
        frame.pixels_mut()[offset..offset + 3].copy_from_slice(&[16, 16, 16]);
        let edges = laplacian_of_gaussian(&frame);
        assert_eq!(edges.pixel(2, 2)[0], 255);
        // The ring around the point sees the negative lobe.
        assert_eq!(edges.pixel(2, 1)[0], 32);
        assert_eq!(edges.pixel(2, 0)[0], 16);
    }

    #[test]
    fn vertical_edge_produces_response() {
        let mut frame = Frame::solid(8, 4, [0, 0, 0, 255]);
        for y in 0..4 {
            for x in 4..8 {
                let offset = ((y * 8 + x) * 4) as usize;
                frame.pixels_mut()[offset..offset + 3].fill(200);
            }
        }
        let edges = laplacian_of_gaussian(&frame);
        assert!(edges.pixel(4, 2)[0] > 0);
        assert!(edges.pixel(3, 2)[0] > 0);
        assert_eq!(edges.pixel(0, 2)[0], 0);
        assert_eq!(edges.pixel(7, 2)[0], 0);
    }
}
