//! Moving pixels between the CPU and a context's textures.
//!
//! Contexts share no GPU objects, so a canvas reaches another target by
//! reading it back here and uploading the bytes again.

use crossbeam_channel::bounded;
use image::RgbaImage;
use scheduler::{Dimensions, Frame, PipelineError, TargetKind};

use super::resources::Texture;

/// Uploads `frame` into `texture`, flipping rows so texture row 0 holds the
/// bottom of the image. A frame of another size is rejected untouched.
pub(crate) fn upload_frame(
    queue: &wgpu::Queue,
    texture: &Texture,
    frame: &Frame,
    target: TargetKind,
) -> Result<(), PipelineError> {
    let mismatch = || PipelineError::FrameSizeMismatch {
        target,
        frame: frame.dimensions(),
        expected: texture.dims,
    };
    if frame.dimensions() != texture.dims {
        return Err(mismatch());
    }
    let mut flipped = RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .ok_or_else(mismatch)?;
    image::imageops::flip_vertical_in_place(&mut flipped);

    queue.write_texture(
        texture.texture.as_image_copy(),
        flipped.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(frame.width() * Frame::BYTES_PER_PIXEL as u32),
            rows_per_image: Some(frame.height()),
        },
        wgpu::Extent3d {
            width: frame.width(),
            height: frame.height(),
            depth_or_array_layers: 1,
        },
    );
    Ok(())
}

/// Row pitch for texture-to-buffer copies, rounded up to wgpu's alignment.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * Frame::BYTES_PER_PIXEL as u32;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Mappable buffer large enough to read back a `dims` texture.
pub(crate) fn readback_buffer(device: &wgpu::Device, dims: Dimensions, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: u64::from(padded_bytes_per_row(dims.width)) * u64::from(dims.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    })
}

/// Blocking readback of `texture` through `buffer`, which must come from
/// [`readback_buffer`] at the texture's size. Returns rows in storage order,
/// which for render targets is top-first.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &Texture,
    buffer: &wgpu::Buffer,
    target: TargetKind,
) -> Result<Frame, PipelineError> {
    let readback_error = |reason: String| PipelineError::Readback { target, reason };
    let dims = texture.dims;
    let padded = padded_bytes_per_row(dims.width);
    let unpadded = (dims.width as usize) * Frame::BYTES_PER_PIXEL;
    let size = u64::from(padded) * u64::from(dims.height);
    if buffer.size() < size {
        return Err(readback_error(format!(
            "buffer holds {} bytes, {dims} needs {size}",
            buffer.size()
        )));
    }

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(dims.height),
            },
        },
        wgpu::Extent3d {
            width: dims.width,
            height: dims.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..size);
    let (tx, rx) = bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| readback_error(err.to_string()))?;
    rx.recv()
        .map_err(|_| readback_error("map callback never ran".into()))?
        .map_err(|err| readback_error(err.to_string()))?;

    let mut pixels = Vec::with_capacity(unpadded * dims.height as usize);
    {
        let mapped = slice.get_mapped_range();
        for row in mapped.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded]);
        }
    }
    buffer.unmap();

    Frame::new(dims.width, dims.height, pixels).map_err(|err| readback_error(err.to_string()))
}
