//! Color conversion
//!
//! [`ScaleContext`] converts decoded frames into the packed BGRA layout of the
//! capture buffers. It is keyed by source geometry/format and destination
//! geometry; reconfiguring with an unchanged key is a no-op.
//!
//! YUV input uses BT.601 limited-range coefficients. When the destination size
//! differs from the source, the converted picture is resampled bilinearly.

use crate::capture::frame::{PixelFormat, VideoFrame};
use crate::capture::image::PIXEL_PITCH;
use crate::error::{CaptureError, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};
use tracing::{debug, error};

/// Destination format of every conversion
pub const DESTINATION_FORMAT: PixelFormat = PixelFormat::Bgra32;

/// Conversion parameters a context is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleKey {
    pub src_width: u32,
    pub src_height: u32,
    pub src_format: PixelFormat,
    pub dst_width: u32,
    pub dst_height: u32,
}

impl ScaleKey {
    fn needs_resample(&self) -> bool {
        self.src_width != self.dst_width || self.src_height != self.dst_height
    }
}

/// Cached color conversion context
#[derive(Debug, Default)]
pub struct ScaleContext {
    key: Option<ScaleKey>,
    /// Full-size BGRA picture used when resampling
    scratch: Vec<u8>,
    reconfigurations: u64,
}

impl ScaleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure for a conversion, reusing the context if nothing changed
    pub fn configure(
        &mut self,
        src_width: u32,
        src_height: u32,
        src_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<()> {
        let key = ScaleKey {
            src_width,
            src_height,
            src_format,
            dst_width,
            dst_height,
        };
        if self.key == Some(key) {
            return Ok(());
        }

        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            self.close();
            error!("PiCamera: failed to configure scaler for {:?}", key);
            return Err(CaptureError::scaler(format!(
                "invalid conversion {}x{} -> {}x{}",
                src_width, src_height, dst_width, dst_height
            )));
        }

        debug!(
            "Configuring scaler: {}x{} {} -> {}x{} {}",
            src_width, src_height, src_format, dst_width, dst_height, DESTINATION_FORMAT
        );
        self.scratch.clear();
        self.key = Some(key);
        self.reconfigurations += 1;
        Ok(())
    }

    /// Current configuration
    pub fn key(&self) -> Option<ScaleKey> {
        self.key
    }

    /// How many times the context was rebuilt
    pub fn reconfigurations(&self) -> u64 {
        self.reconfigurations
    }

    /// Convert `frame` into `dst`, rows `dst_row_pitch` bytes apart
    pub fn scale(&mut self, frame: &VideoFrame, dst: &mut [u8], dst_row_pitch: usize) -> Result<()> {
        let key = self
            .key
            .ok_or_else(|| CaptureError::scaler("scaler not configured"))?;

        if frame.width != key.src_width
            || frame.height != key.src_height
            || frame.format != key.src_format
        {
            return Err(CaptureError::scaler(format!(
                "frame {}x{} {} does not match scaler input {}x{} {}",
                frame.width, frame.height, frame.format, key.src_width, key.src_height, key.src_format
            )));
        }

        let dst_w = key.dst_width as usize;
        let dst_h = key.dst_height as usize;
        if dst_row_pitch < dst_w * PIXEL_PITCH || dst.len() < dst_row_pitch * dst_h {
            return Err(CaptureError::scaler(format!(
                "destination of {} bytes (pitch {}) too small for {}x{}",
                dst.len(),
                dst_row_pitch,
                dst_w,
                dst_h
            )));
        }

        if !key.needs_resample() {
            return convert_into(frame, dst, dst_row_pitch);
        }

        let src_pitch = frame.width as usize * PIXEL_PITCH;
        self.scratch.resize(src_pitch * frame.height as usize, 0);
        convert_into(frame, &mut self.scratch, src_pitch)?;

        // Channel order is irrelevant to the filter; BGRA rides in an Rgba buffer
        let view: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, self.scratch.as_slice())
                .ok_or_else(|| CaptureError::scaler("scratch buffer too small"))?;
        let resized = imageops::resize(&view, key.dst_width, key.dst_height, FilterType::Triangle);

        let row_bytes = dst_w * PIXEL_PITCH;
        for (row, src) in resized.as_raw().chunks_exact(row_bytes).enumerate() {
            let start = row * dst_row_pitch;
            dst[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    /// Drop the configuration. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.key = None;
        self.scratch = Vec::new();
    }
}

impl Drop for ScaleContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Convert a whole frame to BGRA without resampling
fn convert_into(frame: &VideoFrame, dst: &mut [u8], dst_row_pitch: usize) -> Result<()> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if frame.data.len() < frame.format.buffer_size(frame.width, frame.height) {
        return Err(CaptureError::scaler("source frame shorter than its geometry"));
    }

    let y_size = frame.strides[0] * height;
    for row in 0..height {
        let out = &mut dst[row * dst_row_pitch..row * dst_row_pitch + width * PIXEL_PITCH];
        match frame.format {
            PixelFormat::Bgra32 => {
                let start = row * frame.strides[0];
                out.copy_from_slice(&frame.data[start..start + width * PIXEL_PITCH]);
            }
            PixelFormat::RGB24 => {
                let src = &frame.data[row * frame.strides[0]..];
                for (x, px) in out.chunks_exact_mut(PIXEL_PITCH).enumerate() {
                    px.copy_from_slice(&[src[x * 3 + 2], src[x * 3 + 1], src[x * 3], 0xFF]);
                }
            }
            PixelFormat::YUYV => {
                let src = &frame.data[row * frame.strides[0]..];
                for (x, px) in out.chunks_exact_mut(PIXEL_PITCH).enumerate() {
                    let pair = (x / 2) * 4;
                    let y = src[pair + (x & 1) * 2];
                    write_yuv(px, y, src[pair + 1], src[pair + 3]);
                }
            }
            PixelFormat::I420 => {
                let chroma_rows = (height + 1) / 2;
                let y_row = &frame.data[row * frame.strides[0]..];
                let u_plane = &frame.data[y_size..];
                let v_plane = &frame.data[y_size + frame.strides[1] * chroma_rows..];
                let u_row = &u_plane[(row / 2) * frame.strides[1]..];
                let v_row = &v_plane[(row / 2) * frame.strides[2]..];
                for (x, px) in out.chunks_exact_mut(PIXEL_PITCH).enumerate() {
                    write_yuv(px, y_row[x], u_row[x / 2], v_row[x / 2]);
                }
            }
            PixelFormat::NV12 => {
                let y_row = &frame.data[row * frame.strides[0]..];
                let uv_row = &frame.data[y_size + (row / 2) * frame.strides[1]..];
                for (x, px) in out.chunks_exact_mut(PIXEL_PITCH).enumerate() {
                    let c = (x / 2) * 2;
                    write_yuv(px, y_row[x], uv_row[c], uv_row[c + 1]);
                }
            }
        }
    }
    Ok(())
}

/// Write one BT.601 limited-range YUV sample as BGRA
#[inline]
fn write_yuv(px: &mut [u8], y: u8, u: u8, v: u8) {
    let c = (y as i32 - 16).max(0) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (c + 409 * e + 128) >> 8;
    let g = (c - 100 * d - 208 * e + 128) >> 8;
    let b = (c + 516 * d + 128) >> 8;

    px[0] = b.clamp(0, 255) as u8;
    px[1] = g.clamp(0, 255) as u8;
    px[2] = r.clamp(0, 255) as u8;
    px[3] = 0xFF;
}
