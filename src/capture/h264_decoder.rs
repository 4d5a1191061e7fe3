//! H.264 Video Decoder
//!
//! Wrapper around OpenH264 for decoding Annex B access units from UVC cameras
//! that expose an `H264` capture format.

use crate::capture::decoder::VideoDecoder;
use crate::capture::frame::{PixelFormat, VideoFrame};
use crate::capture::negotiator::{CodecParameters, Packet};
use crate::error::{CaptureError, Result};
use openh264::decoder::{DecodedYUV, Decoder};
use openh264::formats::YUVSource;
use tracing::{debug, trace};

/// H.264 decoder
pub struct H264Decoder {
    /// OpenH264 decoder instance
    decoder: Decoder,
    /// Most recent picture not yet taken by `receive_frame`
    pending: Option<VideoFrame>,
    /// Frame counter for statistics
    frames_decoded: u64,
}

impl H264Decoder {
    /// Create a new H.264 decoder
    pub fn new() -> Result<Self> {
        let decoder = Decoder::new().map_err(|e| CaptureError::DecoderAlloc(format!("{:?}", e)))?;

        Ok(Self {
            decoder,
            pending: None,
            frames_decoded: 0,
        })
    }

    /// Get number of frames decoded
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Check if data has H.264 start code
    fn has_start_code(data: &[u8]) -> bool {
        data.starts_with(&[0, 0, 1]) || data.starts_with(&[0, 0, 0, 1])
    }

    /// Copy OpenH264 output into a tightly packed I420 frame
    fn yuv_to_frame(yuv: &DecodedYUV<'_>) -> Result<VideoFrame> {
        let (width, height) = yuv.dimensions();
        let (y_stride, u_stride, v_stride) = yuv.strides();
        let chroma_w = (width + 1) / 2;
        let chroma_h = (height + 1) / 2;

        let mut data = Vec::with_capacity(width * height + chroma_w * chroma_h * 2);
        copy_plane(&mut data, yuv.y(), y_stride, width, height)?;
        copy_plane(&mut data, yuv.u(), u_stride, chroma_w, chroma_h)?;
        copy_plane(&mut data, yuv.v(), v_stride, chroma_w, chroma_h)?;

        VideoFrame::from_data(width as u32, height as u32, PixelFormat::I420, data)
            .ok_or_else(|| CaptureError::decode("decoded picture shorter than its geometry"))
    }
}

/// Append `rows` rows of `width` bytes from a strided plane
fn copy_plane(out: &mut Vec<u8>, plane: &[u8], stride: usize, width: usize, rows: usize) -> Result<()> {
    for row in 0..rows {
        let start = row * stride;
        let src = plane
            .get(start..start + width)
            .ok_or_else(|| CaptureError::decode("decoded plane shorter than its stride"))?;
        out.extend_from_slice(src);
    }
    Ok(())
}

impl VideoDecoder for H264Decoder {
    fn name(&self) -> &str {
        "h264 (openh264)"
    }

    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()> {
        // SPS/PPS arrive in-band; the negotiated size is only informative
        debug!("H.264 stream advertised as {}x{}", params.width, params.height);
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        if !Self::has_start_code(&packet.data) {
            return Err(CaptureError::decode("H.264 unit missing start code"));
        }

        trace!("Decoding H.264 access unit: {} bytes", packet.data.len());

        let maybe_yuv = self
            .decoder
            .decode(&packet.data)
            .map_err(|e| CaptureError::decode(format!("{:?}", e)))?;

        if let Some(yuv) = maybe_yuv {
            let frame = Self::yuv_to_frame(&yuv)?;
            self.frames_decoded += 1;
            self.pending = Some(frame);
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<VideoFrame> {
        // No picture yet is normal until the first IDR
        self.pending.take().ok_or(CaptureError::WouldBlock)
    }
}
