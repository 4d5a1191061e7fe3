//! Decoding
//!
//! [`CodecContext`] owns the decoder bound to the negotiated stream. Packets go
//! in through [`VideoDecoder::send_packet`], frames come out of
//! [`VideoDecoder::receive_frame`]; "no frame yet" is
//! [`CaptureError::WouldBlock`].

use crate::capture::frame::{PixelFormat, VideoFrame};
use crate::capture::negotiator::{CodecId, CodecParameters, Packet};
use crate::error::{CaptureError, Result};
use image::ImageFormat;
use tracing::{debug, error, trace};

/// A stateful decoder for one codec
pub trait VideoDecoder {
    /// Decoder name for logs
    fn name(&self) -> &str;

    /// Transfer stream parameters into the decoder
    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()>;

    /// Finish initialisation; called once after [`set_parameters`](Self::set_parameters)
    fn open(&mut self) -> Result<()>;

    /// Submit one unit
    fn send_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Take the next decoded frame, or [`CaptureError::WouldBlock`]
    fn receive_frame(&mut self) -> Result<VideoFrame>;
}

/// Decoders compiled into this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    Mjpeg,
    #[cfg(feature = "video")]
    H264,
    Raw(PixelFormat),
}

impl DecoderKind {
    /// Allocate a fresh decoder instance
    pub fn alloc(&self) -> Result<Box<dyn VideoDecoder>> {
        match self {
            DecoderKind::Mjpeg => Ok(Box::new(MjpegDecoder::new())),
            #[cfg(feature = "video")]
            DecoderKind::H264 => Ok(Box::new(crate::capture::h264_decoder::H264Decoder::new()?)),
            DecoderKind::Raw(format) => Ok(Box::new(RawDecoder::new(*format))),
        }
    }
}

/// Find a decoder for `codec_id`
pub fn find_decoder(codec_id: CodecId) -> Option<DecoderKind> {
    match codec_id {
        CodecId::Mjpeg => Some(DecoderKind::Mjpeg),
        #[cfg(feature = "video")]
        CodecId::H264 => Some(DecoderKind::H264),
        CodecId::RawYuyv => Some(DecoderKind::Raw(PixelFormat::YUYV)),
        CodecId::RawNv12 => Some(DecoderKind::Raw(PixelFormat::NV12)),
        CodecId::RawI420 => Some(DecoderKind::Raw(PixelFormat::I420)),
        CodecId::RawRgb24 => Some(DecoderKind::Raw(PixelFormat::RGB24)),
        _ => None,
    }
}

/// Decode context bound to one stream
///
/// Created empty; [`open`](Self::open) either fully succeeds or leaves the
/// context unusable. The decoder is released on drop.
#[derive(Default)]
pub struct CodecContext {
    decoder: Option<Box<dyn VideoDecoder>>,
    codec_id: Option<CodecId>,
    frames_decoded: u64,
}

impl CodecContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a decoder to `params`
    pub fn open(&mut self, params: Option<&CodecParameters>) -> Result<()> {
        self.decoder = None;
        self.codec_id = None;

        let result = Self::open_decoder(params);
        match result {
            Ok(decoder) => {
                debug!("Opened {} decoder", decoder.name());
                self.codec_id = params.map(|p| p.codec_id);
                self.decoder = Some(decoder);
                Ok(())
            }
            Err(e) => {
                error!("PiCamera: {}", e);
                Err(e)
            }
        }
    }

    fn open_decoder(params: Option<&CodecParameters>) -> Result<Box<dyn VideoDecoder>> {
        let params = params.ok_or(CaptureError::MissingParameters)?;
        let kind = find_decoder(params.codec_id)
            .ok_or_else(|| CaptureError::DecoderNotFound(params.codec_id.to_string()))?;

        let mut decoder = kind.alloc()?;
        decoder.set_parameters(params)?;
        decoder.open()?;
        Ok(decoder)
    }

    /// The opened decoder, `None` if [`open`](Self::open) has not succeeded
    pub fn get(&mut self) -> Option<&mut (dyn VideoDecoder + 'static)> {
        self.decoder.as_deref_mut()
    }

    /// Codec of the opened decoder
    pub fn codec_id(&self) -> Option<CodecId> {
        self.codec_id
    }

    /// Submit a packet and pull the resulting frame
    pub fn decode(&mut self, packet: &Packet) -> Result<VideoFrame> {
        let decoder = self
            .decoder
            .as_deref_mut()
            .ok_or_else(|| CaptureError::decode("decoder not opened"))?;
        decoder.send_packet(packet)?;
        let frame = decoder.receive_frame()?;
        self.frames_decoded += 1;
        Ok(frame)
    }

    /// Number of frames decoded
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Release the decoder. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            debug!(
                "Closing {} decoder ({} frames decoded)",
                decoder.name(),
                self.frames_decoded
            );
        }
        self.codec_id = None;
    }
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Motion JPEG decoder
///
/// Every packet is a complete JPEG image, so a frame is ready after each send.
pub struct MjpegDecoder {
    pending: Option<VideoFrame>,
}

impl MjpegDecoder {
    pub fn new() -> Self {
        Self { pending: None }
    }
}

impl Default for MjpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecoder for MjpegDecoder {
    fn name(&self) -> &str {
        "mjpeg"
    }

    fn set_parameters(&mut self, _params: &CodecParameters) -> Result<()> {
        // JPEG frames carry their own geometry
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        trace!("Decoding JPEG: {} bytes", packet.data.len());
        let rgb = image::load_from_memory_with_format(&packet.data, ImageFormat::Jpeg)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = VideoFrame::from_data(width, height, PixelFormat::RGB24, rgb.into_raw())
            .ok_or_else(|| CaptureError::decode("JPEG output shorter than its geometry"))?;
        self.pending = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<VideoFrame> {
        self.pending.take().ok_or(CaptureError::WouldBlock)
    }
}

/// Passthrough decoder for uncompressed formats
///
/// Rows padded by the driver are repacked. A packet whose size differs from
/// the negotiated frame size is rejected.
pub struct RawDecoder {
    format: PixelFormat,
    width: u32,
    height: u32,
    /// Bytes per line of the first plane; 0 when tightly packed
    stride: usize,
    pending: Option<VideoFrame>,
}

impl RawDecoder {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            width: 0,
            height: 0,
            stride: 0,
            pending: None,
        }
    }

    fn expected_size(&self) -> usize {
        if self.stride == 0 {
            self.format.buffer_size(self.width, self.height)
        } else {
            self.format.strided_size(self.width, self.height, self.stride)
        }
    }
}

impl VideoDecoder for RawDecoder {
    fn name(&self) -> &str {
        "rawvideo"
    }

    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()> {
        if params.width == 0 || params.height == 0 {
            return Err(CaptureError::DecoderParameters(format!(
                "invalid raw frame size {}x{}",
                params.width, params.height
            )));
        }
        self.width = params.width;
        self.height = params.height;
        self.stride = params.stride as usize;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::DecoderOpen("frame size not set".into()));
        }
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let expected = self.expected_size();
        if packet.data.len() != expected {
            return Err(CaptureError::decode(format!(
                "{} frame size mismatch: got {} bytes, expected {}",
                self.format,
                packet.data.len(),
                expected
            )));
        }
        let frame = if self.stride == 0 {
            VideoFrame::from_data(self.width, self.height, self.format, packet.data.clone())
        } else {
            VideoFrame::from_strided(self.width, self.height, self.format, &packet.data, self.stride)
        }
        .ok_or_else(|| {
            CaptureError::decode(format!(
                "{} stride {} too short for width {}",
                self.format, self.stride, self.width
            ))
        })?;
        self.pending = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<VideoFrame> {
        self.pending.take().ok_or(CaptureError::WouldBlock)
    }
}
