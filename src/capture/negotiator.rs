//! Stream Negotiation
//!
//! Opens a capture device through an [`InputDriver`], passes the requested
//! geometry and frame rate as hints, probes the streams the device exposes and
//! selects the one to decode.
//!
//! The driver is a trait so that the V4L2 implementation (feature `video`) and
//! other inputs can be swapped without touching the capture loop.

use crate::config::VideoConfig;
use crate::error::{CaptureError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Kind of media carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
    Data,
}

/// Codec identity of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// Motion JPEG
    Mjpeg,
    /// H.264 Annex B
    H264,
    /// Uncompressed YUYV 4:2:2
    RawYuyv,
    /// Uncompressed NV12
    RawNv12,
    /// Uncompressed I420 (YU12)
    RawI420,
    /// Uncompressed RGB24
    RawRgb24,
    /// Anything else, keeps the fourcc for diagnostics
    Unknown([u8; 4]),
}

impl CodecId {
    /// Map a V4L2 fourcc to a codec id
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"MJPG" | b"JPEG" => CodecId::Mjpeg,
            b"H264" => CodecId::H264,
            b"YUYV" => CodecId::RawYuyv,
            b"NV12" => CodecId::RawNv12,
            b"YU12" => CodecId::RawI420,
            b"RGB3" => CodecId::RawRgb24,
            other => CodecId::Unknown(*other),
        }
    }

    /// Whether this crate ships a decoder for the codec
    pub fn is_known(&self) -> bool {
        !matches!(self, CodecId::Unknown(_))
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecId::Mjpeg => write!(f, "MJPEG"),
            CodecId::H264 => write!(f, "H264"),
            CodecId::RawYuyv => write!(f, "rawvideo (YUYV)"),
            CodecId::RawNv12 => write!(f, "rawvideo (NV12)"),
            CodecId::RawI420 => write!(f, "rawvideo (I420)"),
            CodecId::RawRgb24 => write!(f, "rawvideo (RGB24)"),
            CodecId::Unknown(fourcc) => write!(f, "unknown ({})", String::from_utf8_lossy(fourcc)),
        }
    }
}

/// Codec parameters of a negotiated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParameters {
    pub codec_id: CodecId,
    pub width: u32,
    pub height: u32,
    /// Bytes per line of the first plane for raw formats; 0 means tightly packed
    pub stride: u32,
    /// Frame rate reported by the driver, if any
    pub framerate: Option<u32>,
}

/// One stream exposed by an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub media_type: MediaType,
    pub codecpar: CodecParameters,
}

/// A compressed (or raw) unit read from an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Stream the unit belongs to
    pub stream_index: usize,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(stream_index: usize, data: Vec<u8>) -> Self {
        Self { stream_index, data }
    }
}

/// Options handed to the driver when opening a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHints {
    /// Requested `(width, height)`; `None` keeps the device default
    pub video_size: Option<(u32, u32)>,
    /// Requested frame rate; `None` keeps the device default
    pub framerate: Option<u32>,
    /// How long a single read may block before reporting "no data yet"
    pub read_timeout: Duration,
}

impl CaptureHints {
    /// Derive hints from a requested configuration
    ///
    /// Only positive width/height pairs and positive frame rates become hints.
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            video_size: config.video_size(),
            framerate: config.requested_framerate(),
            read_timeout: config.frame_interval(),
        }
    }
}

/// An opened input
pub trait InputContext {
    /// Probe the streams the input provides
    fn find_stream_info(&mut self) -> Result<Vec<StreamInfo>>;

    /// Read the next unit
    ///
    /// Returns [`CaptureError::WouldBlock`] when nothing is ready yet.
    fn read_packet(&mut self) -> Result<Packet>;
}

/// A driver able to open inputs of one kind
pub trait InputDriver {
    /// Short driver name (e.g. `v4l2`)
    fn name(&self) -> &str;

    /// Open `device`, applying `hints` where the device allows it
    fn open_input(&self, device: &Path, hints: &CaptureHints) -> Result<Box<dyn InputContext>>;
}

/// Look up an input driver by name
///
/// Returns `None` if the driver was not compiled in.
pub fn find_input_driver(name: &str) -> Option<Box<dyn InputDriver>> {
    match name {
        #[cfg(feature = "video")]
        "v4l2" => Some(Box::new(crate::capture::v4l2::V4l2Driver::new())),
        _ => None,
    }
}

/// Pick the stream to decode
///
/// Video streams only; decodable codecs win over unknown ones, then the largest
/// picture wins. Ties keep the lowest index.
pub fn find_best_stream(streams: &[StreamInfo]) -> Option<usize> {
    streams
        .iter()
        .filter(|s| s.media_type == MediaType::Video)
        .max_by_key(|s| {
            (
                s.codecpar.codec_id.is_known(),
                s.codecpar.width as u64 * s.codecpar.height as u64,
                std::cmp::Reverse(s.index),
            )
        })
        .map(|s| s.index)
}

/// Negotiated device handle
///
/// Owns the opened input and the selected stream. Closing is idempotent and
/// happens automatically on drop.
#[derive(Default)]
pub struct FormatContext {
    input: Option<Box<dyn InputContext>>,
    streams: Vec<StreamInfo>,
    stream_index: Option<usize>,
    device: PathBuf,
}

impl FormatContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `device` through `driver` and select the best video stream
    ///
    /// Any failure is terminal: the context is closed again before returning.
    pub fn open(
        &mut self,
        driver: Option<&dyn InputDriver>,
        device: &str,
        config: &VideoConfig,
    ) -> Result<()> {
        self.close();

        let result = self.try_open(driver, device, config);
        if let Err(ref e) = result {
            error!("PiCamera: negotiation with {} failed: {}", device, e);
            self.close();
        }
        result
    }

    fn try_open(
        &mut self,
        driver: Option<&dyn InputDriver>,
        device: &str,
        config: &VideoConfig,
    ) -> Result<()> {
        let driver = driver.ok_or_else(|| CaptureError::DriverNotFound("v4l2".into()))?;

        let hints = CaptureHints::from_config(config);
        debug!(
            "Opening {} with driver {} (video_size={:?}, framerate={:?})",
            device,
            driver.name(),
            hints.video_size,
            hints.framerate
        );

        let mut input = driver.open_input(Path::new(device), &hints)?;
        let streams = input.find_stream_info()?;
        let index = find_best_stream(&streams).ok_or(CaptureError::NoVideoStream)?;

        self.device = PathBuf::from(device);
        self.input = Some(input);
        self.streams = streams;
        self.stream_index = Some(index);

        if let Some(stream) = self.stream() {
            info!(
                "PiCamera: negotiated stream #{} on {}: {} {}x{}",
                index,
                device,
                stream.codecpar.codec_id,
                stream.codecpar.width,
                stream.codecpar.height
            );
        }
        Ok(())
    }

    /// Release the input. Safe to call when nothing is open.
    pub fn close(&mut self) {
        if self.input.take().is_some() {
            debug!("Closing input {}", self.device.display());
        }
        self.streams.clear();
        self.stream_index = None;
    }

    /// Whether an input is open
    pub fn is_open(&self) -> bool {
        self.input.is_some()
    }

    /// The selected stream, if negotiated
    pub fn stream(&self) -> Option<&StreamInfo> {
        let index = self.stream_index?;
        self.streams.iter().find(|s| s.index == index)
    }

    /// Index of the selected stream
    pub fn index(&self) -> Option<usize> {
        self.stream_index
    }

    /// Device path of the open input
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Read the next unit from the open input
    pub fn read_packet(&mut self) -> Result<Packet> {
        match self.input.as_mut() {
            Some(input) => input.read_packet(),
            None => Err(CaptureError::read("input not open")),
        }
    }
}

impl Drop for FormatContext {
    fn drop(&mut self) {
        self.close();
    }
}
