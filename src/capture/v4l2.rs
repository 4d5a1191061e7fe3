//! V4L2 Capture Input
//!
//! [`InputDriver`] backed by the kernel's Video4Linux2 capture API. The device
//! is opened with the `v4l` crate, the requested geometry and frame rate are
//! applied as format/parameter requests (the driver may adjust them) and frames
//! are read from a memory-mapped buffer queue.
//!
//! ## Prerequisites
//!
//! The user needs read/write access to the device node, usually through the
//! `video` group:
//!
//! ```bash
//! sudo usermod -a -G video $USER
//! ```

use crate::capture::negotiator::{
    CaptureHints, CodecId, CodecParameters, InputContext, InputDriver, MediaType, Packet,
    StreamInfo,
};
use crate::error::{CaptureError, Result};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;

/// Number of mmap buffers queued with the driver
const BUFFER_COUNT: u32 = 4;

/// The V4L2 stream is always the single stream of the device
const STREAM_INDEX: usize = 0;

/// V4L2 input driver
#[derive(Debug, Default)]
pub struct V4l2Driver;

impl V4l2Driver {
    pub fn new() -> Self {
        Self
    }
}

impl InputDriver for V4l2Driver {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open_input(&self, device: &Path, hints: &CaptureHints) -> Result<Box<dyn InputContext>> {
        info!("Opening V4L2 capture device {}", device.display());

        if !device.exists() {
            return Err(CaptureError::DeviceNotFound(device.display().to_string()));
        }

        let dev = Device::with_path(device).map_err(|e| open_error(device, e))?;

        let caps = dev
            .query_caps()
            .map_err(|e| CaptureError::open(format!("VIDIOC_QUERYCAP: {}", e)))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CaptureError::open(format!(
                "{} ({}) is not a video capture device",
                device.display(),
                caps.card
            )));
        }
        debug!("V4L2 device: card={}, driver={}", caps.card, caps.driver);

        if let Some((width, height)) = hints.video_size {
            let mut fmt = dev
                .format()
                .map_err(|e| CaptureError::open(format!("VIDIOC_G_FMT: {}", e)))?;
            fmt.width = width;
            fmt.height = height;
            let applied = dev
                .set_format(&fmt)
                .map_err(|e| CaptureError::open(format!("VIDIOC_S_FMT: {}", e)))?;
            if applied.width != width || applied.height != height {
                info!(
                    "Driver adjusted requested size {}x{} to {}x{}",
                    width, height, applied.width, applied.height
                );
            }
        }

        if let Some(fps) = hints.framerate {
            // Not every driver exposes frame interval control
            if let Err(e) = dev.set_params(&Parameters::with_fps(fps)) {
                warn!("Could not set frame rate {} (using device default): {}", fps, e);
            }
        }

        Ok(Box::new(V4l2Input {
            stream: None,
            device: dev,
            read_timeout: hints.read_timeout,
        }))
    }
}

/// An opened V4L2 capture device
struct V4l2Input {
    /// Declared before `device` so buffers are unmapped first
    stream: Option<MmapStream<'static>>,
    device: Device,
    read_timeout: Duration,
}

impl V4l2Input {
    fn start_stream(&mut self) -> Result<&mut MmapStream<'static>> {
        if self.stream.is_none() {
            let mut stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|e| CaptureError::probe(format!("failed to map capture buffers: {}", e)))?;
            stream.set_timeout(self.read_timeout);
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| CaptureError::other("capture stream unavailable"))
    }
}

impl InputContext for V4l2Input {
    fn find_stream_info(&mut self) -> Result<Vec<StreamInfo>> {
        let fmt = self
            .device
            .format()
            .map_err(|e| CaptureError::probe(format!("VIDIOC_G_FMT: {}", e)))?;

        let framerate = self
            .device
            .params()
            .ok()
            .filter(|p| p.interval.numerator > 0)
            .map(|p| p.interval.denominator / p.interval.numerator);

        self.start_stream()?;

        Ok(vec![StreamInfo {
            index: STREAM_INDEX,
            media_type: MediaType::Video,
            codecpar: CodecParameters {
                codec_id: CodecId::from_fourcc(&fmt.fourcc.repr),
                width: fmt.width,
                height: fmt.height,
                stride: fmt.stride,
                framerate,
            },
        }])
    }

    fn read_packet(&mut self) -> Result<Packet> {
        let stream = self.start_stream()?;
        match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                if used == 0 {
                    trace!("Empty V4L2 buffer (seq {})", meta.sequence);
                    return Err(CaptureError::WouldBlock);
                }
                Ok(Packet::new(STREAM_INDEX, buf[..used].to_vec()))
            }
            Err(e) => Err(read_error(e)),
        }
    }
}

fn open_error(device: &Path, e: io::Error) -> CaptureError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        CaptureError::open(format!(
            "permission denied for {}, try adding user to 'video' group",
            device.display()
        ))
    } else {
        CaptureError::open(e.to_string())
    }
}

/// Timeouts and interrupted waits mean "no frame yet"; anything else is fatal
fn read_error(e: io::Error) -> CaptureError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
            CaptureError::WouldBlock
        }
        _ => CaptureError::read(format!("VIDIOC_DQBUF: {}", e)),
    }
}
