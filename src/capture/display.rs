//! Camera capture session
//!
//! [`CameraDisplay`] ties the pipeline together: it negotiates the device,
//! opens the decoder and runs the paced capture loop that fills the host's
//! buffers.
//!
//! ```text
//! pull buffer → read packet → decode → convert to BGRA → push buffer
//!      ↑                                                      │
//!      └──────────────────── paced by FramePacer ─────────────┘
//! ```

use crate::capture::decoder::CodecContext;
use crate::capture::discovery::DEFAULT_DEVICE;
use crate::capture::image::CaptureImage;
use crate::capture::negotiator::{find_input_driver, FormatContext, InputDriver};
use crate::capture::pacing::{FramePacer, SleepOvershootLogger};
use crate::capture::scaler::ScaleContext;
use crate::capture::stats::CaptureStats;
use crate::config::VideoConfig;
use crate::error::{CaptureError, Result};
use crate::platform::{
    CaptureStatus, Display, EncodeDevice, EncoderPixelFormat, PullFreeImage, PushCapturedImage,
};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Geometry assumed before the stream reports its own
const DEFAULT_WIDTH: usize = 1280;
const DEFAULT_HEIGHT: usize = 720;

/// V4L2 camera capture session
pub struct CameraDisplay {
    device: String,
    format: FormatContext,
    codec: CodecContext,
    scaler: ScaleContext,
    /// Time between paced frames
    delay: Duration,
    width: usize,
    height: usize,
    env_width: usize,
    env_height: usize,
    stats: CaptureStats,
    overshoot: SleepOvershootLogger,
}

impl CameraDisplay {
    /// Create an uninitialised session for `device`
    pub fn new(device: impl Into<String>) -> Self {
        let delay = VideoConfig::default().frame_interval();
        Self {
            device: device.into(),
            format: FormatContext::new(),
            codec: CodecContext::new(),
            scaler: ScaleContext::new(),
            delay,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            env_width: DEFAULT_WIDTH,
            env_height: DEFAULT_HEIGHT,
            stats: CaptureStats::default(),
            overshoot: SleepOvershootLogger::new(delay),
        }
    }

    /// Negotiate the device and open the decoder
    pub fn init(&mut self, driver: Option<&dyn InputDriver>, config: &VideoConfig) -> Result<()> {
        self.delay = config.frame_interval();
        self.overshoot = SleepOvershootLogger::new(self.delay);

        self.format.open(driver, &self.device, config)?;

        let codecpar = self
            .format
            .stream()
            .map(|s| s.codecpar)
            .ok_or(CaptureError::NoVideoStream)?;

        self.set_geometry(codecpar.width as usize, codecpar.height as usize);

        self.codec.open(Some(&codecpar))?;

        info!("PiCamera: capturing from {}", self.device);
        Ok(())
    }

    /// Device path of this session
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Interval between paced frames
    pub fn frame_interval(&self) -> Duration {
        self.delay
    }

    /// Statistics of this session
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            avg_overshoot_ms: self.overshoot.average_ms(),
            max_overshoot_ms: self.overshoot.max_ms(),
            ..self.stats.clone()
        }
    }

    /// Release scaler, decoder and device. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.scaler.close();
        self.codec.close();
        self.format.close();
    }

    fn set_geometry(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.env_width = width;
        self.env_height = height;
    }

    /// Read, decode and convert one frame into `img`
    fn read_frame(&mut self, img: &mut CaptureImage) -> CaptureStatus {
        let packet = match self.format.read_packet() {
            Ok(packet) => packet,
            Err(CaptureError::WouldBlock) => return CaptureStatus::Timeout,
            Err(e) => {
                error!("PiCamera: read_packet failed: {}", e);
                return CaptureStatus::Error;
            }
        };

        if Some(packet.stream_index) != self.format.index() {
            trace!("Discarding packet from stream #{}", packet.stream_index);
            self.stats.packets_discarded += 1;
            return CaptureStatus::Timeout;
        }

        let frame = match self.codec.decode(&packet) {
            Ok(frame) => frame,
            Err(CaptureError::WouldBlock) => return CaptureStatus::Timeout,
            Err(e) => {
                error!("PiCamera: decode failed: {}", e);
                return CaptureStatus::Error;
            }
        };

        let (width, height) = (frame.width as usize, frame.height as usize);
        if (width, height) != (self.width, self.height) {
            debug!(
                "Frame geometry changed: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.stats.geometry_changes += 1;
        }
        self.set_geometry(width, height);

        if self
            .scaler
            .configure(frame.width, frame.height, frame.format, frame.width, frame.height)
            .is_err()
        {
            return CaptureStatus::Error;
        }

        img.ensure_geometry(width, height);

        if let Err(e) = self.scaler.scale(&frame, &mut img.data, img.row_pitch) {
            error!("PiCamera: color conversion failed: {}", e);
            return CaptureStatus::Error;
        }

        img.frame_timestamp = Some(Instant::now());
        CaptureStatus::Ok
    }
}

impl Display for CameraDisplay {
    fn capture(
        &mut self,
        push: &mut PushCapturedImage<'_>,
        pull: &mut PullFreeImage<'_>,
        _cursor: bool,
    ) -> CaptureStatus {
        let mut pacer = FramePacer::new(self.delay, Instant::now());
        self.overshoot.reset();

        let status = loop {
            pacer.wait(&mut self.overshoot);

            let Some(mut img) = pull() else {
                break CaptureStatus::Interrupted;
            };

            match self.read_frame(&mut img) {
                CaptureStatus::Ok => {
                    self.stats.frames_captured += 1;
                    if !push(img, true) {
                        break CaptureStatus::Ok;
                    }
                }
                CaptureStatus::Timeout => {
                    self.stats.timeouts += 1;
                    if !push(img, false) {
                        break CaptureStatus::Ok;
                    }
                }
                status => break status,
            }
        };

        info!("PiCamera: capture stopped ({:?}): {}", status, self.stats());
        status
    }

    fn alloc_img(&self) -> CaptureImage {
        CaptureImage::new(self.width, self.height)
    }

    fn dummy_img(&self, img: &mut CaptureImage) -> Result<()> {
        if img.is_empty() {
            if self.width == 0 || self.height == 0 {
                return Err(CaptureError::Image("no frame geometry yet".into()));
            }
            *img = CaptureImage::new(self.width, self.height);
        }
        img.clear();
        Ok(())
    }

    fn make_encode_device(&self, pix_fmt: EncoderPixelFormat) -> Option<EncodeDevice> {
        Some(EncodeDevice {
            pix_fmt: Some(pix_fmt),
        })
    }

    fn is_codec_supported(&self, _codec: &str, _config: &VideoConfig) -> bool {
        true
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn env_width(&self) -> usize {
        self.env_width
    }

    fn env_height(&self) -> usize {
        self.env_height
    }
}

impl Drop for CameraDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open a capture session on `device` (empty = default device)
///
/// Uses the V4L2 input driver. Returns `None` if negotiation or decoder setup
/// fails; the reason is logged.
pub fn create_display(device: &str, config: &VideoConfig) -> Option<CameraDisplay> {
    let driver = find_input_driver("v4l2");
    create_display_with_driver(driver.as_deref(), device, config)
}

/// Open a capture session through an explicit input driver
pub fn create_display_with_driver(
    driver: Option<&dyn InputDriver>,
    device: &str,
    config: &VideoConfig,
) -> Option<CameraDisplay> {
    let resolved = if device.is_empty() { DEFAULT_DEVICE } else { device };

    let mut display = CameraDisplay::new(resolved);
    if let Err(e) = display.init(driver, config) {
        error!("PiCamera: failed to initialise capture on {}: {}", resolved, e);
        return None;
    }
    Some(display)
}
