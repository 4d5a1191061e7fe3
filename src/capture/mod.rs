//! Camera Capture Module
//!
//! Pulls video from a V4L2 camera, decodes it and delivers BGRA frames to the
//! host at a paced rate.
//!
//! ## Architecture
//!
//! ```text
//! DeviceProbe → FormatContext (negotiation) → CodecContext (decode)
//!                        │                           │
//!                        └──── CameraDisplay ────────┘ → ScaleContext (BGRA)
//!                                   │
//!                         pull/push CaptureImage with the host
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use picamera_capture::{create_display, CaptureImage, Display, VideoConfig};
//!
//! let mut display = create_display("", &VideoConfig::hd_720p()).expect("no camera");
//! let mut frames = 0;
//! let status = display.capture(
//!     &mut |img: CaptureImage, fresh: bool| {
//!         if fresh {
//!             frames += 1;
//!         }
//!         frames < 100
//!     },
//!     &mut || Some(CaptureImage::default()),
//!     false,
//! );
//! ```
//!
//! ## Feature Flag
//!
//! The V4L2 driver and the H.264 decoder live behind the default `video`
//! feature. Without it no camera can be opened and [`initialize`] reports the
//! backend as unavailable:
//! ```toml
//! picamera-capture = { version = "0.1", default-features = false }
//! ```

mod decoder;
mod discovery;
mod display;
mod frame;
#[cfg(feature = "video")]
mod h264_decoder;
mod image;
mod negotiator;
mod pacing;
mod scaler;
mod stats;
#[cfg(feature = "video")]
mod v4l2;

pub use decoder::{find_decoder, CodecContext, DecoderKind, MjpegDecoder, RawDecoder, VideoDecoder};
pub use discovery::{display_names, initialize, DeviceProbe, DEFAULT_DEVICE, MAX_PROBED_DEVICES};
pub use display::{create_display, create_display_with_driver, CameraDisplay};
pub use frame::{PixelFormat, VideoFrame};
#[cfg(feature = "video")]
pub use h264_decoder::H264Decoder;
pub use self::image::{CaptureImage, PIXEL_PITCH};
pub use negotiator::{
    find_best_stream, find_input_driver, CaptureHints, CodecId, CodecParameters, FormatContext,
    InputContext, InputDriver, MediaType, Packet, StreamInfo,
};
pub use pacing::{FramePacer, SleepOvershootLogger};
pub use scaler::{ScaleContext, DESTINATION_FORMAT};
pub use stats::CaptureStats;
#[cfg(feature = "video")]
pub use v4l2::V4l2Driver;
