//! Capture backend contract
//!
//! Every capture backend (this V4L2 camera backend among them) implements
//! [`Display`]. The host drives capture through a pull/push exchange of
//! [`CaptureImage`] buffers:
//!
//! - `pull` lends the backend a free buffer, or returns `None` to stop capture.
//! - `push` hands a buffer back, flagged with whether it holds a new frame, and
//!   returns `false` when the host wants no more frames.
//!
//! Buffers move by value, so a pushed buffer is owned by the host until it is
//! lent out again.

use crate::capture::CaptureImage;
use crate::config::VideoConfig;
use crate::error::Result;

/// Outcome of a capture call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Host declined further frames
    Ok,
    /// Host stopped supplying buffers
    Interrupted,
    /// No new frame this tick; never returned from [`Display::capture`]
    Timeout,
    /// Unrecoverable failure, the session must be recreated
    Error,
}

/// Pixel formats an encoder may ask a backend to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderPixelFormat {
    Yuv420p,
    Yuv420p10,
    Nv12,
    P010,
    Yuv444p,
    Yuv444p16,
}

/// Encoder-side adapter returned by [`Display::make_encode_device`]
///
/// This backend performs no conversion of its own; the adapter only records the
/// requested format so the encoder converts from the BGRA capture buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeDevice {
    pub pix_fmt: Option<EncoderPixelFormat>,
}

/// Host callback receiving a filled (or unfilled) buffer
pub type PushCapturedImage<'a> = dyn FnMut(CaptureImage, bool) -> bool + 'a;

/// Host callback lending a free buffer
pub type PullFreeImage<'a> = dyn FnMut() -> Option<CaptureImage> + 'a;

/// A capture backend
pub trait Display {
    /// Run the capture loop until the host stops it or an error occurs
    ///
    /// Returns [`CaptureStatus::Ok`], [`CaptureStatus::Interrupted`] or
    /// [`CaptureStatus::Error`].
    fn capture(
        &mut self,
        push: &mut PushCapturedImage<'_>,
        pull: &mut PullFreeImage<'_>,
        cursor: bool,
    ) -> CaptureStatus;

    /// A new buffer sized to the current geometry
    fn alloc_img(&self) -> CaptureImage;

    /// Zero-fill `img`, allocating it at the current geometry if empty
    fn dummy_img(&self, img: &mut CaptureImage) -> Result<()>;

    /// Encoder adapter for `pix_fmt`
    fn make_encode_device(&self, pix_fmt: EncoderPixelFormat) -> Option<EncodeDevice>;

    /// Whether the encoder may use `codec` with this backend
    fn is_codec_supported(&self, codec: &str, config: &VideoConfig) -> bool;

    /// Width of the most recent frame
    fn width(&self) -> usize;

    /// Height of the most recent frame
    fn height(&self) -> usize;

    /// Width advertised to the host for input mapping
    fn env_width(&self) -> usize {
        self.width()
    }

    /// Height advertised to the host for input mapping
    fn env_height(&self) -> usize {
        self.height()
    }
}
