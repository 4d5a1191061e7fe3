//! picamera-capture
//!
//! V4L2 camera backend for a pluggable screen/video capture layer.
//!
//! ## Architecture
//!
//! The backend opens a camera, negotiates its stream, decodes the compressed
//! (or raw) frames and converts them to packed BGRA. Frames are delivered at a
//! fixed rate through a pull/push buffer exchange with the host.
//!
//! ### Modules
//!
//! - `capture`: negotiation, decoding, color conversion and the capture loop
//! - `platform`: the [`Display`] contract shared by capture backends
//! - `config`: requested geometry and frame rate
//! - `error`: error types
//!
//! ## Example
//!
//! ```rust
//! use picamera_capture::{display_names, VideoConfig};
//!
//! // Never empty: falls back to /dev/video0
//! assert!(!display_names().is_empty());
//!
//! let config = VideoConfig::from_json(r#"{"width": 1280, "height": 720}"#).unwrap();
//! assert_eq!(config.video_size(), Some((1280, 720)));
//! ```

// Re-export commonly used types
pub use capture::{
    create_display, create_display_with_driver, display_names, initialize, CameraDisplay,
    CaptureImage, CaptureStats,
};
pub use config::VideoConfig;
pub use error::{CaptureError, Result};
pub use platform::{CaptureStatus, Display, EncodeDevice, EncoderPixelFormat};

// Public modules
pub mod capture;
pub mod config;
pub mod error;
pub mod platform;

use tracing::info;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a `tracing` subscriber filtered by `log_level`
///
/// Invalid filter strings fall back to `info`. Fails if a global subscriber is
/// already installed.
pub fn init_logging(log_level: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| CaptureError::Other(format!("Failed to initialize logging: {}", e)))?;

    info!("picamera-capture initialized with log level: {}", log_level);
    Ok(())
}
