//! Error types for picamera-capture

use std::io;
use thiserror::Error;

/// Result type alias using CaptureError
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Capture error types
///
/// Every failure of the negotiation, decode and conversion stages maps to one
/// of these variants. Native error codes never leave the module that produced
/// them; they are logged and folded into a message here.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No data available yet (not a failure)
    #[error("Resource temporarily unavailable")]
    WouldBlock,

    /// Input driver not available
    #[error("Input driver not found: {0}")]
    DriverNotFound(String),

    /// Device does not exist
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to open the device
    #[error("Failed to open device: {0}")]
    Open(String),

    /// Failed to read stream information
    #[error("Failed to probe stream info: {0}")]
    Probe(String),

    /// No usable video stream
    #[error("No video stream found")]
    NoVideoStream,

    /// Failed to read from the input
    #[error("Read error: {0}")]
    Read(String),

    /// Codec parameters were not supplied
    #[error("Codec parameters missing")]
    MissingParameters,

    /// No decoder for the codec
    #[error("Decoder not available for {0}")]
    DecoderNotFound(String),

    /// Decoder context allocation failed
    #[error("Failed to allocate decoder context: {0}")]
    DecoderAlloc(String),

    /// Codec parameters rejected by the decoder
    #[error("Failed to initialise decoder context: {0}")]
    DecoderParameters(String),

    /// Decoder failed to open
    #[error("Failed to open decoder: {0}")]
    DecoderOpen(String),

    /// Decode error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Scaler / color conversion error
    #[error("Scaler error: {0}")]
    Scaler(String),

    /// Frame buffer error
    #[error("Image error: {0}")]
    Image(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CaptureError {
    /// Create an Open error
    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    /// Create a Probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a Read error
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Create a Decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a Scaler error
    pub fn scaler(msg: impl Into<String>) -> Self {
        Self::Scaler(msg.into())
    }

    /// Create an Other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this is the "try again later" signal rather than a failure
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}
