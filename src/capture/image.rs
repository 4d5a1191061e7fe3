//! Capture frame buffer
//!
//! The buffer exchanged with the consumer through the pull/push protocol.
//! Always 4 bytes per pixel (BGRA).

use std::time::Instant;

/// Bytes per pixel of every capture buffer
pub const PIXEL_PITCH: usize = 4;

/// Capture-owned image buffer
#[derive(Debug, Clone, Default)]
pub struct CaptureImage {
    /// Width in pixels
    pub width: usize,
    /// Height in rows
    pub height: usize,
    /// Bytes per row
    pub row_pitch: usize,
    /// Bytes per pixel, always [`PIXEL_PITCH`]
    pub pixel_pitch: usize,
    /// Pixel data, `row_pitch * height` bytes
    pub data: Vec<u8>,
    /// When the frame was captured; `None` until first filled
    pub frame_timestamp: Option<Instant>,
}

impl CaptureImage {
    /// Allocate a zeroed buffer for `width` x `height`
    pub fn new(width: usize, height: usize) -> Self {
        let row_pitch = width * PIXEL_PITCH;
        Self {
            width,
            height,
            row_pitch,
            pixel_pitch: PIXEL_PITCH,
            data: vec![0u8; row_pitch * height],
            frame_timestamp: None,
        }
    }

    /// Whether no pixel storage has been allocated yet
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the buffer already has the geometry of a `width` x `height` frame
    pub fn matches(&self, width: usize, height: usize) -> bool {
        self.row_pitch == width * PIXEL_PITCH
            && self.height == height
            && !self.data.is_empty()
            && self.data.len() == self.row_pitch * height
    }

    /// Resize in place to `width` x `height`
    ///
    /// The allocation is reused when the geometry already matches; otherwise the
    /// old contents are discarded.
    pub fn ensure_geometry(&mut self, width: usize, height: usize) {
        if !self.matches(width, height) {
            self.row_pitch = width * PIXEL_PITCH;
            self.height = height;
            self.data = vec![0u8; self.row_pitch * height];
        }
        self.width = width;
        self.pixel_pitch = PIXEL_PITCH;
    }

    /// Zero every byte of the buffer
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
