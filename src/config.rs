//! Capture configuration
//!
//! The requested geometry and frame rate a host hands to
//! [`create_display`](crate::create_display). Zero (or negative) fields mean
//! "use the device default".

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requested capture configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Desired width in pixels (0 = device default)
    pub width: i32,
    /// Desired height in pixels (0 = device default)
    pub height: i32,
    /// Desired frame rate (0 = device default, pacing falls back to 1 fps)
    pub framerate: i32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            framerate: 30,
        }
    }
}

impl VideoConfig {
    /// Create config for 720p @ 30fps
    pub fn hd_720p() -> Self {
        Self {
            width: 1280,
            height: 720,
            framerate: 30,
        }
    }

    /// Create config for 1080p @ 30fps
    pub fn fhd_1080p() -> Self {
        Self {
            width: 1920,
            height: 1080,
            framerate: 30,
        }
    }

    /// Parse a config from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Requested `(width, height)` if both are positive
    pub fn video_size(&self) -> Option<(u32, u32)> {
        if self.width > 0 && self.height > 0 {
            Some((self.width as u32, self.height as u32))
        } else {
            None
        }
    }

    /// Requested frame rate if positive
    pub fn requested_framerate(&self) -> Option<u32> {
        (self.framerate > 0).then_some(self.framerate as u32)
    }

    /// Time between two paced frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.framerate.max(1) as u32
    }
}
