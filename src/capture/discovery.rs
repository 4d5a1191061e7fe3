//! Device Discovery
//!
//! Filesystem probing for `/dev/videoN` nodes. Independent of any open session.

use crate::capture::negotiator::find_input_driver;
use std::path::Path;
use tracing::debug;

/// Device used when the host does not name one
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// Number of `/dev/videoN` indices probed
pub const MAX_PROBED_DEVICES: usize = 8;

/// Probes a small, bounded set of numbered device nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProbe {
    /// Path prefix the index is appended to
    prefix: String,
    /// Indices `0..count` are probed
    count: usize,
    /// Returned when nothing exists
    fallback: String,
}

impl Default for DeviceProbe {
    fn default() -> Self {
        Self::new("/dev/video", MAX_PROBED_DEVICES, DEFAULT_DEVICE)
    }
}

impl DeviceProbe {
    pub fn new(prefix: impl Into<String>, count: usize, fallback: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            count,
            fallback: fallback.into(),
        }
    }

    /// Whether the fallback device exists
    pub fn is_available(&self) -> bool {
        Path::new(&self.fallback).exists()
    }

    /// Every probed path that exists, or just the fallback if none do
    pub fn list_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = (0..self.count)
            .map(|idx| format!("{}{}", self.prefix, idx))
            .filter(|path| Path::new(path).exists())
            .collect();

        if devices.is_empty() {
            devices.push(self.fallback.clone());
        }
        devices
    }
}

/// Whether the backend can capture: a V4L2 driver is built in and the
/// default capture device exists
///
/// Hosts use this to decide whether the backend is selectable at all.
pub fn initialize() -> bool {
    if find_input_driver("v4l2").is_none() {
        debug!("V4L2 input driver not built in (enable the `video` feature)");
        return false;
    }
    DeviceProbe::default().is_available()
}

/// Candidate capture devices, never empty
pub fn display_names() -> Vec<String> {
    DeviceProbe::default().list_devices()
}
