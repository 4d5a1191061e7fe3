//! Capture statistics
//!
//! Counters kept by a capture session. Sessions are single-threaded, so plain
//! integers suffice.

use std::fmt;

/// Capture session statistics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStats {
    /// Buffers pushed with a new frame
    pub frames_captured: u64,
    /// Buffers pushed without a new frame
    pub timeouts: u64,
    /// Packets dropped because they belonged to another stream
    pub packets_discarded: u64,
    /// Times the decoded geometry differed from the previous frame
    pub geometry_changes: u64,
    /// Average sleep overshoot over the recent window, in milliseconds
    pub avg_overshoot_ms: f64,
    /// Largest sleep overshoot over the recent window, in milliseconds
    pub max_overshoot_ms: f64,
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "captured={}, timeouts={}, discarded={}, geometry_changes={}, overshoot avg={:.2}ms max={:.2}ms",
            self.frames_captured,
            self.timeouts,
            self.packets_discarded,
            self.geometry_changes,
            self.avg_overshoot_ms,
            self.max_overshoot_ms
        )
    }
}
