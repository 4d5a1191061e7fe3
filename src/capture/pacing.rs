//! Frame pacing
//!
//! Deadlines advance by a fixed interval. After a stall the deadline is reset
//! to `now + interval` instead of replaying every missed tick.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fixed-rate deadline tracker
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_frame: Instant,
}

impl FramePacer {
    /// Start pacing with the first deadline at `start`
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_frame: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current deadline
    pub fn deadline(&self) -> Instant {
        self.next_frame
    }

    /// Move to the next deadline, relative to the time `now` observed this tick
    pub fn advance(&mut self, now: Instant) -> Instant {
        self.next_frame += self.interval;
        if self.next_frame < now {
            self.next_frame = now + self.interval;
        }
        self.next_frame
    }

    /// Block until the current deadline, then advance it
    ///
    /// Overshoot of the sleep is handed to `logger`.
    pub fn wait(&mut self, logger: &mut SleepOvershootLogger) {
        let now = Instant::now();
        if self.next_frame > now {
            thread::sleep(self.next_frame - now);
            logger.record(self.next_frame, Instant::now());
        }
        self.advance(now);
    }
}

/// Wake-ups kept for the overshoot summary
const OVERSHOOT_WINDOW: usize = 30;

/// Tracks how late the capture thread wakes up
#[derive(Debug, Clone)]
pub struct SleepOvershootLogger {
    /// Most recent overshoots, oldest first
    recent: VecDeque<Duration>,
    /// Overshoot above which a single wake-up is reported
    warn_threshold: Duration,
    samples: u64,
}

impl SleepOvershootLogger {
    pub fn new(warn_threshold: Duration) -> Self {
        Self {
            recent: VecDeque::with_capacity(OVERSHOOT_WINDOW),
            warn_threshold,
            samples: 0,
        }
    }

    /// Forget previous samples
    pub fn reset(&mut self) {
        self.recent.clear();
        self.samples = 0;
    }

    /// Record a wake-up at `actual` for a sleep that targeted `intended`
    pub fn record(&mut self, intended: Instant, actual: Instant) {
        let overshoot = actual.saturating_duration_since(intended);
        if self.recent.len() == OVERSHOOT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(overshoot);
        self.samples += 1;

        if overshoot > self.warn_threshold {
            warn!("Capture thread woke {:.2}ms late", as_ms(overshoot));
        }
        if self.samples % OVERSHOOT_WINDOW as u64 == 0 {
            debug!(
                "Sleep overshoot over last {} frames: avg {:.3}ms, max {:.3}ms",
                self.recent.len(),
                self.average_ms(),
                self.max_ms()
            );
        }
    }

    /// Mean overshoot of the recent wake-ups, 0 when there are none
    pub fn average_ms(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let total: Duration = self.recent.iter().sum();
        as_ms(total) / self.recent.len() as f64
    }

    /// Largest overshoot of the recent wake-ups
    pub fn max_ms(&self) -> f64 {
        self.recent.iter().max().copied().map_or(0.0, as_ms)
    }

    /// Number of samples since the last reset
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(20);

    #[test]
    fn test_advance_on_time() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(INTERVAL, start);

        assert_eq!(pacer.advance(start), start + INTERVAL);
        assert_eq!(pacer.advance(start + INTERVAL), start + INTERVAL * 2);
    }

    #[test]
    fn test_advance_after_stall_resets() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(INTERVAL, start);

        // Stall for many intervals: no backlog of missed deadlines
        let now = start + INTERVAL * 10;
        assert_eq!(pacer.advance(now), now + INTERVAL);
        assert_eq!(pacer.advance(now + INTERVAL), now + INTERVAL * 2);
    }

    #[test]
    fn test_advance_slightly_late_keeps_cadence() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(INTERVAL, start);

        // Late by less than one interval: the grid is kept
        let now = start + Duration::from_millis(5);
        assert_eq!(pacer.advance(now), start + INTERVAL);
    }

    #[test]
    fn test_wait_sleeps_until_deadline() {
        let mut logger = SleepOvershootLogger::new(Duration::from_secs(1));
        let start = Instant::now();
        let mut pacer = FramePacer::new(INTERVAL, start);

        // First tick is due immediately
        pacer.wait(&mut logger);
        assert_eq!(logger.samples(), 0);

        pacer.wait(&mut logger);
        assert!(start.elapsed() >= INTERVAL);
        assert_eq!(logger.samples(), 1);
    }

    #[test]
    fn test_overshoot_logger() {
        let mut logger = SleepOvershootLogger::new(Duration::from_millis(5));
        let intended = Instant::now();

        logger.record(intended, intended + Duration::from_millis(2));
        logger.record(intended, intended + Duration::from_millis(4));
        assert!((logger.average_ms() - 3.0).abs() < 1e-6);
        assert!((logger.max_ms() - 4.0).abs() < 1e-6);

        // Early wake-ups count as zero overshoot
        logger.record(intended + Duration::from_millis(1), intended);
        assert_eq!(logger.samples(), 3);

        logger.reset();
        assert_eq!(logger.samples(), 0);
        assert_eq!(logger.average_ms(), 0.0);
    }

    #[test]
    fn test_overshoot_window_drops_oldest() {
        let mut logger = SleepOvershootLogger::new(Duration::from_secs(1));
        let intended = Instant::now();

        logger.record(intended, intended + Duration::from_millis(50));
        for _ in 0..OVERSHOOT_WINDOW {
            logger.record(intended, intended + Duration::from_millis(1));
        }
        assert_eq!(logger.samples(), OVERSHOOT_WINDOW as u64 + 1);
        assert!((logger.max_ms() - 1.0).abs() < 1e-6);
        assert!((logger.average_ms() - 1.0).abs() < 1e-6);
    }
}
