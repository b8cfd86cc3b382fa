//! Monotonic time source for the hosted build.
//!
//! Every reading is a delta against an epoch captured once at startup, so
//! wall-clock adjustments never move the firmware's notion of time.

use std::thread;
use std::time::{Duration, Instant};

/// Process clock armed from a single captured epoch.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    /// Capture the epoch. Call once per process.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Microseconds elapsed since the epoch.
    pub fn now_micros(&self) -> u64 {
        // u64 microseconds covers ~584k years of uptime
        self.epoch.elapsed().as_micros() as u64
    }

    /// Milliseconds elapsed since the epoch, truncated to 32 bits.
    ///
    /// Wraps after ~49.7 days. Compare readings with [`millis_since`],
    /// never with `<`.
    pub fn now_millis(&self) -> u32 {
        (self.now_micros() / 1000) as u32
    }

    /// Microseconds between `earlier` and now, saturating at zero.
    pub fn micros_since(&self, earlier: u64) -> u64 {
        self.now_micros().saturating_sub(earlier)
    }

    /// Suspend the calling thread for at least `us` microseconds.
    pub fn sleep_micros(&self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }

    /// Suspend the calling thread for at least `ms` milliseconds.
    pub fn sleep_millis(&self, ms: u32) {
        self.sleep_micros(u64::from(ms) * 1000);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

/// Wrap-tolerant difference between two [`Clock::now_millis`] readings.
pub fn millis_since(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier)
}
