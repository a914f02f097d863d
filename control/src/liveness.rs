//! Watchdog feeding tied to the progress of the sense phase.
//!
//! The background loop is the one feeding the watchdog, but it only does so
//! while the periodic sense phase keeps beating the [`Heartbeat`]. If the
//! periodic task hangs or stops being rescheduled, feeding stops and the
//! hardware watchdog resets the device.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::watchdog::Watchdog;

/// Counter of completed sense phases, shared between contexts.
#[derive(Debug, Default)]
pub struct Heartbeat(AtomicU32);

impl Heartbeat {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn beat(&self) {
        self.0.fetch_add(1, Ordering::Release);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

pub struct LivenessReporter<W> {
    watchdog: W,
    stall_limit_ms: u64,
    last_count: u32,
    last_progress_ms: u64,
}

impl<W: Watchdog> LivenessReporter<W> {
    pub fn new(watchdog: W, stall_limit_ms: u32, now_ms: u64) -> Self {
        Self {
            watchdog,
            stall_limit_ms: u64::from(stall_limit_ms),
            last_count: 0,
            last_progress_ms: now_ms,
        }
    }

    /// Feed the watchdog unless the sense phase stalled.
    ///
    /// Returns whether the watchdog was fed.
    pub fn service(&mut self, now_ms: u64, heartbeat: &Heartbeat) -> bool {
        let count = heartbeat.count();
        if count != self.last_count {
            self.last_count = count;
            self.last_progress_ms = now_ms;
        }

        if self.is_stalled(now_ms) {
            return false;
        }

        self.watchdog.feed();
        true
    }

    pub fn is_stalled(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_progress_ms) > self.stall_limit_ms
    }
}
