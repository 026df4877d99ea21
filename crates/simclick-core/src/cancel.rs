//! Cooperative cancellation shared by the scheduler and macro playback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of cancellable waits. Cancellation latency is bounded by this,
/// not by the configured interval.
pub const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Two-flag cancellation token: `running` is the graceful stop request,
/// `emergency` is the forced stop that takes precedence.
#[derive(Debug, Default)]
pub struct CancelToken {
    running: AtomicBool,
    emergency: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh run.
    pub fn arm(&self) {
        self.emergency.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    /// Request a graceful stop.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Request a forced stop.
    pub fn trip_emergency(&self) {
        self.emergency.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    /// True once either stop flag is asserted.
    pub fn is_cancelled(&self) -> bool {
        self.is_emergency() || !self.is_running()
    }

    /// Sleep for `duration` in [`WAIT_SLICE`] slices, re-checking the stop
    /// flags between slices. Returns `false` if cancelled mid-wait.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}
