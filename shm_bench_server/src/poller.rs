//! Readiness poller.
//!
//! Peeks at the marker byte, never clears it, and sleeps between checks on a
//! stop signal that a shutdown request can interrupt.

use parking_lot::{Condvar, Mutex};
use shm_bench_common::Marker;
use shm_bench_ipc::SegmentView;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// True if a client deposited the pending marker.
///
/// Reads exactly one byte and never writes.
#[inline]
pub fn is_request_pending(segment: &SegmentView) -> bool {
    segment.marker() == Marker::Pending
}

/// Cooperative stop flag with an interruptible wait.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    /// New, not yet requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any waiter.
    pub fn request(&self) {
        *self.requested.lock() = true;
        self.wake.notify_all();
    }

    /// Whether a stop has been requested.
    pub fn is_requested(&self) -> bool {
        *self.requested.lock()
    }

    /// Clear a previous request before the next start.
    pub fn reset(&self) {
        *self.requested.lock() = false;
    }

    /// Sleep up to `timeout`, returning early on a stop request.
    ///
    /// Returns whether a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut requested = self.requested.lock();
        while !*requested {
            if self.wake.wait_until(&mut requested, deadline).timed_out() {
                break;
            }
        }
        *requested
    }
}

/// Poll loop: check the stop flag, check the marker, sleep.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    stop: Arc<StopSignal>,
}

impl Poller {
    /// Poller sleeping `interval` between checks.
    pub fn new(interval: Duration, stop: Arc<StopSignal>) -> Self {
        Self { interval, stop }
    }

    /// Sleep between two checks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until a stop is requested, calling `on_request` synchronously for
    /// every check that finds the pending marker.
    ///
    /// The stop flag is observed once per iteration and after each sleep; a
    /// running `on_request` is never interrupted. Returns the number of checks.
    pub fn run<F>(&self, segment: &SegmentView, mut on_request: F) -> u64
    where
        F: FnMut(),
    {
        let mut checks = 0u64;
        while !self.stop.is_requested() {
            checks += 1;
            if is_request_pending(segment) {
                debug!("Message ready (check #{})", checks);
                on_request();
            }
            if self.stop.wait(self.interval) {
                break;
            }
        }
        debug!("Poll loop stopped after {} checks", checks);
        checks
    }
}
