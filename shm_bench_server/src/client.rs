//! Probe client.
//!
//! The counterpart of the server side of the protocol: request a run, wait for
//! the marker to leave the pending state (the server then holds the lock), and
//! read the result under the semaphore.

use crate::error::ProbeError;
use shm_bench_common::Marker;
use shm_bench_common::consts::{IpcKey, TRIALS};
use shm_bench_ipc::{
    AttachedSegment, BinarySemaphore, SysvSemaphore, attach, open_semaphore, open_shared_segment,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sleep between two marker checks while waiting for a result.
pub const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One measured run as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// Cycle total read from the segment.
    pub total_cycles: u64,
    /// Trials the total covers.
    pub trials: u32,
}

impl ProbeResult {
    /// Mean cycles per trial.
    pub fn cycles_per_trial(&self) -> f64 {
        self.total_cycles as f64 / f64::from(self.trials)
    }
}

/// Client attached to a running server's segment and semaphore.
#[derive(Debug)]
pub struct BenchProbe {
    semaphore: SysvSemaphore,
    mapping: AttachedSegment,
}

impl BenchProbe {
    /// Open the existing objects at `key`; never creates them.
    ///
    /// The semaphore is used with `SEM_UNDO`, so a client killed while holding
    /// the lock does not leave the server blocked on it.
    pub fn connect(key: IpcKey) -> Result<Self, ProbeError> {
        let semaphore = open_semaphore(key)?.with_undo();
        let segment = open_shared_segment(key)?;
        let mapping = attach(&segment)?;
        debug!(
            "Probe attached to segment {} / semaphore {}",
            segment.id(),
            semaphore.id()
        );
        Ok(Self { semaphore, mapping })
    }

    /// Deposit the pending marker.
    pub fn request(&self) {
        self.mapping.view().set_marker(Marker::Pending);
    }

    /// Semaphore handle used for reading results.
    pub fn semaphore(&self) -> &SysvSemaphore {
        &self.semaphore
    }

    /// Current marker.
    pub fn marker(&self) -> Marker {
        self.mapping.view().marker()
    }

    /// Result field as it is right now, without taking the lock.
    pub fn peek_result(&self) -> u64 {
        self.mapping.view().read_result()
    }

    /// Wait for the pending request to be picked up, then read the result
    /// under the semaphore.
    ///
    /// A timeout too large to represent as an `Instant` waits without limit.
    pub fn wait_result(&self, timeout: Duration) -> Result<ProbeResult, ProbeError> {
        let deadline = Instant::now().checked_add(timeout);
        while self.marker() == Marker::Pending {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ProbeError::Timeout(timeout));
            }
            thread::sleep(PROBE_POLL_INTERVAL);
        }

        // Blocks until the server releases the lock after writing the result.
        self.semaphore.lock()?;
        let total_cycles = self.mapping.view().read_result();
        self.semaphore.unlock()?;

        Ok(ProbeResult {
            total_cycles,
            trials: TRIALS,
        })
    }

    /// Request a run and wait for its result.
    pub fn measure(&self, timeout: Duration) -> Result<ProbeResult, ProbeError> {
        self.request();
        self.wait_result(timeout)
    }
}
