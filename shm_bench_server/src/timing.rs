//! Timing engine.
//!
//! One benchmark run, under the semaphore:
//!
//! ```text
//! lock ─► TRIALS × [ start = now ─ copy ack frame ─ stop = now ] ─► write total @1 ─► idle @0 ─► unlock
//! ```

use crate::ticks::TickSource;
use shm_bench_common::Marker;
use shm_bench_common::consts::TRIALS;
use shm_bench_common::layout::ack_frame;
use shm_bench_ipc::{BinarySemaphore, IpcResult, SegmentView};
use std::hint::black_box;
use std::sync::atomic::{Ordering, compiler_fence};
use tracing::{info, warn};

/// Result of a run that got the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchOutcome {
    /// Sum of the elapsed ticks of every trial, as written to the segment.
    pub total_cycles: u64,
    /// Number of trials summed.
    pub trials: u32,
    /// Outcome of the final unlock; a failure does not invalidate the result.
    pub unlock: IpcResult<()>,
}

impl BenchOutcome {
    /// Mean ticks per trial (integer division).
    pub fn cycles_per_trial(&self) -> u64 {
        self.total_cycles / u64::from(self.trials.max(1))
    }
}

/// Runs timed copy batches with an injected tick source.
#[derive(Debug, Clone)]
pub struct TimingEngine<T: TickSource> {
    ticks: T,
}

impl<T: TickSource> TimingEngine<T> {
    /// Engine sampling `ticks`.
    pub fn new(ticks: T) -> Self {
        Self { ticks }
    }

    /// Run one benchmark against `segment`, holding `semaphore` throughout.
    ///
    /// # Errors
    ///
    /// `LockFailed` if the semaphore cannot be taken; no trial runs and no
    /// unlock is attempted. An unlock failure is reported in
    /// [`BenchOutcome::unlock`] instead, after the result is written.
    pub fn run_benchmark<S>(&self, segment: &SegmentView, semaphore: &S) -> IpcResult<BenchOutcome>
    where
        S: BinarySemaphore + ?Sized,
    {
        semaphore.lock()?;

        let total_cycles = self.run_trials(segment);
        segment.write_result(total_cycles);
        segment.set_marker(Marker::Idle);
        info!("Total cycles: {}", total_cycles);

        let unlock = semaphore.unlock();
        if let Err(e) = &unlock {
            warn!("{} (result already written)", e);
        }

        Ok(BenchOutcome {
            total_cycles,
            trials: TRIALS,
            unlock,
        })
    }

    fn run_trials(&self, segment: &SegmentView) -> u64 {
        let mut total = 0u64;
        for _ in 0..TRIALS {
            let frame = black_box(ack_frame());

            let start = self.ticks.now();
            compiler_fence(Ordering::SeqCst);
            segment.write_frame(&frame);
            compiler_fence(Ordering::SeqCst);
            let stop = self.ticks.now();

            // Unsigned difference; the counter must not wrap within a trial.
            total = total.wrapping_add(stop.wrapping_sub(start));
        }
        total
    }
}
