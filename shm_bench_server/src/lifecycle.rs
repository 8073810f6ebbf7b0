//! Lifecycle controller.
//!
//! `BenchServer` owns every IPC handle and the worker thread. Resources are
//! acquired in a fixed order and released in reverse; every exit path out of
//! `Starting` releases what was already acquired.
//!
//! ```text
//! Uninitialized ─start()─► Starting ──ok──► Running ─stop()─► Stopping ─► Terminated
//!                             │                                              ▲
//!                             └──────────────── error ───────────────────────┘
//! ```

use crate::error::ServerError;
use crate::poller::{Poller, StopSignal};
use crate::ticks::{CycleCounter, TickSource};
use crate::timing::{BenchOutcome, TimingEngine};
use shm_bench_common::config::ServerConfig;
use shm_bench_common::consts::BUFSIZE;
use shm_bench_common::Marker;
use shm_bench_ipc::{
    AttachedSegment, IpcResult, ReleaseReport, SegmentId, SysvSemaphore, acquire_semaphore,
    acquire_shared_segment, attach, release_all,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Worker thread name.
pub const WORKER_THREAD_NAME: &str = "shm_server";

/// Lifecycle state of a [`BenchServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Never started.
    Uninitialized,
    /// Acquiring IPC objects.
    Starting,
    /// Worker thread polling.
    Running,
    /// Stop requested, worker draining.
    Stopping,
    /// Worker gone and teardown attempted.
    Terminated,
}

/// Worker counters, shared with the owning server.
#[derive(Debug, Default)]
struct WorkerStats {
    checks: AtomicU64,
    runs: AtomicU64,
    lock_failures: AtomicU64,
    unlock_failures: AtomicU64,
    last_total_cycles: AtomicU64,
}

impl WorkerStats {
    fn record_run(&self, outcome: &BenchOutcome) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.last_total_cycles
            .store(outcome.total_cycles, Ordering::Relaxed);
        if outcome.unlock.is_err() {
            self.unlock_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
            unlock_failures: self.unlock_failures.load(Ordering::Relaxed),
            last_total_cycles: self.last_total_cycles.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.checks,
            &self.runs,
            &self.lock_failures,
            &self.unlock_failures,
            &self.last_total_cycles,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of the worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Readiness checks performed (written when the worker exits).
    pub checks: u64,
    /// Runs that got the lock and wrote a result.
    pub runs: u64,
    /// Runs aborted because the lock could not be taken.
    pub lock_failures: u64,
    /// Runs whose final unlock failed.
    pub unlock_failures: u64,
    /// Total of the most recent run.
    pub last_total_cycles: u64,
}

/// Handles owned while `Running`.
struct Resources {
    semaphore: SysvSemaphore,
    segment: SegmentId,
    mapping: Arc<AttachedSegment>,
}

/// The benchmark server.
///
/// Dropping a started server stops it.
pub struct BenchServer<T: TickSource = CycleCounter> {
    config: ServerConfig,
    ticks: T,
    state: ServerState,
    resources: Option<Resources>,
    stop: Arc<StopSignal>,
    stats: Arc<WorkerStats>,
    worker: Option<JoinHandle<()>>,
}

impl BenchServer<CycleCounter> {
    /// Server timed with the hardware cycle counter.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_ticks(config, CycleCounter)
    }
}

impl<T: TickSource> BenchServer<T> {
    /// Server timed with a custom tick source.
    pub fn with_ticks(config: ServerConfig, ticks: T) -> Self {
        Self {
            config,
            ticks,
            state: ServerState::Uninitialized,
            resources: None,
            stop: Arc::new(StopSignal::new()),
            stats: Arc::new(WorkerStats::default()),
            worker: None,
        }
    }

    /// Acquire the IPC objects, publish the idle marker and spawn the worker.
    ///
    /// A no-op while already `Running`. On failure the server ends up
    /// `Terminated` with nothing left allocated.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, any IPC step fails, or
    /// the worker thread cannot be spawned.
    pub fn start(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Running => {
                debug!("start() ignored: already running");
                return Ok(());
            }
            ServerState::Starting | ServerState::Stopping => {
                return Err(ServerError::InvalidState(self.state));
            }
            ServerState::Uninitialized | ServerState::Terminated => {}
        }

        self.state = ServerState::Starting;
        if let Err(e) = self.config.validate() {
            error!("Refusing to start: {}", e);
            self.state = ServerState::Terminated;
            return Err(e.into());
        }

        info!(
            "Initializing {} (key {:#x}, poll interval {}ms)",
            WORKER_THREAD_NAME, self.config.ipc_key, self.config.poll_interval_ms
        );

        let resources = match acquire_resources(&self.config) {
            Ok(resources) => resources,
            Err(e) => {
                error!("Startup failed: {}", e);
                self.state = ServerState::Terminated;
                return Err(e.into());
            }
        };
        resources.mapping.view().set_marker(Marker::Idle);
        info!(
            "Shared memory {} attached at {:p}",
            resources.segment.id(),
            resources.mapping.view().as_ptr()
        );

        self.stop.reset();
        self.stats.reset();

        let worker = Worker {
            mapping: Arc::clone(&resources.mapping),
            semaphore: resources.semaphore,
            engine: TimingEngine::new(self.ticks.clone()),
            poller: Poller::new(self.config.poll_interval(), Arc::clone(&self.stop)),
            stats: Arc::clone(&self.stats),
        };
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.resources = Some(resources);
                self.state = ServerState::Running;
                info!("{} running", WORKER_THREAD_NAME);
                Ok(())
            }
            Err(e) => {
                error!("Unable to spawn worker thread: {}", e);
                let Resources {
                    semaphore,
                    segment,
                    mapping,
                } = resources;
                drop(mapping);
                release_all(segment, semaphore);
                self.state = ServerState::Terminated;
                Err(ServerError::Spawn(e))
            }
        }
    }

    /// Stop the worker, detach and remove both IPC objects.
    ///
    /// Waits for an in-progress run to finish. Removal failures are logged and
    /// returned, never raised. Calling it again finds nothing to release.
    pub fn stop(&mut self) -> ReleaseReport {
        let Some(resources) = self.resources.take() else {
            debug!("stop() with no IPC resources held");
            return ReleaseReport::nothing_to_release();
        };

        info!("Cleaning up {}", WORKER_THREAD_NAME);
        self.state = ServerState::Stopping;
        self.stop.request();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Unable to stop {}: worker panicked", WORKER_THREAD_NAME);
            }
        }

        let Resources {
            semaphore,
            segment,
            mapping,
        } = resources;
        drop(mapping);
        let report = release_all(segment, semaphore);

        let stats = self.stats.snapshot();
        info!(
            "{} stopped: {} checks, {} runs, {} lock failures, {} unlock failures, last total {} cycles",
            WORKER_THREAD_NAME,
            stats.checks,
            stats.runs,
            stats.lock_failures,
            stats.unlock_failures,
            stats.last_total_cycles
        );

        self.state = ServerState::Terminated;
        report
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Worker counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Segment and semaphore held while running.
    pub fn ipc_ids(&self) -> Option<(SegmentId, SysvSemaphore)> {
        self.resources
            .as_ref()
            .map(|resources| (resources.segment, resources.semaphore))
    }
}

impl<T: TickSource> Drop for BenchServer<T> {
    fn drop(&mut self) {
        if self.resources.is_some() {
            let report = self.stop();
            if !report.is_clean() {
                warn!("IPC teardown on drop was incomplete");
            }
        }
    }
}

/// Semaphore, then segment, then mapping; anything acquired is released
/// before an error is returned.
fn acquire_resources(config: &ServerConfig) -> IpcResult<Resources> {
    acquire_resources_with(config, attach)
}

fn acquire_resources_with<A>(config: &ServerConfig, attach_segment: A) -> IpcResult<Resources>
where
    A: FnOnce(&SegmentId) -> IpcResult<AttachedSegment>,
{
    let semaphore = acquire_semaphore(config.ipc_key)?;

    let segment = match acquire_shared_segment(config.ipc_key, BUFSIZE) {
        Ok(segment) => segment,
        Err(e) => {
            if let Err(removal) = semaphore.remove() {
                warn!("{}", removal);
            }
            return Err(e);
        }
    };

    let mapping = match attach_segment(&segment) {
        Ok(mapping) => mapping,
        Err(e) => {
            release_all(segment, semaphore);
            return Err(e);
        }
    };

    Ok(Resources {
        semaphore,
        segment,
        mapping: Arc::new(mapping),
    })
}

/// Everything the worker thread owns.
struct Worker<T: TickSource> {
    mapping: Arc<AttachedSegment>,
    semaphore: SysvSemaphore,
    engine: TimingEngine<T>,
    poller: Poller,
    stats: Arc<WorkerStats>,
}

impl<T: TickSource> Worker<T> {
    fn run(self) {
        let view = self.mapping.view();
        let checks = self.poller.run(view, || {
            match self.engine.run_benchmark(view, &self.semaphore) {
                Ok(outcome) => self.stats.record_run(&outcome),
                Err(e) => {
                    error!("{}", e);
                    self.stats.lock_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        self.stats.checks.store(checks, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_server_is_uninitialized() {
        let server = BenchServer::new(ServerConfig::default());
        assert_eq!(server.state(), ServerState::Uninitialized);
        assert_eq!(server.stats(), StatsSnapshot::default());
        assert!(server.ipc_ids().is_none());
    }

    #[test]
    fn test_stop_before_start_releases_nothing() {
        let mut server = BenchServer::new(ServerConfig::default());
        let report = server.stop();
        assert!(report.is_clean());
        assert_eq!(server.state(), ServerState::Uninitialized);
    }

    #[test]
    fn test_invalid_config_never_touches_ipc() {
        let mut server = BenchServer::new(ServerConfig::with_key(0));
        assert!(matches!(server.start(), Err(ServerError::Config(_))));
        assert_eq!(server.state(), ServerState::Terminated);
        assert!(server.ipc_ids().is_none());
    }

    #[test]
    fn test_attach_failure_releases_semaphore_and_segment() {
        let pid = std::process::id() as shm_bench_common::consts::IpcKey & 0x7FFF;
        let key = 0x2400_0000 | (pid << 8);
        let config = ServerConfig::with_key(key);

        let result = acquire_resources_with(&config, |segment| {
            // Both objects exist at the key when the attach step runs.
            assert!(shm_bench_ipc::open_semaphore(key).is_ok());
            assert!(shm_bench_ipc::open_shared_segment(key).is_ok());
            Err(shm_bench_ipc::IpcError::AttachFailed {
                id: segment.id(),
                source: nix::errno::Errno::ENOMEM,
            })
        });

        assert!(matches!(
            result,
            Err(shm_bench_ipc::IpcError::AttachFailed { .. })
        ));
        assert!(shm_bench_ipc::open_semaphore(key).is_err());
        assert!(shm_bench_ipc::open_shared_segment(key).is_err());
    }

    #[test]
    fn test_stats_track_outcomes() {
        let stats = WorkerStats::default();
        stats.record_run(&BenchOutcome {
            total_cycles: 5000,
            trials: 1000,
            unlock: Ok(()),
        });
        stats.record_run(&BenchOutcome {
            total_cycles: 6000,
            trials: 1000,
            unlock: Err(shm_bench_ipc::IpcError::UnlockFailed {
                id: 1,
                source: nix::errno::Errno::EINVAL,
            }),
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.runs, 2);
        assert_eq!(snapshot.unlock_failures, 1);
        assert_eq!(snapshot.last_total_cycles, 6000);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
