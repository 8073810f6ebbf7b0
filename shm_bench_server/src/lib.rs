//! # Shared-memory latency benchmark server
//!
//! A background worker attaches to a System V segment and semaphore, polls
//! the segment's first byte for a client request, and on request times
//! `TRIALS` copies of a fixed acknowledgement frame into the segment with the
//! CPU cycle counter, writing the summed cycles back for the client.
//!
//! # Module Structure
//!
//! - [`lifecycle`] - `BenchServer`: start/stop, worker thread, teardown
//! - [`poller`] - Readiness check and interruptible poll loop
//! - [`timing`] - Locked, cycle-timed copy loop
//! - [`ticks`] - Hardware cycle counter behind the `TickSource` trait
//! - [`client`] - Probe client used by `shm_bench_client` and the tests
//! - [`error`] - Server and probe errors
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         BenchServer                              │
//! │  ┌──────────────┐   pending?   ┌──────────────┐   lock/unlock    │
//! │  │   Poller     ├─────────────►│ TimingEngine ├──────────────┐   │
//! │  │ (StopSignal) │              │ (TickSource) │              │   │
//! │  └──────┬───────┘              └──────┬───────┘              ▼   │
//! │         │ marker @0                   │ frames, total @1   SysV  │
//! │         ▼                             ▼                    sem   │
//! │  ┌────────────────────────────────────────────┐                  │
//! │  │           SysV shared memory segment        │◄──── client     │
//! │  └────────────────────────────────────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod poller;
pub mod ticks;
pub mod timing;

pub use crate::client::{BenchProbe, ProbeResult};
pub use crate::error::{ProbeError, ServerError};
pub use crate::lifecycle::{BenchServer, ServerState, StatsSnapshot};
pub use crate::poller::{Poller, StopSignal, is_request_pending};
pub use crate::ticks::{CycleCounter, TickSource};
pub use crate::timing::{BenchOutcome, TimingEngine};
