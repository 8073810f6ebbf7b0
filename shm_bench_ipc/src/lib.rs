//! # Shared-memory benchmark IPC
//!
//! System V IPC objects behind the shared-memory latency benchmark: one
//! shared memory segment carrying the readiness marker and the cycle-count
//! result, and one binary semaphore guarding the timing critical section.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │   Server        │    │  SysV segment (key)  │    │   Client        │
//! │                 │    │                      │    │                 │
//! │ AttachedSegment ├───►│ [marker|cycles|ack…] │◄───┤ AttachedSegment │
//! │                 │    └──────────────────────┘    │                 │
//! │ SysvSemaphore   ├───►  SysV semaphore set (key) ◄─┤ SysvSemaphore   │
//! └─────────────────┘        value 1 = free          └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shm_bench_common::consts::{BUFSIZE, DEFAULT_IPC_KEY};
//! use shm_bench_common::Marker;
//! use shm_bench_ipc::{acquire_semaphore, acquire_shared_segment, attach, release_all};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let semaphore = acquire_semaphore(DEFAULT_IPC_KEY)?;
//! let segment = acquire_shared_segment(DEFAULT_IPC_KEY, BUFSIZE)?;
//! let mapping = attach(&segment)?;
//! mapping.view().set_marker(Marker::Idle);
//!
//! drop(mapping);
//! let report = release_all(segment, semaphore);
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every kernel call maps to one [`IpcError`] variant carrying the object id
//! (or key) and the errno. Teardown never short-circuits: [`release_all`]
//! returns a [`ReleaseReport`] with one result per object.
//!
//! ## Thread Safety
//!
//! - **SysvSemaphore / SegmentId**: plain ids, `Copy`
//! - **SegmentView**: `Send + Sync`; the marker byte is atomic, the result
//!   field is protected by the semaphore protocol

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod segment;
pub mod semaphore;

pub use error::{IpcError, IpcResource, IpcResult};
pub use lifecycle::{ReleaseReport, release_all};
pub use segment::{
    AttachedSegment, HeapSegment, SegmentId, SegmentView, acquire_shared_segment, attach,
    open_shared_segment,
};
pub use semaphore::{BinarySemaphore, SysvSemaphore, acquire_semaphore, open_semaphore};

/// Initialize a plain tracing subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
