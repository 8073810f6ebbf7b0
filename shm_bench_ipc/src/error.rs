//! Error types for System V IPC operations

use nix::errno::Errno;
use shm_bench_common::consts::IpcKey;
use std::fmt;
use thiserror::Error;

/// Kind of IPC object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcResource {
    /// System V shared memory segment
    SharedMemory,
    /// System V semaphore set
    Semaphore,
}

impl fmt::Display for IpcResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedMemory => f.write_str("shared memory"),
            Self::Semaphore => f.write_str("semaphore"),
        }
    }
}

/// Errors that can occur while managing the benchmark IPC objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpcError {
    /// Creating or opening a segment or semaphore set failed
    #[error("Unable to obtain {resource} for key {key:#x}: {source}")]
    ResourceUnavailable {
        /// Object kind
        resource: IpcResource,
        /// Key that was requested
        key: IpcKey,
        /// Kernel error
        source: Errno,
    },

    /// The semaphore value could not be set
    #[error("Unable to initialize semaphore {id}: {source}")]
    InitializationFailed {
        /// Semaphore set id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// The segment could not be mapped
    #[error("Unable to attach shared memory {id}: {source}")]
    AttachFailed {
        /// Segment id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// Decrementing the semaphore failed
    #[error("Unable to lock semaphore {id}: {source}")]
    LockFailed {
        /// Semaphore set id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// Incrementing the semaphore failed
    #[error("Unable to free semaphore {id}: {source}")]
    UnlockFailed {
        /// Semaphore set id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// Teardown could not remove an object from the system
    #[error("Unable to remove {resource} {id} from system: {source}")]
    RemovalFailed {
        /// Object kind
        resource: IpcResource,
        /// Object id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// Reading object state (semaphore value, segment size) failed
    #[error("Unable to query {resource} {id}: {source}")]
    QueryFailed {
        /// Object kind
        resource: IpcResource,
        /// Object id
        id: libc::c_int,
        /// Kernel error
        source: Errno,
    },

    /// Segment too small for the marker and result fields
    #[error("Invalid segment size: {size} bytes (need at least {min})")]
    InvalidSize {
        /// Requested size in bytes
        size: usize,
        /// Minimum size of the benchmark layout
        min: usize,
    },
}

impl IpcError {
    /// Kernel errno behind this error, if any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::ResourceUnavailable { source, .. }
            | Self::InitializationFailed { source, .. }
            | Self::AttachFailed { source, .. }
            | Self::LockFailed { source, .. }
            | Self::UnlockFailed { source, .. }
            | Self::RemovalFailed { source, .. }
            | Self::QueryFailed { source, .. } => Some(*source),
            Self::InvalidSize { .. } => None,
        }
    }
}

/// Result type for IPC operations
pub type IpcResult<T> = Result<T, IpcError>;
