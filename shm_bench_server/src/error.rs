//! Server and probe error types.

use crate::lifecycle::ServerState;
use shm_bench_common::ConfigError;
use shm_bench_ipc::IpcError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Acquiring or attaching an IPC object failed
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// Invalid server configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The worker thread could not be created
    #[error("Unable to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Operation not allowed in the current state
    #[error("Invalid server state: {0:?}")]
    InvalidState(ServerState),
}

/// Errors surfaced by the probe client.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Opening, attaching or locking failed
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// The marker stayed pending for the whole timeout
    #[error("No result within {0:?} (server not running or lock failed)")]
    Timeout(Duration),
}
