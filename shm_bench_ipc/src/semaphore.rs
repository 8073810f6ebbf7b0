//! Binary semaphore on a one-member System V semaphore set

use crate::error::{IpcError, IpcResource, IpcResult};
use crate::platform;
use shm_bench_common::consts::{IPC_MODE, IpcKey};
use tracing::{debug, warn};

/// Mutual-exclusion lock guarding the benchmark critical section.
///
/// Not reentrant: a holder calling [`lock`](BinarySemaphore::lock) again
/// blocks forever.
pub trait BinarySemaphore {
    /// Take the lock (`sem_op = -1`), blocking while another party holds it.
    fn lock(&self) -> IpcResult<()>;

    /// Release the lock (`sem_op = +1`).
    fn unlock(&self) -> IpcResult<()>;
}

/// Handle to semaphore 0 of a System V semaphore set.
///
/// The handle is a plain id; it does not remove the set when dropped.
/// Removal is explicit, see [`crate::lifecycle::release_all`].
///
/// Operations use `sem_flg = 0` unless the handle was switched to
/// [`with_undo`](Self::with_undo).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysvSemaphore {
    id: libc::c_int,
    key: IpcKey,
    undo: bool,
}

impl SysvSemaphore {
    /// Semaphore set id.
    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// Key the set was obtained with.
    pub fn key(&self) -> IpcKey {
        self.key
    }

    /// Same set, with `SEM_UNDO` on lock and unlock.
    ///
    /// The kernel reverts a lock this process still holds when it exits, so a
    /// killed holder cannot leave the set at 0.
    pub fn with_undo(self) -> Self {
        Self { undo: true, ..self }
    }

    /// Whether lock and unlock carry `SEM_UNDO`.
    pub fn undo(&self) -> bool {
        self.undo
    }

    fn op_flags(&self) -> libc::c_short {
        if self.undo {
            libc::SEM_UNDO as libc::c_short
        } else {
            0
        }
    }

    /// Current value of semaphore 0 (1 = free, 0 = held).
    pub fn value(&self) -> IpcResult<i32> {
        platform::semctl_getval(self.id, 0).map_err(|source| IpcError::QueryFailed {
            resource: IpcResource::Semaphore,
            id: self.id,
            source,
        })
    }

    /// Remove the set from the system.
    pub fn remove(self) -> IpcResult<()> {
        platform::semctl_rmid(self.id).map_err(|source| IpcError::RemovalFailed {
            resource: IpcResource::Semaphore,
            id: self.id,
            source,
        })?;
        debug!("Removed semaphore set {}", self.id);
        Ok(())
    }
}

impl BinarySemaphore for SysvSemaphore {
    fn lock(&self) -> IpcResult<()> {
        platform::semop(self.id, 0, -1, self.op_flags())
            .map_err(|source| IpcError::LockFailed { id: self.id, source })
    }

    fn unlock(&self) -> IpcResult<()> {
        platform::semop(self.id, 0, 1, self.op_flags())
            .map_err(|source| IpcError::UnlockFailed { id: self.id, source })
    }
}

/// Create-or-open the semaphore set at `key` and initialize it to 1 (free).
///
/// # Errors
///
/// - [`IpcError::ResourceUnavailable`] if `semget` fails
/// - [`IpcError::InitializationFailed`] if `SETVAL` fails; the set is removed
///   again before returning
pub fn acquire_semaphore(key: IpcKey) -> IpcResult<SysvSemaphore> {
    let id = platform::semget(key, 1, IPC_MODE | libc::IPC_CREAT).map_err(|source| {
        IpcError::ResourceUnavailable {
            resource: IpcResource::Semaphore,
            key,
            source,
        }
    })?;

    if let Err(source) = platform::semctl_setval(id, 0, 1) {
        if let Err(e) = platform::semctl_rmid(id) {
            warn!("Unable to remove uninitialized semaphore set {}: {}", id, e);
        }
        return Err(IpcError::InitializationFailed { id, source });
    }

    debug!("Semaphore set {} ready for key {:#x}", id, key);
    Ok(SysvSemaphore {
        id,
        key,
        undo: false,
    })
}

/// Open an existing semaphore set without creating or initializing it.
pub fn open_semaphore(key: IpcKey) -> IpcResult<SysvSemaphore> {
    let id = platform::semget(key, 1, 0).map_err(|source| IpcError::ResourceUnavailable {
        resource: IpcResource::Semaphore,
        key,
        source,
    })?;
    Ok(SysvSemaphore {
        id,
        key,
        undo: false,
    })
}
