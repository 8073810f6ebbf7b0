//! Linux System V IPC system calls

use nix::errno::Errno;
use shm_bench_common::consts::IpcKey;
use std::ffi::c_void;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

/// Get (or create, with `IPC_CREAT` in `flags`) a semaphore set.
pub fn semget(key: IpcKey, nsems: libc::c_int, flags: libc::c_int) -> Result<libc::c_int, Errno> {
    Errno::result(unsafe { libc::semget(key, nsems, flags) })
}

/// Set the value of one semaphore in a set (`SETVAL`).
pub fn semctl_setval(semid: libc::c_int, semnum: libc::c_int, value: libc::c_int) -> Result<(), Errno> {
    // union semun is passed by value; its `val` member is a plain int.
    Errno::result(unsafe { libc::semctl(semid, semnum, libc::SETVAL, value) }).map(drop)
}

/// Read the value of one semaphore in a set (`GETVAL`).
pub fn semctl_getval(semid: libc::c_int, semnum: libc::c_int) -> Result<libc::c_int, Errno> {
    Errno::result(unsafe { libc::semctl(semid, semnum, libc::GETVAL) })
}

/// Remove a semaphore set (`IPC_RMID`).
pub fn semctl_rmid(semid: libc::c_int) -> Result<(), Errno> {
    Errno::result(unsafe { libc::semctl(semid, 0, libc::IPC_RMID) }).map(drop)
}

/// Apply a single `sem_op` to one semaphore, blocking while it would go negative.
///
/// `flags` is the `sem_flg` field (`0` or `SEM_UNDO`).
pub fn semop(semid: libc::c_int, semnum: u16, op: i16, flags: libc::c_short) -> Result<(), Errno> {
    let mut sb = libc::sembuf {
        sem_num: semnum,
        sem_op: op,
        sem_flg: flags,
    };
    Errno::result(unsafe { libc::semop(semid, &mut sb, 1) }).map(drop)
}

/// Get (or create, with `IPC_CREAT` in `flags`) a shared memory segment.
pub fn shmget(key: IpcKey, size: usize, flags: libc::c_int) -> Result<libc::c_int, Errno> {
    Errno::result(unsafe { libc::shmget(key, size, flags) })
}

/// Size in bytes of an existing segment (`IPC_STAT`).
pub fn shm_segment_size(shmid: libc::c_int) -> Result<usize, Errno> {
    let mut ds = MaybeUninit::<libc::shmid_ds>::zeroed();
    Errno::result(unsafe { libc::shmctl(shmid, libc::IPC_STAT, ds.as_mut_ptr()) })?;
    Ok(unsafe { ds.assume_init() }.shm_segsz as usize)
}

/// Map a segment into this address space at a kernel-chosen address.
pub fn shmat(shmid: libc::c_int) -> Result<NonNull<u8>, Errno> {
    let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
    if addr as isize == -1 {
        return Err(Errno::last());
    }
    NonNull::new(addr.cast::<u8>()).ok_or(Errno::EFAULT)
}

/// Unmap a segment previously returned by [`shmat`].
pub fn shmdt(addr: NonNull<u8>) -> Result<(), Errno> {
    Errno::result(unsafe { libc::shmdt(addr.as_ptr().cast::<c_void>()) }).map(drop)
}

/// Mark a segment for removal (`IPC_RMID`).
pub fn shmctl_rmid(shmid: libc::c_int) -> Result<(), Errno> {
    Errno::result(unsafe { libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut()) }).map(drop)
}
