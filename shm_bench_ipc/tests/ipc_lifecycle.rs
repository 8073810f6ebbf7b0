//! System V lifecycle tests for the benchmark IPC objects.
//!
//! Every test uses its own key (pid + counter) and removes what it created.

use nix::errno::Errno;
use shm_bench_common::Marker;
use shm_bench_common::consts::{BUFSIZE, IpcKey, LAYOUT_MIN_SIZE};
use shm_bench_ipc::{
    BinarySemaphore, IpcError, IpcResource, IpcResult, acquire_semaphore, acquire_shared_segment,
    attach, open_semaphore, open_shared_segment, release_all,
};
use std::sync::atomic::{AtomicI32, Ordering};

/// Helper: fresh key that no other test (or run) in this process uses.
fn unique_key() -> IpcKey {
    static NEXT: AtomicI32 = AtomicI32::new(1);
    let pid = std::process::id() as IpcKey & 0x7FFF;
    0x2200_0000 | (pid << 8) | (NEXT.fetch_add(1, Ordering::Relaxed) & 0xFF)
}

#[test]
fn test_semaphore_starts_free_and_pairs_lock_unlock() -> IpcResult<()> {
    shm_bench_ipc::init_tracing();
    let key = unique_key();
    let semaphore = acquire_semaphore(key)?;
    let segment = acquire_shared_segment(key, BUFSIZE)?;

    assert_eq!(semaphore.value()?, 1);
    semaphore.lock()?;
    assert_eq!(semaphore.value()?, 0);
    semaphore.unlock()?;
    assert_eq!(semaphore.value()?, 1);

    assert!(release_all(segment, semaphore).is_clean());
    Ok(())
}

#[test]
fn test_acquire_resets_existing_semaphore() -> IpcResult<()> {
    let key = unique_key();
    let first = acquire_semaphore(key)?;
    first.lock()?;
    assert_eq!(first.value()?, 0);

    let second = acquire_semaphore(key)?;
    assert_eq!(second.id(), first.id());
    assert_eq!(second.value()?, 1);

    second.remove()?;
    Ok(())
}

#[test]
fn test_attach_shares_bytes_between_mappings() -> IpcResult<()> {
    let key = unique_key();
    let semaphore = acquire_semaphore(key)?;
    let segment = acquire_shared_segment(key, BUFSIZE)?;

    let server = attach(&segment)?;
    let client_id = open_shared_segment(key)?;
    assert_eq!(client_id.id(), segment.id());
    assert_eq!(client_id.size(), BUFSIZE);
    let client = attach(&client_id)?;

    server.view().set_marker(Marker::Idle);
    client.view().set_marker(Marker::Pending);
    assert_eq!(server.view().marker(), Marker::Pending);

    server.view().write_result(123_456);
    assert_eq!(client.view().read_result(), 123_456);

    drop(client);
    drop(server);
    assert!(release_all(segment, semaphore).is_clean());
    Ok(())
}

#[test]
fn test_too_small_segment_rejected_before_syscall() {
    let result = acquire_shared_segment(unique_key(), LAYOUT_MIN_SIZE - 1);
    assert!(matches!(result, Err(IpcError::InvalidSize { .. })));
}

#[test]
fn test_existing_smaller_segment_is_unavailable() -> IpcResult<()> {
    let key = unique_key();
    let small = acquire_shared_segment(key, LAYOUT_MIN_SIZE)?;

    let result = acquire_shared_segment(key, BUFSIZE * 4);
    match result {
        Err(IpcError::ResourceUnavailable {
            resource: IpcResource::SharedMemory,
            source: Errno::EINVAL,
            ..
        }) => {}
        other => panic!("Expected ResourceUnavailable(EINVAL), got: {:?}", other),
    }

    small.remove()?;
    Ok(())
}

#[test]
fn test_open_missing_objects_fails() {
    let key = unique_key();
    assert!(matches!(
        open_semaphore(key),
        Err(IpcError::ResourceUnavailable {
            resource: IpcResource::Semaphore,
            source: Errno::ENOENT,
            ..
        })
    ));
    assert!(matches!(
        open_shared_segment(key),
        Err(IpcError::ResourceUnavailable {
            resource: IpcResource::SharedMemory,
            source: Errno::ENOENT,
            ..
        })
    ));
}

#[test]
fn test_release_twice_reports_both_failures() -> IpcResult<()> {
    let key = unique_key();
    let semaphore = acquire_semaphore(key)?;
    let segment = acquire_shared_segment(key, BUFSIZE)?;

    assert!(release_all(segment, semaphore).is_clean());

    let second = release_all(segment, semaphore);
    assert!(!second.is_clean());
    assert_eq!(second.errors().count(), 2);
    assert!(
        second
            .errors()
            .all(|e| matches!(e, IpcError::RemovalFailed { .. }))
    );

    // Nothing left behind at the key.
    assert!(open_semaphore(key).is_err());
    assert!(open_shared_segment(key).is_err());
    Ok(())
}

#[test]
fn test_lock_on_removed_semaphore_fails() -> IpcResult<()> {
    let key = unique_key();
    let semaphore = acquire_semaphore(key)?;
    semaphore.remove()?;

    assert!(matches!(semaphore.lock(), Err(IpcError::LockFailed { .. })));
    assert!(matches!(
        semaphore.unlock(),
        Err(IpcError::UnlockFailed { .. })
    ));
    Ok(())
}

#[test]
fn test_attach_removed_segment_fails() -> IpcResult<()> {
    let key = unique_key();
    let segment = acquire_shared_segment(key, BUFSIZE)?;
    segment.remove()?;

    let result = attach(&segment);
    assert!(matches!(
        result,
        Err(IpcError::AttachFailed { id, .. }) if id == segment.id()
    ));
    assert!(open_shared_segment(key).is_err());
    Ok(())
}

#[test]
fn test_undo_handle_pairs_lock_unlock() -> IpcResult<()> {
    let key = unique_key();
    let semaphore = acquire_semaphore(key)?;
    let client = open_semaphore(key)?.with_undo();
    assert!(client.undo());
    assert!(!semaphore.undo());
    assert_eq!(client.id(), semaphore.id());

    client.lock()?;
    assert_eq!(semaphore.value()?, 0);
    client.unlock()?;
    assert_eq!(semaphore.value()?, 1);

    semaphore.remove()?;
    Ok(())
}
