//! Shared memory segment structures and operations

use crate::error::{IpcError, IpcResource, IpcResult};
use crate::platform;
use shm_bench_common::consts::{
    IPC_MODE, IpcKey, LAYOUT_MIN_SIZE, MARKER_OFFSET, RESULT_OFFSET, RESULT_SIZE,
};
use shm_bench_common::layout::{Marker, decode_cycles, encode_cycles};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering, fence};
use tracing::{debug, warn};

/// Identity of a System V shared memory segment.
///
/// Like [`crate::SysvSemaphore`], this is a plain id; removal is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId {
    id: libc::c_int,
    key: IpcKey,
    size: usize,
}

impl SegmentId {
    /// Kernel segment id.
    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// Key the segment was obtained with.
    pub fn key(&self) -> IpcKey {
        self.key
    }

    /// Segment size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Mark the segment for removal; the kernel frees it after the last detach.
    pub fn remove(self) -> IpcResult<()> {
        platform::shmctl_rmid(self.id).map_err(|source| IpcError::RemovalFailed {
            resource: IpcResource::SharedMemory,
            id: self.id,
            source,
        })?;
        debug!("Removed shared memory segment {}", self.id);
        Ok(())
    }
}

/// Create-or-open a segment of exactly `size` bytes at `key`, mode `0666`.
///
/// # Errors
///
/// - [`IpcError::InvalidSize`] if `size` cannot hold the marker and result
/// - [`IpcError::ResourceUnavailable`] if `shmget` fails (this includes an
///   existing segment at `key` that is smaller than `size`)
pub fn acquire_shared_segment(key: IpcKey, size: usize) -> IpcResult<SegmentId> {
    validate_segment_size(size)?;

    let id = platform::shmget(key, size, IPC_MODE | libc::IPC_CREAT).map_err(|source| {
        IpcError::ResourceUnavailable {
            resource: IpcResource::SharedMemory,
            key,
            source,
        }
    })?;

    debug!("Shared memory segment {} ({} bytes) for key {:#x}", id, size, key);
    Ok(SegmentId { id, key, size })
}

/// Open an existing segment without creating it; its size is read back.
pub fn open_shared_segment(key: IpcKey) -> IpcResult<SegmentId> {
    let id = platform::shmget(key, 0, 0).map_err(|source| IpcError::ResourceUnavailable {
        resource: IpcResource::SharedMemory,
        key,
        source,
    })?;
    let size = platform::shm_segment_size(id).map_err(|source| IpcError::QueryFailed {
        resource: IpcResource::SharedMemory,
        id,
        source,
    })?;
    validate_segment_size(size)?;
    Ok(SegmentId { id, key, size })
}

/// Map a segment into this process.
///
/// # Errors
///
/// [`IpcError::AttachFailed`] if `shmat` returns an invalid address.
pub fn attach(segment: &SegmentId) -> IpcResult<AttachedSegment> {
    let base = platform::shmat(segment.id).map_err(|source| IpcError::AttachFailed {
        id: segment.id,
        source,
    })?;
    debug!("Attached shared memory {} at {:p}", segment.id, base);

    Ok(AttachedSegment {
        segment: *segment,
        // SAFETY: shmat mapped `size` bytes at `base`; they stay mapped until
        // this AttachedSegment detaches them on drop.
        view: unsafe { SegmentView::from_raw_parts(base, segment.size) },
    })
}

/// Validate that a segment can hold the benchmark layout
pub fn validate_segment_size(size: usize) -> IpcResult<()> {
    if size < LAYOUT_MIN_SIZE {
        return Err(IpcError::InvalidSize {
            size,
            min: LAYOUT_MIN_SIZE,
        });
    }
    Ok(())
}

/// A segment mapped into this address space; detached on drop.
#[derive(Debug)]
pub struct AttachedSegment {
    segment: SegmentId,
    view: SegmentView,
}

impl AttachedSegment {
    /// Segment identity.
    pub fn segment(&self) -> SegmentId {
        self.segment
    }

    /// Field accessors over the mapping.
    pub fn view(&self) -> &SegmentView {
        &self.view
    }
}

impl Drop for AttachedSegment {
    fn drop(&mut self) {
        if let Err(e) = platform::shmdt(self.view.base) {
            warn!("Unable to detach shared memory {}: {}", self.segment.id, e);
        }
    }
}

/// Typed access to the benchmark fields of a mapped region.
///
/// The other side of the protocol lives in another process, so every access
/// goes through raw pointers; the marker byte is always accessed atomically.
#[derive(Debug)]
pub struct SegmentView {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the view only hands out copies of the bytes it points to; the
// mapping itself is process-wide and valid on every thread.
unsafe impl Send for SegmentView {}
unsafe impl Sync for SegmentView {}

impl SegmentView {
    /// Build a view over `len` bytes at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for reads and writes for the whole
    /// lifetime of the view, and `len` must be at least [`LAYOUT_MIN_SIZE`].
    pub unsafe fn from_raw_parts(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(len >= LAYOUT_MIN_SIZE);
        Self { base, len }
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// False for any view built from a validated size (at least the marker and result).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the mapping.
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    fn marker_cell(&self) -> &AtomicU8 {
        // SAFETY: offset 0 is inside the mapping and AtomicU8 has alignment 1.
        unsafe { AtomicU8::from_ptr(self.base.as_ptr().add(MARKER_OFFSET)) }
    }

    /// Raw marker byte (acquire load).
    #[inline]
    pub fn marker_byte(&self) -> u8 {
        self.marker_cell().load(Ordering::Acquire)
    }

    /// Decoded marker.
    #[inline]
    pub fn marker(&self) -> Marker {
        Marker::from_byte(self.marker_byte())
    }

    /// Publish a marker (release store).
    #[inline]
    pub fn set_marker(&self, marker: Marker) {
        self.marker_cell().store(marker.as_byte(), Ordering::Release);
    }

    /// Copy a frame over the start of the segment.
    ///
    /// Byte 0 goes through the atomic marker cell; the rest is a plain copy.
    /// Frames longer than the mapping are truncated.
    #[inline]
    pub fn write_frame(&self, frame: &[u8]) {
        let len = frame.len().min(self.len);
        if len == 0 {
            return;
        }
        self.marker_cell().store(frame[0], Ordering::Relaxed);
        // SAFETY: 1..len lies inside both the frame and the mapping, which
        // never overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(
                frame.as_ptr().add(1),
                self.base.as_ptr().add(1),
                len - 1,
            );
        }
    }

    /// Store the cycle total at [`RESULT_OFFSET`].
    #[inline]
    pub fn write_result(&self, cycles: u64) {
        let bytes = encode_cycles(cycles);
        // SAFETY: RESULT_OFFSET + RESULT_SIZE <= LAYOUT_MIN_SIZE <= len.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.base.as_ptr().add(RESULT_OFFSET),
                RESULT_SIZE,
            );
        }
        fence(Ordering::Release);
    }

    /// Load the cycle total at [`RESULT_OFFSET`].
    #[inline]
    pub fn read_result(&self) -> u64 {
        fence(Ordering::Acquire);
        let mut bytes = [0u8; RESULT_SIZE];
        // SAFETY: see write_result.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(RESULT_OFFSET),
                bytes.as_mut_ptr(),
                RESULT_SIZE,
            );
        }
        decode_cycles(bytes)
    }

    /// Copy of the whole mapping.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len];
        // SAFETY: len bytes at base are mapped.
        unsafe { std::ptr::copy_nonoverlapping(self.base.as_ptr(), out.as_mut_ptr(), self.len) };
        out
    }
}

/// Process-local stand-in for an attached segment.
///
/// Backs a [`SegmentView`] with heap memory so the benchmark protocol can be
/// driven without kernel IPC objects.
#[derive(Debug)]
pub struct HeapSegment {
    view: SegmentView,
    storage: NonNull<[u8]>,
}

// SAFETY: the storage is only reached through the view.
unsafe impl Send for HeapSegment {}
unsafe impl Sync for HeapSegment {}

impl HeapSegment {
    /// Zeroed heap segment of `size` bytes.
    pub fn new(size: usize) -> IpcResult<Self> {
        validate_segment_size(size)?;
        let storage = NonNull::from(Box::leak(vec![0u8; size].into_boxed_slice()));
        let base = storage.cast::<u8>();
        Ok(Self {
            // SAFETY: the leaked allocation lives until Drop reclaims it.
            view: unsafe { SegmentView::from_raw_parts(base, size) },
            storage,
        })
    }

    /// Field accessors over the heap buffer.
    pub fn view(&self) -> &SegmentView {
        &self.view
    }
}

impl Drop for HeapSegment {
    fn drop(&mut self) {
        // SAFETY: storage came from Box::leak in new() and is dropped once.
        drop(unsafe { Box::from_raw(self.storage.as_ptr()) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shm_bench_common::consts::BUFSIZE;
    use shm_bench_common::layout::ack_frame;

    #[test]
    fn test_segment_size_validation() {
        assert!(validate_segment_size(BUFSIZE).is_ok());
        assert!(validate_segment_size(LAYOUT_MIN_SIZE).is_ok());
        assert!(matches!(
            validate_segment_size(LAYOUT_MIN_SIZE - 1),
            Err(IpcError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_heap_segment_starts_zeroed() {
        let segment = HeapSegment::new(BUFSIZE).unwrap();
        assert_eq!(segment.view().len(), BUFSIZE);
        assert_eq!(segment.view().marker(), Marker::Unknown(0));
        assert_eq!(segment.view().read_result(), 0);
    }

    #[test]
    fn test_result_does_not_touch_marker() {
        let segment = HeapSegment::new(BUFSIZE).unwrap();
        let view = segment.view();
        view.set_marker(Marker::Pending);
        view.write_result(u64::MAX - 1);
        assert_eq!(view.marker(), Marker::Pending);
        assert_eq!(view.read_result(), u64::MAX - 1);
        assert_eq!(view.snapshot()[RESULT_OFFSET + RESULT_SIZE], 0);
    }

    #[test]
    fn test_frame_overwrites_marker_and_result() {
        let segment = HeapSegment::new(BUFSIZE).unwrap();
        let view = segment.view();
        view.set_marker(Marker::Pending);
        view.write_result(42);

        let frame = ack_frame();
        view.write_frame(&frame);
        assert_eq!(view.marker(), Marker::Idle);
        assert_eq!(view.snapshot(), frame.to_vec());
    }

    #[test]
    fn test_frame_is_truncated_to_mapping() {
        let segment = HeapSegment::new(LAYOUT_MIN_SIZE).unwrap();
        segment.view().write_frame(&ack_frame());
        assert_eq!(segment.view().snapshot(), ack_frame()[..LAYOUT_MIN_SIZE].to_vec());
    }
}
