//! Benchmark constants.
//!
//! These constants define the wire layout of the benchmark segment and the
//! fixed parameters of one benchmark run. They are the single source of truth -
//! the server, the probe client and the tests all import from here.

use static_assertions::const_assert;

/// System V IPC key type.
pub type IpcKey = libc::key_t;

/// Size of the shared memory segment in bytes.
///
/// One acknowledgement frame is exactly this long, so every trial copies the
/// whole segment.
pub const BUFSIZE: usize = 64;

/// Number of timed copy operations in one benchmark run.
pub const TRIALS: u32 = 1000;

/// Offset of the readiness marker byte.
pub const MARKER_OFFSET: usize = 0;

/// Offset of the cycle-count result.
pub const RESULT_OFFSET: usize = 1;

/// Width of the cycle-count result (native-endian `u64`).
pub const RESULT_SIZE: usize = core::mem::size_of::<u64>();

/// Smallest segment that can hold the marker and the result.
pub const LAYOUT_MIN_SIZE: usize = RESULT_OFFSET + RESULT_SIZE;

/// Marker value written by the client to request a run.
pub const PENDING_MARKER: u8 = b'*';

/// Marker value meaning "idle / result available".
pub const IDLE_MARKER: u8 = b'~';

/// Acknowledgement message copied into the segment on every trial.
///
/// Starts with [`IDLE_MARKER`], so the first trial of a run already moves the
/// marker out of the pending state.
pub const ACK_MESSAGE: &[u8] = b"~Thanks for the message Client";

/// Well-known key shared by the segment and the semaphore set ("SHMB").
pub const DEFAULT_IPC_KEY: IpcKey = 0x5348_4D42;

/// Permission bits for both IPC objects (world read/write).
pub const IPC_MODE: libc::c_int = 0o666;

/// Default sleep between two readiness checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Upper bound accepted for the poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

const_assert!(LAYOUT_MIN_SIZE <= BUFSIZE);
const_assert!(ACK_MESSAGE.len() <= BUFSIZE);
const_assert!(ACK_MESSAGE[0] == IDLE_MARKER);
const_assert!(PENDING_MARKER != IDLE_MARKER);
const_assert!(TRIALS > 0);
