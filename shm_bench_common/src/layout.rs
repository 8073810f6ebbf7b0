//! Segment layout helpers.
//!
//! ```text
//! offset  0        1                9                      BUFSIZE
//!         ┌────────┬────────────────┬──────────────────────┐
//!         │ marker │ cycles (u64 ne)│ rest of ack frame    │
//!         └────────┴────────────────┴──────────────────────┘
//! ```

use crate::consts::{ACK_MESSAGE, BUFSIZE, IDLE_MARKER, PENDING_MARKER, RESULT_SIZE};

/// Decoded readiness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// A client requested a run (`'*'`).
    Pending,
    /// No request outstanding; the last result is readable (`'~'`).
    Idle,
    /// Any other byte, e.g. a segment nobody initialized yet.
    Unknown(u8),
}

impl Marker {
    /// Decode a raw marker byte.
    #[inline]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            PENDING_MARKER => Self::Pending,
            IDLE_MARKER => Self::Idle,
            other => Self::Unknown(other),
        }
    }

    /// Raw byte for this marker.
    #[inline]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Pending => PENDING_MARKER,
            Self::Idle => IDLE_MARKER,
            Self::Unknown(byte) => byte,
        }
    }
}

/// The fixed acknowledgement frame: [`ACK_MESSAGE`] zero-padded to [`BUFSIZE`].
pub const fn ack_frame() -> [u8; BUFSIZE] {
    let mut frame = [0u8; BUFSIZE];
    let mut i = 0;
    while i < ACK_MESSAGE.len() {
        frame[i] = ACK_MESSAGE[i];
        i += 1;
    }
    frame
}

/// Encode a cycle total the way it is stored in the segment.
#[inline]
pub const fn encode_cycles(cycles: u64) -> [u8; RESULT_SIZE] {
    cycles.to_ne_bytes()
}

/// Decode a cycle total read from the segment.
#[inline]
pub const fn decode_cycles(bytes: [u8; RESULT_SIZE]) -> u64 {
    u64::from_ne_bytes(bytes)
}
