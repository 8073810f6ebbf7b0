//! Teardown of the benchmark IPC objects

use crate::error::{IpcError, IpcResult};
use crate::segment::SegmentId;
use crate::semaphore::SysvSemaphore;
use tracing::{info, warn};

/// Outcome of [`release_all`]: one entry per object, never short-circuited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Removal of the shared memory segment
    pub segment: IpcResult<()>,
    /// Removal of the semaphore set
    pub semaphore: IpcResult<()>,
}

impl ReleaseReport {
    /// Report for a teardown that had nothing left to remove.
    pub fn nothing_to_release() -> Self {
        Self {
            segment: Ok(()),
            semaphore: Ok(()),
        }
    }

    /// True if both removals succeeded.
    pub fn is_clean(&self) -> bool {
        self.segment.is_ok() && self.semaphore.is_ok()
    }

    /// Every removal failure, segment first.
    pub fn errors(&self) -> impl Iterator<Item = &IpcError> {
        self.segment
            .as_ref()
            .err()
            .into_iter()
            .chain(self.semaphore.as_ref().err())
    }
}

/// Remove the segment and the semaphore set from the system.
///
/// Each removal is attempted even if the other one fails, and neither is
/// retried. Failures are logged and returned in the report.
pub fn release_all(segment: SegmentId, semaphore: SysvSemaphore) -> ReleaseReport {
    let report = ReleaseReport {
        segment: segment.remove(),
        semaphore: semaphore.remove(),
    };

    for e in report.errors() {
        warn!("{}", e);
    }
    if report.is_clean() {
        info!(
            "Released shared memory {} and semaphore {}",
            segment.id(),
            semaphore.id()
        );
    }
    report
}
