//! Transfer progress tracking

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Receives percent-complete values (0 to 100).
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Raw byte counters emitted by a transport while the body is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Whole percent sent, rounded down. An empty body counts as 0 until completion.
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        let sent = self.bytes_sent.min(self.bytes_total) as u128;
        (sent * 100 / self.bytes_total as u128) as u8
    }
}

/// Turns transport counters into callback invocations.
///
/// Values are strictly increasing; while the body is in flight they are capped at 99
/// so that 100 is only reported by [`ProgressReporter::complete`].
pub struct ProgressReporter {
    callback: ProgressCallback,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback,
            last: AtomicU8::new(0),
        }
    }

    pub fn report(&self, progress: TransferProgress) {
        self.emit(progress.percent().min(99));
    }

    /// Storage accepted the file.
    pub fn complete(&self) {
        self.emit(100);
    }

    /// Last value handed to the callback.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    fn emit(&self, percent: u8) {
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            (self.callback)(percent);
        }
    }
}
