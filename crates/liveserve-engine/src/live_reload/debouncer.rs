//! Change debouncing.
//!
//! Coalesces bursts of file-change notifications into a single pending
//! change, so one editor save (which often produces several filesystem
//! events) triggers one reload.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The change waiting out its quiet period.
struct PendingChange {
    path: PathBuf,
    deadline: Instant,
}

/// Thread-safe change debouncer.
///
/// Holds at most one pending change: every notification overwrites the
/// slot and re-arms the deadline, so only the last file of a burst is
/// reported. A notification is emitted (via [`drain_ready`]) once no new
/// notification arrived for the quiet period.
///
/// [`drain_ready`]: ChangeDebouncer::drain_ready
pub(crate) struct ChangeDebouncer {
    pending: Mutex<Option<PendingChange>>,
    quiet_period: Duration,
}

impl ChangeDebouncer {
    /// Create a debouncer with the given quiet period.
    pub(crate) fn new(quiet_period: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            quiet_period,
        }
    }

    /// Record a change notification.
    ///
    /// Supersedes any pending change regardless of its path.
    pub(crate) fn notify(&self, path: &Path) {
        let mut pending = self.pending.lock().unwrap();
        *pending = Some(PendingChange {
            path: path.to_path_buf(),
            deadline: Instant::now() + self.quiet_period,
        });
    }

    /// Take the pending change if its quiet period has elapsed.
    ///
    /// Called from the pump task. A zero quiet period still goes through
    /// here, so emission is always deferred to the next pump tick.
    pub(crate) fn drain_ready(&self) -> Option<PathBuf> {
        let mut pending = self.pending.lock().unwrap();
        if pending
            .as_ref()
            .is_some_and(|change| change.deadline <= Instant::now())
        {
            return pending.take().map(|change| change.path);
        }
        None
    }

    /// Drop any pending change without emitting it.
    ///
    /// Used on shutdown so a timer armed before `stop()` cannot fire into
    /// a torn-down push channel.
    pub(crate) fn clear(&self) {
        self.pending.lock().unwrap().take();
    }
}
