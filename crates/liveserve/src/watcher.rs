//! Filesystem change feed.
//!
//! Watches the serving root and forwards matching raw change events to the
//! engine's notification intake. Burst coalescing happens engine-side; this
//! only filters and forwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use liveserve_engine::Engine;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Watches a directory and feeds change notifications to an engine.
pub(crate) struct FileWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// Paths are matched against `watch_patterns` (relative to `root`,
    /// default: everything) before being forwarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file watcher cannot be created.
    pub(crate) fn spawn(
        root: PathBuf,
        watch_patterns: Option<Vec<String>>,
        engine: Arc<Engine>,
    ) -> Result<Self, notify::Error> {
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        // Create watcher with callback that sends events to channel
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // Use blocking_send since callback is sync
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let patterns = watch_patterns.unwrap_or_else(|| vec!["**/*".to_owned()]);
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    continue;
                }
                for path in &event.paths {
                    if matches_patterns(path, &root, &patterns) {
                        tracing::debug!(path = %path.display(), "Forwarding change notification");
                        engine.notify(path);
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// Stop watching. Dropping the watcher also ends the forwarding task.
    pub(crate) fn stop(self) {
        self.task.abort();
    }
}

/// Check if a path matches any watch pattern.
fn matches_patterns(path: &Path, root: &Path, patterns: &[String]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    let relative_str = relative.to_string_lossy();

    patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .any(|glob_pattern| glob_pattern.matches(&relative_str))
}
