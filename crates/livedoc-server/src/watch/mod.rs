//! Filesystem save detection.
//!
//! [`SaveWatcher`] turns filesystem activity on tracked documents into
//! debounced [`FsEvent`]s delivered over a channel. It watches each tracked
//! document's parent directory rather than the file itself, so atomic saves
//! that replace the file are still observed.

mod debouncer;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use debouncer::EventDebouncer;
pub use debouncer::{FsEvent, FsEventKind};

/// How often the debouncer is polled for settled events.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type Tracked = Arc<Mutex<HashSet<PathBuf>>>;

/// Watches tracked documents and emits debounced change events.
pub struct SaveWatcher {
    watcher: RecommendedWatcher,
    tracked: Tracked,
    /// Watched directories with the number of tracked documents in each.
    dirs: BTreeMap<PathBuf, usize>,
}

impl SaveWatcher {
    /// Start the watcher.
    ///
    /// Spawns background tasks on the current tokio runtime. Events stop
    /// when the returned receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn start(debounce: Duration) -> Result<(Self, mpsc::Receiver<FsEvent>), notify::Error> {
        let (raw_tx, mut raw_rx) = mpsc::channel::<Event>(100);
        let (out_tx, out_rx) = mpsc::channel::<FsEvent>(100);

        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // Callback runs on the notify thread
                Ok(event) => {
                    let _ = raw_tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })?;

        let tracked: Tracked = Arc::default();
        let debouncer = Arc::new(EventDebouncer::new(debounce));

        let record_tracked = Arc::clone(&tracked);
        let record_debouncer = Arc::clone(&debouncer);
        tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                record_event(&event, &record_tracked, &record_debouncer);
            }
        });

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                for event in debouncer.drain_ready() {
                    if out_tx.send(event).await.is_err() {
                        return;
                    }
                }
                if out_tx.is_closed() {
                    return;
                }
            }
        });

        let watcher = Self {
            watcher,
            tracked,
            dirs: BTreeMap::new(),
        };
        Ok((watcher, out_rx))
    }

    /// Start reporting changes to `file`. Tracking a file twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be watched.
    pub fn track(&mut self, file: &Path) -> Result<(), notify::Error> {
        let file = canonical(file);
        let Some(dir) = file.parent().map(Path::to_path_buf) else {
            return Ok(());
        };

        if !lock(&self.tracked).insert(file.clone()) {
            return Ok(());
        }

        if !self.dirs.contains_key(&dir) {
            if let Err(e) = self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                lock(&self.tracked).remove(&file);
                return Err(e);
            }
            tracing::debug!(dir = %dir.display(), "Watching directory");
        }
        *self.dirs.entry(dir).or_insert(0) += 1;
        Ok(())
    }

    /// Stop reporting changes to `file`. Unknown files are ignored.
    pub fn untrack(&mut self, file: &Path) {
        let file = canonical(file);
        if !lock(&self.tracked).remove(&file) {
            return;
        }
        let Some(dir) = file.parent() else {
            return;
        };
        let Some(count) = self.dirs.get_mut(dir) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.dirs.remove(dir);
            if let Err(e) = self.watcher.unwatch(dir) {
                tracing::debug!(dir = %dir.display(), error = %e, "Failed to unwatch directory");
            }
        }
    }

    /// Number of tracked documents.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }
}

fn lock(tracked: &Tracked) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
    tracked.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canonical path, or the path as given if it cannot be resolved.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Map a raw notify event kind to a document change.
fn classify(kind: EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Some(FsEventKind::Removed)
        }
        // Permission and timestamp changes are not saves
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FsEventKind::Modified),
        _ => None,
    }
}

/// Record a raw event for every tracked path it touches.
fn record_event(event: &Event, tracked: &Tracked, debouncer: &EventDebouncer) {
    let Some(kind) = classify(event.kind) else {
        return;
    };

    let tracked = lock(tracked);
    for path in &event.paths {
        if tracked.contains(path) {
            debouncer.record(path.clone(), kind);
            tracing::debug!(path = %path.display(), ?kind, "Recorded filesystem event");
        }
    }
}
