//! Save event debouncing.
//!
//! Editors rarely produce a single filesystem event per save: a plain write
//! can emit several modifications, and atomic saves show up as a removal or
//! rename followed by a creation. Events are held per path until the path
//! has been quiet for the debounce window, then released as one event.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Kind of filesystem change to a watched document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsEventKind {
    /// The file appeared.
    Created,
    /// The file content changed.
    Modified,
    /// The file disappeared or was renamed away.
    Removed,
}

impl FsEventKind {
    /// Merge a later event into a pending one.
    ///
    /// Returns `None` when the pair cancels out (created then removed within
    /// one window).
    fn merge(self, next: Self) -> Option<Self> {
        use FsEventKind::{Created, Modified, Removed};

        match (self, next) {
            (Created, Removed) => None,
            (Created, Created | Modified) | (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            // Atomic save: old file replaced by a new one
            (Removed, Created) => Some(Modified),
            (Modified | Removed, Removed) | (Removed, Modified) => Some(Removed),
        }
    }
}

/// A debounced filesystem event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEvent {
    /// Path of the document.
    pub path: PathBuf,
    /// Coalesced kind of change.
    pub kind: FsEventKind,
}

#[derive(Debug)]
struct Pending {
    kind: FsEventKind,
    deadline: Instant,
}

/// Thread-safe per-path event debouncer.
#[derive(Debug)]
pub(crate) struct EventDebouncer {
    pending: Mutex<BTreeMap<PathBuf, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    /// Create a debouncer that releases a path after `window` of quiet.
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a raw event, restarting the window for its path.
    pub(crate) fn record(&self, path: PathBuf, kind: FsEventKind) {
        let deadline = Instant::now() + self.window;
        let mut pending = self.lock();

        let merged = match pending.remove(&path) {
            Some(existing) => existing.kind.merge(kind),
            None => Some(kind),
        };
        if let Some(kind) = merged {
            pending.insert(path, Pending { kind, deadline });
        }
    }

    /// Take every event whose window has elapsed, in path order.
    pub(crate) fn drain_ready(&self) -> Vec<FsEvent> {
        let now = Instant::now();
        let mut pending = self.lock();

        let (ready, waiting): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut *pending)
            .into_iter()
            .partition(|(_, event)| event.deadline <= now);
        *pending = waiting;

        ready
            .into_iter()
            .map(|(path, event)| FsEvent {
                path,
                kind: event.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    const WINDOW: Duration = Duration::from_millis(10);

    fn settle() {
        thread::sleep(WINDOW + Duration::from_millis(5));
    }

    fn doc() -> PathBuf {
        PathBuf::from("/notes/todo.md")
    }

    #[test]
    fn test_event_held_until_window_elapses() {
        let debouncer = EventDebouncer::new(WINDOW);
        debouncer.record(doc(), FsEventKind::Modified);

        assert!(debouncer.drain_ready().is_empty());

        settle();
        assert_eq!(
            debouncer.drain_ready(),
            vec![FsEvent {
                path: doc(),
                kind: FsEventKind::Modified
            }]
        );
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_burst_of_writes_is_one_save() {
        let debouncer = EventDebouncer::new(WINDOW);
        for _ in 0..4 {
            debouncer.record(doc(), FsEventKind::Modified);
        }

        settle();
        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FsEventKind::Modified);
    }

    #[test]
    fn test_atomic_save_is_modification() {
        let debouncer = EventDebouncer::new(WINDOW);
        debouncer.record(doc(), FsEventKind::Removed);
        debouncer.record(doc(), FsEventKind::Created);
        debouncer.record(doc(), FsEventKind::Modified);

        settle();
        // Removed + Created -> Modified, then Modified + Modified
        assert_eq!(debouncer.drain_ready()[0].kind, FsEventKind::Modified);
    }

    #[test]
    fn test_transient_file_is_discarded() {
        let debouncer = EventDebouncer::new(WINDOW);
        debouncer.record(doc(), FsEventKind::Created);
        debouncer.record(doc(), FsEventKind::Removed);

        settle();
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_deleted_after_edit_is_removal() {
        let debouncer = EventDebouncer::new(WINDOW);
        debouncer.record(doc(), FsEventKind::Modified);
        debouncer.record(doc(), FsEventKind::Removed);

        settle();
        assert_eq!(debouncer.drain_ready()[0].kind, FsEventKind::Removed);
    }

    #[test]
    fn test_paths_debounced_independently() {
        let debouncer = EventDebouncer::new(WINDOW);
        debouncer.record(PathBuf::from("/notes/b.md"), FsEventKind::Modified);
        debouncer.record(PathBuf::from("/notes/a.md"), FsEventKind::Created);

        settle();
        let paths: Vec<_> = debouncer.drain_ready().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/notes/a.md"), PathBuf::from("/notes/b.md")]
        );
    }

    #[test]
    fn test_merge_table() {
        use FsEventKind::{Created, Modified, Removed};

        let cases = [
            (Created, Created, Some(Created)),
            (Created, Modified, Some(Created)),
            (Created, Removed, None),
            (Modified, Created, Some(Created)),
            (Modified, Modified, Some(Modified)),
            (Modified, Removed, Some(Removed)),
            (Removed, Created, Some(Modified)),
            (Removed, Modified, Some(Removed)),
            (Removed, Removed, Some(Removed)),
        ];
        for (pending, next, expected) in cases {
            assert_eq!(pending.merge(next), expected, "{pending:?} + {next:?}");
        }
    }
}
