//! Session registry.
//!
//! Maps each preview-enabled document to its exported page.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One preview-enabled document and its derived HTML output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Absolute path of the source document (registry key).
    pub source: PathBuf,
    /// Path of the exported HTML page inside the output directory.
    ///
    /// `None` until the first successful export, so a recorded path always
    /// names a page that was written.
    pub output_path: Option<PathBuf>,
    /// Page title from document metadata or the file name.
    pub title: String,
}

impl Session {
    /// File name of the exported page, as served over HTTP.
    #[must_use]
    pub fn page_name(&self) -> Option<String> {
        self.output_path
            .as_deref()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Registry of open preview sessions keyed by absolute source path.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<PathBuf, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Returns `false` if the source was already registered,
    /// in which case the existing session is kept.
    pub fn insert(&mut self, session: Session) -> bool {
        use std::collections::btree_map::Entry;

        match self.sessions.entry(session.source.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(session);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Remove a session, returning it if present.
    pub fn remove(&mut self, source: &Path) -> Option<Session> {
        self.sessions.remove(source)
    }

    /// Look up a session by source path.
    #[must_use]
    pub fn get(&self, source: &Path) -> Option<&Session> {
        self.sessions.get(source)
    }

    /// Record the latest export of a registered session.
    ///
    /// Does nothing if the source is not registered.
    pub fn record_export(&mut self, source: &Path, output_path: PathBuf, title: String) {
        if let Some(session) = self.sessions.get_mut(source) {
            session.output_path = Some(output_path);
            session.title = title;
        }
    }

    /// Check whether a source is registered.
    #[must_use]
    pub fn contains(&self, source: &Path) -> bool {
        self.sessions.contains_key(source)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate sessions in source path order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Source paths of all registered sessions.
    #[must_use]
    pub fn sources(&self) -> Vec<PathBuf> {
        self.sessions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session(source: &str, output: &str) -> Session {
        Session {
            source: PathBuf::from(source),
            output_path: Some(PathBuf::from(output)),
            title: "Title".to_owned(),
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut registry = SessionRegistry::new();

        assert!(registry.insert(session("/docs/a.md", "/out/a.html")));
        assert!(!registry.insert(session("/docs/a.md", "/out/other.html")));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(Path::new("/docs/a.md")).unwrap().output_path,
            Some(PathBuf::from("/out/a.html"))
        );
    }

    #[test]
    fn test_remove_absent_is_none() {
        let mut registry = SessionRegistry::new();
        assert!(registry.remove(Path::new("/docs/missing.md")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_record_export_updates_title() {
        let mut registry = SessionRegistry::new();
        registry.insert(Session {
            output_path: None,
            ..session("/docs/a.md", "")
        });

        registry.record_export(
            Path::new("/docs/a.md"),
            PathBuf::from("/out/a.html"),
            "New Title".to_owned(),
        );
        registry.record_export(
            Path::new("/docs/unknown.md"),
            PathBuf::from("/out/unknown.html"),
            "Ignored".to_owned(),
        );

        let recorded = registry.get(Path::new("/docs/a.md")).unwrap();
        assert_eq!(recorded.title, "New Title");
        assert_eq!(recorded.output_path, Some(PathBuf::from("/out/a.html")));
        assert!(!registry.contains(Path::new("/docs/unknown.md")));
    }

    #[test]
    fn test_sources_sorted() {
        let mut registry = SessionRegistry::new();
        registry.insert(session("/docs/b.md", "/out/b.html"));
        registry.insert(session("/docs/a.md", "/out/a.html"));

        assert_eq!(
            registry.sources(),
            vec![PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.md")]
        );
    }

    #[test]
    fn test_page_name() {
        let exported = session("/docs/a.md", "/out/a.html");
        assert_eq!(exported.page_name().as_deref(), Some("a.html"));

        let pending = Session {
            output_path: None,
            ..exported
        };
        assert_eq!(pending.page_name(), None);
    }
}
