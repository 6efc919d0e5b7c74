//! Output directory management.
//!
//! Exported pages and published assets live in one shared directory. It is
//! either configured explicitly or created lazily as a temporary directory,
//! which is removed when the owning [`OutputDir`] is dropped.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Lazily created output directory.
#[derive(Debug)]
pub struct OutputDir {
    configured: Option<PathBuf>,
    temp: Option<TempDir>,
}

impl OutputDir {
    /// Create a handle for the output directory.
    ///
    /// With `configured == None` a temporary directory is created on first use.
    #[must_use]
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            temp: None,
        }
    }

    /// Get the directory path, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn path(&mut self) -> io::Result<&Path> {
        if let Some(dir) = &self.configured {
            std::fs::create_dir_all(dir)?;
            return Ok(dir);
        }
        let temp = match self.temp.take() {
            Some(temp) => temp,
            None => {
                let temp = tempfile::Builder::new().prefix("livedoc-").tempdir()?;
                tracing::debug!(path = %temp.path().display(), "Created output directory");
                temp
            }
        };
        Ok(self.temp.insert(temp).path())
    }

    /// Get the directory path if it has been created or configured.
    #[must_use]
    pub fn existing(&self) -> Option<&Path> {
        self.configured
            .as_deref()
            .or_else(|| self.temp.as_ref().map(TempDir::path))
    }
}

/// HTML file name for a source document: its base name with `.html`.
///
/// Documents sharing a base name in different directories map to the same
/// page and overwrite each other.
#[must_use]
pub fn page_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map_or_else(|| "index".into(), |s| s.to_string_lossy());
    format!("{stem}.html")
}
