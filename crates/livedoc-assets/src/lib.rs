//! Page template and static assets for livedoc previews.
//!
//! The assets under `assets/` are compiled into the binary via `rust-embed`.
//! An optional override directory lets users replace any of them without
//! rebuilding: a file present there wins over the embedded copy.
//!
//! - `template.html`: page shell with `{{title}}`, `{{ws_port}}` and `{{body}}`
//!   placeholders
//! - `style.css`: preview stylesheet
//! - `live-reload.js`: browser reload client

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Embedded preview assets.
#[derive(rust_embed::RustEmbed)]
#[folder = "assets/"]
struct Embedded;

/// File name of the page template.
pub const TEMPLATE: &str = "template.html";

/// Stylesheet referenced by the page template.
pub const STYLESHEET: &str = "style.css";

/// Reload client script referenced by the page template.
pub const RELOAD_SCRIPT: &str = "live-reload.js";

/// Assets copied into the output directory next to exported pages.
pub const PUBLISHED: [&str; 2] = [STYLESHEET, RELOAD_SCRIPT];

/// Source of preview assets: embedded files with optional overrides.
#[derive(Clone, Debug, Default)]
pub struct AssetSource {
    override_dir: Option<PathBuf>,
}

impl AssetSource {
    /// Create an asset source.
    ///
    /// Files in `override_dir` take precedence over the embedded assets.
    #[must_use]
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self { override_dir }
    }

    /// Get an asset by name.
    ///
    /// Returns the override file if it exists and is readable, otherwise the
    /// embedded asset, or `None` if neither exists.
    pub fn get(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                match std::fs::read(&path) {
                    Ok(content) => return Some(Cow::Owned(content)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to read asset override");
                    }
                }
            }
        }
        Embedded::get(name).map(|f| f.data)
    }

    /// Get the page template as text.
    ///
    /// Invalid UTF-8 sequences in an override template are replaced.
    pub fn template(&self) -> String {
        self.get(TEMPLATE)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    /// Copy the published assets into `dest`, overwriting existing copies.
    ///
    /// Always re-copies so edits to override files take effect on the next
    /// export without a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if `dest` cannot be created or a file cannot be written.
    pub fn publish(&self, dest: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dest)?;
        for name in PUBLISHED {
            let Some(content) = self.get(name) else {
                continue;
            };
            std::fs::write(dest.join(name), &content)?;
        }
        tracing::debug!(dest = %dest.display(), "Published static assets");
        Ok(())
    }
}

/// Iterate all embedded asset names.
pub fn iter() -> impl Iterator<Item = Cow<'static, str>> {
    Embedded::iter()
}
