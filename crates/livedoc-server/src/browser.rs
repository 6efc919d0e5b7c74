//! Browser launching.

/// Opens preview pages in a browser. Fire-and-forget.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`. Failures are logged, never returned.
    fn open(&self, url: &str);
}

/// Opens URLs with the system default browser or a named application.
#[derive(Clone, Debug, Default)]
pub struct SystemBrowser {
    app: Option<String>,
}

impl SystemBrowser {
    /// Create a launcher. `app` overrides the system default browser.
    #[must_use]
    pub fn new(app: Option<String>) -> Self {
        Self { app }
    }
}

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) {
        let result = match &self.app {
            Some(app) => open::with_detached(url, app),
            None => open::that_detached(url),
        };
        match result {
            Ok(()) => tracing::debug!(url, app = ?self.app, "Opened browser"),
            Err(e) => tracing::warn!(url, error = %e, "Failed to open browser"),
        }
    }
}
