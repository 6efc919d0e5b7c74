//! Preview error types.

use std::fmt;
use std::path::PathBuf;

/// Which of the two preview servers an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerKind {
    /// HTTP static file server.
    Http,
    /// WebSocket reload server.
    WebSocket,
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("HTTP"),
            Self::WebSocket => f.write_str("WebSocket"),
        }
    }
}

/// Errors surfaced by the preview service.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// No free port in the configured range.
    #[error("no port available in range {min}-{max}")]
    NoPortAvailable {
        /// Lowest port probed.
        min: u16,
        /// Highest port probed.
        max: u16,
    },

    /// A server failed to start. Any server already started was stopped.
    #[error("failed to start {server} server: {source}")]
    ServerStartFailed {
        /// Server that failed.
        server: ServerKind,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Converting or writing a document failed. The previous output is untouched.
    #[error("failed to export {}: {reason}", .path.display())]
    ExportFailed {
        /// Source document.
        path: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// The document has no backing file.
    #[error("cannot preview {}: no backing file", .path.display())]
    NotPreviewable {
        /// Path that was rejected.
        path: PathBuf,
    },

    /// Output directory I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl PreviewError {
    pub(crate) fn start_failed(
        server: ServerKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ServerStartFailed {
            server,
            source: source.into(),
        }
    }

    pub(crate) fn export_failed(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ExportFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for preview operations.
pub type Result<T, E = PreviewError> = std::result::Result<T, E>;
