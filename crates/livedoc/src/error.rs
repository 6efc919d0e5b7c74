//! CLI error types.

use livedoc_config::ConfigError;
use livedoc_server::PreviewError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Preview(#[from] PreviewError),

    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Validation(String),
}
