//! `livedoc export` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use livedoc_assets::AssetSource;
use livedoc_config::{CliSettings, Config};
use livedoc_convert::MarkdownConverter;
use livedoc_server::Exporter;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the export command.
#[derive(Args)]
pub(crate) struct ExportArgs {
    /// Document to export.
    file: PathBuf,

    /// Path to configuration file (default: auto-discover livedoc.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to write the page into (default: current directory).
    #[arg(short, long, env = "LIVEDOC_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

impl ExportArgs {
    /// Execute the export command.
    ///
    /// Pages embed the first port of the WebSocket range since no server
    /// is running.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the export fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        if !self.file.is_file() {
            return Err(CliError::Validation(format!(
                "not a file: {}",
                self.file.display()
            )));
        }

        let cli_settings = CliSettings {
            output_dir: self.output_dir,
            open_browser: None,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let out_dir = match config.output_resolved.dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&out_dir)?;

        let exporter = Exporter::new(
            Arc::new(MarkdownConverter::new()),
            AssetSource::new(config.preview_resolved.template_dir.clone()),
            config.server.ws_ports.min,
        );
        let page = exporter.export(&self.file, &out_dir, None)?;

        output.success(&format!("Exported \"{}\"", page.title));
        if page.images > 0 {
            output.info(&format!("Copied {} image(s)", page.images));
        }
        output.result(&page.output_path.display().to_string());
        Ok(())
    }
}
