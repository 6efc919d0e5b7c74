//! `livedoc preview` command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use livedoc_config::{CliSettings, Config};
use livedoc_convert::MarkdownConverter;
use livedoc_server::{FsEvent, FsEventKind, PreviewService, SaveWatcher, preview_config_from_config};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::output::Output;
use crate::protocol::{EditorCommand, parse_line};

/// Arguments for the preview command.
#[derive(Args)]
pub(crate) struct PreviewArgs {
    /// Documents to preview.
    files: Vec<PathBuf>,

    /// Path to configuration file (default: auto-discover livedoc.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for exported pages (overrides config).
    #[arg(short, long, env = "LIVEDOC_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Do not open previews in a browser.
    #[arg(long)]
    no_open: bool,

    /// Read editor commands (open, save, close, quit) from stdin.
    #[arg(long)]
    stdin: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl PreviewArgs {
    /// Execute the preview command.
    ///
    /// Runs until interrupted, until `quit` is read in stdin mode, or until
    /// the last document is closed otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the file watcher cannot
    /// start, or no document could be previewed.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        if self.files.is_empty() && !self.stdin {
            return Err(CliError::Validation(
                "nothing to preview: pass one or more files or --stdin".to_owned(),
            ));
        }

        let cli_settings = CliSettings {
            output_dir: self.output_dir,
            open_browser: self.no_open.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        if config.port_ranges_overlap() {
            output.warning(&format!(
                "HTTP ports {} overlap WebSocket ports {}",
                config.server.http_ports, config.server.ws_ports
            ));
        }

        let service = PreviewService::new(
            preview_config_from_config(&config),
            Arc::new(MarkdownConverter::new()),
        );
        let (watcher, mut events) =
            SaveWatcher::start(Duration::from_millis(config.watch.debounce_ms))?;

        let mut previews = Previews {
            service,
            watcher,
            output,
        };

        for file in &self.files {
            previews.open(file).await;
        }
        if !self.stdin && previews.service.session_count() == 0 {
            return Err(CliError::Validation(
                "none of the given documents could be previewed".to_owned(),
            ));
        }

        let stdin = self.stdin.then(|| BufReader::new(tokio::io::stdin()).lines());
        previews.run(&mut events, stdin, shutdown_signal()).await;

        previews.service.shutdown().await;
        previews.output.info("Preview stopped");
        Ok(())
    }
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// Read the next editor line, or wait forever when there is no editor input.
async fn next_line<R>(lines: &mut Option<Lines<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Preview service together with the watcher tracking its documents.
struct Previews {
    service: PreviewService,
    watcher: SaveWatcher,
    output: Output,
}

impl Previews {
    /// Handle events until `shutdown` completes or there is nothing left to do.
    ///
    /// With editor input, the loop ends on `quit` or end of input. Without
    /// it, the loop ends once the last document is closed.
    async fn run<R>(
        &mut self,
        events: &mut mpsc::Receiver<FsEvent>,
        mut input: Option<Lines<R>>,
        shutdown: impl Future<Output = ()>,
    ) where
        R: AsyncBufRead + Unpin,
    {
        let interactive = input.is_some();
        tokio::pin!(shutdown);

        loop {
            if !interactive && self.service.session_count() == 0 {
                self.output.info("No documents left to preview");
                break;
            }

            tokio::select! {
                Some(event) = events.recv() => self.on_fs_event(event).await,
                line = next_line(&mut input) => match line {
                    Ok(Some(line)) => {
                        if self.on_line(&line).await.is_break() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Editor input closed");
                        break;
                    }
                    Err(e) => {
                        self.output.error(&format!("Failed to read stdin: {e}"));
                        break;
                    }
                },
                () = &mut shutdown => break,
            }
        }
    }

    async fn open(&mut self, file: &Path) {
        let result = self.service.enable_preview(file).await;

        // A document whose first export failed stays registered; watch it so
        // the next save retries
        if self.service.session(file).is_some()
            && let Err(e) = self.watcher.track(file)
        {
            self.output
                .warning(&format!("Not watching {} for saves: {e}", file.display()));
        }

        match result {
            Ok(url) => {
                self.output
                    .success(&format!("Previewing {}", file.display()));
                self.output.highlight(&url);
            }
            Err(e) => self
                .output
                .error(&format!("Cannot preview {}: {e}", file.display())),
        }
    }

    async fn save(&mut self, file: &Path) {
        match self.service.on_document_saved(file).await {
            Ok(clients) => {
                tracing::info!(source = %file.display(), clients, "Reload sent");
            }
            Err(e) => self
                .output
                .error(&format!("Cannot refresh {}: {e}", file.display())),
        }
    }

    async fn close(&mut self, file: &Path) {
        if self.service.session(file).is_none() {
            return;
        }
        self.watcher.untrack(file);
        self.service.disable_preview(file).await;
        self.output.info(&format!("Closed {}", file.display()));
    }

    async fn on_fs_event(&mut self, event: FsEvent) {
        match event.kind {
            FsEventKind::Created | FsEventKind::Modified => self.save(&event.path).await,
            FsEventKind::Removed => {
                // Some editors save by renaming over the file
                if event.path.exists() {
                    self.save(&event.path).await;
                } else {
                    self.close(&event.path).await;
                }
            }
        }
    }

    /// Handle one editor command line. Breaks on `quit`.
    async fn on_line(&mut self, line: &str) -> std::ops::ControlFlow<()> {
        match parse_line(line) {
            Ok(Some(EditorCommand::Open(file))) => self.open(&file).await,
            Ok(Some(EditorCommand::Save(file))) => self.save(&file).await,
            Ok(Some(EditorCommand::Close(file))) => self.close(&file).await,
            Ok(Some(EditorCommand::Quit)) => return std::ops::ControlFlow::Break(()),
            Ok(None) => {}
            Err(e) => self.output.warning(&format!("Ignoring command: {e}")),
        }
        std::ops::ControlFlow::Continue(())
    }
}
