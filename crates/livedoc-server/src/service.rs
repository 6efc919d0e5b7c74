//! Preview service.
//!
//! Owns the session registry, the output directory and the pair of shared
//! servers. The first registered session starts both servers; unregistering
//! the last one stops them.
//!
//! All methods take `&mut self` and are meant to be driven from a single
//! task, so the registry and server state need no locking. Only the client
//! set is shared with the WebSocket connection tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use livedoc_assets::AssetSource;
use livedoc_config::{Config, PortRange};
use livedoc_convert::Converter;

use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::error::{PreviewError, Result, ServerKind};
use crate::export::Exporter;
use crate::live_reload::{self, ClientSet, ReloadMessage};
use crate::output::{OutputDir, page_file_name};
use crate::registry::{Session, SessionRegistry};
use crate::server::ServerHandle;

/// Preview service configuration.
#[derive(Clone, Debug)]
pub struct PreviewConfig {
    /// Ports to probe for the HTTP static server.
    pub http_ports: PortRange,
    /// Ports to probe for the WebSocket reload server.
    pub ws_ports: PortRange,
    /// Output directory (`None` uses a temporary directory).
    pub output_dir: Option<PathBuf>,
    /// Directory overriding the embedded page assets.
    pub template_dir: Option<PathBuf>,
    /// Open new previews in a browser.
    pub open_browser: bool,
    /// Browser application overriding the system default.
    pub browser: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            http_ports: PortRange::new(8800, 8849),
            ws_ports: PortRange::new(8850, 8899),
            output_dir: None,
            template_dir: None,
            open_browser: false,
            browser: None,
        }
    }
}

impl PreviewConfig {
    /// WebSocket port embedded in pages exported while no server is bound.
    #[must_use]
    pub fn fallback_ws_port(&self) -> u16 {
        self.ws_ports.min
    }
}

/// Create preview configuration from livedoc config.
#[must_use]
pub fn preview_config_from_config(config: &Config) -> PreviewConfig {
    PreviewConfig {
        http_ports: config.server.http_ports,
        ws_ports: config.server.ws_ports,
        output_dir: config.output_resolved.dir.clone(),
        template_dir: config.preview_resolved.template_dir.clone(),
        open_browser: config.preview_resolved.open_browser,
        browser: config.preview_resolved.browser.clone(),
    }
}

/// Snapshot of server state.
///
/// `running` is true exactly when both ports are set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStatus {
    /// Bound HTTP port.
    pub http_port: Option<u16>,
    /// Bound WebSocket port.
    pub ws_port: Option<u16>,
    /// Both servers are accepting connections.
    pub running: bool,
}

/// The two servers, which only ever exist together.
#[derive(Debug)]
struct RunningServers {
    http: ServerHandle,
    ws: ServerHandle,
}

/// Live preview service.
pub struct PreviewService {
    config: PreviewConfig,
    exporter: Exporter,
    browser: Option<Box<dyn BrowserLauncher>>,
    output: OutputDir,
    registry: SessionRegistry,
    clients: ClientSet,
    servers: Option<RunningServers>,
}

impl PreviewService {
    /// Create a service. No directory or server is created until needed.
    ///
    /// When `config.open_browser` is set the system browser is used; see
    /// [`with_browser`](Self::with_browser) to supply another launcher.
    #[must_use]
    pub fn new(config: PreviewConfig, converter: Arc<dyn Converter>) -> Self {
        let assets = AssetSource::new(config.template_dir.clone());
        let exporter = Exporter::new(converter, assets, config.fallback_ws_port());
        let browser: Option<Box<dyn BrowserLauncher>> = config
            .open_browser
            .then(|| Box::new(SystemBrowser::new(config.browser.clone())) as Box<dyn BrowserLauncher>);

        Self {
            output: OutputDir::new(config.output_dir.clone()),
            config,
            exporter,
            browser,
            registry: SessionRegistry::new(),
            clients: ClientSet::new(),
            servers: None,
        }
    }

    /// Use `launcher` to open new previews.
    #[must_use]
    pub fn with_browser(mut self, launcher: Box<dyn BrowserLauncher>) -> Self {
        self.browser = Some(launcher);
        self
    }

    /// Current server state.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        match &self.servers {
            Some(servers) => ServerStatus {
                http_port: Some(servers.http.port()),
                ws_port: Some(servers.ws.port()),
                running: true,
            },
            None => ServerStatus::default(),
        }
    }

    /// Look up a session by source path.
    #[must_use]
    pub fn session(&self, source: &Path) -> Option<&Session> {
        self.registry.get(&session_key(source))
    }

    /// All registered sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.registry.iter()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of connected reload clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Shared set of connected reload clients.
    #[must_use]
    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    /// Output directory, if it has been created or configured.
    #[must_use]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output.existing()
    }

    /// URL of a session's page, once it has been exported and while the
    /// HTTP server is running.
    #[must_use]
    pub fn page_url(&self, session: &Session) -> Option<String> {
        let port = self.status().http_port?;
        let page = session.page_name()?;
        Some(format!("http://127.0.0.1:{port}/{page}"))
    }

    /// Register a document for preview.
    ///
    /// Idempotent. The first session starts both servers; if that fails the
    /// registration is rolled back. The session has no page until it is
    /// exported.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::NotPreviewable`] if `source` is not an existing
    /// file, or a server start error.
    pub async fn register_session(&mut self, source: &Path) -> Result<Session> {
        let source = resolve_source(source)?;
        if let Some(existing) = self.registry.get(&source) {
            return Ok(existing.clone());
        }

        let session = Session {
            output_path: None,
            title: livedoc_convert::SourceMeta::new(&source).file_stem(),
            source: source.clone(),
        };
        self.registry.insert(session.clone());
        tracing::info!(source = %source.display(), sessions = self.registry.len(), "Registered session");

        if self.registry.len() == 1
            && let Err(e) = self.ensure_servers_running().await
        {
            self.registry.remove(&source);
            return Err(e);
        }

        Ok(session)
    }

    /// Unregister a document. Unknown documents are ignored.
    ///
    /// Deletes the session's exported page and stops the servers when no
    /// sessions remain.
    pub async fn unregister_session(&mut self, source: &Path) {
        let Some(session) = self.registry.remove(&session_key(source)) else {
            return;
        };

        if let Some(page) = &session.output_path {
            match std::fs::remove_file(page) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %page.display(), error = %e, "Failed to remove exported page");
                }
            }
        }
        tracing::info!(source = %session.source.display(), sessions = self.registry.len(), "Unregistered session");

        if self.registry.is_empty() {
            self.stop_servers().await;
        }
    }

    /// Start both servers unless they are already running.
    ///
    /// If the WebSocket server fails after the HTTP server is up, the HTTP
    /// server is stopped before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::ServerStartFailed`] if either server cannot start.
    pub async fn ensure_servers_running(&mut self) -> Result<()> {
        if self.servers.is_some() {
            return Ok(());
        }

        let root = self.output.path()?.to_path_buf();
        self.exporter
            .assets()
            .publish(&root)
            .map_err(|e| PreviewError::start_failed(ServerKind::Http, e))?;

        let http = ServerHandle::start(
            ServerKind::Http,
            self.config.http_ports,
            crate::http::router(&root),
        )
        .await?;

        let ws = match ServerHandle::start(
            ServerKind::WebSocket,
            self.config.ws_ports,
            live_reload::router(self.clients.clone()),
        )
        .await
        {
            Ok(ws) => ws,
            Err(e) => {
                http.stop().await;
                return Err(e);
            }
        };

        tracing::info!(
            http_port = http.port(),
            ws_port = ws.port(),
            root = %root.display(),
            "Preview servers running"
        );
        self.servers = Some(RunningServers { http, ws });
        Ok(())
    }

    /// Stop both servers and close all client connections. Idempotent.
    pub async fn stop_servers(&mut self) {
        let Some(RunningServers { http, ws }) = self.servers.take() else {
            return;
        };
        self.clients.close_all();
        ws.stop().await;
        http.stop().await;
    }

    /// Export a document to its preview page.
    ///
    /// Registered sessions get their output path and title updated. The
    /// currently bound WebSocket port is embedded in the page.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::ExportFailed`] if conversion or writing fails.
    pub fn export(&mut self, source: &Path) -> Result<PathBuf> {
        let source = session_key(source);
        let out_dir = self.output.path()?.to_path_buf();
        let page = self.exporter.export(&source, &out_dir, self.status().ws_port)?;
        self.registry
            .record_export(&source, page.output_path.clone(), page.title);
        Ok(page.output_path)
    }

    /// Handle a save of `source`.
    ///
    /// Re-exports a registered document, makes sure the servers are up and
    /// tells every connected client to reload. Saves of unregistered
    /// documents are ignored. Returns the number of clients notified.
    ///
    /// # Errors
    ///
    /// Returns an export or server start error; no reload is broadcast then.
    pub async fn on_document_saved(&mut self, source: &Path) -> Result<usize> {
        let key = session_key(source);
        if !self.registry.contains(&key) {
            tracing::debug!(source = %source.display(), "Ignoring save of untracked document");
            return Ok(0);
        }

        // Servers first so the page embeds the live WebSocket port
        self.ensure_servers_running().await?;
        self.export(&key)?;
        Ok(self.clients.broadcast(ReloadMessage::Reload))
    }

    /// Enable preview: register, export and optionally open a browser.
    ///
    /// Returns the page URL.
    ///
    /// # Errors
    ///
    /// Returns a registration, server start or export error. A document that
    /// fails its first export stays registered so a later save can retry.
    pub async fn enable_preview(&mut self, source: &Path) -> Result<String> {
        let session = self.register_session(source).await?;
        self.ensure_servers_running().await?;
        self.export(&session.source)?;

        let url = self
            .session(&session.source)
            .and_then(|s| self.page_url(s))
            .unwrap_or_else(|| page_file_name(&session.source));
        if let Some(browser) = &self.browser {
            browser.open(&url);
        }
        Ok(url)
    }

    /// Disable preview for a document.
    pub async fn disable_preview(&mut self, source: &Path) {
        self.unregister_session(source).await;
    }

    /// Unregister every session and stop the servers.
    pub async fn shutdown(&mut self) {
        for source in self.registry.sources() {
            self.unregister_session(&source).await;
        }
        self.stop_servers().await;
    }
}

/// Resolve a source path to its canonical registry key.
///
/// Fails unless the path names an existing regular file.
fn resolve_source(source: &Path) -> Result<PathBuf> {
    let not_previewable = || PreviewError::NotPreviewable {
        path: source.to_path_buf(),
    };
    if source.as_os_str().is_empty() {
        return Err(not_previewable());
    }
    let canonical = source.canonicalize().map_err(|_| not_previewable())?;
    if !canonical.is_file() {
        return Err(not_previewable());
    }
    Ok(canonical)
}

/// Registry key for a path that may no longer exist.
fn session_key(source: &Path) -> PathBuf {
    source
        .canonicalize()
        .unwrap_or_else(|_| std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf()))
}
