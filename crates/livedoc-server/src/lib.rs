//! Live preview sessions for livedoc.
//!
//! This crate keeps a browser preview of one or more documents up to date:
//! - exports each document to a standalone HTML page in an output directory
//! - serves that directory over HTTP on a loopback port
//! - tells connected browsers to reload over a WebSocket on a second port
//!
//! Both servers are shared by every open document. They start with the first
//! registered session and stop when the last one is unregistered.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use livedoc_convert::MarkdownConverter;
//! use livedoc_server::{PreviewConfig, PreviewService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = PreviewService::new(
//!         PreviewConfig::default(),
//!         Arc::new(MarkdownConverter::new()),
//!     );
//!
//!     let url = service.enable_preview(Path::new("notes.md")).await.unwrap();
//!     println!("Preview at {url}");
//!
//!     // After each save:
//!     service.on_document_saved(Path::new("notes.md")).await.unwrap();
//!
//!     service.disable_preview(Path::new("notes.md")).await;
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! save ──► PreviewService::on_document_saved
//!               │
//!               ├─► ensure_servers_running ──► HTTP (ServeDir)   :http_port
//!               │                          └─► WebSocket (/)      :ws_port
//!               ├─► Exporter ──► converter ──► images ──► template ──► <name>.html
//!               │
//!               └─► ClientSet::broadcast ──► {"type":"reload"} ──► browsers
//! ```

mod browser;
mod error;
mod export;
mod http;
mod live_reload;
mod middleware;
mod output;
mod ports;
mod registry;
mod server;
mod service;
mod watch;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use error::{PreviewError, Result, ServerKind};
pub use export::{ExportedPage, Exporter};
pub use live_reload::{ClientId, ClientSender, ClientSet, ReloadMessage};
pub use output::{OutputDir, page_file_name};
pub use ports::allocate_port;
pub use registry::{Session, SessionRegistry};
pub use service::{PreviewConfig, PreviewService, ServerStatus, preview_config_from_config};
pub use watch::{FsEvent, FsEventKind, SaveWatcher};
