//! Running server handles.
//!
//! A [`ServerHandle`] owns one spawned axum server bound to a loopback port
//! allocated from a configured range, plus the signal that shuts it down.

use std::net::Ipv4Addr;

use axum::Router;
use livedoc_config::PortRange;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{PreviewError, Result, ServerKind};
use crate::ports::allocate_port;

/// Handle to a running server.
#[derive(Debug)]
pub(crate) struct ServerHandle {
    kind: ServerKind,
    port: u16,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Allocate a port from `range`, bind it and start serving `router`.
    ///
    /// The server is accepting connections once this returns.
    pub(crate) async fn start(kind: ServerKind, range: PortRange, router: Router) -> Result<Self> {
        let port = allocate_port(range).map_err(|e| PreviewError::start_failed(kind, e))?;
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| PreviewError::start_failed(kind, e))?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(server = %kind, error = %e, "Server terminated with error");
            }
        });

        tracing::info!(server = %kind, address = %format!("127.0.0.1:{port}"), "Server listening");

        Ok(Self {
            kind,
            port,
            shutdown,
            task,
        })
    }

    /// Bound port.
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(server = %self.kind, error = %e, "Server task failed during shutdown");
        }
        tracing::info!(server = %self.kind, port = self.port, "Server stopped");
    }
}
