//! Connected reload clients.
//!
//! Each open WebSocket connection is represented by the sending half of an
//! unbounded channel; the connection task owns the receiving half and writes
//! to the socket. When a connection dies its receiver is dropped, so the
//! next send on its handle fails and the handle is removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc;

/// Message sent to reload clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Reload the current page.
    Reload,
}

impl ReloadMessage {
    /// JSON text frame payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized.
    pub fn to_json(self) -> serde_json::Result<String> {
        serde_json::to_string(&self)
    }
}

/// Anonymous identifier of a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

/// Handle used to push text frames to one connection.
pub type ClientSender = mpsc::UnboundedSender<String>;

/// Shared set of open client connections.
///
/// Cheap to clone; all clones refer to the same set. The lock is never held
/// while sending.
#[derive(Clone, Debug, Default)]
pub struct ClientSet {
    clients: Arc<Mutex<HashMap<ClientId, ClientSender>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientSet {
    /// Create an empty client set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, ClientSender>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add an open connection and return its identifier.
    pub fn insert(&self, sender: ClientSender) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, sender);
        tracing::debug!(client = id.0, "Reload client connected");
        id
    }

    /// Remove a connection. Safe to call for an already removed client.
    pub fn remove(&self, id: ClientId) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(client = id.0, "Reload client disconnected");
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether there are no open connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Send `message` to every open connection.
    ///
    /// Iterates over a snapshot of the set. A connection whose send fails is
    /// removed and delivery continues with the rest. Returns the number of
    /// connections the message was delivered to.
    pub fn broadcast(&self, message: ReloadMessage) -> usize {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(?message, error = %e, "Failed to serialize reload message");
                return 0;
            }
        };
        let snapshot: Vec<(ClientId, ClientSender)> = self
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in snapshot {
            if sender.send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(client = id.0, "Dropping reload client after failed send");
                self.remove(id);
            }
        }

        tracing::debug!(delivered, ?message, "Broadcast reload message");
        delivered
    }

    /// Close every connection by dropping its sender.
    ///
    /// Connection tasks observe the closed channel, send a close frame and exit.
    pub fn close_all(&self) {
        let closed = std::mem::take(&mut *self.lock());
        if !closed.is_empty() {
            tracing::debug!(count = closed.len(), "Closed all reload clients");
        }
    }
}
