//! WebSocket handler for live reload.
//!
//! Registers each connection in the [`ClientSet`] and forwards reload
//! messages to it. Anything the client sends is ignored.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::mpsc;

use super::clients::ClientSet;

/// Create the router for the WebSocket reload server.
pub(crate) fn router(clients: ClientSet) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(clients)
}

/// Handle WebSocket upgrade for live reload.
async fn ws_handler(ws: WebSocketUpgrade, State(clients): State<ClientSet>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, clients))
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, clients: ClientSet) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = clients.insert(tx);

    loop {
        tokio::select! {
            // Forward reload messages to client
            outgoing = rx.recv() => {
                if let Some(text) = outgoing {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                } else {
                    // Server is shutting down
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            // Client messages are ignored; only closure matters
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    clients.remove(id);
}
