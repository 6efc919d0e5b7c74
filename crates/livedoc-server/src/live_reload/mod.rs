//! Live reload: WebSocket broadcast of reload notifications.

mod clients;
mod websocket;

pub use clients::{ClientId, ClientSender, ClientSet, ReloadMessage};
pub(crate) use websocket::router;
