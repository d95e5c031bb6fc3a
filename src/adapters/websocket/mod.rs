//! WebSocket transport: wire protocol and the per-connection handler.

mod handler;
mod messages;

pub use handler::{ws_handler, WsState};
pub use messages::{ClientMessage, ServerMessage};
