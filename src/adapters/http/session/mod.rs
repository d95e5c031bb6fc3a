//! HTTP adapter for session status and teardown.

mod dto;
mod handlers;
mod routes;

pub use handlers::SessionHandlers;
pub use routes::session_routes;
