//! HTTP adapter for the check history.

mod dto;
mod handlers;
mod routes;

pub use handlers::HistoryHandlers;
pub use routes::history_routes;
