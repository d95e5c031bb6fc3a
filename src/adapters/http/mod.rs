//! HTTP adapters - REST API implementations.
//!
//! Each surface has its own module with DTOs, handlers, and routes.

pub mod auth;
pub mod error;
pub mod history;
pub mod middleware;
pub mod router;
pub mod session;

pub use auth::AuthHandlers;
pub use history::HistoryHandlers;
pub use router::app_router;
pub use session::SessionHandlers;
