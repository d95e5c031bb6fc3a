//! HTTP routes for session endpoints.

use axum::{
    routing::{delete, get},
    Router,
};

use super::handlers::{delete_session, session_status, SessionHandlers};

/// Creates the session router with all endpoints.
pub fn session_routes(handlers: SessionHandlers) -> Router {
    Router::new()
        .route("/status", get(session_status))
        .route("/", delete(delete_session))
        .with_state(handlers)
}
