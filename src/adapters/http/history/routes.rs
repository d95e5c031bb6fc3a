//! HTTP routes for history endpoints.

use axum::{routing::get, Router};

use super::handlers::{list_history, HistoryHandlers};

/// Creates the history router.
pub fn history_routes(handlers: HistoryHandlers) -> Router {
    Router::new()
        .route("/", get(list_history))
        .with_state(handlers)
}
