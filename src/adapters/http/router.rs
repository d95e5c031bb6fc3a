//! Top-level router assembly.

use axum::{http::StatusCode, middleware, routing::get, Json, Router};

use crate::adapters::websocket::{ws_handler, WsState};

use super::auth::{auth_routes, AuthHandlers};
use super::history::{history_routes, HistoryHandlers};
use super::middleware::{auth_middleware, AuthState};
use super::session::{session_routes, SessionHandlers};

/// Builds the full application router.
///
/// The auth middleware runs on every route; the WebSocket endpoint ignores it
/// and authenticates in-band, since browsers cannot set headers on upgrade
/// requests.
pub fn app_router(
    auth: AuthHandlers,
    session: SessionHandlers,
    history: HistoryHandlers,
    ws_state: WsState,
    tokens: AuthState,
) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes(auth))
        .nest("/api/session", session_routes(session))
        .nest("/api/history", history_routes(history))
        .route("/health", get(health))
        .merge(Router::new().route("/ws", get(ws_handler)).with_state(ws_state))
        .layer(middleware::from_fn_with_state(tokens, auth_middleware))
}

/// GET /health - Liveness probe
async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
