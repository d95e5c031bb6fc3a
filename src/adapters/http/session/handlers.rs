//! HTTP handlers for session endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::domain_error_response;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::SessionManager;
use crate::domain::session::SessionState;
use crate::ports::SessionStatusRepository;

use super::dto::SessionStatusResponse;

#[derive(Clone)]
pub struct SessionHandlers {
    sessions: Arc<SessionManager>,
    status: Arc<dyn SessionStatusRepository>,
}

impl SessionHandlers {
    pub fn new(sessions: Arc<SessionManager>, status: Arc<dyn SessionStatusRepository>) -> Self {
        Self { sessions, status }
    }
}

/// GET /api/session/status - Live session state plus persisted account info
pub async fn session_status(
    State(handlers): State<SessionHandlers>,
    RequireAuth(user): RequireAuth,
) -> Response {
    let state = handlers
        .sessions
        .state(&user.id)
        .await
        .unwrap_or(SessionState::Uninitialized);
    let identity = handlers.sessions.identity(&user.id).await;

    let row = match handlers.status.find(&user.id).await {
        Ok(row) => row,
        Err(e) => return domain_error_response(e),
    };

    let (account_name, account_number) = match identity {
        Some(identity) => (Some(identity.display_name), Some(identity.address_id)),
        None => row
            .as_ref()
            .map(|r| (r.account_name.clone(), r.account_number.clone()))
            .unwrap_or((None, None)),
    };

    let response = SessionStatusResponse {
        state,
        account_name,
        account_number,
        last_qr_generated: row
            .as_ref()
            .and_then(|r| r.last_qr_generated.as_ref())
            .map(|t| t.to_rfc3339()),
        updated_at: row.as_ref().map(|r| r.updated_at.to_rfc3339()),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// DELETE /api/session - Tear down the engine session
///
/// Synchronous: the engine is shut down and the persisted status cleared
/// before the response is sent, so a follow-up status call never sees the
/// old session.
pub async fn delete_session(
    State(handlers): State<SessionHandlers>,
    RequireAuth(user): RequireAuth,
) -> Response {
    match handlers.sessions.teardown(&user.id).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "Session torn down via API");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "message": "Session cleared" })),
            )
                .into_response()
        }
        Err(e) => domain_error_response(e),
    }
}
