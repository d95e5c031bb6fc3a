//! Shared HTTP error envelope and DomainError status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::foundation::{AuthError, DomainError, ErrorCode};

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            details: None,
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed | ErrorCode::EmptyBatch => StatusCode::BAD_REQUEST,
        ErrorCode::UserNotFound | ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
        ErrorCode::SessionNotReady | ErrorCode::RunInProgress | ErrorCode::EmailTaken => {
            StatusCode::CONFLICT
        }
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden | ErrorCode::AccountInactive => StatusCode::FORBIDDEN,
        ErrorCode::EngineError => StatusCode::BAD_GATEWAY,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps a domain error onto the standard HTTP error envelope.
pub fn domain_error_response(error: DomainError) -> Response {
    let status = status_for(error.code);
    if status.is_server_error() {
        tracing::error!(code = %error.code, "Request failed: {}", error.message);
    }

    let details = if error.details.is_empty() {
        None
    } else {
        serde_json::to_value(&error.details).ok()
    };

    let body = ErrorResponse {
        error: error.message,
        code: error.code.to_string(),
        details,
    };
    (status, Json(body)).into_response()
}

/// Maps an authentication error onto the standard HTTP error envelope.
pub fn auth_error_response(error: AuthError) -> Response {
    let (status, code) = match &error {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
        AuthError::InvalidToken | AuthError::TokenExpired => {
            (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)
        }
        AuthError::AccountInactive => (StatusCode::FORBIDDEN, ErrorCode::AccountInactive),
        AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
        AuthError::ServiceUnavailable(msg) => {
            tracing::error!("Auth service unavailable: {}", msg);
            (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::InternalError)
        }
    };

    let body = ErrorResponse::new(code.to_string(), error.to_string());
    (status, Json(body)).into_response()
}
