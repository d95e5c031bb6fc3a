//! HTTP handlers for auth endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::auth::{hash_password, verify_password};
use crate::adapters::http::error::{auth_error_response, domain_error_response, ErrorResponse};
use crate::adapters::http::middleware::RequireAuth;
use crate::domain::foundation::{AuthError, DomainError, ErrorCode};
use crate::domain::user::NewUser;
use crate::ports::{TokenService, UserRepository};

use super::dto::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct AuthHandlers {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenService>,
}

impl AuthHandlers {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenService>) -> Self {
        Self { users, tokens }
    }
}

/// POST /api/auth/register - Create an account and issue a token
pub async fn register(
    State(handlers): State<AuthHandlers>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    if let Err(e) = validate_registration(&req) {
        return domain_error_response(e);
    }

    let new_user = NewUser {
        email: req.email.trim().to_lowercase(),
        password_hash: hash_password(&req.password),
        full_name: req.full_name.trim().to_string(),
    };

    let user = match handlers.users.create(new_user).await {
        Ok(user) => user,
        Err(e) => return domain_error_response(e),
    };

    tracing::info!(user_id = %user.id, "Registered new account");

    let token = match handlers.tokens.issue(&user.id, &user.email) {
        Ok(token) => token,
        Err(e) => return auth_error_response(e),
    };

    let response = AuthResponse {
        token,
        user: user.into(),
    };
    (StatusCode::CREATED, Json(response)).into_response()
}

/// POST /api/auth/login - Verify credentials and issue a token
pub async fn login(State(handlers): State<AuthHandlers>, Json(req): Json<LoginRequest>) -> Response {
    let email = req.email.trim().to_lowercase();

    let user = match handlers.users.find_by_email(&email).await {
        Ok(Some(user)) => user,
        // Unknown email and wrong password answer identically.
        Ok(None) => return auth_error_response(AuthError::InvalidCredentials),
        Err(e) => return domain_error_response(e),
    };

    if !verify_password(&req.password, &user.password_hash) {
        return auth_error_response(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        return auth_error_response(AuthError::AccountInactive);
    }

    if let Err(e) = handlers.users.record_login(&user.id).await {
        tracing::warn!(user_id = %user.id, "Failed to record login time: {}", e);
    }

    let token = match handlers.tokens.issue(&user.id, &user.email) {
        Ok(token) => token,
        Err(e) => return auth_error_response(e),
    };

    tracing::info!(user_id = %user.id, "User logged in");

    let response = AuthResponse {
        token,
        user: user.into(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// POST /api/auth/logout - Acknowledge logout
///
/// Tokens are stateless, so there is nothing to revoke server-side; the
/// client discards the token. The endpoint exists so clients have a uniform
/// logout call.
pub async fn logout(RequireAuth(user): RequireAuth) -> Response {
    tracing::info!(user_id = %user.id, "User logged out");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response()
}

/// GET /api/auth/me - Current account details
pub async fn me(State(handlers): State<AuthHandlers>, RequireAuth(user): RequireAuth) -> Response {
    match handlers.users.find_by_id(&user.id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                ErrorCode::UserNotFound.to_string(),
                "User not found",
            )),
        )
            .into_response(),
        Err(e) => domain_error_response(e),
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), DomainError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("email", "A valid email is required"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if req.full_name.trim().is_empty() {
        return Err(DomainError::validation("fullName", "Full name is required"));
    }
    Ok(())
}
