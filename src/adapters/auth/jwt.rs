//! JWT-backed token service (HS256).
//!
//! Tokens carry the user id and email; validation re-checks the account
//! against the user store so a deleted or deactivated account cannot keep
//! using an old token.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::{TokenService, UserRepository};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: String,
    email: String,
    /// Expiry, seconds since epoch.
    exp: i64,
    /// Issued at, seconds since epoch.
    iat: i64,
}

/// Issues and validates HS256 bearer tokens.
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    users: Arc<dyn UserRepository>,
}

impl JwtTokenService {
    pub fn new(secret: &str, ttl_secs: i64, users: Arc<dyn UserRepository>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
            users,
        }
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    fn issue(&self, user_id: &UserId, email: &str) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: now + self.ttl_secs,
            iat: now,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))
    }

    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        let user_id: UserId = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .users
            .find_by_id(&user_id)
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(AuthenticatedUser::new(user.id, user.email))
    }
}
