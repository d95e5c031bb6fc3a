//! TokenService port - issues and validates opaque bearer credentials.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};

/// Issues bearer tokens at login and resolves presented tokens back to a
/// user. Backed by JWT in production; tests use an in-memory map.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Issues a token bound to the given user.
    fn issue(&self, user_id: &UserId, email: &str) -> Result<String, AuthError>;

    /// Validates a presented token and resolves the user it names.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
