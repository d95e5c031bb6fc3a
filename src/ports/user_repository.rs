//! UserRepository port - account storage.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::user::{NewUser, User};

/// Stores user accounts and their password digests.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new account. Fails with `EmailTaken` on a duplicate email.
    async fn create(&self, user: NewUser) -> Result<User, DomainError>;

    /// Looks an account up by email (login path).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Looks an account up by id (token validation path).
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Stamps `last_login` with the current time.
    async fn record_login(&self, id: &UserId) -> Result<(), DomainError>;
}
