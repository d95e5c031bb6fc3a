//! User account types.

use serde::Serialize;

use super::foundation::{Timestamp, UserId};

/// A registered user account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<Timestamp>,
    pub is_active: bool,
    /// Stored password digest, never serialized.
    #[serde(skip)]
    pub password_hash: String,
}

/// Data required to create a new account. The password arrives in clear and
/// is digested before it reaches storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}
