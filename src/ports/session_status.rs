//! SessionStatusRepository port - the persisted per-user session-status row.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::session::AccountIdentity;

/// Snapshot of a user's session status as stored.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusRow {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_qr_generated: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Stores one session-status row per user, upserted on lifecycle transitions.
#[async_trait]
pub trait SessionStatusRepository: Send + Sync {
    /// Marks the session authenticated and records the bound account.
    async fn mark_authenticated(
        &self,
        user_id: &UserId,
        identity: &AccountIdentity,
    ) -> Result<(), DomainError>;

    /// Marks the session unauthenticated (engine disconnect or init failure).
    async fn mark_disconnected(&self, user_id: &UserId) -> Result<(), DomainError>;

    /// Records that a fresh QR challenge was issued.
    async fn touch_qr_generated(&self, user_id: &UserId) -> Result<(), DomainError>;

    /// Reads the user's row, if any.
    async fn find(&self, user_id: &UserId) -> Result<Option<SessionStatusRow>, DomainError>;

    /// Deletes the user's row. Part of session teardown.
    async fn clear(&self, user_id: &UserId) -> Result<(), DomainError>;
}
