//! CheckHistoryRepository port - durable storage for individual check results.

use async_trait::async_trait;

use crate::domain::check::{CheckResult, HistoryEntry};
use crate::domain::foundation::{DomainError, UserId};

/// Persists and pages through a user's historical check results.
///
/// Writes are best-effort from the pipeline's perspective: a failed insert is
/// logged and never aborts a run.
#[async_trait]
pub trait CheckHistoryRepository: Send + Sync {
    /// Records one result for the given user.
    async fn record(&self, user_id: &UserId, result: &CheckResult) -> Result<(), DomainError>;

    /// Returns one page of the user's results, newest first.
    async fn list(
        &self,
        user_id: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<HistoryEntry>, DomainError>;

    /// Total number of results stored for the user.
    async fn count(&self, user_id: &UserId) -> Result<u64, DomainError>;
}
