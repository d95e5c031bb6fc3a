//! Sequential verification pipeline.
//!
//! Consumes an ordered batch of raw numbers for one user's `Ready` session,
//! checks them one at a time against the engine with a fixed pacing delay
//! between queries, and emits progress events through the subscriber
//! registry. One failure never aborts the remaining queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::check::{normalize_number, BatchStats, CheckResult};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::session::SessionEvent;
use crate::ports::{CheckHistoryRepository, Engine};

use super::session_manager::SessionManager;
use super::subscribers::SubscriberRegistry;

/// Fixed delay between consecutive queries.
///
/// Hard backpressure against the external engine's rate limits; deliberately
/// not configurable per call.
pub const PACING_INTERVAL: Duration = Duration::from_secs(3);

/// Runs verification batches against ready sessions.
pub struct CheckPipeline {
    sessions: Arc<SessionManager>,
    history: Arc<dyn CheckHistoryRepository>,
    subscribers: Arc<SubscriberRegistry>,
    pacing: Duration,
}

impl CheckPipeline {
    pub fn new(
        sessions: Arc<SessionManager>,
        history: Arc<dyn CheckHistoryRepository>,
        subscribers: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            sessions,
            history,
            subscribers,
            pacing: PACING_INTERVAL,
        }
    }

    /// Overrides the pacing interval. Test hook only; production always runs
    /// at [`PACING_INTERVAL`].
    #[cfg(test)]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Runs one batch for the user.
    ///
    /// Rejects an empty batch (`ValidationFailed`), a session that is not
    /// `Ready` (`SessionNotReady`), and a second concurrent run
    /// (`RunInProgress`). Entries that normalize to an empty string are
    /// skipped silently and never counted.
    ///
    /// Returns the run's cumulative counters; they are not persisted.
    pub async fn run(
        &self,
        user_id: UserId,
        numbers: Vec<String>,
    ) -> Result<BatchStats, DomainError> {
        if numbers.is_empty() {
            return Err(
                DomainError::validation("numbers", "At least one phone number is required")
                    .with_detail("code", ErrorCode::EmptyBatch.to_string()),
            );
        }

        let jobs: Vec<String> = numbers
            .iter()
            .map(|raw| normalize_number(raw))
            .filter(|n| !n.is_empty())
            .collect();

        let (engine, cancel) = self.sessions.begin_run(&user_id).await?;
        info!(user_id = %user_id, total = jobs.len(), "starting check run");

        let stats = self.run_jobs(&user_id, engine, jobs, cancel).await;
        self.sessions.finish_run(&user_id).await;

        info!(
            user_id = %user_id,
            checked = stats.checked,
            active = stats.active,
            errors = stats.errors,
            "check run finished"
        );
        Ok(stats)
    }

    async fn run_jobs(
        &self,
        user_id: &UserId,
        engine: Arc<dyn Engine>,
        jobs: Vec<String>,
        cancel: CancellationToken,
    ) -> BatchStats {
        let mut stats = BatchStats {
            total: jobs.len(),
            ..Default::default()
        };

        for (index, number) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            self.subscribers
                .broadcast(
                    user_id,
                    SessionEvent::CheckStart {
                        number: number.clone(),
                    },
                )
                .await;

            // A failed query becomes this number's error result; it never
            // aborts the rest of the queue.
            let result = match engine.is_registered(number).await {
                Ok(registered) => CheckResult::from_query(number.clone(), registered),
                Err(e) => CheckResult::from_error(number.clone(), e.to_string()),
            };

            if let Err(e) = self.history.record(user_id, &result).await {
                // Best-effort persistence: log and move on.
                warn!(user_id = %user_id, error = %e, "failed to persist check result");
            }

            stats.record(result.status);
            self.subscribers
                .broadcast(user_id, SessionEvent::CheckResult { result })
                .await;

            if index + 1 < jobs.len() {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacing) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }

        self.subscribers
            .broadcast(user_id, SessionEvent::CheckComplete)
            .await;
        stats
    }
}
