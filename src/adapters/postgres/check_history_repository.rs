//! PostgreSQL implementation of CheckHistoryRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::check::{CheckResult, CheckStatus, HistoryEntry};
use crate::domain::foundation::{CheckId, DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::CheckHistoryRepository;

/// PostgreSQL implementation of CheckHistoryRepository.
#[derive(Clone)]
pub struct PostgresCheckHistoryRepository {
    pool: PgPool,
}

impl PostgresCheckHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckHistoryRepository for PostgresCheckHistoryRepository {
    async fn record(&self, user_id: &UserId, result: &CheckResult) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO check_history (id, user_id, phone_number, status, error_message, checked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(result.id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(&result.phone_number)
        .bind(result.status.as_str())
        .bind(&result.error_message)
        .bind(result.timestamp.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert check result: {}", e),
            )
        })?;

        Ok(())
    }

    async fn list(
        &self,
        user_id: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<HistoryEntry>, DomainError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, phone_number, status, error_message, checked_at
            FROM check_history
            WHERE user_id = $1
            ORDER BY checked_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch check history: {}", e),
            )
        })?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn count(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM check_history WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to count check history: {}", e),
                )
            })?;

        let total: i64 = row.try_get("total").map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Malformed count: {}", e))
        })?;
        Ok(total as u64)
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<HistoryEntry, DomainError> {
    let map_err = |e: sqlx::Error| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Malformed history row: {}", e),
        )
    };
    let status_str: String = row.try_get("status").map_err(map_err)?;
    let status = CheckStatus::parse(&status_str).ok_or_else(|| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Unknown check status in storage: {}", status_str),
        )
    })?;
    let checked_at: DateTime<Utc> = row.try_get("checked_at").map_err(map_err)?;

    Ok(HistoryEntry {
        id: CheckId::from_uuid(row.try_get("id").map_err(map_err)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(map_err)?),
        phone_number: row.try_get("phone_number").map_err(map_err)?,
        status,
        error_message: row.try_get("error_message").map_err(map_err)?,
        checked_at: Timestamp::from_datetime(checked_at),
    })
}
