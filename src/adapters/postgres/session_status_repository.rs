//! PostgreSQL implementation of SessionStatusRepository.
//!
//! One row per user, upserted on every lifecycle transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::session::AccountIdentity;
use crate::ports::{SessionStatusRepository, SessionStatusRow};

/// PostgreSQL implementation of SessionStatusRepository.
#[derive(Clone)]
pub struct PostgresSessionStatusRepository {
    pool: PgPool,
}

impl PostgresSessionStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl SessionStatusRepository for PostgresSessionStatusRepository {
    async fn mark_authenticated(
        &self,
        user_id: &UserId,
        identity: &AccountIdentity,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO whatsapp_sessions (user_id, is_authenticated, account_name, account_number, updated_at)
            VALUES ($1, TRUE, $2, $3, now())
            ON CONFLICT (user_id) DO UPDATE SET
                is_authenticated = TRUE,
                account_name = EXCLUDED.account_name,
                account_number = EXCLUDED.account_number,
                updated_at = now()
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&identity.display_name)
        .bind(&identity.address_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark session authenticated"))?;

        Ok(())
    }

    async fn mark_disconnected(&self, user_id: &UserId) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO whatsapp_sessions (user_id, is_authenticated, account_name, account_number, updated_at)
            VALUES ($1, FALSE, NULL, NULL, now())
            ON CONFLICT (user_id) DO UPDATE SET
                is_authenticated = FALSE,
                account_name = NULL,
                account_number = NULL,
                updated_at = now()
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark session disconnected"))?;

        Ok(())
    }

    async fn touch_qr_generated(&self, user_id: &UserId) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO whatsapp_sessions (user_id, is_authenticated, last_qr_generated, updated_at)
            VALUES ($1, FALSE, now(), now())
            ON CONFLICT (user_id) DO UPDATE SET
                last_qr_generated = now(),
                updated_at = now()
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record QR timestamp"))?;

        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<SessionStatusRow>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT is_authenticated, account_name, account_number, last_qr_generated, updated_at
            FROM whatsapp_sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch session status"))?;

        let Some(row) = row else { return Ok(None) };

        let map_err = db_error("Malformed session status row");
        let last_qr: Option<DateTime<Utc>> = row.try_get("last_qr_generated").map_err(&map_err)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(&map_err)?;

        Ok(Some(SessionStatusRow {
            is_authenticated: row.try_get("is_authenticated").map_err(&map_err)?,
            account_name: row.try_get("account_name").map_err(&map_err)?,
            account_number: row.try_get("account_number").map_err(&map_err)?,
            last_qr_generated: last_qr.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(updated_at),
        }))
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM whatsapp_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to clear session status"))?;

        Ok(())
    }
}
