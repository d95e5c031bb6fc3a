//! In-memory adapter implementations.
//!
//! Back the persistence and token ports with plain maps for tests and local
//! development without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::check::{CheckResult, HistoryEntry};
use crate::domain::foundation::{
    AuthError, AuthenticatedUser, DomainError, ErrorCode, Timestamp, UserId,
};
use crate::domain::session::AccountIdentity;
use crate::domain::user::{NewUser, User};
use crate::ports::{
    CheckHistoryRepository, SessionStatusRepository, SessionStatusRow, TokenService,
    UserRepository,
};

/// Session-status rows in a map.
#[derive(Default)]
pub struct InMemorySessionStatusRepository {
    rows: Mutex<HashMap<UserId, SessionStatusRow>>,
}

impl InMemorySessionStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStatusRepository for InMemorySessionStatusRepository {
    async fn mark_authenticated(
        &self,
        user_id: &UserId,
        identity: &AccountIdentity,
    ) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().await;
        let last_qr = rows.get(user_id).and_then(|r| r.last_qr_generated);
        rows.insert(
            *user_id,
            SessionStatusRow {
                is_authenticated: true,
                account_name: Some(identity.display_name.clone()),
                account_number: Some(identity.address_id.clone()),
                last_qr_generated: last_qr,
                updated_at: Timestamp::now(),
            },
        );
        Ok(())
    }

    async fn mark_disconnected(&self, user_id: &UserId) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().await;
        let last_qr = rows.get(user_id).and_then(|r| r.last_qr_generated);
        rows.insert(
            *user_id,
            SessionStatusRow {
                is_authenticated: false,
                account_name: None,
                account_number: None,
                last_qr_generated: last_qr,
                updated_at: Timestamp::now(),
            },
        );
        Ok(())
    }

    async fn touch_qr_generated(&self, user_id: &UserId) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().await;
        let row = rows.entry(*user_id).or_insert_with(|| SessionStatusRow {
            is_authenticated: false,
            account_name: None,
            account_number: None,
            last_qr_generated: None,
            updated_at: Timestamp::now(),
        });
        row.last_qr_generated = Some(Timestamp::now());
        row.updated_at = Timestamp::now();
        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<SessionStatusRow>, DomainError> {
        Ok(self.rows.lock().await.get(user_id).cloned())
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), DomainError> {
        self.rows.lock().await.remove(user_id);
        Ok(())
    }
}

/// Check history in a vector, newest entries appended last.
#[derive(Default)]
pub struct InMemoryCheckHistoryRepository {
    entries: Mutex<Vec<HistoryEntry>>,
    fail_writes: AtomicBool,
}

impl InMemoryCheckHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` call fail, to exercise the pipeline's
    /// best-effort persistence contract.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// All stored entries, oldest first.
    pub async fn all(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl CheckHistoryRepository for InMemoryCheckHistoryRepository {
    async fn record(&self, user_id: &UserId, result: &CheckResult) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "scripted write failure",
            ));
        }
        self.entries.lock().await.push(HistoryEntry {
            id: result.id,
            user_id: *user_id,
            phone_number: result.phone_number.clone(),
            status: result.status,
            error_message: result.error_message.clone(),
            checked_at: result.timestamp,
        });
        Ok(())
    }

    async fn list(
        &self,
        user_id: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<HistoryEntry>, DomainError> {
        let entries = self.entries.lock().await;
        let mut mine: Vec<HistoryEntry> = entries
            .iter()
            .filter(|e| e.user_id == *user_id)
            .cloned()
            .collect();
        mine.reverse(); // newest first
        let offset = (page.saturating_sub(1) as usize) * per_page as usize;
        Ok(mine.into_iter().skip(offset).take(per_page as usize).collect())
    }

    async fn count(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().filter(|e| e.user_id == *user_id).count() as u64)
    }
}

/// User accounts in a map.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(DomainError::new(
                ErrorCode::EmailTaken,
                "Email already registered",
            ));
        }
        let created = User {
            id: UserId::new(),
            email: user.email,
            full_name: user.full_name,
            created_at: Timestamp::now(),
            last_login: None,
            is_active: true,
            password_hash: user.password_hash,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn record_login(&self, id: &UserId) -> Result<(), DomainError> {
        let mut users = self.users.lock().await;
        match users.get_mut(id) {
            Some(user) => {
                user.last_login = Some(Timestamp::now());
                Ok(())
            }
            None => Err(DomainError::new(ErrorCode::UserNotFound, "User not found")),
        }
    }
}

/// Token service backed by a map of scripted tokens.
#[derive(Default)]
pub struct MockTokenService {
    tokens: std::sync::Mutex<HashMap<String, AuthenticatedUser>>,
}

impl MockTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a token as valid for the given user.
    pub fn with_token(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.tokens
            .lock()
            .expect("token map poisoned")
            .insert(token.into(), user);
        self
    }
}

#[async_trait]
impl TokenService for MockTokenService {
    fn issue(&self, user_id: &UserId, email: &str) -> Result<String, AuthError> {
        let token = format!("mock-token-{}", uuid::Uuid::new_v4());
        self.tokens
            .lock()
            .expect("token map poisoned")
            .insert(token.clone(), AuthenticatedUser::new(*user_id, email));
        Ok(token)
    }

    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.tokens
            .lock()
            .expect("token map poisoned")
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::check::CheckResult;

    #[tokio::test]
    async fn history_lists_newest_first_with_pagination() {
        let repo = InMemoryCheckHistoryRepository::new();
        let user = UserId::new();

        for i in 0..5 {
            let result = CheckResult::from_query(format!("62811{}", i), i % 2 == 0);
            repo.record(&user, &result).await.unwrap();
        }

        let page1 = repo.list(&user, 1, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].phone_number, "628114");
        assert_eq!(page1[1].phone_number, "628113");

        let page3 = repo.list(&user, 3, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(repo.count(&user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn history_is_scoped_per_user() {
        let repo = InMemoryCheckHistoryRepository::new();
        let alice = UserId::new();
        let bob = UserId::new();

        repo.record(&alice, &CheckResult::from_query("628111", true))
            .await
            .unwrap();

        assert_eq!(repo.count(&bob).await.unwrap(), 0);
        assert!(repo.list(&bob, 1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = InMemoryUserRepository::new();
        let new_user = NewUser {
            email: "a@example.com".into(),
            password_hash: "digest".into(),
            full_name: "A".into(),
        };
        repo.create(new_user.clone()).await.unwrap();

        let err = repo.create(new_user).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EmailTaken);
    }

    #[tokio::test]
    async fn issued_mock_tokens_validate() {
        let tokens = MockTokenService::new();
        let user_id = UserId::new();

        let token = tokens.issue(&user_id, "a@example.com").unwrap();
        let user = tokens.validate(&token).await.unwrap();
        assert_eq!(user.id, user_id);

        assert!(tokens.validate("unknown").await.is_err());
    }

    #[tokio::test]
    async fn status_row_survives_disconnect_with_qr_timestamp() {
        let repo = InMemorySessionStatusRepository::new();
        let user = UserId::new();

        repo.touch_qr_generated(&user).await.unwrap();
        repo.mark_authenticated(&user, &AccountIdentity::new("Alice", "628111"))
            .await
            .unwrap();

        let row = repo.find(&user).await.unwrap().unwrap();
        assert!(row.is_authenticated);
        assert!(row.last_qr_generated.is_some());

        repo.mark_disconnected(&user).await.unwrap();
        let row = repo.find(&user).await.unwrap().unwrap();
        assert!(!row.is_authenticated);
        assert!(row.account_name.is_none());

        repo.clear(&user).await.unwrap();
        assert!(repo.find(&user).await.unwrap().is_none());
    }
}
