//! Session table and lifecycle state machine.
//!
//! One [`SessionRecord`] per user, held in a process-wide table. Each record
//! exclusively owns its engine handle and a pump task that consumes the
//! engine's lifecycle events, advances the state machine, persists status
//! transitions, and fans the events out to the user's observers.
//!
//! Records for different users progress fully concurrently; the table lock is
//! only held while a record is created or evicted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::session::{AccountIdentity, SessionEvent, SessionState};
use crate::ports::{Engine, EngineEvent, EngineFactory, SessionStatusRepository};

use super::subscribers::SubscriberRegistry;

#[derive(Debug, Clone)]
struct Snapshot {
    state: SessionState,
    identity: Option<AccountIdentity>,
}

/// In-memory state for one user's automation session.
///
/// The engine handle is owned exclusively by this record: created on session
/// init, destroyed on teardown, never shared with another record.
pub struct SessionRecord {
    user_id: UserId,
    engine: Arc<dyn Engine>,
    snapshot: RwLock<Snapshot>,
    active_run: Mutex<Option<CancellationToken>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRecord {
    fn new(user_id: UserId, engine: Arc<dyn Engine>) -> Self {
        Self {
            user_id,
            engine,
            snapshot: RwLock::new(Snapshot {
                state: SessionState::Uninitialized,
                identity: None,
            }),
            active_run: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    async fn state(&self) -> SessionState {
        self.snapshot.read().await.state
    }

    async fn identity(&self) -> Option<AccountIdentity> {
        self.snapshot.read().await.identity.clone()
    }

    async fn set_state(&self, state: SessionState, identity: Option<AccountIdentity>) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.state = state;
        snapshot.identity = identity;
    }

    /// Cancels the active pipeline run, if any. The slot stays occupied until
    /// the pipeline observes the cancellation and calls `finish_run`.
    async fn cancel_run(&self) -> bool {
        let active_run = self.active_run.lock().await;
        match active_run.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn stop_pump(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
    }
}

/// Process-wide table of per-user session records.
pub struct SessionManager {
    sessions: RwLock<HashMap<UserId, Arc<SessionRecord>>>,
    engines: Arc<dyn EngineFactory>,
    subscribers: Arc<SubscriberRegistry>,
    status: Arc<dyn SessionStatusRepository>,
}

impl SessionManager {
    pub fn new(
        engines: Arc<dyn EngineFactory>,
        subscribers: Arc<SubscriberRegistry>,
        status: Arc<dyn SessionStatusRepository>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engines,
            subscribers,
            status,
        }
    }

    /// Initializes the user's session, creating an engine handle and starting
    /// its handshake.
    ///
    /// Idempotent: if a live record already exists its current state is
    /// returned and no second engine handle is created. A record stuck in
    /// `Disconnected` is discarded first; its stale handle is never reused.
    pub async fn init(&self, user_id: UserId) -> Result<SessionState, DomainError> {
        let record = {
            // The write lock spans the existence check and the insert so that
            // two concurrent init calls can never both create a handle.
            let mut sessions = self.sessions.write().await;

            if let Some(existing) = sessions.get(&user_id) {
                let state = existing.state().await;
                if state != SessionState::Disconnected {
                    return Ok(state);
                }
                let stale = sessions
                    .remove(&user_id)
                    .expect("record disappeared while locked");
                stale.stop_pump().await;
                if let Err(e) = stale.engine.shutdown().await {
                    warn!(user_id = %user_id, error = %e, "stale engine shutdown failed");
                }
            }

            let engine = self.engines.create(&user_id).await.map_err(|e| {
                DomainError::new(ErrorCode::EngineError, e.to_string())
            })?;
            let record = Arc::new(SessionRecord::new(user_id, engine));
            sessions.insert(user_id, record.clone());
            record
        };

        match record.engine.initialize().await {
            Ok(events) => {
                record.set_state(SessionState::AwaitingScan, None).await;
                info!(user_id = %user_id, "session initialized, awaiting scan");

                let pump = tokio::spawn(Self::pump_events(
                    user_id,
                    record.clone(),
                    events,
                    self.subscribers.clone(),
                    self.status.clone(),
                ));
                *record.pump.lock().await = Some(pump);

                Ok(SessionState::AwaitingScan)
            }
            Err(e) => {
                // No auto-retry: the record stays Disconnected until an
                // explicit init call replaces it.
                record.set_state(SessionState::Disconnected, None).await;
                error!(user_id = %user_id, error = %e, "engine initialization failed");
                if let Err(e) = self.status.mark_disconnected(&user_id).await {
                    warn!(user_id = %user_id, error = %e, "failed to persist disconnect");
                }
                Err(DomainError::new(ErrorCode::EngineError, e.to_string()))
            }
        }
    }

    /// Consumes one session's engine events for the record's lifetime.
    async fn pump_events(
        user_id: UserId,
        record: Arc<SessionRecord>,
        mut events: mpsc::Receiver<EngineEvent>,
        subscribers: Arc<SubscriberRegistry>,
        status: Arc<dyn SessionStatusRepository>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::QrCode(payload) => {
                    // Re-entrant: a fresh challenge replaces a stale one and
                    // only the newest payload reaches observers.
                    record.set_state(SessionState::AwaitingScan, None).await;
                    if let Err(e) = status.touch_qr_generated(&user_id).await {
                        warn!(user_id = %user_id, error = %e, "failed to persist QR timestamp");
                    }
                    subscribers
                        .broadcast(&user_id, SessionEvent::QrCode { qr_code: payload })
                        .await;
                }
                EngineEvent::Ready(identity) => {
                    record
                        .set_state(SessionState::Ready, Some(identity.clone()))
                        .await;
                    info!(user_id = %user_id, account = %identity.display_name, "session ready");
                    if let Err(e) = status.mark_authenticated(&user_id, &identity).await {
                        warn!(user_id = %user_id, error = %e, "failed to persist authentication");
                    }
                    subscribers
                        .broadcast(&user_id, SessionEvent::Authenticated { identity })
                        .await;
                }
                EngineEvent::Disconnected => {
                    record.set_state(SessionState::Disconnected, None).await;
                    // An in-flight run cannot make progress anymore.
                    if record.cancel_run().await {
                        info!(user_id = %user_id, "cancelled in-flight run after disconnect");
                    }
                    if let Err(e) = status.mark_disconnected(&user_id).await {
                        warn!(user_id = %user_id, error = %e, "failed to persist disconnect");
                    }
                    subscribers
                        .broadcast(&user_id, SessionEvent::Disconnected)
                        .await;
                }
            }
        }
    }

    /// Tears the user's session down: cancels any run, awaits engine
    /// shutdown, clears persisted status rows, and evicts the record.
    ///
    /// The engine is released before this returns, so no further events can
    /// be emitted for the torn-down session. Observers stay subscribed; they
    /// simply see a silent stream until the next init.
    pub async fn teardown(&self, user_id: &UserId) -> Result<(), DomainError> {
        let record = self.sessions.write().await.remove(user_id);

        let Some(record) = record else {
            // Nothing live; still clear any leftover persisted rows.
            self.status.clear(user_id).await?;
            return Ok(());
        };

        record.cancel_run().await;
        if let Err(e) = record.engine.shutdown().await {
            warn!(user_id = %user_id, error = %e, "engine shutdown failed during teardown");
        }
        record.stop_pump().await;
        self.status.clear(user_id).await?;
        info!(user_id = %user_id, "session torn down");
        Ok(())
    }

    /// Current lifecycle state, if a record exists.
    pub async fn state(&self, user_id: &UserId) -> Option<SessionState> {
        let record = self.sessions.read().await.get(user_id).cloned()?;
        Some(record.state().await)
    }

    /// The bound account identity, present only in `Ready`.
    pub async fn identity(&self, user_id: &UserId) -> Option<AccountIdentity> {
        let record = self.sessions.read().await.get(user_id).cloned()?;
        record.identity().await
    }

    /// Claims the user's session for a pipeline run.
    ///
    /// Fails with `SessionNotReady` unless the session is `Ready`, and with
    /// `RunInProgress` while another run holds the claim. On success returns
    /// the engine handle to query and the run's cancellation token.
    pub async fn begin_run(
        &self,
        user_id: &UserId,
    ) -> Result<(Arc<dyn Engine>, CancellationToken), DomainError> {
        let record = self
            .sessions
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| {
                DomainError::new(ErrorCode::SessionNotReady, "WhatsApp session not ready")
            })?;

        if !record.state().await.can_check() {
            return Err(DomainError::new(
                ErrorCode::SessionNotReady,
                "WhatsApp session not ready",
            ));
        }

        let mut active_run = record.active_run.lock().await;
        if active_run.is_some() {
            return Err(DomainError::new(
                ErrorCode::RunInProgress,
                "A check run is already in progress",
            ));
        }
        let token = CancellationToken::new();
        *active_run = Some(token.clone());

        Ok((record.engine.clone(), token))
    }

    /// Releases the run claim taken by [`begin_run`].
    pub async fn finish_run(&self, user_id: &UserId) {
        if let Some(record) = self.sessions.read().await.get(user_id).cloned() {
            *record.active_run.lock().await = None;
        }
    }

    /// Cancels the user's active run, if any. Returns whether one was active.
    pub async fn cancel_run(&self, user_id: &UserId) -> bool {
        match self.sessions.read().await.get(user_id).cloned() {
            Some(record) => record.cancel_run().await,
            None => false,
        }
    }

    /// Number of live session records (monitoring).
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::engine::MockEngineFactory;
    use crate::adapters::memory::InMemorySessionStatusRepository;
    use crate::application::ObserverId;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Harness {
        manager: Arc<SessionManager>,
        factory: Arc<MockEngineFactory>,
        subscribers: Arc<SubscriberRegistry>,
        status: Arc<InMemorySessionStatusRepository>,
    }

    fn harness() -> Harness {
        let factory = Arc::new(MockEngineFactory::new());
        let subscribers = Arc::new(SubscriberRegistry::with_default_capacity());
        let status = Arc::new(InMemorySessionStatusRepository::new());
        let manager = Arc::new(SessionManager::new(
            factory.clone(),
            subscribers.clone(),
            status.clone(),
        ));
        Harness {
            manager,
            factory,
            subscribers,
            status,
        }
    }

    async fn recv(
        rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
    ) -> SessionEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn init_creates_record_in_awaiting_scan() {
        let h = harness();
        let user = UserId::new();

        let state = h.manager.init(user).await.unwrap();

        assert_eq!(state, SessionState::AwaitingScan);
        assert_eq!(h.factory.created_count(), 1);
        assert_eq!(h.manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn init_is_idempotent_for_live_sessions() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        let state = h.manager.init(user).await.unwrap();

        assert_eq!(state, SessionState::AwaitingScan);
        assert_eq!(h.factory.created_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_init_creates_exactly_one_engine() {
        let h = harness();
        let user = UserId::new();

        let (a, b) = tokio::join!(h.manager.init(user), h.manager.init(user));
        a.unwrap();
        b.unwrap();

        assert_eq!(h.factory.created_count(), 1);
        assert_eq!(h.manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn qr_event_broadcasts_newest_payload_and_touches_status() {
        let h = harness();
        let user = UserId::new();
        let mut rx = h.subscribers.subscribe(&user, ObserverId::new()).await;

        h.manager.init(user).await.unwrap();
        let engine = h.factory.last_engine().await.unwrap();
        engine.emit_qr("qr-1").await;
        engine.emit_qr("qr-2").await;

        assert_eq!(
            recv(&mut rx).await,
            SessionEvent::QrCode {
                qr_code: "qr-1".into()
            }
        );
        assert_eq!(
            recv(&mut rx).await,
            SessionEvent::QrCode {
                qr_code: "qr-2".into()
            }
        );
        assert_eq!(h.manager.state(&user).await, Some(SessionState::AwaitingScan));

        // Persisted row carries the challenge timestamp.
        let row = h.status.find(&user).await.unwrap().unwrap();
        assert!(row.last_qr_generated.is_some());
        assert!(!row.is_authenticated);
    }

    #[tokio::test]
    async fn ready_event_transitions_persists_and_broadcasts() {
        let h = harness();
        let user = UserId::new();
        let mut rx = h.subscribers.subscribe(&user, ObserverId::new()).await;

        h.manager.init(user).await.unwrap();
        let engine = h.factory.last_engine().await.unwrap();
        engine.emit_ready("Alice", "6281234567890").await;

        match recv(&mut rx).await {
            SessionEvent::Authenticated { identity } => {
                assert_eq!(identity.display_name, "Alice");
                assert_eq!(identity.address_id, "6281234567890");
            }
            other => panic!("expected Authenticated, got {:?}", other),
        }

        assert_eq!(h.manager.state(&user).await, Some(SessionState::Ready));
        assert!(h.manager.identity(&user).await.is_some());

        let row = h.status.find(&user).await.unwrap().unwrap();
        assert!(row.is_authenticated);
        assert_eq!(row.account_name.as_deref(), Some("Alice"));
        assert_eq!(row.account_number.as_deref(), Some("6281234567890"));
    }

    #[tokio::test]
    async fn disconnect_event_transitions_and_persists() {
        let h = harness();
        let user = UserId::new();
        let mut rx = h.subscribers.subscribe(&user, ObserverId::new()).await;

        h.manager.init(user).await.unwrap();
        let engine = h.factory.last_engine().await.unwrap();
        engine.emit_ready("Alice", "628111").await;
        engine.emit_disconnected().await;

        assert!(matches!(
            recv(&mut rx).await,
            SessionEvent::Authenticated { .. }
        ));
        assert_eq!(recv(&mut rx).await, SessionEvent::Disconnected);

        assert_eq!(
            h.manager.state(&user).await,
            Some(SessionState::Disconnected)
        );
        assert!(h.manager.identity(&user).await.is_none());
        let row = h.status.find(&user).await.unwrap().unwrap();
        assert!(!row.is_authenticated);
    }

    #[tokio::test]
    async fn init_after_disconnect_never_reuses_stale_handle() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        let first = h.factory.last_engine().await.unwrap();
        first.emit_disconnected().await;

        // Wait for the pump to process the disconnect.
        timeout(Duration::from_secs(1), async {
            while h.manager.state(&user).await != Some(SessionState::Disconnected) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let state = h.manager.init(user).await.unwrap();
        assert_eq!(state, SessionState::AwaitingScan);
        assert_eq!(h.factory.created_count(), 2);
        assert!(first.was_shut_down());
    }

    #[tokio::test]
    async fn teardown_shuts_engine_down_and_clears_status() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        let engine = h.factory.last_engine().await.unwrap();
        engine.emit_ready("Alice", "628111").await;

        h.manager.teardown(&user).await.unwrap();

        assert!(engine.was_shut_down());
        assert_eq!(h.manager.session_count().await, 0);
        assert!(h.status.find(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn teardown_then_init_starts_a_fresh_session() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        h.manager.teardown(&user).await.unwrap();

        let state = h.manager.init(user).await.unwrap();
        assert_eq!(state, SessionState::AwaitingScan);
        assert_eq!(h.factory.created_count(), 2);
    }

    #[tokio::test]
    async fn failed_initialization_moves_record_to_disconnected() {
        let h = harness();
        h.factory.fail_initialization();
        let user = UserId::new();

        let err = h.manager.init(user).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EngineError);
        assert_eq!(
            h.manager.state(&user).await,
            Some(SessionState::Disconnected)
        );
        let row = h.status.find(&user).await.unwrap().unwrap();
        assert!(!row.is_authenticated);
    }

    #[tokio::test]
    async fn begin_run_requires_ready_state() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        let err = h.manager.begin_run(&user).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotReady);
    }

    #[tokio::test]
    async fn second_begin_run_is_rejected_until_finish() {
        let h = harness();
        let user = UserId::new();

        h.manager.init(user).await.unwrap();
        let engine = h.factory.last_engine().await.unwrap();
        engine.emit_ready("Alice", "628111").await;
        timeout(Duration::from_secs(1), async {
            while h.manager.state(&user).await != Some(SessionState::Ready) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let _claim = h.manager.begin_run(&user).await.unwrap();
        let err = h.manager.begin_run(&user).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RunInProgress);

        h.manager.finish_run(&user).await;
        assert!(h.manager.begin_run(&user).await.is_ok());
    }
}
