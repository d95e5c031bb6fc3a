//! Scriptable engine test double.
//!
//! Tests drive the lifecycle by calling `emit_*` directly, standing in for
//! the real backend's handshake. Registration queries answer from a scripted
//! set of registered numbers; selected numbers can be scripted to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::domain::foundation::UserId;
use crate::domain::session::AccountIdentity;
use crate::ports::{Engine, EngineError, EngineEvent, EngineFactory};

/// Engine double with scripted answers and externally-driven lifecycle.
pub struct MockEngine {
    user_id: UserId,
    events_tx: Mutex<Option<mpsc::Sender<EngineEvent>>>,
    registered: RwLock<HashSet<String>>,
    failing: RwLock<HashSet<String>>,
    fail_init: AtomicBool,
    shut_down: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            events_tx: Mutex::new(None),
            registered: RwLock::new(HashSet::new()),
            failing: RwLock::new(HashSet::new()),
            fail_init: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Script a number as registered on the network.
    pub async fn add_registered(&self, number: impl Into<String>) {
        self.registered.write().await.insert(number.into());
    }

    /// Script a number whose query errors.
    pub async fn add_failing(&self, number: impl Into<String>) {
        self.failing.write().await.insert(number.into());
    }

    /// Make the next `initialize` call fail.
    pub fn fail_initialization(&self) {
        self.fail_init.store(true, Ordering::SeqCst);
    }

    /// Push a lifecycle event to the session pump, as the real backend would.
    pub async fn emit(&self, event: EngineEvent) {
        let tx = self.events_tx.lock().await;
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(event).await;
        }
    }

    /// Shorthand for emitting a QR challenge.
    pub async fn emit_qr(&self, payload: impl Into<String>) {
        self.emit(EngineEvent::QrCode(payload.into())).await;
    }

    /// Shorthand for emitting the ready signal.
    pub async fn emit_ready(&self, name: impl Into<String>, number: impl Into<String>) {
        self.emit(EngineEvent::Ready(AccountIdentity::new(name, number)))
            .await;
    }

    /// Shorthand for emitting a disconnect.
    pub async fn emit_disconnected(&self) {
        self.emit(EngineEvent::Disconnected).await;
    }

    /// Whether `shutdown` has been called.
    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// The numbers queried so far, in order.
    pub async fn queried_numbers(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }

    /// The user this handle was created for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn initialize(&self) -> Result<mpsc::Receiver<EngineEvent>, EngineError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(EngineError::InitFailed("scripted init failure".into()));
        }
        let (tx, rx) = mpsc::channel(16);
        *self.events_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn is_registered(&self, address: &str) -> Result<bool, EngineError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::NotReady);
        }
        self.queries.lock().await.push(address.to_string());
        if self.failing.read().await.contains(address) {
            return Err(EngineError::QueryFailed(format!(
                "scripted failure for {}",
                address
            )));
        }
        Ok(self.registered.read().await.contains(address))
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        self.shut_down.store(true, Ordering::SeqCst);
        // Dropping the sender closes the event channel and ends the pump.
        *self.events_tx.lock().await = None;
        Ok(())
    }
}

/// Factory handing out `MockEngine`s, with every created handle retained for
/// later inspection.
#[derive(Default)]
pub struct MockEngineFactory {
    engines: Mutex<Vec<Arc<MockEngine>>>,
    created: AtomicUsize,
    registered: Mutex<Vec<String>>,
    fail_init: AtomicBool,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every engine created from now on treats these numbers as registered.
    pub async fn with_registered(self, numbers: &[&str]) -> Self {
        {
            let mut registered = self.registered.lock().await;
            registered.extend(numbers.iter().map(|n| n.to_string()));
        }
        self
    }

    /// Every engine created from now on fails its `initialize` call.
    pub fn fail_initialization(&self) {
        self.fail_init.store(true, Ordering::SeqCst);
    }

    /// Number of engine handles created so far.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// The most recently created engine, if any.
    pub async fn last_engine(&self) -> Option<Arc<MockEngine>> {
        self.engines.lock().await.last().cloned()
    }

    /// The nth created engine.
    pub async fn engine(&self, index: usize) -> Option<Arc<MockEngine>> {
        self.engines.lock().await.get(index).cloned()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(&self, user_id: &UserId) -> Result<Arc<dyn Engine>, EngineError> {
        let engine = Arc::new(MockEngine::new(*user_id));
        if self.fail_init.load(Ordering::SeqCst) {
            engine.fail_initialization();
        }
        for number in self.registered.lock().await.iter() {
            engine.add_registered(number.clone()).await;
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.engines.lock().await.push(engine.clone());
        Ok(engine)
    }
}
