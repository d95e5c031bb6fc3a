//! Engine port - the opaque automation backend that talks to the messaging
//! network.
//!
//! The core never sees the backend's internals. It observes exactly three
//! lifecycle signals (QR challenge, ready, disconnected) delivered on a
//! channel, and can ask one question: is this address registered?
//!
//! Any concrete backend (browser automation, protocol client, or a test
//! double) satisfies this interface.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::foundation::UserId;
use crate::domain::session::AccountIdentity;

/// Lifecycle signals emitted by an engine during and after its handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A QR challenge payload (opaque image-encoded string). A newer payload
    /// replaces any stale one.
    QrCode(String),
    /// The handshake completed; the session is bound to this account.
    Ready(AccountIdentity),
    /// The backend dropped the session.
    Disconnected,
}

/// Errors surfaced by an engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The session is not in a state that can answer queries.
    #[error("engine session not ready")]
    NotReady,

    /// Handshake could not be started.
    #[error("engine initialization failed: {0}")]
    InitFailed(String),

    /// A registration query failed. The message is carried verbatim into the
    /// per-address error result.
    #[error("engine query failed: {0}")]
    QueryFailed(String),

    /// Shutdown did not complete cleanly.
    #[error("engine shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// One user's automation handle.
///
/// Exclusively owned by that user's session record; no other component calls
/// into it directly.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Starts the authentication handshake. Lifecycle events arrive on the
    /// returned receiver; the channel closes when the engine shuts down.
    async fn initialize(&self) -> Result<mpsc::Receiver<EngineEvent>, EngineError>;

    /// Answers whether the normalized address is registered on the network.
    ///
    /// May suspend for a network round trip. Only valid once the engine has
    /// reported [`EngineEvent::Ready`].
    async fn is_registered(&self, address: &str) -> Result<bool, EngineError>;

    /// Releases the handle. After this resolves no further events are emitted.
    async fn shutdown(&self) -> Result<(), EngineError>;
}

impl std::fmt::Debug for dyn Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Engine")
    }
}

/// Creates one engine handle per user session.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, user_id: &UserId) -> Result<std::sync::Arc<dyn Engine>, EngineError>;
}
