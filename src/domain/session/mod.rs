//! Session lifecycle state machine and the events it emits.
//!
//! One session exists per user. Lifecycle transitions are driven by the
//! engine's handshake signals:
//!
//! ```text
//! Uninitialized --init--> AwaitingScan --ready--> Ready --disconnected--> Disconnected
//!       ^                     |  ^                                              |
//!       |                     +--+ (fresh QR replaces a stale one)              |
//!       +---- teardown (any state) ----+                    init (new handle) --+
//! ```

use serde::{Deserialize, Serialize};

use super::check::CheckResult;

/// Lifecycle state of one user's automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No engine handle exists.
    Uninitialized,
    /// Engine handle created; waiting for the QR challenge to be scanned.
    AwaitingScan,
    /// Handshake complete; registration queries are allowed.
    Ready,
    /// The engine dropped the session; a fresh `init` is required.
    Disconnected,
}

impl SessionState {
    /// Whether the verification pipeline may run in this state.
    pub fn can_check(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

/// The messaging-network account a ready session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub display_name: String,
    pub address_id: String,
}

impl AccountIdentity {
    pub fn new(display_name: impl Into<String>, address_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address_id: address_id.into(),
        }
    }
}

/// An event on one user's session stream.
///
/// Produced by the session lifecycle pump and the verification pipeline,
/// consumed by every subscriber (browser tab) of that user. Delivery order
/// within one user's stream matches production order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new QR challenge payload. Always the newest; stale ones are replaced.
    QrCode { qr_code: String },
    /// The session reached `Ready` and is bound to this account.
    Authenticated { identity: AccountIdentity },
    /// The engine dropped the session.
    Disconnected,
    /// The pipeline is about to query this normalized number.
    CheckStart { number: String },
    /// One number's terminal outcome.
    CheckResult { result: CheckResult },
    /// The batch finished (or was cancelled after the in-flight job).
    CheckComplete,
    /// A non-fatal error surfaced to observers.
    Error { message: String },
}
