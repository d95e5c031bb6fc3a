//! Wire protocol between server and observers.
//!
//! Text-framed JSON, one message per frame, discriminated by a `type` field
//! with camelCase names: `qr`, `authenticated`, `disconnected`, `checkStart`,
//! `checkResult`, `checkComplete`, `error` outbound; `authenticate`,
//! `startCheck`, `stopCheck` inbound.

use serde::{Deserialize, Serialize};

use crate::domain::check::CheckResult;
use crate::domain::session::SessionEvent;

/// All message types sent from server to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// QR challenge payload (opaque image-encoded string).
    Qr { qr_code: String },

    /// The session is bound to this messaging-network account.
    Authenticated {
        account_name: String,
        account_number: String,
    },

    /// The engine dropped the session.
    Disconnected,

    /// A number is about to be queried.
    CheckStart { number: String },

    /// One number's terminal outcome.
    CheckResult { result: CheckResult },

    /// The batch finished.
    CheckComplete,

    /// Non-fatal error surfaced to the observer.
    Error { message: String },
}

impl From<SessionEvent> for ServerMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::QrCode { qr_code } => ServerMessage::Qr { qr_code },
            SessionEvent::Authenticated { identity } => ServerMessage::Authenticated {
                account_name: identity.display_name,
                account_number: identity.address_id,
            },
            SessionEvent::Disconnected => ServerMessage::Disconnected,
            SessionEvent::CheckStart { number } => ServerMessage::CheckStart { number },
            SessionEvent::CheckResult { result } => ServerMessage::CheckResult { result },
            SessionEvent::CheckComplete => ServerMessage::CheckComplete,
            SessionEvent::Error { message } => ServerMessage::Error { message },
        }
    }
}

/// All message types received from observers.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Binds this channel to a user identity. Must be the first message.
    Authenticate { token: String },

    /// Starts a verification run over the given numbers, in order.
    StartCheck { numbers: Vec<String> },

    /// Cancels the active run after the in-flight job.
    StopCheck,
}
