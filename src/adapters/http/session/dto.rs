//! HTTP DTOs for session endpoints.

use serde::Serialize;

use crate::domain::session::SessionState;

/// Combined live and persisted session status.
///
/// `state` reflects the in-process session manager; the account fields come
/// from the live identity when one is bound, otherwise from the last
/// persisted snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_qr_generated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_state_in_wire_casing() {
        let status = SessionStatusResponse {
            state: SessionState::AwaitingScan,
            account_name: None,
            account_number: None,
            last_qr_generated: None,
            updated_at: None,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""state":"awaiting_scan""#));
        assert!(!json.contains("accountName"));
    }
}
