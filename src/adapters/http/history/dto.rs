//! HTTP DTOs for history endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::check::{CheckStatus, HistoryEntry};

/// Query parameters for listing history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// One stored check result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryResponse {
    pub id: String,
    pub phone_number: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub checked_at: String,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            phone_number: entry.phone_number,
            status: entry.status,
            error_message: entry.error_message,
            checked_at: entry.checked_at.to_rfc3339(),
        }
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryListResponse {
    pub items: Vec<HistoryEntryResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_query_fields_are_optional() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(query.page.is_none());
        assert!(query.per_page.is_none());
    }

    #[test]
    fn entry_serializes_status_in_wire_casing() {
        use crate::domain::foundation::{CheckId, Timestamp, UserId};

        let entry = HistoryEntry {
            id: CheckId::new(),
            user_id: UserId::new(),
            phone_number: "6281234567890".into(),
            status: CheckStatus::NonWa,
            error_message: None,
            checked_at: Timestamp::now(),
        };
        let json = serde_json::to_string(&HistoryEntryResponse::from(entry)).unwrap();
        assert!(json.contains(r#""status":"non-wa""#));
        assert!(json.contains(r#""phoneNumber""#));
        assert!(!json.contains("errorMessage"));
    }
}
