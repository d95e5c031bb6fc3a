//! Check semantics: phone number normalization, result statuses, batch stats.

use serde::{Deserialize, Serialize};

use super::foundation::{CheckId, Timestamp, UserId};

/// Country prefix applied by [`normalize_number`].
///
/// The rewrite is fixed: the service targets Indonesian (+62) numbers, matching
/// the upstream rate-limited engine's account region.
pub const COUNTRY_PREFIX: &str = "62";

/// Normalizes raw user input into an engine-ready address.
///
/// Rules, applied in order:
/// 1. Strip every non-digit character.
/// 2. Empty after stripping stays empty (the caller skips such entries).
/// 3. Leading `0` is replaced by the country prefix.
/// 4. Anything not already starting with the prefix gets it prepended.
///
/// The function is pure and idempotent: normalizing an already-normalized
/// number returns it unchanged.
pub fn normalize_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return digits;
    }

    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{}{}", COUNTRY_PREFIX, rest);
    }

    if digits.starts_with(COUNTRY_PREFIX) {
        digits
    } else {
        format!("{}{}", COUNTRY_PREFIX, digits)
    }
}

/// Terminal status of a single number check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Queued, not yet picked up.
    #[serde(rename = "pending")]
    Pending,
    /// Currently being queried.
    #[serde(rename = "checking")]
    Checking,
    /// Registered on the messaging network.
    #[serde(rename = "active")]
    Active,
    /// Not registered.
    #[serde(rename = "non-wa")]
    NonWa,
    /// The engine query failed for this number.
    #[serde(rename = "error")]
    Error,
}

impl CheckStatus {
    /// Stable wire/storage string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Checking => "checking",
            CheckStatus::Active => "active",
            CheckStatus::NonWa => "non-wa",
            CheckStatus::Error => "error",
        }
    }

    /// Parses a storage string back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CheckStatus::Pending),
            "checking" => Some(CheckStatus::Checking),
            "active" => Some(CheckStatus::Active),
            "non-wa" => Some(CheckStatus::NonWa),
            "error" => Some(CheckStatus::Error),
            _ => None,
        }
    }
}

/// Outcome of checking one phone number. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: CheckId,
    pub phone_number: String,
    pub status: CheckStatus,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CheckResult {
    /// Builds a result for a successfully answered query.
    pub fn from_query(phone_number: impl Into<String>, registered: bool) -> Self {
        Self {
            id: CheckId::new(),
            phone_number: phone_number.into(),
            status: if registered {
                CheckStatus::Active
            } else {
                CheckStatus::NonWa
            },
            timestamp: Timestamp::now(),
            error_message: None,
        }
    }

    /// Builds an error result carrying the engine's failure message.
    pub fn from_error(phone_number: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: CheckId::new(),
            phone_number: phone_number.into(),
            status: CheckStatus::Error,
            timestamp: Timestamp::now(),
            error_message: Some(message.into()),
        }
    }
}

/// A persisted check result with its owner, as read back from history storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: CheckId,
    pub user_id: UserId,
    pub phone_number: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub checked_at: Timestamp,
}

/// Cumulative counters for one pipeline run.
///
/// Ephemeral: lives only while the run is active and is discarded afterwards.
/// Only the individual [`CheckResult`]s are durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub checked: usize,
    pub active: usize,
    pub non_registered: usize,
    pub errors: usize,
}

impl BatchStats {
    /// Records one result into the counters.
    pub fn record(&mut self, status: CheckStatus) {
        self.checked += 1;
        match status {
            CheckStatus::Active => self.active += 1,
            CheckStatus::NonWa => self.non_registered += 1,
            CheckStatus::Error => self.errors += 1,
            CheckStatus::Pending | CheckStatus::Checking => {}
        }
    }
}
