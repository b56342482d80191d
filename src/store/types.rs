//! Data types for teammate activity tracking.
//!
//! Defines the persisted state document and the per-teammate records
//! the tracker transitions between invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle status of a tracked teammate.
///
/// `Completed` and `Failed` are only ever written by the external caller
/// that knows the teammate's real outcome; the tracker itself writes
/// `Idle`, `Working` and `ForceProceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeammateStatus {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "WORKING")]
    Working,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "FORCE_PROCEEDED")]
    ForceProceeded,
}

impl TeammateStatus {
    /// Whether this status is terminal with respect to the retry loop.
    ///
    /// Terminal teammates stay in the map but are excluded from idle
    /// scanning forever.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::ForceProceeded)
    }
}

impl fmt::Display for TeammateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Working => "WORKING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::ForceProceeded => "FORCE_PROCEEDED",
        };
        f.write_str(name)
    }
}

/// State kept for a single teammate across hook invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeammateRecord {
    /// Current lifecycle status.
    pub status: TeammateStatus,

    /// Timestamp of the most recent observed event for this teammate.
    /// `None` when the stored value is missing or unparsable; such
    /// records are treated as not-idle by the scanner.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_activity: Option<DateTime<Utc>>,

    /// How many times this teammate has been found idle and retried.
    #[serde(default)]
    pub retry_count: u32,

    /// How many times this teammate transitioned into `WORKING`.
    #[serde(default)]
    pub messages_sent: u64,

    /// When this teammate was first observed.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TeammateRecord {
    /// Creates a fresh record for a teammate first observed at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: TeammateStatus::Idle,
            last_activity: Some(now),
            retry_count: 0,
            messages_sent: 0,
            created_at: Some(now),
        }
    }
}

/// The whole persisted activity document.
///
/// Created empty on first run, read-modified-written on every invocation
/// and never explicitly deleted. A document that fails structural
/// validation is replaced wholesale by `Default` at the load boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityState {
    /// One record per teammate identifier.
    pub teammates: HashMap<String, TeammateRecord>,

    /// When this state document was first created.
    #[serde(default = "Utc::now")]
    pub session_start: DateTime<Utc>,

    /// Session-wide retry counter, monotonically non-decreasing.
    #[serde(default)]
    pub total_retries: u64,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self {
            teammates: HashMap::new(),
            session_start: Utc::now(),
            total_retries: 0,
        }
    }
}

/// One idle-scan result: a non-terminal teammate past the idle timeout.
#[derive(Debug, Clone)]
pub struct IdleTeammate {
    /// Teammate identifier.
    pub id: String,
    /// Seconds elapsed since the teammate's `last_activity`.
    pub elapsed_secs: i64,
    /// Retry count at scan time.
    pub retry_count: u32,
    /// Status at scan time.
    pub status: TeammateStatus,
}

/// Outcome of resolving one idle teammate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveAction {
    /// Retries remained; the teammate was reset to `IDLE` for another round.
    Retry,
    /// Retries exhausted; the teammate was marked `FORCE_PROCEEDED`.
    ForceProceed,
}

/// Deserializes an RFC 3339 timestamp, degrading to `None` on anything
/// missing, non-string or unparsable instead of failing the document.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}
