//! Shared types for context operations.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A durable, named storage volume that outlives any session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Context {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: ContextState,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub last_used_time: Option<String>,
}

/// Server-reported lifecycle state of a context. A response without a
/// state reads as `Unknown`, never as done.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextState {
    Available,
    PreAvailable,
    InUse,
    Clearing,
    #[serde(alias = "clear-failed")]
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextState::Available => "available",
            ContextState::PreAvailable => "pre-available",
            ContextState::InUse => "in-use",
            ContextState::Clearing => "clearing",
            ContextState::Failed => "failed",
            ContextState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Paging parameters for `list`. The cursor is opaque.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListContextsParams {
    pub max_results: Option<u32>,
    pub next_token: Option<String>,
}

/// One page of contexts.
#[derive(Clone, Debug, Default)]
pub struct ContextPage {
    pub contexts: Vec<Context>,
    pub next_token: Option<String>,
    pub total_count: Option<u64>,
    pub request_id: String,
}

impl ContextPage {
    pub fn has_more(&self) -> bool {
        self.next_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A file stored inside a context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextFileEntry {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gmt_modified: Option<String>,
}

/// A time-limited URL that is itself the credential for one transfer.
///
/// `Debug` hides the query string, which carries the signature.
#[derive(Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    /// Expiry as Unix seconds, when the server sends one.
    pub expire_time: Option<i64>,
    pub request_id: String,
}

impl PresignedUrl {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expire_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|t| Utc::now() >= t)
    }
}

impl fmt::Debug for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresignedUrl")
            .field("url", &redact_url(&self.url))
            .field("expire_time", &self.expire_time)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Strips the query string and fragment so a presigned URL can be logged.
pub fn redact_url(url: &str) -> String {
    match url.find(['?', '#']) {
        Some(idx) => format!("{}?<redacted>", &url[..idx]),
        None => url.to_string(),
    }
}

/// Kind of work a status row describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Upload,
    Download,
    Clear,
    #[serde(other)]
    Other,
}

/// Direction requested for a `sync()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Upload,
    Download,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Upload => "upload",
            SyncMode::Download => "download",
        }
    }
}

/// Per-path sync progress as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    #[serde(alias = "Pending", alias = "Waiting")]
    Queued,
    #[serde(alias = "Running", alias = "InProgress")]
    Syncing,
    Success,
    #[serde(alias = "Failed")]
    Fail,
    #[serde(other)]
    Unknown,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Fail)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Queued => "Queued",
            SyncStatus::Syncing => "Syncing",
            SyncStatus::Success => "Success",
            SyncStatus::Fail => "Fail",
            SyncStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One row of server-reported sync progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStatusItem {
    pub context_id: String,
    pub path: String,
    pub task_type: TaskType,
    pub status: SyncStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub finish_time: Option<i64>,
}

/// State of a context-path binding, derived from its status rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Success,
    Fail,
}

impl SyncState {
    /// Aggregates status rows: nothing reported is `Idle`, any non-terminal
    /// row keeps the binding `Syncing`, and once every row is terminal a
    /// single `Fail` makes the whole binding `Fail`.
    pub fn aggregate<'a>(items: impl IntoIterator<Item = &'a ContextStatusItem>) -> Self {
        let mut seen = false;
        let mut failed = false;
        for item in items {
            seen = true;
            match item.status {
                SyncStatus::Success => {}
                SyncStatus::Fail => failed = true,
                _ => return SyncState::Syncing,
            }
        }
        match (seen, failed) {
            (false, _) => SyncState::Idle,
            (true, true) => SyncState::Fail,
            (true, false) => SyncState::Success,
        }
    }
}

/// Result of `info()`: the status rows visible at call time.
#[derive(Clone, Debug, Default)]
pub struct ContextInfo {
    pub items: Vec<ContextStatusItem>,
    pub request_id: String,
}

impl ContextInfo {
    pub fn state(&self) -> SyncState {
        SyncState::aggregate(&self.items)
    }
}

/// Lifecycle state of a session, as reported by `GetSession`. The server
/// sends both `PAUSED` and `Paused` spellings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[serde(alias = "Running")]
    Running,
    #[serde(alias = "Pausing")]
    Pausing,
    #[serde(alias = "Paused")]
    Paused,
    #[serde(alias = "Resuming")]
    Resuming,
    #[serde(alias = "Deleting")]
    Deleting,
    #[serde(alias = "Deleted")]
    Deleted,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "RUNNING",
            SessionStatus::Pausing => "PAUSING",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Resuming => "RESUMING",
            SessionStatus::Deleting => "DELETING",
            SessionStatus::Deleted => "DELETED",
            SessionStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Acknowledgement of a request that returns no payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationReceipt {
    pub request_id: String,
}
