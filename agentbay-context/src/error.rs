//! Context sync error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// One bound path that the server reported as failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathFailure {
    pub context_id: String,
    pub path: String,
    pub message: String,
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.context_id, self.message)
    }
}

fn join_failures(failures: &[PathFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in context sync operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Client-side validation failure. Never sent to the server.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("operation rejected: {message} (request {request_id})")]
    OperationRejected { message: String, request_id: String },

    #[error(
        "operation timed out after {:.1}s, last status {last_status} (request {request_id})",
        elapsed.as_secs_f64()
    )]
    OperationTimeout {
        last_status: String,
        request_id: String,
        elapsed: Duration,
    },

    #[error(
        "sync failed for {} of {total} paths: {} (request {request_id})",
        failures.len(),
        join_failures(failures)
    )]
    PartialSyncFailure {
        failures: Vec<PathFailure>,
        total: usize,
        request_id: String,
    },

    #[error("sync failed for every path: {} (request {request_id})", join_failures(failures))]
    SyncFailed {
        failures: Vec<PathFailure>,
        request_id: String,
    },

    #[error("could not acquire presigned URL: {message} (request {request_id})")]
    UrlAcquisitionFailed { message: String, request_id: String },

    #[error("transfer failed with HTTP {status}: {message}")]
    TransferFailed { status: u16, message: String },

    #[error("no API key available (set AGENTBAY_API_KEY)")]
    AuthenticationMissing,

    #[error("API call failed [{code}]: {message} (request {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextError {
    /// Returns the most recent request id carried by this error, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::OperationRejected { request_id, .. }
            | Self::OperationTimeout { request_id, .. }
            | Self::PartialSyncFailure { request_id, .. }
            | Self::SyncFailed { request_id, .. }
            | Self::UrlAcquisitionFailed { request_id, .. }
            | Self::Api { request_id, .. } => Some(request_id.as_str()).filter(|id| !id.is_empty()),
            _ => None,
        }
    }

    /// Failing paths for sync errors; empty for every other kind.
    pub fn failures(&self) -> &[PathFailure] {
        match self {
            Self::PartialSyncFailure { failures, .. } | Self::SyncFailed { failures, .. } => {
                failures
            }
            _ => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::OperationTimeout { .. })
    }
}
