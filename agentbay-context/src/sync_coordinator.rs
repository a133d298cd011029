//! Session-side context synchronization: `sync`, `info` and `clear`.
//!
//! `sync()` is fire-and-forget on the server. It is wrapped here so that a
//! successful return means every matching status row reached `Success`.
//! `info()` only reads; it never triggers a sync and may report stale
//! state if no `sync()` was requested first.

use crate::api_client::{Transport, decode_nested};
use crate::config::PollOptions;
use crate::error::{ContextError, ContextResult, PathFailure};
use crate::poller::{AsyncOperation, OperationKind, OperationOutcome, PollOutcome, PollStatus, StartOutcome};
use crate::registry::ContextService;
use crate::types::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Completed sync: the terminal status rows plus the last poll's request id.
pub type SyncOutcome = OperationOutcome<ContextInfo>;

/// Narrows `sync`/`info` to one context, one path, or one direction.
/// The default scope covers every binding of the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncScope {
    pub context_id: Option<String>,
    pub path: Option<String>,
    pub mode: Option<SyncMode>,
}

impl SyncScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = Some(mode);
        self
    }

    fn matches(&self, item: &ContextStatusItem) -> bool {
        let context_ok = self
            .context_id
            .as_deref()
            .is_none_or(|id| id == item.context_id);
        let path_ok = self.path.as_deref().is_none_or(|p| p == item.path);
        let task_ok = match (self.mode, item.task_type) {
            (None, _) => true,
            (Some(SyncMode::Upload), TaskType::Upload) => true,
            (Some(SyncMode::Download), TaskType::Download) => true,
            _ => false,
        };
        context_ok && path_ok && task_ok
    }

    fn params(&self, session_id: &str) -> Value {
        let mut params = json!({ "SessionId": session_id });
        if let Some(id) = &self.context_id {
            params["ContextId"] = Value::String(id.clone());
        }
        if let Some(path) = &self.path {
            params["Path"] = Value::String(path.clone());
        }
        params
    }
}

/// Drives sync/info/clear for the contexts bound to one session.
#[derive(Clone)]
pub struct ContextSyncCoordinator {
    session_id: String,
    transport: Arc<dyn Transport>,
}

impl ContextSyncCoordinator {
    pub fn new(session_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            session_id: session_id.into(),
            transport,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Reads current status rows without changing any state.
    pub async fn info(&self, scope: &SyncScope) -> ContextResult<ContextInfo> {
        let mut params = scope.params(&self.session_id);
        if let Some(mode) = scope.mode {
            params["TaskType"] = Value::String(mode.as_str().to_string());
        }

        let envelope = self.transport.call("GetContextInfo", params).await?;
        let request_id = envelope.request_id.clone();
        let data = envelope.into_data()?;

        let items = parse_status_items(&data)?
            .into_iter()
            .filter(|item| scope.matches(item))
            .collect::<Vec<_>>();
        debug!(
            session_id = %self.session_id,
            request_id = %request_id,
            rows = items.len(),
            "context info"
        );
        Ok(ContextInfo { items, request_id })
    }

    /// Requests a sync and waits until every matching row is terminal.
    ///
    /// Fails with `PartialSyncFailure` when some rows failed and `SyncFailed`
    /// when all did; either error lists every failing path.
    pub async fn sync(&self, scope: &SyncScope, options: PollOptions) -> ContextResult<SyncOutcome> {
        let target = scope
            .context_id
            .clone()
            .unwrap_or_else(|| self.session_id.clone());

        AsyncOperation::new(OperationKind::Sync, target, options)
            .run(
                move || async move {
                    let mut params = scope.params(&self.session_id);
                    if let Some(mode) = scope.mode {
                        params["Mode"] = Value::String(mode.as_str().to_string());
                    }
                    let envelope = self.transport.call("SyncContext", params).await?;
                    Ok(if envelope.success {
                        StartOutcome::accepted(envelope.request_id)
                    } else {
                        let message = envelope.message().to_string();
                        StartOutcome::rejected(envelope.request_id, message)
                    })
                },
                move || async move {
                    let info = self.info(scope).await?;
                    Ok(classify(info))
                },
            )
            .await
    }

    /// Erases all data under a context and waits for the server to finish.
    pub async fn clear(
        &self,
        context_id: &str,
        options: PollOptions,
    ) -> ContextResult<OperationOutcome<ContextState>> {
        ContextService::new(self.transport.clone())
            .clear(context_id, options)
            .await
    }
}

/// Maps a status snapshot to a poll result.
///
/// No rows means the server has no pending task for the scope, which is
/// treated as done.
fn classify(info: ContextInfo) -> PollOutcome<ContextInfo> {
    let request_id = info.request_id.clone();
    match info.state() {
        SyncState::Idle => PollOutcome::new(PollStatus::Succeeded(info), request_id, "no tasks"),
        SyncState::Success => {
            let observed = format!("{} paths synced", info.items.len());
            PollOutcome::new(PollStatus::Succeeded(info), request_id, observed)
        }
        SyncState::Syncing => {
            let pending = info
                .items
                .iter()
                .filter(|item| !item.status.is_terminal())
                .count();
            let observed = format!("{pending} of {} paths pending", info.items.len());
            PollOutcome::new(PollStatus::InProgress, request_id, observed)
        }
        SyncState::Fail => {
            let failures = collect_failures(&info.items);
            let observed = format!("{} of {} paths failed", failures.len(), info.items.len());
            let err = if failures.len() == info.items.len() {
                ContextError::SyncFailed {
                    failures,
                    request_id: request_id.clone(),
                }
            } else {
                ContextError::PartialSyncFailure {
                    failures,
                    total: info.items.len(),
                    request_id: request_id.clone(),
                }
            };
            PollOutcome::new(PollStatus::Failed(err), request_id, observed)
        }
    }
}

fn collect_failures(items: &[ContextStatusItem]) -> Vec<PathFailure> {
    items
        .iter()
        .filter(|item| item.status == SyncStatus::Fail)
        .map(|item| PathFailure {
            context_id: item.context_id.clone(),
            path: item.path.clone(),
            message: item
                .error_message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "no error message".to_string()),
        })
        .collect()
}

/// Extracts status rows from a `GetContextInfo` payload.
///
/// `ContextStatus` is a JSON string holding a list of `{type, data}`
/// entries; for `type == "data"` the `data` field is itself a JSON string
/// with the rows. Rows embedded directly are accepted as well.
pub fn parse_status_items(data: &Value) -> ContextResult<Vec<ContextStatusItem>> {
    let data = decode_nested(data)?;
    let status = match data.get("ContextStatus") {
        Some(raw) => decode_nested(raw)?,
        None => return Ok(Vec::new()),
    };

    let mut items = Vec::new();
    let Value::Array(entries) = status else {
        return Ok(items);
    };
    for entry in entries {
        match entry.get("type").and_then(Value::as_str) {
            Some("data") => {
                let rows = decode_nested(entry.get("data").unwrap_or(&Value::Null))?;
                if let Value::Array(rows) = rows {
                    for row in rows {
                        items.push(serde_json::from_value(row)?);
                    }
                }
            }
            Some(_) => {}
            None if entry.get("contextId").is_some() => {
                items.push(serde_json::from_value(entry)?);
            }
            None => {}
        }
    }
    Ok(items)
}
