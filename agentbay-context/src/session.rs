//! Session handle and session-creation parameters.
//!
//! A `Session` is passed explicitly to whatever needs it; there is no
//! global registry of live sessions.

use crate::api_client::Transport;
use crate::config::PollOptions;
use crate::error::{ContextError, ContextResult};
use crate::file_transfer::FileTransfer;
use crate::poller::{AsyncOperation, OperationKind, OperationOutcome, PollOutcome, PollStatus, StartOutcome};
use crate::policy::ContextSync;
use crate::sync_coordinator::ContextSyncCoordinator;
use crate::types::SessionStatus;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parameters for creating a session.
#[derive(Clone, Debug, Default)]
pub struct SessionParams {
    pub image_id: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub context_syncs: Vec<ContextSync>,
}

impl SessionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Binds a context into the session. Bindings cannot change later.
    pub fn with_context_sync(mut self, binding: ContextSync) -> Self {
        self.context_syncs.push(binding);
        self
    }

    /// Request body for `CreateMcpSession`.
    pub fn to_request(&self) -> ContextResult<Value> {
        let mut body = json!({});
        if let Some(image) = &self.image_id {
            body["ImageId"] = Value::String(image.clone());
        }
        if !self.labels.is_empty() {
            body["Labels"] = Value::String(serde_json::to_string(&self.labels)?);
        }
        if !self.context_syncs.is_empty() {
            let entries = self
                .context_syncs
                .iter()
                .map(ContextSync::to_persistence_entry)
                .collect::<ContextResult<Vec<_>>>()?;
            body["PersistenceDataList"] = Value::Array(entries);
        }
        Ok(body)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionPayload {
    #[serde(default)]
    status: Option<SessionStatus>,
}

/// Handle to one remote session.
#[derive(Clone)]
pub struct Session {
    id: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            transport,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Sync/info/clear for the contexts bound to this session.
    pub fn context(&self) -> ContextSyncCoordinator {
        ContextSyncCoordinator::new(self.id.clone(), self.transport.clone())
    }

    /// Presigned-URL file transfer into and out of this session's contexts.
    pub fn file_transfer(&self) -> ContextResult<FileTransfer> {
        FileTransfer::new(self.clone())
    }

    /// Current lifecycle status and the request id of the read.
    pub async fn status(&self) -> ContextResult<(SessionStatus, String)> {
        let envelope = self
            .transport
            .call("GetSession", json!({ "SessionId": self.id }))
            .await?;
        let request_id = envelope.request_id.clone();
        if !envelope.success {
            return Err(envelope.into_error());
        }
        let data = envelope.data_object()?;
        let payload: Option<SessionPayload> = serde_json::from_value(data)?;
        let status = payload
            .and_then(|p| p.status)
            .ok_or_else(|| ContextError::Api {
                code: "MissingStatus".into(),
                message: format!("GetSession returned no status for {}", self.id),
                request_id: request_id.clone(),
            })?;
        Ok((status, request_id))
    }

    /// Pauses the session and waits until it reports `PAUSED`.
    pub async fn pause(&self, options: PollOptions) -> ContextResult<OperationOutcome<SessionStatus>> {
        self.transition(OperationKind::Pause, "PauseSessionAsync", SessionStatus::Paused, options)
            .await
    }

    /// Resumes the session and waits until it reports `RUNNING`.
    pub async fn resume(&self, options: PollOptions) -> ContextResult<OperationOutcome<SessionStatus>> {
        self.transition(OperationKind::Resume, "ResumeSessionAsync", SessionStatus::Running, options)
            .await
    }

    async fn transition(
        &self,
        kind: OperationKind,
        action: &'static str,
        target: SessionStatus,
        options: PollOptions,
    ) -> ContextResult<OperationOutcome<SessionStatus>> {
        let target = &target;
        AsyncOperation::new(kind, self.id.clone(), options)
            .run(
                move || async move {
                    let envelope = self
                        .transport
                        .call(action, json!({ "SessionId": self.id }))
                        .await?;
                    Ok(if envelope.success {
                        StartOutcome::accepted(envelope.request_id)
                    } else {
                        let message = envelope.message().to_string();
                        StartOutcome::rejected(envelope.request_id, message)
                    })
                },
                move || async move {
                    match self.status().await {
                        Ok((status, request_id)) => {
                            let observed = status.to_string();
                            let status = if &status == target {
                                PollStatus::Succeeded(status)
                            } else {
                                PollStatus::InProgress
                            };
                            Ok(PollOutcome::new(status, request_id, observed))
                        }
                        Err(err @ ContextError::Api { .. }) => {
                            let request_id = err.request_id().unwrap_or_default().to_string();
                            Ok(PollOutcome::new(PollStatus::Failed(err), request_id, "error"))
                        }
                        Err(err) => Err(err),
                    }
                },
            )
            .await
    }
}
