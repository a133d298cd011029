//! Context registry: name-to-context resolution, CRUD, file listing,
//! presigned URL acquisition and the context `clear` operation.
//!
//! Nothing is cached; every read reflects the server at call time.

use crate::api_client::{ApiEnvelope, Transport, decode_nested};
use crate::config::PollOptions;
use crate::error::{ContextError, ContextResult};
use crate::poller::{AsyncOperation, OperationKind, OperationOutcome, PollOutcome, PollStatus, StartOutcome};
use crate::types::*;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Client for context-level (session independent) operations.
#[derive(Clone)]
pub struct ContextService {
    transport: Arc<dyn Transport>,
}

/// A page of files inside a context.
#[derive(Clone, Debug, Default)]
pub struct ContextFilePage {
    pub entries: Vec<ContextFileEntry>,
    pub count: Option<u64>,
    pub request_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UrlPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expire_time: Option<i64>,
}

fn is_not_found(envelope: &ApiEnvelope) -> bool {
    if envelope.success {
        return envelope.data.is_null();
    }
    envelope
        .code
        .as_deref()
        .is_some_and(|code| code.contains("NotFound"))
}

fn metadata_u64(envelope: &ApiEnvelope, data: &Value, key: &str) -> Option<u64> {
    data.get(key)
        .or_else(|| envelope.metadata.get(key))
        .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
}

impl ContextService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Looks up a context by name.
    ///
    /// Returns `(context, true)` when it already existed. When it did not
    /// and `create_if_missing` is set, it is created and returned with
    /// `false`; otherwise the result is `NotFound`.
    pub async fn get(&self, name: &str, create_if_missing: bool) -> ContextResult<(Context, bool)> {
        let envelope = self
            .transport
            .call("GetContext", json!({ "Name": name, "AllowCreate": false }))
            .await?;

        if !is_not_found(&envelope) {
            let context = parse_context(envelope.into_data()?)?;
            debug!(context_id = %context.id, "resolved existing context {name}");
            return Ok((context, true));
        }

        if !create_if_missing {
            return Err(ContextError::NotFound(format!("context {name}")));
        }

        let envelope = self
            .transport
            .call("GetContext", json!({ "Name": name, "AllowCreate": true }))
            .await?;
        let request_id = envelope.request_id.clone();
        let data = envelope.into_data()?;
        if data.is_null() {
            return Err(ContextError::Api {
                code: "EmptyResponse".into(),
                message: format!("server returned no context after creating {name}"),
                request_id,
            });
        }
        let context = parse_context(data)?;
        info!(context_id = %context.id, request_id = %request_id, "created context {name}");
        Ok((context, false))
    }

    /// Creates a context, or returns the existing one with that name.
    pub async fn create(&self, name: &str) -> ContextResult<Context> {
        self.get(name, true).await.map(|(context, _)| context)
    }

    /// Reads a context by id.
    pub async fn get_by_id(&self, context_id: &str) -> ContextResult<(Context, String)> {
        let envelope = self
            .transport
            .call("GetContext", json!({ "ContextId": context_id, "AllowCreate": false }))
            .await?;
        if is_not_found(&envelope) {
            return Err(ContextError::NotFound(format!("context {context_id}")));
        }
        let request_id = envelope.request_id.clone();
        Ok((parse_context(envelope.into_data()?)?, request_id))
    }

    pub async fn update(&self, context: &Context) -> ContextResult<OperationReceipt> {
        self.acknowledge(
            "ModifyContext",
            json!({ "Id": context.id, "Name": context.name }),
        )
        .await
    }

    /// Deletes the context object itself. See [`ContextService::clear`]
    /// for emptying its content.
    pub async fn delete(&self, context: &Context) -> ContextResult<OperationReceipt> {
        self.acknowledge("DeleteContext", json!({ "Id": context.id }))
            .await
    }

    /// Lists one page of contexts. Pass `next_token` back unchanged to
    /// continue.
    pub async fn list(&self, params: &ListContextsParams) -> ContextResult<ContextPage> {
        let mut body = json!({ "MaxResults": params.max_results.unwrap_or(10) });
        if let Some(token) = &params.next_token {
            body["NextToken"] = Value::String(token.clone());
        }

        let envelope = self.transport.call("ListContexts", body).await?;
        let request_id = envelope.request_id.clone();
        if !envelope.success {
            return Err(envelope.into_error());
        }
        let data = envelope.data_object()?;

        let rows = match &data {
            Value::Array(_) => data.clone(),
            Value::Object(map) => map.get("Contexts").cloned().unwrap_or(Value::Array(Vec::new())),
            _ => Value::Array(Vec::new()),
        };
        let contexts: Vec<Context> = serde_json::from_value(rows)?;

        let next_token = data
            .get("NextToken")
            .or_else(|| envelope.metadata.get("NextToken"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(ContextPage {
            total_count: metadata_u64(&envelope, &data, "TotalCount"),
            contexts,
            next_token,
            request_id,
        })
    }

    pub async fn list_files(
        &self,
        context_id: &str,
        parent_folder_path: &str,
        page_number: u32,
        page_size: u32,
    ) -> ContextResult<ContextFilePage> {
        let envelope = self
            .transport
            .call(
                "DescribeContextFiles",
                json!({
                    "ContextId": context_id,
                    "ParentFolderPath": parent_folder_path,
                    "PageNumber": page_number.max(1),
                    "PageSize": page_size.max(1),
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        if !envelope.success {
            return Err(envelope.into_error());
        }
        let data = envelope.data_object()?;
        let entries = match &data {
            Value::Null => Vec::new(),
            Value::Array(_) => serde_json::from_value(data.clone())?,
            Value::Object(map) => match map.get("Entries") {
                Some(rows) => serde_json::from_value(rows.clone())?,
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        Ok(ContextFilePage {
            count: metadata_u64(&envelope, &data, "Count"),
            entries,
            request_id,
        })
    }

    pub async fn delete_file(&self, context_id: &str, file_path: &str) -> ContextResult<OperationReceipt> {
        self.acknowledge(
            "DeleteContextFile",
            json!({ "ContextId": context_id, "FilePath": file_path }),
        )
        .await
    }

    /// Presigned PUT URL for `file_path` inside the context.
    pub async fn get_file_upload_url(&self, context_id: &str, file_path: &str) -> ContextResult<PresignedUrl> {
        self.presigned_url("GetContextFileUploadUrl", context_id, file_path)
            .await
    }

    /// Presigned GET URL for `file_path` inside the context.
    pub async fn get_file_download_url(&self, context_id: &str, file_path: &str) -> ContextResult<PresignedUrl> {
        self.presigned_url("GetContextFileDownloadUrl", context_id, file_path)
            .await
    }

    async fn presigned_url(&self, action: &str, context_id: &str, file_path: &str) -> ContextResult<PresignedUrl> {
        let envelope = self
            .transport
            .call(action, json!({ "ContextId": context_id, "FilePath": file_path }))
            .await?;
        let request_id = envelope.request_id.clone();
        if !envelope.success {
            return Err(ContextError::UrlAcquisitionFailed {
                message: envelope.message().to_string(),
                request_id,
            });
        }

        let payload: Option<UrlPayload> = serde_json::from_value(envelope.data_object()?)?;
        match payload {
            Some(UrlPayload {
                url: Some(url),
                expire_time,
            }) if !url.trim().is_empty() => Ok(PresignedUrl {
                url,
                expire_time,
                request_id,
            }),
            _ => Err(ContextError::UrlAcquisitionFailed {
                message: format!("{action} returned no URL for {file_path}"),
                request_id,
            }),
        }
    }

    /// Current clear progress of a context.
    pub async fn clear_status(&self, context_id: &str) -> ContextResult<(ContextState, String)> {
        let (context, request_id) = self.get_by_id(context_id).await?;
        Ok((context.state, request_id))
    }

    /// Erases all data in the context and waits until the server reports
    /// the clear as finished, failed, or the timeout elapses.
    pub async fn clear(
        &self,
        context_id: &str,
        options: PollOptions,
    ) -> ContextResult<OperationOutcome<ContextState>> {
        AsyncOperation::new(OperationKind::Clear, context_id, options)
            .run(
                move || async move {
                    let envelope = self
                        .transport
                        .call("ClearContext", json!({ "Id": context_id }))
                        .await?;
                    Ok(if envelope.success {
                        StartOutcome::accepted(envelope.request_id)
                    } else {
                        let message = envelope.message().to_string();
                        StartOutcome::rejected(envelope.request_id, message)
                    })
                },
                move || async move {
                    let (state, request_id) = self.clear_status(context_id).await?;
                    let observed = state.to_string();
                    let status = match state {
                        ContextState::Available | ContextState::PreAvailable | ContextState::InUse => {
                            PollStatus::Succeeded(state)
                        }
                        ContextState::Failed => PollStatus::Failed(ContextError::Api {
                            code: "ClearFailed".into(),
                            message: format!("server reported clear of context {context_id} as failed"),
                            request_id: request_id.clone(),
                        }),
                        ContextState::Clearing | ContextState::Unknown => PollStatus::InProgress,
                    };
                    Ok(PollOutcome::new(status, request_id, observed))
                },
            )
            .await
    }

    async fn acknowledge(&self, action: &str, params: Value) -> ContextResult<OperationReceipt> {
        let envelope = self.transport.call(action, params).await?;
        let request_id = envelope.request_id.clone();
        envelope.into_data()?;
        debug!(action, request_id = %request_id, "acknowledged");
        Ok(OperationReceipt { request_id })
    }
}

fn parse_context(data: Value) -> ContextResult<Context> {
    Ok(serde_json::from_value(decode_nested(&data)?)?)
}
