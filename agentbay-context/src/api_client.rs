//! Transport for the AgentBay control plane.
//!
//! Every remote operation is a named action with a JSON parameter object.
//! The server answers with a `{Success, RequestId, Code, Message, Data}`
//! envelope, which is normalized into [`ApiEnvelope`].

use crate::config::AgentBayConfig;
use crate::error::{ContextError, ContextResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Executes one named remote operation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, action: &str, params: Value) -> ContextResult<ApiEnvelope>;
}

/// Normalized result of one remote call.
///
/// `success == false` always comes with a non-empty `error_message`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiEnvelope {
    pub success: bool,
    pub request_id: String,
    pub code: Option<String>,
    pub data: Value,
    pub error_message: Option<String>,
    /// Other top-level response fields, such as paging cursors.
    pub metadata: Map<String, Value>,
}

impl ApiEnvelope {
    pub fn ok(request_id: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            code: None,
            data,
            error_message: None,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn failed(
        request_id: impl Into<String>,
        code: Option<String>,
        message: Option<String>,
    ) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| code.clone())
            .unwrap_or_else(|| "request failed without an error message".to_string());
        Self {
            success: false,
            request_id: request_id.into(),
            code,
            data: Value::Null,
            error_message: Some(message),
            metadata: Map::new(),
        }
    }

    /// Error message for a failed envelope.
    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or_default()
    }

    /// Returns the payload, or `ContextError::Api` when the call failed.
    pub fn into_data(self) -> ContextResult<Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.into_error())
        }
    }

    pub fn into_error(self) -> ContextError {
        ContextError::Api {
            code: self.code.unwrap_or_else(|| "Unknown".to_string()),
            message: self.error_message.unwrap_or_default(),
            request_id: self.request_id,
        }
    }

    /// The payload as an object. Some actions return the object encoded as
    /// a JSON string; that form is decoded here.
    pub fn data_object(&self) -> ContextResult<Value> {
        decode_nested(&self.data)
    }
}

/// Decodes a value that may be a JSON document wrapped in a string.
pub(crate) fn decode_nested(value: &Value) -> ContextResult<Value> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::String(s) => Ok(serde_json::from_str(s)?),
        other => Ok(other.clone()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEnvelope {
    success: Option<bool>,
    request_id: Option<String>,
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// HTTP transport: POSTs JSON parameters to `{endpoint}/{action}`.
pub struct HttpTransport {
    client: Client,
    config: AgentBayConfig,
}

impl HttpTransport {
    pub fn new(config: AgentBayConfig) -> ContextResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AgentBayConfig {
        &self.config
    }

    fn api_key(&self) -> ContextResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ContextError::AuthenticationMissing)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, action: &str, params: Value) -> ContextResult<ApiEnvelope> {
        let api_key = self.api_key()?;
        let url = format!("{}/{action}", self.config.endpoint.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&params)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let raw: Option<RawEnvelope> = serde_json::from_str(&text).ok();

        let envelope = match raw {
            Some(raw) if status.is_success() && raw.success.unwrap_or(true) => {
                let mut envelope = ApiEnvelope::ok(raw.request_id.unwrap_or_default(), raw.data);
                envelope.metadata = raw.extra;
                envelope
            }
            Some(raw) => ApiEnvelope::failed(
                raw.request_id.unwrap_or_default(),
                raw.code.or_else(|| Some(status.as_u16().to_string())),
                raw.message,
            ),
            None => ApiEnvelope::failed(
                String::new(),
                Some(status.as_u16().to_string()),
                Some(format!("unparseable response for {action} (HTTP {status})")),
            ),
        };

        debug!(
            action,
            request_id = %envelope.request_id,
            success = envelope.success,
            "api call finished"
        );
        Ok(envelope)
    }
}
