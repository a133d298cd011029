//! Entry point: builds the transport and hands out sessions and the
//! context registry.

use crate::api_client::{HttpTransport, Transport};
use crate::config::AgentBayConfig;
use crate::error::{ContextError, ContextResult};
use crate::registry::ContextService;
use crate::session::{Session, SessionParams};
use crate::types::OperationReceipt;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct AgentBay {
    transport: Arc<dyn Transport>,
    config: AgentBayConfig,
}

impl AgentBay {
    pub fn new(config: AgentBayConfig) -> ContextResult<Self> {
        let transport = Arc::new(HttpTransport::new(config.clone())?);
        Ok(Self { transport, config })
    }

    /// Client configured from `AGENTBAY_API_KEY` / `AGENTBAY_ENDPOINT`.
    pub fn from_env() -> ContextResult<Self> {
        Self::new(AgentBayConfig::from_env())
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: AgentBayConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &AgentBayConfig {
        &self.config
    }

    pub fn contexts(&self) -> ContextService {
        ContextService::new(self.transport.clone())
    }

    /// Handle for an existing session id.
    pub fn session(&self, session_id: impl Into<String>) -> Session {
        Session::new(session_id, self.transport.clone())
    }

    pub async fn create_session(&self, params: &SessionParams) -> ContextResult<Session> {
        let envelope = self
            .transport
            .call("CreateMcpSession", params.to_request()?)
            .await?;
        let request_id = envelope.request_id.clone();
        if !envelope.success {
            return Err(envelope.into_error());
        }
        let data = envelope.data_object()?;
        let session_id = data
            .get("SessionId")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ContextError::Api {
                code: "MissingSessionId".into(),
                message: "CreateMcpSession returned no session id".into(),
                request_id: request_id.clone(),
            })?;

        info!(
            session_id,
            request_id = %request_id,
            bindings = params.context_syncs.len(),
            "session created"
        );
        Ok(self.session(session_id))
    }

    pub async fn delete_session(&self, session: &Session) -> ContextResult<OperationReceipt> {
        let envelope = self
            .transport
            .call("ReleaseMcpSession", json!({ "SessionId": session.id() }))
            .await?;
        let request_id = envelope.request_id.clone();
        envelope.into_data()?;
        info!(session_id = session.id(), request_id = %request_id, "session released");
        Ok(OperationReceipt { request_id })
    }
}
