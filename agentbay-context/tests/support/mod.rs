//! Shared test helpers: a scripted in-memory transport and payload builders.

#![allow(dead_code)]

use agentbay_context::api_client::{ApiEnvelope, Transport};
use agentbay_context::session::Session;
use agentbay_context::{ContextResult, PollOptions};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Replays queued responses per action. The last queued response for an
/// action repeats once the queue is down to it.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<ApiEnvelope>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, action: &str, envelope: ApiEnvelope) {
        self.responses
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(envelope);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|(action, _)| action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls().iter().filter(|(a, _)| a == action).count()
    }

    pub fn params(&self, action: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(a, _)| a == action)
            .map(|(_, p)| p)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, action: &str, params: Value) -> ContextResult<ApiEnvelope> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), params));

        let mut responses = self.responses.lock().unwrap();
        let queue = responses.entry(action.to_string()).or_default();
        let envelope = match queue.len() {
            0 => ApiEnvelope::failed(
                "req-unscripted",
                Some("NoScript".into()),
                Some(format!("no scripted response for {action}")),
            ),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap(),
        };
        Ok(envelope)
    }
}

pub fn ok(request_id: &str, data: Value) -> ApiEnvelope {
    ApiEnvelope::ok(request_id, data)
}

pub fn failed(request_id: &str, code: &str, message: &str) -> ApiEnvelope {
    ApiEnvelope::failed(request_id, Some(code.into()), Some(message.into()))
}

/// `GetContextInfo` payload in the server's doubly-encoded form.
/// Rows are `(context_id, path, task_type, status, error_message)`.
pub fn status_payload(rows: &[(&str, &str, &str, &str, &str)]) -> Value {
    let items: Vec<Value> = rows
        .iter()
        .map(|(context_id, path, task_type, status, error)| {
            json!({
                "contextId": context_id,
                "path": path,
                "taskType": task_type,
                "status": status,
                "errorMessage": error,
                "startTime": 1_700_000_000,
                "finishTime": 1_700_000_010,
            })
        })
        .collect();
    let entries = json!([{ "type": "data", "data": Value::Array(items).to_string() }]);
    json!({ "ContextStatus": entries.to_string() })
}

pub fn context_payload(id: &str, name: &str, state: &str) -> Value {
    json!({
        "Id": id,
        "Name": name,
        "State": state,
        "OsType": "linux",
        "CreateTime": "2025-01-01T00:00:00Z",
        "LastUsedTime": "2025-01-02T00:00:00Z",
    })
}

pub fn session_payload(status: &str) -> Value {
    json!({ "SessionId": "s-1", "Status": status })
}

pub fn test_session(transport: &Arc<ScriptedTransport>) -> Session {
    Session::new("s-1", transport.clone())
}

/// Poll budget used by most timing tests: 30 s timeout, 2 s interval.
pub fn opts() -> PollOptions {
    PollOptions::new(30, 2)
}

/// Routes crate logs to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Per-test unique context name.
pub fn unique_name() -> String {
    format!("ctx-test-{}", Uuid::new_v4())
}
