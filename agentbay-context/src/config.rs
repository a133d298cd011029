//! Client configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable holding the bearer credential.
pub const API_KEY_ENV: &str = "AGENTBAY_API_KEY";

/// Optional environment override for the API endpoint.
pub const ENDPOINT_ENV: &str = "AGENTBAY_ENDPOINT";

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the AgentBay client.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentBayConfig {
    /// Base URL of the control plane API.
    pub endpoint: String,

    /// Bearer credential. Checked lazily, at the first call that needs it.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Default interval between status polls (seconds).
    pub poll_interval_secs: u64,

    /// Default budget for async operations (seconds).
    pub operation_timeout_secs: u64,
}

impl Default for AgentBayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://wuyingai.cn-shanghai.aliyuncs.com".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            poll_interval_secs: 2,
            operation_timeout_secs: 300,
        }
    }
}

impl fmt::Debug for AgentBayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentBayConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}

impl AgentBayConfig {
    /// Builds a config from the process environment.
    ///
    /// A missing `AGENTBAY_API_KEY` is not an error here; the transport
    /// reports `AuthenticationMissing` when it is first used.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim_end_matches('/').to_string();
            }
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Poll options derived from the configured defaults.
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(self.operation_timeout_secs, self.poll_interval_secs)
    }
}

/// Timeout budget and poll cadence for one async operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl PollOptions {
    pub fn new(timeout_secs: u64, poll_interval_secs: u64) -> Self {
        Self::from_durations(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(poll_interval_secs),
        )
    }

    /// Intervals below one second are raised to one second.
    pub fn from_durations(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(300, 2)
    }
}
