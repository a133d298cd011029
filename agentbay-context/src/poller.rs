//! Start-then-poll driver for server-side asynchronous operations.
//!
//! The server exposes pause, resume, clear and sync as fire-and-forget
//! requests plus a status endpoint. [`AsyncOperation::run`] turns such a
//! pair into one awaitable call with a hard timeout:
//!
//! 1. `start()` is sent once. A refusal returns `OperationRejected`
//!    without polling.
//! 2. Every `poll_interval` the status is polled. `Succeeded` returns,
//!    `Failed` returns the error the status check built, anything else waits.
//! 3. Once `timeout` has elapsed without a terminal status the call
//!    returns `OperationTimeout` with the last observed status. The server
//!    side keeps running; a later status read can still see it finish.
//!
//! The interval is fixed. The final request id is always the one of the
//! last poll, not of `start()`.

use crate::config::PollOptions;
use crate::error::{ContextError, ContextResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which server-side operation is being awaited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Pause,
    Resume,
    Clear,
    Sync,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Pause => write!(f, "pause"),
            OperationKind::Resume => write!(f, "resume"),
            OperationKind::Clear => write!(f, "clear"),
            OperationKind::Sync => write!(f, "sync"),
        }
    }
}

/// Answer to the `start()` request.
#[derive(Clone, Debug)]
pub struct StartOutcome {
    pub accepted: bool,
    pub request_id: String,
    pub message: Option<String>,
}

impl StartOutcome {
    pub fn accepted(request_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            request_id: request_id.into(),
            message: None,
        }
    }

    pub fn rejected(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            request_id: request_id.into(),
            message: Some(message.into()),
        }
    }
}

/// Coarse status reported by one poll.
#[derive(Debug)]
pub enum PollStatus<T> {
    Pending,
    InProgress,
    Succeeded(T),
    Failed(ContextError),
}

/// One poll result: the status, the request id of the poll, and a short
/// description of the raw server state for timeout reporting.
#[derive(Debug)]
pub struct PollOutcome<T> {
    pub status: PollStatus<T>,
    pub request_id: String,
    pub observed: String,
}

impl<T> PollOutcome<T> {
    pub fn new(status: PollStatus<T>, request_id: impl Into<String>, observed: impl Into<String>) -> Self {
        Self {
            status,
            request_id: request_id.into(),
            observed: observed.into(),
        }
    }
}

/// Successful completion of an async operation.
#[derive(Clone, Debug)]
pub struct OperationOutcome<T> {
    /// Request id of the last poll.
    pub request_id: String,
    pub elapsed: Duration,
    pub polls: u32,
    pub detail: T,
}

/// One in-flight async operation. Lives for the duration of one call.
#[derive(Clone, Debug)]
pub struct AsyncOperation {
    pub kind: OperationKind,
    pub target_id: String,
    pub started_at: DateTime<Utc>,
    pub options: PollOptions,
}

impl AsyncOperation {
    pub fn new(kind: OperationKind, target_id: impl Into<String>, options: PollOptions) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
            started_at: Utc::now(),
            options: PollOptions::from_durations(options.timeout, options.poll_interval),
        }
    }

    /// Sends `start` once, then polls until a terminal status or timeout.
    pub async fn run<T, S, SFut, P, PFut>(
        self,
        start: S,
        mut poll: P,
    ) -> ContextResult<OperationOutcome<T>>
    where
        S: FnOnce() -> SFut,
        SFut: Future<Output = ContextResult<StartOutcome>>,
        P: FnMut() -> PFut,
        PFut: Future<Output = ContextResult<PollOutcome<T>>>,
    {
        let clock = Instant::now();
        let PollOptions {
            timeout,
            poll_interval,
        } = self.options;

        let started = start().await?;
        if !started.accepted {
            let message = started
                .message
                .unwrap_or_else(|| format!("{} request was not accepted", self.kind));
            warn!(
                kind = %self.kind,
                target = %self.target_id,
                request_id = %started.request_id,
                "async operation rejected: {message}"
            );
            return Err(ContextError::OperationRejected {
                message,
                request_id: started.request_id,
            });
        }
        debug!(
            kind = %self.kind,
            target = %self.target_id,
            request_id = %started.request_id,
            "async operation accepted"
        );

        let mut last_request_id = started.request_id;
        let mut last_status = "accepted".to_string();
        let mut polls = 0u32;

        loop {
            let elapsed = clock.elapsed();
            if elapsed >= timeout {
                warn!(
                    kind = %self.kind,
                    target = %self.target_id,
                    request_id = %last_request_id,
                    polls,
                    "async operation timed out, last status {last_status}"
                );
                return Err(ContextError::OperationTimeout {
                    last_status,
                    request_id: last_request_id,
                    elapsed,
                });
            }

            tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;

            let outcome = poll().await?;
            polls += 1;
            last_request_id = outcome.request_id;
            debug!(
                kind = %self.kind,
                target = %self.target_id,
                request_id = %last_request_id,
                attempt = polls,
                observed = %outcome.observed,
                "poll"
            );

            match outcome.status {
                PollStatus::Succeeded(detail) => {
                    let elapsed = clock.elapsed();
                    info!(
                        kind = %self.kind,
                        target = %self.target_id,
                        request_id = %last_request_id,
                        "async operation finished in {:.1}s after {polls} polls",
                        elapsed.as_secs_f64()
                    );
                    return Ok(OperationOutcome {
                        request_id: last_request_id,
                        elapsed,
                        polls,
                        detail,
                    });
                }
                PollStatus::Failed(err) => {
                    warn!(
                        kind = %self.kind,
                        target = %self.target_id,
                        request_id = %last_request_id,
                        "async operation failed: {err}"
                    );
                    return Err(err);
                }
                PollStatus::Pending | PollStatus::InProgress => {
                    last_status = outcome.observed;
                }
            }
        }
    }
}
