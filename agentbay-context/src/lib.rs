//! Context synchronization for AgentBay sessions.
//!
//! Provides:
//! - Sync policy model (upload/download/delete strategy, allow lists, retention)
//! - Context registry (resolve or create by name, CRUD, file listing)
//! - Session-side sync/info/clear with a blocking completion contract
//! - A single start-then-poll driver shared by pause, resume, clear and sync
//! - Presigned-URL file upload/download

pub mod api_client;
pub mod client;
pub mod config;
pub mod error;
pub mod file_transfer;
pub mod policy;
pub mod poller;
pub mod registry;
pub mod session;
pub mod sync_coordinator;
pub mod types;

pub use client::AgentBay;
pub use config::{AgentBayConfig, PollOptions};
pub use error::{ContextError, ContextResult};
pub use types::*;
