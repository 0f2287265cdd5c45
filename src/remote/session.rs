//! Remote store session boundary.
//!
//! The remote store is a hierarchical key-value tree reached through an
//! authenticated session. Reads are bounded synchronous calls; writes are
//! asynchronous tasks that complete through the session's pump. The session
//! must be pumped regularly (every bounded wait in this crate does so),
//! otherwise authentication and in-flight writes never progress.

use serde::Serialize;
use serde_json::Value;

/// Terminal state of an upload task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TaskOutcome {
    Pending,
    Success,
    Error { code: i64, message: String },
}

/// One asynchronous write, tagged for correlation with its completion event.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub correlation_id: String,
    pub path: String,
    pub payload: Value,
    pub outcome: TaskOutcome,
}

impl UploadTask {
    /// Create a pending write of `payload` to `path`.
    pub fn new(correlation_id: impl Into<String>, path: impl Into<String>, payload: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            path: path.into(),
            payload,
            outcome: TaskOutcome::Pending,
        }
    }
}

/// Completion/diagnostic events drained from the session pump.
///
/// A single dispatch function consumes these, keyed on correlation id;
/// nothing here is fatal to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session-level lifecycle event (auth progress and the like)
    Event { message: String },
    /// Diagnostic chatter, logged only
    Debug { message: String },
    /// A task failed
    Error {
        correlation_id: String,
        code: i64,
        message: String,
    },
    /// A task was acknowledged
    Completed { correlation_id: String },
}

/// Errors surfaced by synchronous session calls.
#[derive(Debug)]
pub enum RemoteError {
    /// The session has not completed authentication
    NotReady,
    /// Transport-level failure
    Network(String),
    /// The store answered with something unusable
    Protocol(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::NotReady => write!(f, "Remote session not ready"),
            RemoteError::Network(e) => write!(f, "Remote network error: {e}"),
            RemoteError::Protocol(e) => write!(f, "Remote protocol error: {e}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// An authenticated session against the remote store.
///
/// Bring-up (credentials, network registration, the authentication
/// handshake) happens outside this crate; the core only observes readiness.
pub trait RemoteSession {
    /// Whether authentication has completed and calls may be issued.
    fn is_ready(&self) -> bool;

    /// Bounded synchronous read of an integer counter at `path`.
    /// `Ok(None)` when the node is absent.
    fn fetch_counter(&mut self, path: &str) -> Result<Option<u64>, RemoteError>;

    /// Queue an asynchronous write. Completion arrives later through
    /// [`RemoteSession::advance`].
    fn submit(&mut self, task: UploadTask) -> Result<(), RemoteError>;

    /// Pump the session: let authentication and in-flight writes progress,
    /// returning whatever events completed since the last call.
    fn advance(&mut self) -> Vec<SessionEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_task_starts_pending() {
        let task = UploadTask::new("abc", "devices/x/data/2025-12-02", json!({"v": 1}));
        assert_eq!(task.outcome, TaskOutcome::Pending);
        assert_eq!(task.path, "devices/x/data/2025-12-02");
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Network("timed out".to_string());
        assert!(err.to_string().contains("timed out"));
        assert!(RemoteError::NotReady.to_string().contains("not ready"));
    }
}
