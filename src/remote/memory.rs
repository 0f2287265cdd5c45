//! In-process remote store session.
//!
//! A functional stand-in for the real store used by tests, simulations and
//! offline runs. Writes complete after a configurable number of pump calls
//! so settle-window behavior can be exercised; per-path failure injection
//! covers the error dispatch path.

use crate::remote::session::{RemoteError, RemoteSession, SessionEvent, TaskOutcome, UploadTask};
use serde_json::Value;
use std::collections::HashMap;

struct InFlight {
    task: UploadTask,
    pumps_remaining: u32,
}

/// In-memory key-value session with pump-driven write completion.
pub struct MemorySession {
    ready: bool,
    ack_delay_pumps: u32,
    values: HashMap<String, Value>,
    counters: HashMap<String, u64>,
    failures: HashMap<String, (i64, String)>,
    in_flight: Vec<InFlight>,
    completed: Vec<UploadTask>,
}

impl MemorySession {
    /// A ready session acknowledging writes on the next pump.
    pub fn new() -> Self {
        Self {
            ready: true,
            ack_delay_pumps: 1,
            values: HashMap::new(),
            counters: HashMap::new(),
            failures: HashMap::new(),
            in_flight: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// A session that never becomes ready (no store configured).
    pub fn offline() -> Self {
        let mut session = Self::new();
        session.ready = false;
        session
    }

    /// Override readiness (exercise the auth-not-ready path).
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Number of pump calls before a queued write acknowledges.
    pub fn set_ack_delay_pumps(&mut self, pumps: u32) {
        self.ack_delay_pumps = pumps;
    }

    /// Seed an integer counter readable via `fetch_counter`.
    pub fn set_counter(&mut self, path: &str, value: u64) {
        self.counters.insert(path.to_string(), value);
    }

    /// Make every write to `path` fail with the given code and message.
    pub fn fail_writes_to(&mut self, path: &str, code: i64, message: &str) {
        self.failures
            .insert(path.to_string(), (code, message.to_string()));
    }

    /// Value last written to `path`, if any.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Tasks that reached a terminal outcome, in completion order.
    pub fn completed_tasks(&self) -> &[UploadTask] {
        &self.completed
    }

    /// Writes still awaiting acknowledgement.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSession for MemorySession {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn fetch_counter(&mut self, path: &str) -> Result<Option<u64>, RemoteError> {
        if !self.ready {
            return Err(RemoteError::NotReady);
        }
        if let Some(value) = self.counters.get(path) {
            return Ok(Some(*value));
        }
        // The store is hierarchical: a counter may live as a field of an
        // object written one level up.
        if let Some((parent, leaf)) = path.rsplit_once('/') {
            if let Some(node) = self.values.get(parent).and_then(|v| v.get(leaf)) {
                return Ok(node.as_u64());
            }
        }
        Ok(self.values.get(path).and_then(Value::as_u64))
    }

    fn submit(&mut self, task: UploadTask) -> Result<(), RemoteError> {
        if !self.ready {
            return Err(RemoteError::NotReady);
        }
        self.in_flight.push(InFlight {
            task,
            pumps_remaining: self.ack_delay_pumps,
        });
        Ok(())
    }

    fn advance(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let mut still_pending = Vec::new();

        for mut entry in self.in_flight.drain(..) {
            if entry.pumps_remaining > 1 {
                entry.pumps_remaining -= 1;
                still_pending.push(entry);
                continue;
            }

            let mut task = entry.task;
            match self.failures.get(&task.path) {
                Some((code, message)) => {
                    task.outcome = TaskOutcome::Error {
                        code: *code,
                        message: message.clone(),
                    };
                    events.push(SessionEvent::Error {
                        correlation_id: task.correlation_id.clone(),
                        code: *code,
                        message: message.clone(),
                    });
                }
                None => {
                    self.values.insert(task.path.clone(), task.payload.clone());
                    task.outcome = TaskOutcome::Success;
                    events.push(SessionEvent::Completed {
                        correlation_id: task.correlation_id.clone(),
                    });
                }
            }
            self.completed.push(task);
        }

        self.in_flight = still_pending;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_completes_after_pump() {
        let mut session = MemorySession::new();
        session
            .submit(UploadTask::new("t1", "devices/d/data/x", json!({"n": 1})))
            .unwrap();
        assert_eq!(session.in_flight_count(), 1);

        let events = session.advance();
        assert_eq!(
            events,
            vec![SessionEvent::Completed {
                correlation_id: "t1".to_string()
            }]
        );
        assert_eq!(session.value_at("devices/d/data/x"), Some(&json!({"n": 1})));
    }

    #[test]
    fn test_ack_delay_spans_pumps() {
        let mut session = MemorySession::new();
        session.set_ack_delay_pumps(3);
        session
            .submit(UploadTask::new("t1", "p", json!(1)))
            .unwrap();

        assert!(session.advance().is_empty());
        assert!(session.advance().is_empty());
        assert_eq!(session.advance().len(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let mut session = MemorySession::new();
        session.fail_writes_to("p", 401, "permission denied");
        session
            .submit(UploadTask::new("t1", "p", json!(1)))
            .unwrap();

        let events = session.advance();
        match &events[0] {
            SessionEvent::Error {
                correlation_id,
                code,
                message,
            } => {
                assert_eq!(correlation_id, "t1");
                assert_eq!(*code, 401);
                assert!(message.contains("denied"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(session.value_at("p").is_none());
    }

    #[test]
    fn test_offline_session_rejects_calls() {
        let mut session = MemorySession::offline();
        assert!(!session.is_ready());
        assert!(matches!(
            session.fetch_counter("p"),
            Err(RemoteError::NotReady)
        ));
        assert!(matches!(
            session.submit(UploadTask::new("t", "p", json!(0))),
            Err(RemoteError::NotReady)
        ));
    }

    #[test]
    fn test_counter_fetch() {
        let mut session = MemorySession::new();
        session.set_counter("devices/d/data/2025-12-02/daily_impressions", 5);
        assert_eq!(
            session
                .fetch_counter("devices/d/data/2025-12-02/daily_impressions")
                .unwrap(),
            Some(5)
        );
        assert_eq!(session.fetch_counter("absent").unwrap(), None);
    }
}
