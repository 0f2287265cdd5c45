//! Line-oriented command channel to the cellular/positioning module.
//!
//! The real transport is a hardware serial link owned by the bring-up layer;
//! this crate only defines the line-oriented boundary it probes through,
//! plus an in-process scripted implementation so the probe logic can run on
//! hosts without hardware.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Line-oriented request/response transport to the hardware module.
///
/// Implementations deliver whole response lines with line endings stripped.
/// Sending is fire-and-forget: a dead link shows up as read silence, which
/// the probes already treat as a retryable condition.
pub trait CommandChannel {
    /// Send one command line.
    fn send_line(&mut self, line: &str);

    /// Read the next response line, waiting at most `timeout`.
    /// `None` means the channel stayed silent for the whole window.
    fn read_line(&mut self, timeout: Duration) -> Option<String>;
}

/// In-process channel double with per-command scripted responses.
///
/// Each call to [`ScriptedChannel::respond`] queues one response batch for a
/// command; every matching `send_line` pops the next batch into the read
/// queue. Commands with no remaining batches produce silence.
pub struct ScriptedChannel {
    sent: Vec<String>,
    scripts: HashMap<String, VecDeque<Vec<String>>>,
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            sent: Vec::new(),
            scripts: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Queue one batch of response lines for the next occurrence of `command`.
    pub fn respond(&mut self, command: &str, lines: &[&str]) {
        self.scripts
            .entry(command.to_string())
            .or_default()
            .push_back(lines.iter().map(|l| l.to_string()).collect());
    }

    /// Inject a raw line into the read queue (unsolicited output).
    pub fn push_line(&mut self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for ScriptedChannel {
    fn send_line(&mut self, line: &str) {
        self.sent.push(line.to_string());
        if let Some(batches) = self.scripts.get_mut(line) {
            if let Some(batch) = batches.pop_front() {
                for response in batch {
                    let _ = self.tx.send(response);
                }
            }
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Option<String> {
        self.rx.recv_timeout(timeout).ok()
    }
}
