//! Best-effort durable local log.
//!
//! An append-only line sink on local storage. Every write is
//! fire-and-forget: the caller never inspects the result and a missing or
//! failing medium silently disables logging. Nothing privacy-sensitive is
//! ever written here; entries carry aggregate counts, probe outcomes and
//! sync diagnostics only.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Append-only timestamped line log.
#[derive(Debug)]
pub struct Logbook {
    path: Option<PathBuf>,
}

impl Logbook {
    /// A logbook writing to `path`, creating parent directories if needed.
    /// Falls back to a disabled logbook when the medium is unusable.
    pub fn at(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return Self::disabled();
            }
        }
        Self { path: Some(path) }
    }

    /// A logbook that drops every entry.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Whether entries are actually being written.
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append one timestamped line. Never blocks on or reports failure.
    pub fn log(&self, message: &str) {
        let Some(ref path) = self.path else {
            return;
        };
        let entry = format!("[{}] {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"), message);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = file.write_all(entry.as_bytes());
        }
    }

    /// Append a one-line scan summary.
    pub fn scan_entry(&self, scan_number: u64, found: u32, unique: u32, repeated: u32) {
        self.log(&format!(
            "SCAN #{scan_number}: Found={found}, Unique={unique}, Repeated={repeated}"
        ));
    }
}

/// Shared logbook handle.
pub type SharedLogbook = Arc<Logbook>;

/// Create a shared logbook, disabled when no path is configured.
pub fn create_shared_logbook(path: Option<PathBuf>) -> SharedLogbook {
    Arc::new(match path {
        Some(p) => Logbook::at(p),
        None => Logbook::disabled(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("passerby-logbook-{tag}-{}.txt", std::process::id()))
    }

    #[test]
    fn test_appends_timestamped_lines() {
        let path = temp_log_path("append");
        let _ = std::fs::remove_file(&path);

        let log = Logbook::at(path.clone());
        log.log("Modem: Ready");
        log.scan_entry(3, 7, 5, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains("Modem: Ready"));
        assert!(lines[1].contains("SCAN #3: Found=7, Unique=5, Repeated=2"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_disabled_logbook_is_silent() {
        let log = Logbook::disabled();
        assert!(!log.is_enabled());
        // Must not panic or create anything.
        log.log("dropped");
    }
}
