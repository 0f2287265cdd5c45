//! Cloud synchronization of aggregate snapshots.
//!
//! Reconciles the day-scoped impression counter against the remote store at
//! date boundaries, then pushes the daily record and the latest location as
//! asynchronous writes. Uploads get a bounded settle window; anything not
//! acknowledged in time is abandoned for the cycle and superseded by the
//! next cycle's fresher data. Nothing in this module is fatal to the
//! scheduler.

use crate::core::CycleAggregator;
use crate::logbook::Logbook;
use crate::probe::{GeoFix, NetworkTime};
use crate::remote::{RemoteSession, SessionEvent, UploadTask};
use crate::retry::PUMP_GRANULARITY;
use crate::VERSION;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How long each sync pumps the session waiting for acknowledgements.
pub const DEFAULT_UPLOAD_SETTLE_WINDOW: Duration = Duration::from_secs(3);

/// Approximate per-write transport overhead, counted into bytes-sent.
const WRITE_OVERHEAD_BYTES: u64 = 200;

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Writes were submitted and the settle window ran
    Synced,
    /// The session is unauthenticated; nothing was submitted or queued
    SkippedAuthNotReady,
}

/// Date-scoped daily record pushed to `devices/{id}/data/{date}`.
#[derive(Debug, Serialize)]
struct DailyRecord<'a> {
    device_id: &'a str,
    date: &'a str,
    daily_impressions: u64,
    last_updated: &'a str,
}

/// Location node pushed to `devices/{id}/device_info/Location`.
#[derive(Debug, Serialize)]
struct LocationRecord {
    #[serde(rename = "Lat")]
    lat: String,
    #[serde(rename = "Long")]
    long: String,
}

impl LocationRecord {
    fn from_fix(fix: GeoFix) -> Self {
        Self {
            lat: format!("{:.6}", fix.latitude),
            long: format!("{:.6}", fix.longitude),
        }
    }
}

/// One-time device identity record pushed at bring-up.
#[derive(Debug, Serialize)]
struct DeviceInfoRecord<'a> {
    device_id: &'a str,
    firmware: &'a str,
    setup_time: &'a str,
    status: &'a str,
    #[serde(rename = "Location")]
    location: LocationRecord,
}

/// Reconciles daily counters and pushes aggregate snapshots.
pub struct CloudSyncOrchestrator {
    device_id: String,
    settle_window: Duration,
    /// Correlation id -> task label for writes awaiting acknowledgement
    pending: HashMap<String, String>,
    bytes_sent: u64,
}

impl CloudSyncOrchestrator {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            settle_window: DEFAULT_UPLOAD_SETTLE_WINDOW,
            pending: HashMap::new(),
            bytes_sent: 0,
        }
    }

    /// Override the settle window (tests and simulations).
    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Approximate bytes pushed to the store so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn day_data_path(&self, date: &str) -> String {
        format!("devices/{}/data/{}", self.device_id, date)
    }

    fn daily_counter_path(&self, date: &str) -> String {
        format!("{}/daily_impressions", self.day_data_path(date))
    }

    fn location_path(&self) -> String {
        format!("devices/{}/device_info/Location", self.device_id)
    }

    fn device_info_path(&self) -> String {
        format!("devices/{}/device_info", self.device_id)
    }

    /// Adopt the remote daily counter as the local baseline when the
    /// tracked date differs from `date` (or none is tracked yet).
    ///
    /// A positive remote value resumes the day (restart safety); anything
    /// else (absent, zero, or a failed read) starts the day at zero.
    pub fn reconcile_day(
        &mut self,
        session: &mut dyn RemoteSession,
        aggregator: &mut CycleAggregator,
        date: &str,
        log: &Logbook,
    ) {
        if aggregator.tracked_date() == Some(date) {
            return;
        }

        match session.fetch_counter(&self.daily_counter_path(date)) {
            Ok(Some(value)) if value > 0 => {
                aggregator.begin_day(date, value);
                log.log(&format!(
                    "Reconcile: resuming {date} at {value} impressions"
                ));
            }
            Ok(_) => {
                aggregator.begin_day(date, 0);
                log.log(&format!("Reconcile: no data for {date}, starting fresh"));
            }
            Err(e) => {
                aggregator.begin_day(date, 0);
                log.log(&format!(
                    "Reconcile: read failed for {date} ({e}), starting fresh"
                ));
            }
        }
    }

    /// Push the current daily aggregate and location for one flushed cycle.
    pub fn sync(
        &mut self,
        session: &mut dyn RemoteSession,
        aggregator: &mut CycleAggregator,
        fix: GeoFix,
        time: &NetworkTime,
        log: &Logbook,
    ) -> SyncOutcome {
        if !session.is_ready() {
            log.log("Sync: session not ready - skipping cycle upload");
            return SyncOutcome::SkippedAuthNotReady;
        }

        self.reconcile_day(session, aggregator, time.date_key(), log);

        let date = time.date_key().to_string();
        let daily = DailyRecord {
            device_id: &self.device_id,
            date: &date,
            daily_impressions: aggregator.daily_impressions(),
            last_updated: time.timestamp(),
        };
        let daily_payload =
            serde_json::to_value(&daily).unwrap_or_else(|_| serde_json::Value::Null);
        let location_payload = serde_json::to_value(LocationRecord::from_fix(fix))
            .unwrap_or_else(|_| serde_json::Value::Null);

        self.submit_tracked(session, self.day_data_path(&date), daily_payload, "daily_data", log);
        self.submit_tracked(session, self.location_path(), location_payload, "location", log);

        self.settle(session, log);
        SyncOutcome::Synced
    }

    /// One-time device identity publication at bring-up.
    pub fn publish_device_info(
        &mut self,
        session: &mut dyn RemoteSession,
        fix: GeoFix,
        setup_time: &NetworkTime,
        log: &Logbook,
    ) {
        if !session.is_ready() {
            log.log("Sync: session not ready - device info not published");
            return;
        }

        let info = DeviceInfoRecord {
            device_id: &self.device_id,
            firmware: VERSION,
            setup_time: setup_time.timestamp(),
            status: "active",
            location: LocationRecord::from_fix(fix),
        };
        let payload = serde_json::to_value(&info).unwrap_or_else(|_| serde_json::Value::Null);
        self.submit_tracked(session, self.device_info_path(), payload, "device_info", log);
        self.settle(session, log);
    }

    /// Route drained session events; the only consumer of completion
    /// callbacks, keyed on correlation id.
    pub fn dispatch(&mut self, events: Vec<SessionEvent>, log: &Logbook) {
        for event in events {
            match event {
                SessionEvent::Completed { correlation_id } => {
                    let label = self
                        .pending
                        .remove(&correlation_id)
                        .unwrap_or_else(|| "task".to_string());
                    log.log(&format!("Sync: {label} upload acknowledged"));
                }
                SessionEvent::Error {
                    correlation_id,
                    code,
                    message,
                } => {
                    let label = self
                        .pending
                        .remove(&correlation_id)
                        .unwrap_or_else(|| "task".to_string());
                    log.log(&format!(
                        "Sync ERROR - Task: {label}, Code: {code}, Msg: {message}"
                    ));
                }
                SessionEvent::Event { message } => log.log(&format!("Session event: {message}")),
                SessionEvent::Debug { message } => log.log(&format!("Session debug: {message}")),
            }
        }
    }

    fn submit_tracked(
        &mut self,
        session: &mut dyn RemoteSession,
        path: String,
        payload: serde_json::Value,
        label: &str,
        log: &Logbook,
    ) {
        let correlation_id = Uuid::new_v4().to_string();
        let approx_bytes = payload.to_string().len() as u64;
        let task = UploadTask::new(correlation_id.clone(), path, payload);
        match session.submit(task) {
            Ok(()) => {
                self.pending.insert(correlation_id, label.to_string());
                self.bytes_sent += approx_bytes + WRITE_OVERHEAD_BYTES;
            }
            Err(e) => log.log(&format!("Sync: submit of {label} failed: {e}")),
        }
    }

    /// Pump the session for the settle window, then abandon whatever was
    /// not acknowledged. No in-cycle retry: the next cycle carries fresher
    /// data anyway.
    fn settle(&mut self, session: &mut dyn RemoteSession, log: &Logbook) {
        let deadline = Instant::now() + self.settle_window;
        while Instant::now() < deadline && !self.pending.is_empty() {
            std::thread::sleep(PUMP_GRANULARITY);
            let events = session.advance();
            self.dispatch(events, log);
        }

        for (correlation_id, label) in std::mem::take(&mut self.pending) {
            log.log(&format!(
                "Sync: {label} ({correlation_id}) not acknowledged in time - abandoned"
            ));
        }
    }
}
