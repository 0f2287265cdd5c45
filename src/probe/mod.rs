//! Environmental context probes for the Passerby Edge Agent.
//!
//! Two independent request/response sub-protocols share one line-oriented
//! command channel to the cellular/positioning module: wall-clock time
//! acquisition and GPS fix acquisition. Both are bounded by timeouts and
//! neither ever propagates a hard failure: exhausted budgets come back as
//! sentinels the caller substitutes defaults for.

pub mod channel;
pub mod clock;
pub mod gps;

// Re-export commonly used types
pub use channel::{CommandChannel, ScriptedChannel};
pub use clock::{parse_clock_response, NetworkTime, CLOCK_QUERY_COMMAND};
pub use gps::{
    decode_packed_degrees, parse_fix_line, FixLine, FixStatus, GeoFix, GPS_ENABLE_COMMAND,
    GPS_STATUS_COMMAND,
};

use crate::retry::{poll_until, wait_with_pump, RetryPolicy};
use std::time::Duration;

/// Timing knobs for both sub-protocols.
///
/// Defaults match the deployed cadence; tests shrink them to keep failure
/// paths fast.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTiming {
    /// Clock query schedule: 3 attempts, 2 s read window, 500 ms between
    pub clock: RetryPolicy,
    /// Fix refresh schedule: 3 attempts, 2 s read window each
    pub gps_refresh: RetryPolicy,
    /// Cadence of status queries during initial acquisition
    pub gps_poll_cadence: Duration,
    /// Settle time after the enable command before the first status query
    pub gps_enable_settle: Duration,
    /// Single channel-read slice; the pump runs once per slice
    pub read_granularity: Duration,
}

impl Default for ProbeTiming {
    fn default() -> Self {
        Self {
            clock: RetryPolicy::new(3, Duration::from_secs(2), Duration::from_millis(500)),
            gps_refresh: RetryPolicy::new(3, Duration::from_secs(2), Duration::from_millis(200)),
            gps_poll_cadence: Duration::from_secs(1),
            gps_enable_settle: Duration::from_secs(2),
            read_granularity: Duration::from_millis(100),
        }
    }
}

/// Retrying driver for the module's time and GPS sub-protocols.
///
/// Owns the command channel and the current [`GeoFix`]. All waits pump the
/// remote session through the caller-supplied pump callback.
pub struct EnvironmentProbe<C: CommandChannel> {
    channel: C,
    timing: ProbeTiming,
    fix: GeoFix,
}

impl<C: CommandChannel> EnvironmentProbe<C> {
    /// Create a probe over `channel` with deployment timing.
    pub fn new(channel: C) -> Self {
        Self::with_timing(channel, ProbeTiming::default())
    }

    /// Create a probe with explicit timing (tests, simulations).
    pub fn with_timing(channel: C, timing: ProbeTiming) -> Self {
        Self {
            channel,
            timing,
            fix: GeoFix::searching(),
        }
    }

    /// Acquire the network wall clock.
    ///
    /// Sends the clock query and scans the response window for a quoted
    /// timestamp, retrying within the configured budget. `None` after the
    /// budget is exhausted; never an error.
    pub fn network_time(&mut self, pump: &mut dyn FnMut()) -> Option<NetworkTime> {
        let timing = self.timing;
        let channel = &mut self.channel;
        timing.clock.run(pump, &mut |pump| {
            channel.send_line(CLOCK_QUERY_COMMAND);
            read_window(&mut *channel, timing.clock.attempt_timeout, timing.read_granularity, pump, &mut |line| {
                parse_clock_response(line)
            })
        })
    }

    /// Initial fix acquisition: enable the engine, then poll the status
    /// query until a fix arrives or `timeout` elapses.
    ///
    /// On success the stored fix becomes `Locked` and `true` is returned.
    /// On timeout the stored fix is untouched and the caller is expected to
    /// substitute its configured fallback via [`Self::apply_fallback`].
    pub fn acquire_fix(&mut self, timeout: Duration, pump: &mut dyn FnMut()) -> bool {
        let timing = self.timing;
        let channel = &mut self.channel;
        channel.send_line(GPS_ENABLE_COMMAND);
        wait_with_pump(timing.gps_enable_settle, pump);

        let found = poll_until(timeout, timing.gps_poll_cadence, pump, &mut |pump| {
            channel.send_line(GPS_STATUS_COMMAND);
            read_window(&mut *channel, timing.gps_poll_cadence, timing.read_granularity, pump, &mut fix_from_line)
        });

        match found {
            Some((latitude, longitude)) => {
                self.fix = GeoFix {
                    latitude,
                    longitude,
                    status: FixStatus::Locked,
                };
                true
            }
            None => false,
        }
    }

    /// Periodic refresh: a short attempt-bounded re-query that avoids
    /// re-running the long initial search. Keeps the previous fix on
    /// failure.
    pub fn refresh_fix(&mut self, pump: &mut dyn FnMut()) -> bool {
        let timing = self.timing;
        let channel = &mut self.channel;
        let found = timing.gps_refresh.run(pump, &mut |pump| {
            channel.send_line(GPS_STATUS_COMMAND);
            read_window(&mut *channel, timing.gps_refresh.attempt_timeout, timing.read_granularity, pump, &mut fix_from_line)
        });

        match found {
            Some((latitude, longitude)) => {
                self.fix = GeoFix {
                    latitude,
                    longitude,
                    status: FixStatus::Locked,
                };
                true
            }
            None => false,
        }
    }

    /// Substitute the documented fallback coordinates after a failed
    /// acquisition.
    pub fn apply_fallback(&mut self, latitude: f64, longitude: f64) {
        self.fix = GeoFix {
            latitude,
            longitude,
            status: FixStatus::Fallback,
        };
    }

    /// The current fix (searching/fallback/locked).
    pub fn fix(&self) -> GeoFix {
        self.fix
    }

    /// Access the underlying channel (inspection in tests).
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}

/// Classify a response line as a usable coordinate pair.
fn fix_from_line(line: &str) -> Option<(f64, f64)> {
    match parse_fix_line(line) {
        Some(FixLine::Fix {
            latitude,
            longitude,
        }) => Some((latitude, longitude)),
        // Not-ready and unrelated lines both mean "keep reading".
        Some(FixLine::NotReady) | None => None,
    }
}

/// Scan the channel for up to `window`, pumping once per granule, returning
/// the first line `classify` accepts.
fn read_window<C: CommandChannel, T>(
    channel: &mut C,
    window: Duration,
    granule: Duration,
    pump: &mut dyn FnMut(),
    classify: &mut dyn FnMut(&str) -> Option<T>,
) -> Option<T> {
    let deadline = std::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        if let Some(line) = channel.read_line(remaining.min(granule)) {
            if let Some(value) = classify(&line) {
                return Some(value);
            }
        }
        pump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_timing() -> ProbeTiming {
        ProbeTiming {
            clock: RetryPolicy::new(3, Duration::from_millis(30), Duration::from_millis(5)),
            gps_refresh: RetryPolicy::new(3, Duration::from_millis(30), Duration::from_millis(5)),
            gps_poll_cadence: Duration::from_millis(20),
            gps_enable_settle: Duration::from_millis(5),
            read_granularity: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_network_time_first_attempt() {
        let mut channel = ScriptedChannel::new();
        channel.respond(CLOCK_QUERY_COMMAND, &["+CCLK: \"25/12/02,10:30:45+00\"", "OK"]);

        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        let time = probe.network_time(&mut || {}).unwrap();
        assert_eq!(time.timestamp(), "2025-12-02 10:30:45 UTC");
    }

    #[test]
    fn test_network_time_retries_past_garbage() {
        let mut channel = ScriptedChannel::new();
        channel.respond(CLOCK_QUERY_COMMAND, &["ERROR"]);
        channel.respond(CLOCK_QUERY_COMMAND, &["+CCLK: \"25/12/03,00:00:01+00\""]);

        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        let time = probe.network_time(&mut || {}).unwrap();
        assert_eq!(time.date_key(), "2025-12-03");
        assert_eq!(probe.channel_mut().sent().len(), 2);
    }

    #[test]
    fn test_network_time_unavailable_after_budget() {
        let channel = ScriptedChannel::new();
        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        assert!(probe.network_time(&mut || {}).is_none());
        // One clock query per attempt.
        assert_eq!(probe.channel_mut().sent().len(), 3);
    }

    #[test]
    fn test_acquire_fix_waits_through_not_ready() {
        let mut channel = ScriptedChannel::new();
        channel.respond(GPS_STATUS_COMMAND, &["+CGPSINFO: ,,,,,,,,"]);
        channel.respond(
            GPS_STATUS_COMMAND,
            &["+CGPSINFO: 4807.038,N,01131.000,E,021225,103045.0,545.4,0.0,0.0"],
        );

        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        assert!(probe.acquire_fix(Duration::from_millis(500), &mut || {}));

        let fix = probe.fix();
        assert_eq!(fix.status, FixStatus::Locked);
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516667).abs() < 1e-4);
        assert_eq!(probe.channel_mut().sent()[0], GPS_ENABLE_COMMAND);
    }

    #[test]
    fn test_acquire_fix_timeout_leaves_fix_untouched() {
        let channel = ScriptedChannel::new();
        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        assert!(!probe.acquire_fix(Duration::from_millis(60), &mut || {}));
        assert_eq!(probe.fix().status, FixStatus::Searching);

        // Caller substitutes the documented fallback.
        probe.apply_fallback(33.61095, 73.061333);
        let fix = probe.fix();
        assert_eq!(fix.status, FixStatus::Fallback);
        assert!((fix.latitude - 33.61095).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_fix_updates_lock() {
        let mut channel = ScriptedChannel::new();
        channel.respond(
            GPS_STATUS_COMMAND,
            &["+CGPSINFO: 3336.657,N,07303.680,E,021225,103045.0,500.0,0.0,0.0"],
        );

        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        probe.apply_fallback(33.61095, 73.061333);
        assert!(probe.refresh_fix(&mut || {}));
        assert_eq!(probe.fix().status, FixStatus::Locked);
    }

    #[test]
    fn test_refresh_fix_keeps_previous_on_failure() {
        let channel = ScriptedChannel::new();
        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        probe.apply_fallback(33.61095, 73.061333);

        assert!(!probe.refresh_fix(&mut || {}));
        let fix = probe.fix();
        assert_eq!(fix.status, FixStatus::Fallback);
        assert!((fix.longitude - 73.061333).abs() < 1e-9);
    }

    #[test]
    fn test_waits_invoke_pump() {
        let channel = ScriptedChannel::new();
        let mut probe = EnvironmentProbe::with_timing(channel, fast_timing());
        let mut pumps = 0;
        let _ = probe.network_time(&mut || pumps += 1);
        assert!(pumps > 0);
    }
}
