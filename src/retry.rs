//! Shared retry and bounded-wait primitives.
//!
//! The time probe, the GPS probe and the upload settle window are all
//! bounded waits with the same shape: a fixed attempt budget, a per-attempt
//! read window and a fixed inter-attempt delay. They also share one hard
//! rule: every sleep granule must pump the remote session, otherwise
//! in-flight authentication and uploads starve while the agent waits.

use std::time::{Duration, Instant};

/// Granularity at which bounded waits sleep and pump.
pub const PUMP_GRANULARITY: Duration = Duration::from_millis(50);

/// A bounded retry schedule: attempt budget, per-attempt read window and
/// inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Window each attempt may spend reading the channel
    pub attempt_timeout: Duration,
    /// Delay between attempts
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, attempt_timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            retry_delay,
        }
    }

    /// Run `attempt` until it yields a value or the attempt budget is
    /// exhausted. The pump is forwarded into each attempt and driven during
    /// inter-attempt delays. Returns `None` on exhaustion; never panics or
    /// propagates an error.
    pub fn run<T>(
        &self,
        pump: &mut dyn FnMut(),
        attempt: &mut dyn FnMut(&mut dyn FnMut()) -> Option<T>,
    ) -> Option<T> {
        for n in 0..self.max_attempts {
            if let Some(value) = attempt(pump) {
                return Some(value);
            }
            if n + 1 < self.max_attempts {
                wait_with_pump(self.retry_delay, pump);
            }
        }
        None
    }
}

/// Sleep for `total`, invoking the pump once per [`PUMP_GRANULARITY`].
pub fn wait_with_pump(total: Duration, pump: &mut dyn FnMut()) {
    let deadline = Instant::now() + total;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(PUMP_GRANULARITY));
        pump();
    }
}

/// Poll `poll` at a fixed cadence until it yields a value or `window`
/// elapses. Used by the initial GPS acquisition, which is deadline-bounded
/// rather than attempt-bounded.
pub fn poll_until<T>(
    window: Duration,
    cadence: Duration,
    pump: &mut dyn FnMut(),
    poll: &mut dyn FnMut(&mut dyn FnMut()) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + window;
    loop {
        if let Some(value) = poll(pump) {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_with_pump(remaining.min(cadence), pump);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_stops_on_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
        let mut attempts = 0;
        let result = policy.run(&mut || {}, &mut |_pump| {
            attempts += 1;
            if attempts == 2 {
                Some(attempts)
            } else {
                None
            }
        });
        assert_eq!(result, Some(2));
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_retry_exhausts_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
        let mut attempts = 0;
        let result: Option<()> = policy.run(&mut || {}, &mut |_pump| {
            attempts += 1;
            None
        });
        assert!(result.is_none());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_wait_pumps_at_granularity() {
        let mut pumps = 0;
        wait_with_pump(Duration::from_millis(120), &mut || pumps += 1);
        assert!(pumps >= 2);
    }

    #[test]
    fn test_poll_until_deadline() {
        let mut polls = 0;
        let result: Option<()> = poll_until(
            Duration::from_millis(30),
            Duration::from_millis(10),
            &mut || {},
            &mut |_pump| {
                polls += 1;
                None
            },
        );
        assert!(result.is_none());
        assert!(polls >= 2);
    }
}
