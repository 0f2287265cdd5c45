//! Cycle-based deduplication and counting of hashed station tokens.
//!
//! Scans accumulate into fixed-size cycles. Within a cycle, tokens are
//! deduplicated against the current cycle's set; cross-cycle novelty is
//! judged against exactly one previous cycle (single-slot lookback). Deeper
//! history is never kept, so a station reappearing after two or more cycles
//! is counted as new again.

use crate::core::hasher::StationToken;
use serde::Serialize;
use std::collections::HashSet;

/// Counters scoped to the cycle currently accumulating.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleCounters {
    /// Raw detections this cycle (not deduplicated)
    pub impressions: u32,
    /// Tokens first seen this cycle
    pub unique_in_cycle: u32,
    /// Tokens re-observed within this cycle
    pub repeated_in_cycle: u32,
}

/// Counters that only ever grow; reset only by a process restart.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CumulativeCounters {
    /// Tokens absent from both the current and previous cycle when first seen
    pub total_distinct: u64,
    /// Scans that ran to completion (including empty ones)
    pub total_scans: u64,
    /// Cycles flushed
    pub total_cycles: u64,
    /// Scans whose enumeration failed
    pub total_scan_errors: u64,
}

/// Day-scoped impression total, keyed by the network-time calendar day.
///
/// Replaced only through [`CycleAggregator::begin_day`] (reconciliation at a
/// date boundary or at bring-up); otherwise monotonically increasing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyAggregate {
    /// Calendar-day key (`YYYY-MM-DD`), `None` until first reconciled
    pub date: Option<String>,
    pub impressions: u64,
}

/// Completed-cycle record emitted by [`CycleAggregator::flush`].
#[derive(Debug, Clone, Serialize)]
pub struct CycleSnapshot {
    /// Ordinal index of the flushed cycle (1-based)
    pub cycle: u64,
    pub impressions: u32,
    pub unique_in_cycle: u32,
    pub repeated_in_cycle: u32,
    /// Distinct tokens carried by the flushed cycle's set
    pub stations_in_cycle: usize,
}

/// Accumulates hashed scan results into cycles and maintains all counters.
pub struct CycleAggregator {
    max_stations_per_scan: usize,
    current: HashSet<StationToken>,
    previous: HashSet<StationToken>,
    cycle: CycleCounters,
    cumulative: CumulativeCounters,
    daily: DailyAggregate,
}

impl CycleAggregator {
    /// Create an aggregator processing at most `max_stations_per_scan`
    /// tokens per scan.
    pub fn new(max_stations_per_scan: usize) -> Self {
        Self {
            max_stations_per_scan,
            current: HashSet::new(),
            previous: HashSet::new(),
            cycle: CycleCounters::default(),
            cumulative: CumulativeCounters::default(),
            daily: DailyAggregate::default(),
        }
    }

    /// Record one scan's tokens.
    ///
    /// `raw_count` is the driver-reported detection count and may exceed
    /// `tokens.len()`; it feeds the impression tally in full, while only the
    /// first `max_stations_per_scan` tokens are classified.
    pub fn record_scan(&mut self, tokens: &[StationToken], raw_count: u32) {
        self.cumulative.total_scans += 1;
        if raw_count == 0 && tokens.is_empty() {
            return;
        }

        self.cycle.impressions += raw_count;

        let capped = &tokens[..tokens.len().min(self.max_stations_per_scan)];
        for token in capped {
            if self.current.contains(token) {
                self.cycle.repeated_in_cycle += 1;
            } else {
                if !self.previous.contains(token) {
                    self.cumulative.total_distinct += 1;
                }
                self.current.insert(token.clone());
                self.cycle.unique_in_cycle += 1;
            }
        }
    }

    /// Record a scan whose enumeration failed. Counts the error and nothing
    /// else.
    pub fn record_scan_error(&mut self) {
        self.cumulative.total_scan_errors += 1;
    }

    /// Close the accumulating cycle: emit its record, roll its impressions
    /// into the daily aggregate, rotate the lookback slot and reset.
    pub fn flush(&mut self) -> CycleSnapshot {
        self.cumulative.total_cycles += 1;
        let snapshot = CycleSnapshot {
            cycle: self.cumulative.total_cycles,
            impressions: self.cycle.impressions,
            unique_in_cycle: self.cycle.unique_in_cycle,
            repeated_in_cycle: self.cycle.repeated_in_cycle,
            stations_in_cycle: self.current.len(),
        };

        self.daily.impressions += u64::from(self.cycle.impressions);

        self.previous = std::mem::take(&mut self.current);
        self.cycle = CycleCounters::default();

        snapshot
    }

    /// Replace the daily aggregate at a date boundary or at bring-up.
    ///
    /// `baseline` is the reconciled remote value (0 when the remote has no
    /// data for the day).
    pub fn begin_day(&mut self, date: &str, baseline: u64) {
        self.daily.date = Some(date.to_string());
        self.daily.impressions = baseline;
    }

    /// Calendar-day key the daily aggregate is currently tracking.
    pub fn tracked_date(&self) -> Option<&str> {
        self.daily.date.as_deref()
    }

    /// Current day-scoped impression total.
    pub fn daily_impressions(&self) -> u64 {
        self.daily.impressions
    }

    /// Counters for the cycle currently accumulating.
    pub fn cycle_counters(&self) -> CycleCounters {
        self.cycle
    }

    /// Cumulative session counters.
    pub fn cumulative(&self) -> CumulativeCounters {
        self.cumulative
    }

    /// Whether a token is present in the accumulating cycle's set.
    pub fn seen_this_cycle(&self, token: &StationToken) -> bool {
        self.current.contains(token)
    }

    /// Whether a token is present in the single lookback slot.
    pub fn seen_last_cycle(&self, token: &StationToken) -> bool {
        self.previous.contains(token)
    }

    /// Number of distinct tokens in the accumulating cycle.
    pub fn stations_this_cycle(&self) -> usize {
        self.current.len()
    }
}
