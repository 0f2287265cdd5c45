//! Demonstration of the full Passerby Edge Agent pipeline.
//!
//! This example shows how to:
//! 1. Hash scan results with a per-boot salt
//! 2. Accumulate scans into cycles with single-slot deduplication
//! 3. Acquire time and a GPS fix over a (scripted) command channel
//! 4. Reconcile and sync daily aggregates against an in-memory store
//!
//! Run with: cargo run --example simulated_run
//!
//! Everything external is simulated, so this runs on any host.

use passerby_edge_agent::{
    core::{CycleAggregator, Salt, SaltedIdentityHasher, StationToken},
    logbook::Logbook,
    probe::{EnvironmentProbe, ScriptedChannel, CLOCK_QUERY_COMMAND, GPS_STATUS_COMMAND},
    remote::{MemorySession, RemoteSession},
    scanner::{ScanOutcome, ScanSource, Station},
    sync::CloudSyncOrchestrator,
    PRIVACY_DECLARATION,
};
use std::time::Duration;

const SCANS_PER_CYCLE: u32 = 10;
const CYCLES_TO_RUN: u32 = 3;

fn main() {
    println!("Passerby Edge Agent - Simulated Run");
    println!("===================================");
    println!("{PRIVACY_DECLARATION}");

    // Script the modem: a clock answer per cycle plus one slow GPS lock.
    let mut channel = ScriptedChannel::new();
    for _ in 0..=CYCLES_TO_RUN {
        channel.respond(CLOCK_QUERY_COMMAND, &["+CCLK: \"25/12/02,10:30:45+00\"", "OK"]);
    }
    channel.respond(GPS_STATUS_COMMAND, &["+CGPSINFO: ,,,,,,,,"]);
    for _ in 0..=CYCLES_TO_RUN {
        channel.respond(
            GPS_STATUS_COMMAND,
            &["+CGPSINFO: 4807.038,N,01131.000,E,021225,103045.0,545.4,0.0,0.0"],
        );
    }

    // Pretend yesterday already recorded impressions for today's key, as if
    // the device restarted mid-day.
    let mut session = MemorySession::new();
    session.set_counter("devices/demo-site/data/2025-12-02/daily_impressions", 120);

    let hasher = SaltedIdentityHasher::new(Salt::generate());
    let mut aggregator = CycleAggregator::new(20);
    let mut orchestrator = CloudSyncOrchestrator::new("demo-site")
        .with_settle_window(Duration::from_millis(300));
    let mut probe = EnvironmentProbe::new(channel);
    let logbook = Logbook::disabled();

    // Bring-up: clock, fix, day reconciliation.
    let boot_time = probe
        .network_time(&mut || {
            let events = session.advance();
            orchestrator.dispatch(events, &logbook);
        })
        .expect("scripted clock always answers");
    println!("Network time: {boot_time}");

    if probe.acquire_fix(Duration::from_secs(10), &mut || {
        let events = session.advance();
        orchestrator.dispatch(events, &logbook);
    }) {
        let fix = probe.fix();
        println!("GPS fix: {:.6}, {:.6} ({:?})", fix.latitude, fix.longitude, fix.status);
    }

    orchestrator.reconcile_day(&mut session, &mut aggregator, boot_time.date_key(), &logbook);
    println!(
        "Resumed day {} at {} impressions",
        boot_time.date_key(),
        aggregator.daily_impressions()
    );
    println!();

    // Three cycles of synthetic neighborhood traffic.
    let mut scan_source = synthetic_scans();
    for cycle in 1..=CYCLES_TO_RUN {
        for _ in 0..SCANS_PER_CYCLE {
            match scan_source.scan() {
                ScanOutcome::Stations {
                    stations,
                    raw_count,
                } => {
                    let tokens: Vec<StationToken> =
                        stations.iter().map(|s| hasher.hash(&s.address)).collect();
                    aggregator.record_scan(&tokens, raw_count);
                }
                ScanOutcome::Failed { .. } => aggregator.record_scan_error(),
            }
        }

        let snapshot = aggregator.flush();
        println!("=== Cycle {cycle} ===");
        println!("  Impressions: {}", snapshot.impressions);
        println!("  Unique: {}", snapshot.unique_in_cycle);
        println!("  Repeated: {}", snapshot.repeated_in_cycle);

        let time = probe
            .network_time(&mut || {
                let events = session.advance();
                orchestrator.dispatch(events, &logbook);
            })
            .expect("scripted clock always answers");
        let outcome = orchestrator.sync(&mut session, &mut aggregator, probe.fix(), &time, &logbook);
        println!("  Sync: {outcome:?}");
        println!("  Daily impressions: {}", aggregator.daily_impressions());

        let stored = session
            .value_at("devices/demo-site/data/2025-12-02")
            .expect("daily record uploaded");
        println!("  Store now holds: {stored}");
        println!();
    }

    println!("Demo complete!");
}

/// A looping scan pattern: three fixed stations plus one that churns.
fn synthetic_scans() -> impl ScanSource {
    struct Synthetic {
        round: u32,
    }

    impl ScanSource for Synthetic {
        fn scan(&mut self) -> ScanOutcome {
            self.round += 1;
            let mut stations: Vec<Station> = (0..3u8)
                .map(|slot| {
                    Station::new(
                        [0x5c, 0x02, slot, 0x0f, 0xab, 0x01],
                        format!("fixture-{slot}"),
                        -55 - i32::from(slot),
                    )
                })
                .collect();
            let roaming = (self.round % 11) as u8;
            stations.push(Station::new([0xde, 0xad, roaming, 0x0f, 0x00, 0x02], "", -79));
            ScanOutcome::from_stations(stations)
        }
    }

    Synthetic { round: 0 }
}
