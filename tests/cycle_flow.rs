//! Integration tests for the scan → hash → aggregate → sync flow.

use passerby_edge_agent::{
    core::{CycleAggregator, Salt, SaltedIdentityHasher, StationToken},
    logbook::Logbook,
    probe::{parse_clock_response, EnvironmentProbe, FixStatus, NetworkTime, ProbeTiming, ScriptedChannel, CLOCK_QUERY_COMMAND},
    remote::{MemorySession, RemoteSession},
    retry::RetryPolicy,
    sync::{CloudSyncOrchestrator, SyncOutcome},
};
use std::time::Duration;

const DEVICE: &str = "site-01-itest";

fn time_of(day: &str) -> NetworkTime {
    // `day` as yy/mm/dd
    parse_clock_response(&format!("+CCLK: \"{day},10:30:45+00\"")).unwrap()
}

fn orchestrator() -> CloudSyncOrchestrator {
    CloudSyncOrchestrator::new(DEVICE).with_settle_window(Duration::from_millis(200))
}

fn hash_all(hasher: &SaltedIdentityHasher, addresses: &[[u8; 6]]) -> Vec<StationToken> {
    addresses.iter().map(|a| hasher.hash(a)).collect()
}

#[test]
fn full_cycle_reaches_the_store() {
    let hasher = SaltedIdentityHasher::new(Salt::generate());
    let mut aggregator = CycleAggregator::new(20);
    let mut session = MemorySession::new();
    let mut orchestrator = orchestrator();
    let log = Logbook::disabled();

    let a = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    let b = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
    let c = [0x02, 0x00, 0x00, 0x00, 0x00, 0x03];

    let time = time_of("25/12/02");
    orchestrator.reconcile_day(&mut session, &mut aggregator, time.date_key(), &log);

    // Cycle of three scans: a repeats, b and c churn in.
    aggregator.record_scan(&hash_all(&hasher, &[a, b]), 2);
    aggregator.record_scan(&hash_all(&hasher, &[a, c]), 2);
    aggregator.record_scan(&hash_all(&hasher, &[a]), 1);

    let snapshot = aggregator.flush();
    assert_eq!(snapshot.impressions, 5);
    assert_eq!(snapshot.unique_in_cycle, 3);
    assert_eq!(snapshot.repeated_in_cycle, 2);

    let outcome = orchestrator.sync(
        &mut session,
        &mut aggregator,
        passerby_edge_agent::GeoFix {
            latitude: 48.1173,
            longitude: 11.516667,
            status: FixStatus::Locked,
        },
        &time,
        &log,
    );
    assert_eq!(outcome, SyncOutcome::Synced);

    let daily = session
        .value_at(&format!("devices/{DEVICE}/data/2025-12-02"))
        .expect("daily record uploaded");
    assert_eq!(daily["daily_impressions"], 5);
    assert_eq!(daily["device_id"], DEVICE);

    let location = session
        .value_at(&format!("devices/{DEVICE}/device_info/Location"))
        .expect("location uploaded");
    assert_eq!(location["Lat"], "48.117300");
}

#[test]
fn restart_resumes_the_daily_counter() {
    let mut session = MemorySession::new();
    let log = Logbook::disabled();
    let time = time_of("25/12/02");

    // First boot accumulates and uploads.
    {
        let hasher = SaltedIdentityHasher::new(Salt::generate());
        let mut aggregator = CycleAggregator::new(20);
        let mut orchestrator = orchestrator();
        orchestrator.reconcile_day(&mut session, &mut aggregator, time.date_key(), &log);

        aggregator.record_scan(&hash_all(&hasher, &[[1, 2, 3, 4, 5, 6]]), 7);
        let _ = aggregator.flush();
        orchestrator.sync(
            &mut session,
            &mut aggregator,
            passerby_edge_agent::GeoFix {
                latitude: 0.0,
                longitude: 0.0,
                status: FixStatus::Searching,
            },
            &time,
            &log,
        );
        assert_eq!(aggregator.daily_impressions(), 7);
    }

    // Second boot: fresh salt, fresh state; the counter node of the record
    // uploaded before the restart resumes the day instead of double
    // counting or resetting.
    let mut aggregator = CycleAggregator::new(20);
    let mut orchestrator = orchestrator();
    orchestrator.reconcile_day(&mut session, &mut aggregator, time.date_key(), &log);
    assert_eq!(aggregator.daily_impressions(), 7);

    aggregator.record_scan(&[], 3);
    let _ = aggregator.flush();
    assert_eq!(aggregator.daily_impressions(), 10);
}

#[test]
fn day_rollover_adopts_remote_baseline() {
    let mut session = MemorySession::new();
    let log = Logbook::disabled();
    let mut aggregator = CycleAggregator::new(20);
    let mut orchestrator = orchestrator();

    orchestrator.reconcile_day(&mut session, &mut aggregator, "2025-12-02", &log);
    aggregator.record_scan(&[], 50);
    let _ = aggregator.flush();
    assert_eq!(aggregator.daily_impressions(), 50);

    // Another device (or an earlier boot) already wrote 5 for the new day.
    session.set_counter(&format!("devices/{DEVICE}/data/2025-12-03/daily_impressions"), 5);

    let outcome = orchestrator.sync(
        &mut session,
        &mut aggregator,
        passerby_edge_agent::GeoFix {
            latitude: 0.0,
            longitude: 0.0,
            status: FixStatus::Searching,
        },
        &time_of("25/12/03"),
        &log,
    );
    assert_eq!(outcome, SyncOutcome::Synced);
    assert_eq!(aggregator.tracked_date(), Some("2025-12-03"));
    assert_eq!(aggregator.daily_impressions(), 5);
}

#[test]
fn unauthenticated_session_keeps_aggregation_local() {
    let mut session = MemorySession::new();
    session.set_ready(false);
    let log = Logbook::disabled();
    let hasher = SaltedIdentityHasher::new(Salt::generate());
    let mut aggregator = CycleAggregator::new(20);
    let mut orchestrator = orchestrator();

    aggregator.begin_day("2025-12-02", 0);
    for _ in 0..3 {
        aggregator.record_scan(&hash_all(&hasher, &[[9, 9, 9, 9, 9, 9]]), 2);
    }
    let _ = aggregator.flush();

    let outcome = orchestrator.sync(
        &mut session,
        &mut aggregator,
        passerby_edge_agent::GeoFix {
            latitude: 0.0,
            longitude: 0.0,
            status: FixStatus::Searching,
        },
        &time_of("25/12/02"),
        &log,
    );

    assert_eq!(outcome, SyncOutcome::SkippedAuthNotReady);
    assert_eq!(session.in_flight_count(), 0);
    // Nothing queued, nothing lost locally.
    assert_eq!(aggregator.daily_impressions(), 6);

    // Once the session authenticates, the next cycle uploads the full total.
    session.set_ready(true);
    aggregator.record_scan(&[], 4);
    let _ = aggregator.flush();
    orchestrator.sync(
        &mut session,
        &mut aggregator,
        passerby_edge_agent::GeoFix {
            latitude: 0.0,
            longitude: 0.0,
            status: FixStatus::Searching,
        },
        &time_of("25/12/02"),
        &log,
    );
    let daily = session
        .value_at(&format!("devices/{DEVICE}/data/2025-12-02"))
        .expect("daily record uploaded after auth");
    assert_eq!(daily["daily_impressions"], 10);
}

#[test]
fn tokens_cannot_be_traced_back_to_addresses() {
    // Known (address, salt, token) triples: the public surface offers
    // equality and rendering only. No operation accepts a token and
    // returns an address, and the rendering never embeds the input bytes.
    let triples = [
        ([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], 0xDEAD_BEEFu32),
        ([0x00, 0x11, 0x22, 0x33, 0x44, 0x55], 0x1234_5678u32),
        ([0x5C, 0x02, 0x14, 0x0F, 0xAB, 0x01], 7u32),
    ];

    for (address, salt) in triples {
        let token = SaltedIdentityHasher::new(Salt::from_raw(salt)).hash(&address);
        let rendered = token.as_str();
        let address_hex: String = address.iter().map(|b| format!("{b:02x}")).collect();
        assert!(!rendered.contains(&address_hex));
        assert!(!rendered.contains(&address_hex[..6]));

        // A different boot makes the same address unrecognizable.
        let other = SaltedIdentityHasher::new(Salt::from_raw(salt.wrapping_add(1))).hash(&address);
        assert_ne!(token, other);
    }
}

#[test]
fn probe_and_sync_share_one_pump() {
    // A sync settle window and a probe read window must both drive the
    // session; this exercises the probe side against a live session.
    let mut channel = ScriptedChannel::new();
    // First attempt returns chatter only, forcing the probe to wait (and
    // pump) before the second attempt succeeds.
    channel.respond(CLOCK_QUERY_COMMAND, &["OK"]);
    channel.respond(CLOCK_QUERY_COMMAND, &["+CCLK: \"25/12/02,10:30:45+00\""]);

    let timing = ProbeTiming {
        clock: RetryPolicy::new(3, Duration::from_millis(30), Duration::from_millis(5)),
        gps_refresh: RetryPolicy::new(3, Duration::from_millis(30), Duration::from_millis(5)),
        gps_poll_cadence: Duration::from_millis(20),
        gps_enable_settle: Duration::from_millis(5),
        read_granularity: Duration::from_millis(5),
    };
    let mut probe = EnvironmentProbe::with_timing(channel, timing);

    let mut session = MemorySession::new();
    session.set_ack_delay_pumps(1);
    session
        .submit(passerby_edge_agent::UploadTask::new(
            "inflight",
            "devices/x/pending",
            serde_json::json!(1),
        ))
        .unwrap();

    let mut completed = Vec::new();
    let time = probe.network_time(&mut || {
        completed.extend(session.advance());
    });

    assert!(time.is_some());
    // The write completed while the probe was waiting on the channel.
    assert!(!completed.is_empty());
}
