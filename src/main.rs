//! Passerby Edge Agent CLI
//!
//! Privacy-first passive audience measurement for fixed installations.

use chrono::Utc;
use clap::{Parser, Subcommand};
use passerby_edge_agent::{
    config::Config,
    core::{CycleAggregator, Salt, SaltedIdentityHasher, StationToken},
    logbook::{create_shared_logbook, Logbook},
    probe::{EnvironmentProbe, ScriptedChannel, CLOCK_QUERY_COMMAND, GPS_STATUS_COMMAND},
    remote::{MemorySession, RemoteSession},
    scanner::{NoopScanner, ReplayScanner, ScanOutcome, ScanSource, Station},
    sync::CloudSyncOrchestrator,
    PRIVACY_DECLARATION, VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "http-store")]
use passerby_edge_agent::{HttpSession, HttpStoreConfig};

#[derive(Parser)]
#[command(name = "passerby-edge")]
#[command(author = "Passerby Analytics")]
#[command(version = VERSION)]
#[command(about = "Privacy-first passive audience measurement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start scanning and reporting
    Start {
        /// Installation identifier (overrides the configured site id)
        #[arg(long)]
        site: Option<String>,

        /// Seconds between scans (0 = every loop tick)
        #[arg(long)]
        interval: Option<u64>,

        /// Scans per reporting cycle
        #[arg(long)]
        scans_per_cycle: Option<u32>,

        /// Initial GPS acquisition budget in seconds (0 skips straight to
        /// the fallback coordinates)
        #[arg(long)]
        fix_timeout: Option<u64>,

        /// Remote store URL (requires the http-store feature)
        #[arg(long)]
        store_url: Option<String>,

        /// Remote store auth token
        #[arg(long)]
        store_token: Option<String>,

        /// Run against simulated collaborators (scripted modem, synthetic
        /// scans, in-memory store)
        #[arg(long)]
        simulate: bool,
    },

    /// Show device identity and configuration summary
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            site,
            interval,
            scans_per_cycle,
            fix_timeout,
            store_url,
            store_token,
            simulate,
        } => {
            cmd_start(
                site,
                interval,
                scans_per_cycle,
                fix_timeout,
                store_url,
                store_token,
                simulate,
            );
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_start(
    site: Option<String>,
    interval: Option<u64>,
    scans_per_cycle: Option<u32>,
    fix_timeout: Option<u64>,
    store_url: Option<String>,
    store_token: Option<String>,
    simulate: bool,
) {
    println!("Passerby Edge Agent v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_default();
    if let Some(site) = site {
        config.site_id = site;
    }
    if let Some(interval) = interval {
        config.scan_interval_secs = interval;
    }
    if let Some(n) = scans_per_cycle {
        config.scans_per_cycle = n.max(1);
    }
    if let Some(secs) = fix_timeout {
        config.initial_fix_timeout_secs = secs;
    }
    if store_url.is_some() {
        config.store_url = store_url;
    }
    if store_token.is_some() {
        config.store_token = store_token;
    }

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let device_id = format!("{}-{}", config.site_id, hostname);

    println!("Starting measurement...");
    println!("  Device ID: {device_id}");
    println!("  Scan interval: {}s", config.scan_interval_secs);
    println!("  Scans per cycle: {}", config.scans_per_cycle);
    println!("  Station cap per scan: {}", config.max_stations_per_scan);

    let logbook = create_shared_logbook(Some(config.logbook_path()));
    if !logbook.is_enabled() {
        eprintln!("Warning: logbook medium unavailable - local logging disabled");
    }
    logbook.log("=== AGENT STARTUP ===");
    logbook.log(&format!("Firmware: {VERSION}"));
    logbook.log(&format!("Device ID: {device_id}"));

    // Per-boot salt: never persisted, never printed.
    let hasher = SaltedIdentityHasher::new(Salt::generate());
    let mut aggregator = CycleAggregator::new(config.max_stations_per_scan);
    let mut orchestrator = CloudSyncOrchestrator::new(device_id.clone());

    // Collaborators: simulated or whatever the host offers.
    let (mut scan_source, channel): (Box<dyn ScanSource>, ScriptedChannel) = if simulate {
        println!("  Mode: SIMULATION (scripted modem, synthetic scans)");
        simulated_collaborators()
    } else {
        (Box::new(NoopScanner::new()), ScriptedChannel::new())
    };
    let mut probe = EnvironmentProbe::new(channel);

    let mut session = build_session(&config, simulate, &logbook);
    if session.is_ready() {
        println!("  Remote store: ready");
        logbook.log("Store: session ready");
    } else {
        println!("  Remote store: not ready - aggregation will stay local");
        logbook.log("Store: session not ready - sync disabled");
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Bring-up: wall clock, initial fix, day reconciliation, device info.
    let boot_time = probe.network_time(&mut || {
        let events = session.advance();
        orchestrator.dispatch(events, &logbook);
    });
    match &boot_time {
        Some(time) => {
            println!("Network time: {time}");
            logbook.log(&format!("Time: Retrieved successfully - {time}"));
        }
        None => {
            println!("Network time unavailable - uploads wait for the next cycle");
            logbook.log("Time: ERROR - Failed to get time from network");
        }
    }

    let fix_budget = Duration::from_secs(config.initial_fix_timeout_secs);
    let locked = !fix_budget.is_zero()
        && probe.acquire_fix(fix_budget, &mut || {
            let events = session.advance();
            orchestrator.dispatch(events, &logbook);
        });
    if locked {
        let fix = probe.fix();
        println!("GPS fix acquired: {:.6}, {:.6}", fix.latitude, fix.longitude);
        logbook.log(&format!(
            "GPS: Fix acquired - Lat={:.6}, Lon={:.6}",
            fix.latitude, fix.longitude
        ));
    } else {
        probe.apply_fallback(config.fallback_latitude, config.fallback_longitude);
        println!("GPS fix not acquired - using fallback coordinates");
        logbook.log("GPS: No fix - using fallback coordinates");
    }

    if session.is_ready() {
        if let Some(ref time) = boot_time {
            orchestrator.reconcile_day(
                session.as_mut(),
                &mut aggregator,
                time.date_key(),
                &logbook,
            );
            orchestrator.publish_device_info(session.as_mut(), probe.fix(), time, &logbook);
        }
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    let scan_interval = Duration::from_secs(config.scan_interval_secs);
    let mut last_scan: Option<Instant> = None;
    let mut scans_this_cycle: u32 = 0;

    while running.load(Ordering::SeqCst) {
        // Keep the session progressing on every tick.
        let events = session.advance();
        orchestrator.dispatch(events, &logbook);

        let due = match last_scan {
            Some(at) => at.elapsed() >= scan_interval,
            None => true,
        };
        if !due {
            thread::sleep(Duration::from_millis(100));
            continue;
        }
        last_scan = Some(Instant::now());

        match scan_source.scan() {
            ScanOutcome::Failed { code } => {
                aggregator.record_scan_error();
                let errors = aggregator.cumulative().total_scan_errors;
                eprintln!("[WARN] Scan error (code: {code}) - Error Count: {errors}");
                logbook.log(&format!("Scan Error: code {code}"));
            }
            ScanOutcome::Stations {
                stations,
                raw_count,
            } => {
                let before = aggregator.cycle_counters();
                let tokens: Vec<StationToken> =
                    stations.iter().map(|s| hasher.hash(&s.address)).collect();
                aggregator.record_scan(&tokens, raw_count);

                let after = aggregator.cycle_counters();
                let total_scans = aggregator.cumulative().total_scans;
                if raw_count == 0 {
                    logbook.log("Scan: No stations found");
                } else {
                    println!(
                        "[SCAN {}/{}] Found {} station(s) - Total Scans: {}",
                        scans_this_cycle + 1,
                        config.scans_per_cycle,
                        raw_count,
                        total_scans
                    );
                    logbook.scan_entry(
                        total_scans,
                        raw_count,
                        after.unique_in_cycle - before.unique_in_cycle,
                        after.repeated_in_cycle - before.repeated_in_cycle,
                    );
                }
            }
        }

        scans_this_cycle += 1;
        if scans_this_cycle < config.scans_per_cycle {
            continue;
        }
        scans_this_cycle = 0;

        // Cycle boundary: flush, refresh context, sync.
        let snapshot = aggregator.flush();
        println!();
        println!("── Cycle {} report ──────────────────────────", snapshot.cycle);
        println!("  Impressions (raw detections): {}", snapshot.impressions);
        println!("  Unique stations:              {}", snapshot.unique_in_cycle);
        println!("  Repeated stations:            {}", snapshot.repeated_in_cycle);
        println!(
            "  Distinct ever seen:           {}",
            aggregator.cumulative().total_distinct
        );
        logbook.log(&format!(
            "--- CYCLE {} --- Impressions={}, Unique={}, Repeated={}",
            snapshot.cycle,
            snapshot.impressions,
            snapshot.unique_in_cycle,
            snapshot.repeated_in_cycle
        ));

        if probe.refresh_fix(&mut || {
            let events = session.advance();
            orchestrator.dispatch(events, &logbook);
        }) {
            let fix = probe.fix();
            logbook.log(&format!(
                "GPS Updated: Lat={:.6}, Lon={:.6}",
                fix.latitude, fix.longitude
            ));
        } else {
            logbook.log("GPS update failed - keeping last known location");
        }

        let time = probe.network_time(&mut || {
            let events = session.advance();
            orchestrator.dispatch(events, &logbook);
        });
        match time {
            Some(time) => {
                let outcome = orchestrator.sync(
                    session.as_mut(),
                    &mut aggregator,
                    probe.fix(),
                    &time,
                    &logbook,
                );
                println!("  Daily impressions:            {}", aggregator.daily_impressions());
                println!("  Sync: {outcome:?} ({} bytes total)", orchestrator.bytes_sent());
            }
            None => {
                println!("  Sync: skipped - network time unavailable");
                logbook.log("Sync: skipped - time retrieval failed");
            }
        }
        println!();
    }

    println!();
    println!("Stopping...");
    let cumulative = aggregator.cumulative();
    println!("Session statistics:");
    println!("  Scans performed:    {}", cumulative.total_scans);
    println!("  Scan errors:        {}", cumulative.total_scan_errors);
    println!("  Cycles flushed:     {}", cumulative.total_cycles);
    println!("  Distinct stations:  {}", cumulative.total_distinct);
    println!("  Daily impressions:  {}", aggregator.daily_impressions());
    logbook.log(&format!(
        "=== AGENT SHUTDOWN === Scans={}, Cycles={}, Distinct={}",
        cumulative.total_scans, cumulative.total_cycles, cumulative.total_distinct
    ));
}

/// Build the remote session from config and mode.
fn build_session(config: &Config, simulate: bool, logbook: &Logbook) -> Box<dyn RemoteSession> {
    if simulate {
        return Box::new(MemorySession::new());
    }

    #[cfg(feature = "http-store")]
    if let Some(ref url) = config.store_url {
        let mut store_config = HttpStoreConfig::new(url.clone());
        if let Some(ref token) = config.store_token {
            store_config = store_config.with_token(token.clone());
        }
        match HttpSession::new(store_config) {
            Ok(mut session) => {
                if session.authenticate() {
                    return Box::new(session);
                }
                eprintln!("Warning: store authentication failed - sync disabled");
                logbook.log("Store: authentication failed");
                return Box::new(session);
            }
            Err(e) => {
                eprintln!("Warning: store session unavailable: {e}");
                logbook.log(&format!("Store: session unavailable: {e}"));
            }
        }
    }

    #[cfg(not(feature = "http-store"))]
    if config.store_url.is_some() {
        eprintln!("Warning: --store-url ignored (http-store feature not enabled at compile time)");
        logbook.log("Store: http-store feature not compiled in");
    }

    Box::new(MemorySession::offline())
}

/// Scripted modem plus a rotating synthetic scan pattern.
fn simulated_collaborators() -> (Box<dyn ScanSource>, ScriptedChannel) {
    let mut channel = ScriptedChannel::new();

    let clock_line = format!("+CCLK: \"{}\"", Utc::now().format("%y/%m/%d,%H:%M:%S+00"));
    for _ in 0..1000 {
        channel.respond(CLOCK_QUERY_COMMAND, &[clock_line.as_str(), "OK"]);
    }
    // First poll has no fix yet; the rest lock immediately.
    channel.respond(GPS_STATUS_COMMAND, &["+CGPSINFO: ,,,,,,,,"]);
    for _ in 0..1000 {
        channel.respond(
            GPS_STATUS_COMMAND,
            &["+CGPSINFO: 3336.657,N,07303.680,E,021225,103045.0,500.0,1.2,0.0"],
        );
    }

    let (scanner, feed) = ReplayScanner::new();
    // A small neighborhood: some stations persist across scans, some churn.
    for round in 0..1000u32 {
        let mut stations = Vec::new();
        for slot in 0..3u8 {
            stations.push(Station::new(
                [0x5c, 0x02, slot, 0x0f, 0xab, 0x01],
                format!("fixture-{slot}"),
                -55 - i32::from(slot),
            ));
        }
        let roaming = (round % 7) as u8;
        stations.push(Station::new(
            [0xde, 0xad, roaming, 0x0f, 0x00, 0x02],
            "",
            -78,
        ));
        feed.push(ScanOutcome::from_stations(stations));
    }

    (Box::new(scanner), channel)
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Passerby Edge Agent Status");
    println!("==========================");
    println!();

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Device ID: {}-{}", config.site_id, hostname);
    println!();

    println!("Configuration:");
    println!("  Scan interval: {}s", config.scan_interval_secs);
    println!("  Scans per cycle: {}", config.scans_per_cycle);
    println!("  Station cap per scan: {}", config.max_stations_per_scan);
    println!(
        "  Fallback coordinates: {:.6}, {:.6}",
        config.fallback_latitude, config.fallback_longitude
    );
    println!(
        "  Remote store: {}",
        config.store_url.as_deref().unwrap_or("not configured")
    );
    println!();

    let logbook_path = config.logbook_path();
    if logbook_path.exists() {
        println!("Logbook: {logbook_path:?}");
    } else {
        println!("No logbook found (agent has not run on this host).");
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
