//! Passerby Edge Agent - Privacy-first passive audience measurement.
//!
//! This library powers a fixed-installation edge device that passively
//! counts nearby wireless devices and periodically synchronizes aggregate
//! statistics to a remote store.
//!
//! # Privacy Guarantees
//!
//! - **No addresses**: hardware addresses are one-way hashed the moment a
//!   scan completes and are never stored or transmitted
//! - **No cross-boot correlation**: the hashing salt is regenerated from
//!   entropy at every boot and never persisted
//! - **Bounded memory of devices**: deduplication keeps exactly one prior
//!   cycle of hashed tokens, nothing older
//! - **Aggregates only**: everything leaving the device is a counter
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Passerby Edge Agent                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌──────────────────┐     │
//! │  │  Scanner  │──▶│   Hasher   │──▶│ CycleAggregator  │     │
//! │  │ (boundary)│   │ (FNV-1a +  │   │ (dedup, daily    │     │
//! │  └───────────┘   │  boot salt)│   │  + cumulative)   │     │
//! │        │         └────────────┘   └──────────────────┘     │
//! │        ▼                                    │               │
//! │  ┌───────────┐   ┌────────────┐            ▼               │
//! │  │  Logbook  │   │Environment │   ┌──────────────────┐     │
//! │  │(best-     │   │Probe (time,│──▶│ CloudSync        │     │
//! │  │ effort)   │   │ GPS fix)   │   │ Orchestrator     │     │
//! │  └───────────┘   └────────────┘   └──────────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use passerby_edge_agent::core::{CycleAggregator, Salt, SaltedIdentityHasher};
//!
//! let hasher = SaltedIdentityHasher::new(Salt::generate());
//! let mut aggregator = CycleAggregator::new(20);
//!
//! // One scan tick: hash what the radio saw, record the batch.
//! let tokens = vec![hasher.hash(&[0x5c, 0x02, 0x14, 0x0f, 0xab, 0x01])];
//! aggregator.record_scan(&tokens, 1);
//!
//! // Every N scans the scheduler flushes the cycle for upload.
//! let snapshot = aggregator.flush();
//! assert_eq!(snapshot.unique_in_cycle, 1);
//! ```

pub mod config;
pub mod core;
pub mod logbook;
pub mod probe;
pub mod remote;
pub mod retry;
pub mod scanner;
pub mod sync;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use core::{CycleAggregator, CycleSnapshot, Salt, SaltedIdentityHasher, StationToken};
pub use logbook::{create_shared_logbook, Logbook, SharedLogbook};
pub use probe::{CommandChannel, EnvironmentProbe, FixStatus, GeoFix, NetworkTime};
pub use remote::{MemorySession, RemoteError, RemoteSession, SessionEvent, UploadTask};
pub use retry::RetryPolicy;
pub use scanner::{ScanOutcome, ScanSource, Station};
pub use sync::{CloudSyncOrchestrator, SyncOutcome};

// HTTP store re-exports (when enabled)
pub use remote::HttpStoreConfig;
#[cfg(feature = "http-store")]
pub use remote::HttpSession;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║           PASSERBY EDGE AGENT - PRIVACY DECLARATION              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This device measures aggregate audience presence.               ║
║                                                                  ║
║  ✓ WHAT WE COUNT:                                                ║
║    • How many devices were nearby in each reporting cycle        ║
║    • How many of those repeated within one cycle                 ║
║    • Daily impression totals per installation                    ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Hardware addresses (one-way hashed immediately)             ║
║    • Anything linking a device across reboots (per-boot salt)    ║
║    • More than one prior cycle of hashed tokens                  ║
║    • Names, traffic, or content of any kind                      ║
║                                                                  ║
║  All counters are aggregates. The hashing salt lives only in     ║
║  memory and dies with the process; tokens cannot be reversed     ║
║  or correlated between sessions.                                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER KEEP"));
        assert!(PRIVACY_DECLARATION.contains("Hardware addresses"));
    }
}
