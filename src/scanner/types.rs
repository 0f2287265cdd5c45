//! Scan-source boundary types.
//!
//! A scan source reports, once per scheduler tick, the stations its radio
//! observed. Hardware addresses only exist inside a [`ScanOutcome`] for the
//! moment between the scan and hashing; they are never stored, logged or
//! serialized.

/// One passively observed station.
#[derive(Debug, Clone)]
pub struct Station {
    /// 6-byte hardware address; consumed by the hasher and dropped
    pub address: [u8; 6],
    /// Broadcast display name (informational, never uploaded)
    pub name: String,
    /// Signal strength in dBm
    pub rssi: i32,
}

impl Station {
    pub fn new(address: [u8; 6], name: impl Into<String>, rssi: i32) -> Self {
        Self {
            address,
            name: name.into(),
            rssi,
        }
    }
}

/// Result of one scan tick.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// Enumeration succeeded (possibly with zero stations).
    ///
    /// `raw_count` is the driver-reported detection count; it can exceed
    /// `stations.len()` when the driver saw more than it enumerated.
    Stations {
        stations: Vec<Station>,
        raw_count: u32,
    },
    /// Enumeration failed with a driver error code.
    Failed { code: i32 },
}

impl ScanOutcome {
    /// A successful outcome whose raw count equals the enumerated length.
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let raw_count = stations.len() as u32;
        Self::Stations {
            stations,
            raw_count,
        }
    }

    /// An empty successful scan.
    pub fn empty() -> Self {
        Self::Stations {
            stations: Vec::new(),
            raw_count: 0,
        }
    }
}
