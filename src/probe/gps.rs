//! GPS fix acquisition and packed-coordinate decoding.
//!
//! The positioning module reports fixes as a tagged comma-delimited line:
//! `+CGPSINFO: <lat>,<N|S>,<lon>,<E|W>,...` with coordinates in packed
//! degrees+decimal-minutes notation (`DDMM.MMMM`). Before a fix exists the
//! module answers with the tag and empty coordinate fields; that is a
//! "not ready" condition, not an error.

use serde::Serialize;

/// Command enabling the positioning engine.
pub const GPS_ENABLE_COMMAND: &str = "AT+CGPS=1";

/// Status query returning the current fix, if any.
pub const GPS_STATUS_COMMAND: &str = "AT+CGPSINFO";

/// Tag prefixing every fix report line.
const FIX_LINE_TAG: &str = "+CGPSINFO:";

/// Placeholder body the module emits while it has no fix at all.
const EMPTY_FIX_PLACEHOLDER: &str = ",,,,,,,,";

/// Acquisition state of the current coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixStatus {
    /// Coordinates come from a live fix
    Locked,
    /// Acquisition timed out; coordinates are the configured fallback
    Fallback,
    /// No fix yet and no fallback applied
    Searching,
}

/// A geographic coordinate pair with its acquisition status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub status: FixStatus,
}

impl GeoFix {
    /// The pre-acquisition state.
    pub fn searching() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            status: FixStatus::Searching,
        }
    }
}

/// Decoded classification of one response line.
#[derive(Debug, Clone, PartialEq)]
pub enum FixLine {
    /// A well-formed fix
    Fix { latitude: f64, longitude: f64 },
    /// Correct tag, but the module has no usable coordinates yet
    NotReady,
}

/// Decode packed `DDMM.MMMM` degrees+decimal-minutes into decimal degrees,
/// negating for the southern/western hemispheres.
///
/// Pure arithmetic on the raw value; bit-reproducible for identical input.
pub fn decode_packed_degrees(raw: f64, hemisphere: &str) -> f64 {
    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    if hemisphere == "S" || hemisphere == "W" {
        -decimal
    } else {
        decimal
    }
}

/// Classify one response line.
///
/// `None` means the line is unrelated to fix reporting and should be
/// skipped. Syntactically incomplete fix lines classify as
/// [`FixLine::NotReady`]; the probe retries them within its budget instead
/// of surfacing an error.
pub fn parse_fix_line(line: &str) -> Option<FixLine> {
    let line = line.trim();
    if !line.starts_with(FIX_LINE_TAG) {
        return None;
    }
    if line.contains(EMPTY_FIX_PLACEHOLDER) {
        return Some(FixLine::NotReady);
    }

    let body = line[FIX_LINE_TAG.len()..].trim();
    let mut fields = body.split(',');
    let raw_lat = fields.next().unwrap_or("").trim();
    let lat_hemisphere = fields.next().unwrap_or("").trim();
    let raw_lon = fields.next().unwrap_or("").trim();
    let lon_hemisphere = fields.next().unwrap_or("").trim();

    if raw_lat.is_empty() || raw_lon.is_empty() {
        return Some(FixLine::NotReady);
    }

    let (Ok(lat), Ok(lon)) = (raw_lat.parse::<f64>(), raw_lon.parse::<f64>()) else {
        return Some(FixLine::NotReady);
    };

    Some(FixLine::Fix {
        latitude: decode_packed_degrees(lat, lat_hemisphere),
        longitude: decode_packed_degrees(lon, lon_hemisphere),
    })
}
