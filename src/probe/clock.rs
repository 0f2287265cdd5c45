//! Wall-clock acquisition over the module's text channel.
//!
//! The module answers a fixed clock query with a quoted timestamp in
//! two-digit fields, e.g. `+CCLK: "25/12/02,10:30:45+00"`. The probe
//! extracts the first quoted substring, requires at least 17 characters and
//! reassembles the fixed-width fields into `YYYY-MM-DD HH:MM:SS UTC`.

use chrono::{NaiveDate, NaiveTime};

/// Clock query command sent to the module.
pub const CLOCK_QUERY_COMMAND: &str = "AT+CCLK?";

/// Minimum length of the quoted timestamp body (`yy/mm/dd,hh:mm:ss`).
const MIN_QUOTED_LEN: usize = 17;

/// A successfully acquired network wall-clock reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTime {
    formatted: String,
}

impl NetworkTime {
    /// Full timestamp, `YYYY-MM-DD HH:MM:SS UTC`.
    pub fn timestamp(&self) -> &str {
        &self.formatted
    }

    /// Calendar-day key, `YYYY-MM-DD`.
    pub fn date_key(&self) -> &str {
        &self.formatted[..10]
    }
}

impl std::fmt::Display for NetworkTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted)
    }
}

/// Parse one response line into a [`NetworkTime`].
///
/// Returns `None` for anything that does not carry a well-formed quoted
/// timestamp; the caller retries within its attempt budget.
pub fn parse_clock_response(line: &str) -> Option<NetworkTime> {
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    let quoted = &line[start..end];
    if quoted.len() < MIN_QUOTED_LEN || !quoted.is_ascii() {
        return None;
    }

    // Fixed-width fields: yy/mm/dd,hh:mm:ss
    let date = format!("20{}-{}-{}", &quoted[0..2], &quoted[3..5], &quoted[6..8]);
    let time = &quoted[9..17];

    // Reject garbage fields before they become a store path component.
    NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
    NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;

    Some(NetworkTime {
        formatted: format!("{date} {time} UTC"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_response() {
        let time = parse_clock_response("+CCLK: \"25/12/02,10:30:45+00\"").unwrap();
        assert_eq!(time.timestamp(), "2025-12-02 10:30:45 UTC");
        assert_eq!(time.date_key(), "2025-12-02");
    }

    #[test]
    fn test_parse_requires_quotes() {
        assert!(parse_clock_response("+CCLK: 25/12/02,10:30:45+00").is_none());
        assert!(parse_clock_response("OK").is_none());
    }

    #[test]
    fn test_parse_requires_min_length() {
        assert!(parse_clock_response("+CCLK: \"25/12/02\"").is_none());
    }

    #[test]
    fn test_parse_rejects_non_numeric_fields() {
        assert!(parse_clock_response("+CCLK: \"2x/12/02,10:30:45+00\"").is_none());
        assert!(parse_clock_response("+CCLK: \"25/13/02,10:30:45+00\"").is_none());
        assert!(parse_clock_response("+CCLK: \"25/12/02,10:30:99+00\"").is_none());
    }
}
