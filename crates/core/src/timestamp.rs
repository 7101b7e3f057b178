//! Catalog timestamp normalization
//!
//! The catalog reports modification times in several shapes: zero-padded
//! epoch strings from the catalog tables, RFC 3339 instants, and zone-less
//! calendar values such as `2023-11-14.22:13:20` from listings. Staleness
//! checks compare against local file times in epoch seconds, so every shape
//! is reduced to one `f64` here and nowhere else.

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;

use crate::error::{Error, Result};

/// A modification time as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTime {
    /// Whole seconds since the Unix epoch
    Epoch(i64),
    /// An instant carrying its own offset
    Zoned(Timestamp),
    /// A calendar value without zone information, taken to be UTC
    Naive(DateTime),
}

impl CatalogTime {
    /// Parse a catalog time string
    ///
    /// Accepts digit strings (leading zeros allowed), RFC 3339 instants, and
    /// naive `YYYY-MM-DD[T| |.]HH:MM:SS[.fff]` values.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::General("empty catalog timestamp".into()));
        }

        if value.bytes().all(|b| b.is_ascii_digit()) {
            return value
                .parse::<i64>()
                .map(CatalogTime::Epoch)
                .map_err(|e| Error::General(format!("invalid catalog timestamp '{value}': {e}")));
        }

        if let Ok(ts) = value.parse::<Timestamp>() {
            return Ok(CatalogTime::Zoned(ts));
        }

        let civil = normalize_separator(value);
        civil
            .parse::<DateTime>()
            .map(CatalogTime::Naive)
            .map_err(|e| Error::General(format!("invalid catalog timestamp '{value}': {e}")))
    }

    /// Convert to epoch seconds, UTC-normalized
    pub fn to_epoch_seconds(&self) -> Result<f64> {
        let ts = match *self {
            CatalogTime::Epoch(secs) => return Ok(secs as f64),
            CatalogTime::Zoned(ts) => ts,
            CatalogTime::Naive(dt) => TimeZone::UTC
                .to_timestamp(dt)
                .map_err(|e| Error::General(format!("timestamp out of range: {e}")))?,
        };
        Ok(timestamp_seconds(ts))
    }
}

impl From<Timestamp> for CatalogTime {
    fn from(ts: Timestamp) -> Self {
        CatalogTime::Zoned(ts)
    }
}

impl From<DateTime> for CatalogTime {
    fn from(dt: DateTime) -> Self {
        CatalogTime::Naive(dt)
    }
}

/// Parse a free-form epoch value such as an `mtime` AVU (`1700000000.25`)
///
/// Returns `None` for anything that is not a finite number.
pub fn parse_epoch_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite())
}

fn timestamp_seconds(ts: Timestamp) -> f64 {
    ts.as_second() as f64 + f64::from(ts.subsec_nanosecond()) / 1_000_000_000.0
}

// `2023-11-14.22:13:20` and `2023-11-14 22:13:20` -> `2023-11-14T22:13:20`
fn normalize_separator(value: &str) -> String {
    let mut out = value.to_string();
    if out.len() > 10 && matches!(out.as_bytes()[10], b'.' | b' ') {
        out.replace_range(10..11, "T");
    }
    out
}
