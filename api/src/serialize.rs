//! JSON-facing conversions for database values.
//!
//! Numeric columns are cast to `float8` in every `SELECT`, so exact decimals
//! reach the models as `f64`. Timestamps leave the service as
//! `YYYY-MM-DD HH:MM:SS` and are UTC by convention.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::Serializer;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// `serialize_with` helper for timestamp columns.
pub fn timestamp<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

/// Current UTC wall-clock time at second precision.
pub fn utc_now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parses an ISO-like `read_time`. Every `T` is treated as the date/time
/// separator; offsets are folded into UTC.
pub fn parse_read_time(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.trim().replace('T', " ");
    let normalized = match normalized.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => normalized,
    };

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.naive_utc());
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
