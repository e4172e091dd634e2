// Date parsing for time axes

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::data::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date string into epoch milliseconds (UTC).
///
/// Accepts RFC 3339, common `YYYY-MM-DD[ HH:MM[:SS]]` shapes, `YYYY-MM` and a
/// bare four digit year.
pub fn parse_timestamp_millis(input: &str) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return midnight_millis(d);
        }
    }

    // Year-month ("2024-03") and year ("2024") granularity
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return midnight_millis(d);
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1).and_then(midnight_millis);
    }

    None
}

fn midnight_millis(d: NaiveDate) -> Option<i64> {
    d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis())
}

/// Epoch milliseconds for a cell: numbers are taken as already being epoch
/// milliseconds, text is parsed.
pub fn value_timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Date(d) => Some(d.timestamp_millis()),
        Value::Number(n) if n.is_finite() => Some(*n as i64),
        Value::Text(s) => parse_timestamp_millis(s),
        _ => None,
    }
}
