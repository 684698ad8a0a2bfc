use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;

use crate::error::DeskError;

/// Millisecond-precision UTC form the broker expects, e.g. `2025-02-03T09:20:00.000Z`.
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Minute-precision form used by `datetime-local` inputs, e.g. `2025-02-03T09:20`.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Naive exchange-time layouts seen in broker rows.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(WIRE_FORMAT).to_string()
}

pub fn to_display(ts: &DateTime<Utc>) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Rebuild a wire timestamp from an edited display value.
/// Minute precision (`HH:MM`) gains `:00.000Z`; anything else gains `.000Z`.
pub fn reconstitute(value: &str) -> String {
    if value.split(':').count() == 2 {
        format!("{value}:00.000Z")
    } else {
        format!("{value}.000Z")
    }
}

pub fn from_display(value: &str) -> Result<DateTime<Utc>, DeskError> {
    parse_rfc3339(&reconstitute(value.trim()))
}

pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, DeskError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DeskError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a timestamp from a broker row.
/// Values without an offset are exchange time (IST).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DeskError> {
    let value = value.trim();
    if let Ok(ts) = parse_rfc3339(value) {
        return Ok(ts);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| DeskError::InvalidTimestamp {
            value: value.to_string(),
            reason: "unrecognized layout".into(),
        })?;

    Kolkata
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| DeskError::InvalidTimestamp {
            value: value.to_string(),
            reason: "ambiguous local time".into(),
        })
}
