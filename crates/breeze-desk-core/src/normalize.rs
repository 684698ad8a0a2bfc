use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::bar::HistoricalBar;
use crate::datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarField {
    Datetime,
    Open,
    High,
    Low,
    Close,
    Volume,
    OpenInterest,
}

impl BarField {
    const COUNT: usize = 7;

    fn slot(self) -> usize {
        self as usize
    }
}

/// Upstream key spellings mapped to canonical fields.
/// Within a field the canonical spelling comes first and wins.
const FIELD_ALIASES: &[(&str, BarField)] = &[
    ("datetime", BarField::Datetime),
    ("timestamp", BarField::Datetime),
    ("time", BarField::Datetime),
    ("date", BarField::Datetime),
    ("open", BarField::Open),
    ("o", BarField::Open),
    ("high", BarField::High),
    ("h", BarField::High),
    ("low", BarField::Low),
    ("l", BarField::Low),
    ("close", BarField::Close),
    ("c", BarField::Close),
    ("volume", BarField::Volume),
    ("vol", BarField::Volume),
    ("v", BarField::Volume),
    ("open_interest", BarField::OpenInterest),
    ("oi", BarField::OpenInterest),
    ("openInterest", BarField::OpenInterest),
];

/// Keys under which a wrapped response may carry its rows.
const ROW_CONTAINERS: &[&str] = &["Success", "data"];

/// Normalize a raw record, using `now` for a missing or unreadable timestamp.
/// Missing numeric fields become zero.
pub fn normalize_bar(record: &Map<String, Value>, now: DateTime<Utc>) -> HistoricalBar {
    let mut slots: [Option<&Value>; BarField::COUNT] = [None; BarField::COUNT];
    for (key, field) in FIELD_ALIASES {
        let slot = &mut slots[field.slot()];
        if slot.is_none() {
            *slot = record.get(*key).filter(|v| !v.is_null());
        }
    }

    let get = |field: BarField| slots[field.slot()];

    HistoricalBar {
        datetime: get(BarField::Datetime)
            .and_then(value_to_timestamp)
            .unwrap_or(now),
        open: get(BarField::Open).and_then(value_to_decimal).unwrap_or_default(),
        high: get(BarField::High).and_then(value_to_decimal).unwrap_or_default(),
        low: get(BarField::Low).and_then(value_to_decimal).unwrap_or_default(),
        close: get(BarField::Close).and_then(value_to_decimal).unwrap_or_default(),
        volume: get(BarField::Volume).and_then(value_to_count).unwrap_or(0),
        open_interest: get(BarField::OpenInterest)
            .and_then(value_to_count)
            .unwrap_or(0),
    }
}

/// Normalize every record in a broker payload.
/// Accepts a bare array or an object wrapping one; non-object entries are skipped.
pub fn normalize_rows(payload: &Value) -> Vec<HistoricalBar> {
    normalize_rows_at(payload, Utc::now())
}

pub fn normalize_rows_at(payload: &Value, now: DateTime<Utc>) -> Vec<HistoricalBar> {
    let rows = match payload {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => match ROW_CONTAINERS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(rows) => rows.as_slice(),
            None => &[],
        },
        _ => &[],
    };

    rows.iter()
        .filter_map(Value::as_object)
        .map(|record| normalize_bar(record, now))
        .collect()
}

fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => datetime::parse_timestamp(s).ok(),
        // Epoch values above 1e11 are taken as milliseconds
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw.abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn value_to_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}
