use chrono::{DateTime, Utc};
use chrono_tz::Asia::Kolkata;
use rust_decimal::{Decimal, RoundingStrategy};

/// Format a price as Indian rupees, e.g. `₹1,23,456.70`.
pub fn format_inr(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}₹{}.{fraction}", group_indian(whole))
}

/// Format a count with Indian digit grouping, e.g. `12,03,225`.
pub fn format_count(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{}", group_indian(&digits))
}

/// Exchange-local (IST) timestamp for table cells.
pub fn format_local(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Kolkata)
        .format("%d/%m/%Y, %H:%M:%S")
        .to_string()
}

/// Group the last three digits, then pairs: 12345678 -> 1,23,45,678.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

/// Optional cap on how many rows a results table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayLimit(Option<usize>);

impl DisplayLimit {
    pub fn unlimited() -> Self {
        Self(None)
    }

    pub fn rows(max: usize) -> Self {
        Self(Some(max))
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.0
    }

    pub fn apply<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        match self.0 {
            Some(max) if rows.len() > max => &rows[..max],
            _ => rows,
        }
    }

    pub fn truncates(&self, len: usize) -> bool {
        self.0.is_some_and(|max| len > max)
    }
}

impl From<Option<usize>> for DisplayLimit {
    fn from(value: Option<usize>) -> Self {
        Self(value)
    }
}
