//! Field-level normalization shared by the vendor mappers and the pipeline:
//! money amounts in assorted encodings, Brazilian phone numbers, and the
//! timestamp formats the vendors actually send.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Integer amounts at or above this are taken as cents already; below it
/// they are whole reais. Vendors that send integers send cents for real
/// sales (29700), while hand-entered or legacy payloads send reais (297).
const CENTS_FLOOR: i64 = 1000;

/// Best-effort conversion of a vendor money field to cents.
///
/// Strings parse as Brazilian currency (`"R$ 1.234,56"` → `123456`).
/// Floats are whole reais (`297.0` → `29700`). Integers hit the
/// [`CENTS_FLOOR`] heuristic. Anything else, negative values included,
/// yields `None`.
pub fn amount_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(raw) => parse_brl_string(raw),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i < 0 {
                    None
                } else if i >= CENTS_FLOOR {
                    Some(i)
                } else {
                    Some(i * 100)
                }
            } else {
                let f = n.as_f64()?;
                if f.is_finite() && f >= 0.0 {
                    Some((f * 100.0).round() as i64)
                } else {
                    None
                }
            }
        }
        _ => None,
    }
}

/// Parse a Brazilian-formatted currency string (`"R$ 1.234,56"`) to cents.
///
/// Dots are thousands separators, the comma is the decimal mark; a plain
/// integer string is whole reais. Negative or unparsable input yields
/// `None`.
pub fn parse_brl_string(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if cleaned.is_empty() || cleaned.contains('-') {
        return None;
    }
    let decimal = cleaned.replace('.', "").replace(',', ".");
    let value: f64 = decimal.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some((value * 100.0).round() as i64)
    } else {
        None
    }
}

/// Normalize a phone number to digits with a country code.
///
/// Strips formatting and trunk zeros; 10/11-digit national numbers get
/// `default_country` prepended, longer numbers are assumed to carry their
/// country code, 8/9-digit numbers are kept as-is rather than inventing an
/// area code. Fewer than 8 digits is unusable and yields `None`.
pub fn normalize_phone(raw: &str, default_country: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    if digits.len() < 8 {
        return None;
    }
    match digits.len() {
        10 | 11 => Some(format!("{default_country}{digits}")),
        _ => Some(digits.to_string()),
    }
}

/// Parse the timestamp strings vendors send: RFC 3339, or naive
/// `YYYY-MM-DD HH:MM[:SS]` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Epoch milliseconds to a UTC timestamp.
pub fn millis_timestamp(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Collapse blank-or-whitespace optional strings to `None`.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
