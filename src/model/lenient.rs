//! Forgiving field deserializers for persisted snapshots.
//!
//! Old or hand-edited documents may omit fields, hold `null`, or carry the
//! wrong scalar type. Each helper here maps whatever it finds onto the
//! field's default instead of failing the whole document.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Lowest (most urgent) task priority
pub const PRIORITY_MIN: u8 = 1;
/// Highest (least urgent) task priority
pub const PRIORITY_MAX: u8 = 5;
/// Priority applied when a task carries none
pub const PRIORITY_DEFAULT: u8 = 3;

pub fn clamp_priority(p: i64) -> u8 {
    p.clamp(PRIORITY_MIN as i64, PRIORITY_MAX as i64) as u8
}

pub fn default_priority() -> u8 {
    PRIORITY_DEFAULT
}

pub fn default_true() -> bool {
    true
}

/// `null` becomes `T::default()`.
pub fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Strings stay strings, numbers and booleans are stringified, anything else is empty.
pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn bool_or(value: Value, fallback: bool) -> bool {
    match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(fallback, |f| f != 0.0),
        Value::String(s) => match s.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => fallback,
        },
        _ => fallback,
    }
}

pub fn bool_true<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(bool_or(Value::deserialize(d)?, true))
}

pub fn bool_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(bool_or(Value::deserialize(d)?, false))
}

/// Any numeric-looking value, rounded and clamped into `[1, 5]`.
pub fn priority<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let raw = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match raw {
        Some(f) if f.is_finite() => clamp_priority(f.round() as i64),
        _ => PRIORITY_DEFAULT,
    })
}

/// Tag list: accepts an array of strings or a comma-separated string.
/// Entries are trimmed; blanks and duplicates are dropped.
pub fn contexts<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw: Vec<String> = match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    Ok(clean_tags(raw))
}

pub fn clean_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Optional timestamp stored as epoch milliseconds.
pub mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_i64(t.timestamp_millis()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(from_millis),
            Value::String(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(ms) => from_millis(ms),
                    Err(_) => DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|t| t.with_timezone(&Utc)),
                }
            }
            _ => None,
        })
    }

    fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }
}
