//! Attribute value normalization.
//!
//! Devices report the same quantity in different shapes: `"1,5 kH/s"`,
//! `"1500"`, `1500` or `"42.3\r\n"`. Everything is brought into a canonical
//! [`AttributeValue`] before it is compared against the applied state, so a
//! resend of the same reading in a different notation is not seen as a change.

use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Canonical unit for hashrate attributes.
pub const HASHRATE_UNIT: &str = "H/s";

/// Attributes parsed as plain floating point numbers.
const NUMERIC_ATTRIBUTES: &[&str] = &[
    "temp", "rssi", "bestdiff", "lastdiff", "netdiff", "pooldiff", "progress",
];

/// Hashrate suffixes with their scale to H/s.
/// The bare `h/s` must come last since every other suffix ends with it.
const HASHRATE_SUFFIXES: &[(&str, f64)] = &[
    ("kh/s", 1e3),
    ("mh/s", 1e6),
    ("gh/s", 1e9),
    ("th/s", 1e12),
    ("h/s", 1.0),
];

/// A normalized attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    /// Non-string, non-numeric JSON (booleans, null, arrays, objects), passed through as-is
    Raw(Value),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Raw(v) => write!(f, "{}", v),
        }
    }
}

/// Normalize a raw reported value for the given attribute.
///
/// Returns the canonical value plus the unit it is expressed in, if the
/// attribute has one.
pub fn normalize(attribute: &str, raw: &Value) -> (AttributeValue, Option<&'static str>) {
    let key = attribute.to_lowercase();
    let unit = super::metadata::unit_for(&key);

    let value = match raw {
        Value::String(s) => normalize_text(&key, clean(s)),
        Value::Number(n) => match n.as_f64() {
            Some(f) => AttributeValue::Number(f),
            None => AttributeValue::Raw(raw.clone()),
        },
        other => AttributeValue::Raw(other.clone()),
    };

    (value, unit)
}

/// Drop everything from the first carriage return on, then trim.
fn clean(raw: &str) -> &str {
    raw.split('\r').next().unwrap_or_default().trim()
}

fn normalize_text(key: &str, cleaned: &str) -> AttributeValue {
    if key == "hashrate" {
        return AttributeValue::Number(parse_hashrate(cleaned));
    }

    if NUMERIC_ATTRIBUTES.contains(&key) {
        let localized = cleaned.replace(',', ".");
        return match localized.parse::<f64>() {
            Ok(n) => AttributeValue::Number(n),
            Err(_) => AttributeValue::Text(cleaned.to_string()),
        };
    }

    // freeheap keeps its embedded unit text, like every other free-form attribute
    AttributeValue::Text(cleaned.to_string())
}

/// Parse a hashrate string like `"2,3 MH/s"` into H/s.
///
/// Unparseable input yields `0.0` and a warning.
pub fn parse_hashrate(input: &str) -> f64 {
    let normalized = input.trim().to_lowercase().replace(',', ".");

    let parsed = match HASHRATE_SUFFIXES
        .iter()
        .find(|(suffix, _)| normalized.ends_with(suffix))
    {
        Some((suffix, scale)) => normalized[..normalized.len() - suffix.len()]
            .trim()
            .parse::<f64>()
            .map(|n| n * scale),
        None => normalized.parse::<f64>(),
    };

    match parsed {
        Ok(n) if n.is_finite() => n,
        _ => {
            warn!("Could not convert hashrate value: {}", input);
            0.0
        }
    }
}
