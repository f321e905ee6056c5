//! Conversion of raw extraction output into canonical metric maps.
//!
//! The vision model returns metric names in arbitrary casing and spacing,
//! and values as either JSON numbers or numeric strings. Everything is
//! canonicalized here, before it reaches the aggregator, so the aggregator
//! can assume canonical keys and finite values as a precondition.

use crate::models::MetricMap;
use serde_json::Value;
use tracing::debug;

/// Canonicalize a raw metric key.
///
/// Lower-cases and collapses internal whitespace runs to a single
/// underscore; leading and trailing whitespace is dropped. Idempotent:
/// an already-canonical key comes back unchanged.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Build a [`MetricMap`] from the raw key/value pairs of one extraction.
///
/// Values that are not finite numbers (and strings that do not parse as
/// finite numbers) are dropped, never coerced to zero. When two raw keys
/// collapse to the same canonical key, the later entry wins.
pub fn ingest_raw(raw: &serde_json::Map<String, Value>) -> MetricMap {
    let mut metrics = MetricMap::new();

    for (key, value) in raw {
        let Some(number) = parse_number(value) else {
            debug!("Dropping non-numeric value for '{}': {}", key, value);
            continue;
        };

        if !number.is_finite() {
            debug!("Dropping non-finite value for '{}'", key);
            continue;
        }

        metrics.insert(normalize(key), number);
    }

    metrics
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Turn a canonical key into a human-readable label.
///
/// Splits on underscore, capitalizes each segment, joins with spaces.
/// Expects already-canonical input; one-way.
pub fn format_metric_label(canonical: &str) -> String {
    canonical
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
