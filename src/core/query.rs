//! Query-string parsing with configurable coercion.
//!
//! Values are percent-decoded and, depending on [`QueryConfig`], split into
//! arrays and coerced to numbers/booleans. With all toggles off every value
//! stays a string.

use serde_json::Value;
use std::collections::HashMap;

use crate::core::config::QueryConfig;

/// Parse a raw query string into a name → value map.
///
/// Repeated keys accumulate into an array when array parsing is enabled;
/// otherwise the last occurrence wins.
pub fn parse_query(raw: &str, config: &QueryConfig) -> HashMap<String, Value> {
    let mut parsed = HashMap::new();

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };

        let key = decode_component(key);
        let value = decode_component(value);

        let coerced = if config.parse_arrays && value.contains(config.array_delimiter.as_str()) {
            Value::Array(
                value
                    .split(config.array_delimiter.as_str())
                    .map(|part| coerce_scalar(part, config))
                    .collect(),
            )
        } else {
            coerce_scalar(&value, config)
        };

        if config.parse_arrays {
            match parsed.get_mut(&key) {
                Some(Value::Array(items)) => match coerced {
                    Value::Array(mut more) => items.append(&mut more),
                    single => items.push(single),
                },
                Some(existing) => {
                    let first = existing.take();
                    parsed.insert(key, Value::Array(vec![first, coerced]));
                }
                None => {
                    parsed.insert(key, coerced);
                }
            }
        } else {
            parsed.insert(key, coerced);
        }
    }

    parsed
}

/// Percent-decode one query component, treating `+` as a space.
fn decode_component(component: &str) -> String {
    let with_spaces = component.replace('+', " ");
    urlencoding::decode(&with_spaces)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(with_spaces)
}

fn coerce_scalar(value: &str, config: &QueryConfig) -> Value {
    if config.parse_booleans {
        match value {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
    }

    if config.parse_numbers && !value.is_empty() {
        if let Ok(int) = value.parse::<i64>() {
            return Value::Number(int.into());
        }
        if let Ok(float) = value.parse::<f64>() {
            if let Some(number) = serde_json::Number::from_f64(float) {
                return Value::Number(number);
            }
        }
    }

    Value::String(value.to_string())
}
