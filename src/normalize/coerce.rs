//! Numeric, string and boolean coercion for loosely typed records

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Look up the first non-null field among `names`
pub fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

/// Coerce a JSON value to a finite `f64`
///
/// Accepts numbers and numeric strings. NaN and infinities are rejected.
pub fn to_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerce a JSON value to a `Decimal`
///
/// Strings are parsed exactly; numbers go through `f64` and must be finite.
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .ok()
                .or_else(|| Decimal::from_scientific(trimmed).ok())
        }
        Value::Number(_) => Decimal::from_f64(to_f64(value)?),
        _ => None,
    }
}

pub fn field_f64(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    field(obj, names).and_then(to_f64)
}

pub fn field_decimal(obj: &Map<String, Value>, names: &[&str]) -> Option<Decimal> {
    field(obj, names).and_then(to_decimal)
}

/// Non-empty trimmed string; numbers are rendered to text
pub fn field_str(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    let text = match field(obj, names)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Booleans, `0`/`1` and `"true"`/`"false"` strings
pub fn field_bool(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    match field(obj, names)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Unwrap a batch: a bare array, an object wrapping an array under one of
/// `wrappers`, or a single object treated as a batch of one
pub fn records<'a>(value: &'a Value, wrappers: &[&str]) -> Vec<&'a Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            let wrapped = wrappers
                .iter()
                .find_map(|name| obj.get(*name).and_then(Value::as_array));
            match wrapped {
                Some(items) => items.iter().collect(),
                None => vec![value],
            }
        }
        _ => Vec::new(),
    }
}
