//! SQLite-style type-affinity coercion for table cell values (spec.md §4.3).

mod value;

pub use value::InputValue;

use serde_json::Value as JsonValue;
use store_core::PropertyType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Text,
    Integer,
    Real,
    Numeric,
    Blob,
}

pub fn affinity_of(property_type: PropertyType) -> Affinity {
    use PropertyType::*;
    match property_type {
        Text | Markdown | Date | Select | Url | Email | Phone => Affinity::Text,
        Number => Affinity::Numeric,
        Checkbox => Affinity::Integer,
        MultiSelect | Relation | Rollup | Formula => Affinity::Blob,
    }
}

/// Coerces `value` to `affinity`, returning the JSON form that gets written
/// into the record's data map. Nil always passes through untouched,
/// regardless of affinity (spec.md §4.3).
pub fn coerce(value: &InputValue, affinity: Affinity) -> JsonValue {
    if matches!(value, InputValue::Null) {
        return JsonValue::Null;
    }

    match affinity {
        Affinity::Text => coerce_text(value),
        Affinity::Integer => coerce_integer(value),
        Affinity::Real => coerce_real(value),
        Affinity::Numeric => coerce_numeric(value),
        Affinity::Blob => value.to_json(),
    }
}

fn coerce_text(value: &InputValue) -> JsonValue {
    match value {
        InputValue::Null => JsonValue::Null,
        InputValue::Text(s) => JsonValue::String(s.clone()),
        InputValue::Int(i) => JsonValue::String(i.to_string()),
        InputValue::Float(f) => JsonValue::String(format_float_text(*f)),
        InputValue::Bool(b) => JsonValue::String(if *b { "1" } else { "0" }.to_string()),
        InputValue::List(_) | InputValue::Map(_) => value.to_json(),
    }
}

fn format_float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        // Rust's f64 Display already omits a trailing ".0" for whole
        // values (3.0 -> "3") and trims trailing zeros otherwise.
        format!("{f}")
    }
}

fn coerce_integer(value: &InputValue) -> JsonValue {
    match value {
        InputValue::Null => JsonValue::Null,
        InputValue::Int(i) => JsonValue::Number((*i).into()),
        InputValue::Float(f) => float_to_truncated_json(*f).unwrap_or_else(|| value.to_json()),
        InputValue::Bool(b) => JsonValue::Number(if *b { 1 } else { 0 }.into()),
        InputValue::Text(s) => match s.parse::<i64>() {
            Ok(i) => JsonValue::Number(i.into()),
            Err(_) => match s.parse::<f64>() {
                Ok(f) => float_to_truncated_json(f).unwrap_or_else(|| JsonValue::String(s.clone())),
                Err(_) => JsonValue::String(s.clone()),
            },
        },
        InputValue::List(_) | InputValue::Map(_) => value.to_json(),
    }
}

fn float_to_truncated_json(f: f64) -> Option<JsonValue> {
    if !f.is_finite() {
        return None;
    }
    Some(JsonValue::Number((f.trunc() as i64).into()))
}

fn coerce_real(value: &InputValue) -> JsonValue {
    match value {
        InputValue::Null => JsonValue::Null,
        InputValue::Int(i) => json_from_f64(*i as f64).unwrap_or(JsonValue::Null),
        InputValue::Float(f) => json_from_f64(*f).unwrap_or_else(|| value.to_json()),
        InputValue::Bool(b) => json_from_f64(if *b { 1.0 } else { 0.0 }).unwrap_or(JsonValue::Null),
        InputValue::Text(s) => match s.parse::<f64>() {
            Ok(f) => json_from_f64(f).unwrap_or_else(|| JsonValue::String(s.clone())),
            Err(_) => JsonValue::String(s.clone()),
        },
        InputValue::List(_) | InputValue::Map(_) => value.to_json(),
    }
}

fn json_from_f64(f: f64) -> Option<JsonValue> {
    serde_json::Number::from_f64(f).map(JsonValue::Number)
}

fn coerce_numeric(value: &InputValue) -> JsonValue {
    match value {
        InputValue::Null => JsonValue::Null,
        InputValue::Int(i) => JsonValue::Number((*i).into()),
        InputValue::Float(f) => numeric_from_float(*f).unwrap_or_else(|| value.to_json()),
        InputValue::Bool(b) => JsonValue::Number(if *b { 1 } else { 0 }.into()),
        InputValue::Text(s) => match s.parse::<f64>() {
            Ok(f) => numeric_from_float(f).unwrap_or_else(|| JsonValue::String(s.clone())),
            Err(_) => JsonValue::String(s.clone()),
        },
        InputValue::List(_) | InputValue::Map(_) => value.to_json(),
    }
}

/// If `f` is finite, equal to its own truncation, and fits in an i64,
/// stores an integer; otherwise a float (spec.md §4.3 NUMERIC rule).
fn numeric_from_float(f: f64) -> Option<JsonValue> {
    if !f.is_finite() {
        return None;
    }
    if f == f.trunc() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(JsonValue::Number((f as i64).into()))
    } else {
        json_from_f64(f)
    }
}
