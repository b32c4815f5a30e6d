use std::cmp::Ordering;

use serde_json::Value as JsonValue;
use store_core::{DataRecord, FilterNode, FilterOperator};

/// Evaluates `filter` against `record`. A `None` filter matches everything.
pub fn matches(record: &DataRecord, filter: Option<&FilterNode>) -> bool {
    match filter {
        None => true,
        Some(node) => eval(record, node),
    }
}

fn eval(record: &DataRecord, node: &FilterNode) -> bool {
    match node {
        FilterNode::Leaf {
            property,
            operator,
            value,
        } => eval_leaf(record.data.get(property), *operator, value.as_ref()),
        FilterNode::And { children } => children.iter().all(|c| eval(record, c)),
        FilterNode::Or { children } => children.iter().any(|c| eval(record, c)),
    }
}

fn eval_leaf(actual: Option<&JsonValue>, operator: FilterOperator, operand: Option<&JsonValue>) -> bool {
    let Some(actual) = actual else {
        return operator == FilterOperator::IsEmpty;
    };

    match operator {
        FilterOperator::IsEmpty => is_empty_value(actual),
        FilterOperator::IsNotEmpty => !is_empty_value(actual),
        FilterOperator::Equals => operand.is_some_and(|o| typed_compare(actual, o) == Ordering::Equal),
        FilterOperator::NotEquals => operand.is_some_and(|o| typed_compare(actual, o) != Ordering::Equal),
        FilterOperator::Contains => operand.is_some_and(|o| text_of(actual).contains(&text_of(o))),
        FilterOperator::NotContains => operand.is_some_and(|o| !text_of(actual).contains(&text_of(o))),
        FilterOperator::StartsWith => operand.is_some_and(|o| text_of(actual).starts_with(&text_of(o))),
        FilterOperator::EndsWith => operand.is_some_and(|o| text_of(actual).ends_with(&text_of(o))),
        FilterOperator::Gt => operand.is_some_and(|o| typed_compare(actual, o) == Ordering::Greater),
        FilterOperator::Lt => operand.is_some_and(|o| typed_compare(actual, o) == Ordering::Less),
        FilterOperator::Gte => operand.is_some_and(|o| typed_compare(actual, o) != Ordering::Less),
        FilterOperator::Lte => operand.is_some_and(|o| typed_compare(actual, o) != Ordering::Greater),
    }
}

fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
        JsonValue::Bool(_) | JsonValue::Number(_) => false,
    }
}

/// Renders a value for the string-based operators (contains/starts_with/
/// ends_with), folded to ASCII lowercase — string operators are
/// case-insensitive (spec.md §4.4).
fn text_of(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
    .to_ascii_lowercase()
}

/// Compares two values for equals/gt/lt-family operators. Numbers compare
/// numerically; a string that parses as a number compares numerically
/// against a number; otherwise comparison falls back to a case-insensitive
/// string comparison (spec.md §4.4).
fn typed_compare(a: &JsonValue, b: &JsonValue) -> Ordering {
    if let (Some(a), Some(b)) = (as_f64(a), as_f64(b)) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    text_of(a).cmp(&text_of(b))
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}
