use serde_json::Value as JsonValue;

/// Dynamic wire value fed into [`crate::coerce`].
///
/// Mirrors `serde_json::Value` except `Float` can hold `NaN`/infinities,
/// which JSON itself cannot represent but which a formula or rollup
/// property may compute before a TEXT-affinity coercion turns it into a
/// JSON-safe sentinel string.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<InputValue>),
    Map(Vec<(String, InputValue)>),
}

impl InputValue {
    /// Renders this value as JSON, used for affinities that pass a shape
    /// through unchanged (BLOB, or TEXT/INTEGER/REAL/NUMERIC given a list
    /// or object).
    pub fn to_json(&self) -> JsonValue {
        match self {
            InputValue::Null => JsonValue::Null,
            InputValue::Bool(b) => JsonValue::Bool(*b),
            InputValue::Int(i) => JsonValue::Number((*i).into()),
            InputValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            InputValue::Text(s) => JsonValue::String(s.clone()),
            InputValue::List(items) => JsonValue::Array(items.iter().map(InputValue::to_json).collect()),
            InputValue::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for InputValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => InputValue::Null,
            JsonValue::Bool(b) => InputValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    InputValue::Int(i)
                } else {
                    InputValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => InputValue::Text(s),
            JsonValue::Array(items) => InputValue::List(items.into_iter().map(InputValue::from).collect()),
            JsonValue::Object(map) => {
                InputValue::Map(map.into_iter().map(|(k, v)| (k, InputValue::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_json_number_when_converting_then_picks_int_or_float() {
        assert_eq!(InputValue::from(JsonValue::from(42)), InputValue::Int(42));
        assert_eq!(InputValue::from(JsonValue::from(3.5)), InputValue::Float(3.5));
    }

    #[test]
    fn given_non_finite_float_when_rendering_json_then_falls_back_to_null() {
        assert_eq!(InputValue::Float(f64::NAN).to_json(), JsonValue::Null);
    }
}
