use std::cmp::Ordering;

use serde_json::Value as JsonValue;
use store_core::{DataRecord, SortDirection, SortKey};

/// Stable multi-key sort (spec.md §4.4). Each key is compared by typed
/// value; ties fall through to the next key.
pub fn sort_by_keys(records: &mut [DataRecord], keys: &[SortKey]) {
    records.sort_by(|a, b| {
        for key in keys {
            let av = a.data.get(&key.property).unwrap_or(&JsonValue::Null);
            let bv = b.data.get(&key.property).unwrap_or(&JsonValue::Null);
            let ord = match (av.is_null(), bv.is_null()) {
                (true, true) => Ordering::Equal,
                // Nil always sorts last, independent of direction: only a
                // non-nil/non-nil comparison gets the direction flip below.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let mut ord = cmp_value(av, bv);
                    if key.direction == SortDirection::Desc {
                        ord = ord.reverse();
                    }
                    ord
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Numbers compare numerically, strings lexicographically, booleans false
/// before true. Callers never pass `Null` here — see [`sort_by_keys`].
fn cmp_value(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .and_then(|x| y.as_f64().map(|y| x.partial_cmp(&y)))
            .flatten()
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use store_core::RecordId;

    fn record(id: u64, age: JsonValue) -> DataRecord {
        let now = Utc::now();
        let mut data = serde_json::Map::new();
        data.insert("age".to_string(), age);
        DataRecord {
            id: RecordId(id),
            data,
            created: now,
            modified: now,
        }
    }

    #[test]
    fn given_numbers_when_sorting_ascending_then_orders_numerically() {
        let mut records = vec![record(1, json!(30)), record(2, json!(10)), record(3, json!(20))];
        sort_by_keys(
            &mut records,
            &[SortKey {
                property: "age".to_string(),
                direction: SortDirection::Asc,
            }],
        );
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn given_nil_values_when_sorting_then_sort_last_in_either_direction() {
        let mut records = vec![record(1, JsonValue::Null), record(2, json!(5))];
        sort_by_keys(
            &mut records,
            &[SortKey {
                property: "age".to_string(),
                direction: SortDirection::Desc,
            }],
        );
        assert_eq!(records[0].id.0, 2);
        assert_eq!(records[1].id.0, 1);
    }

    #[test]
    fn given_ties_when_sorting_then_preserves_original_order() {
        let mut records = vec![record(1, json!(5)), record(2, json!(5))];
        sort_by_keys(
            &mut records,
            &[SortKey {
                property: "age".to_string(),
                direction: SortDirection::Asc,
            }],
        );
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
