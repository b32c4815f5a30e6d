use serde_json::Value as JsonValue;
use store_core::{DataRecord, GroupSpec};

/// Partitions `records` by the value of `spec.property`, preserving the
/// order groups are first encountered. Groups whose key appears in
/// `spec.hidden_values` are suppressed entirely (spec.md §4.4).
pub fn group_by<'a>(records: &'a [DataRecord], spec: &GroupSpec) -> Vec<(JsonValue, Vec<&'a DataRecord>)> {
    let mut groups: Vec<(JsonValue, Vec<&'a DataRecord>)> = Vec::new();

    for record in records {
        let key = record.data.get(&spec.property).cloned().unwrap_or(JsonValue::Null);
        if spec.hidden_values.contains(&key) {
            continue;
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key, vec![record])),
        }
    }

    groups
}
