use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use store_core::{Author, DataRecord, NodeId, RecordId, StoreError};
use tokio_util::sync::CancellationToken;
use type_coercion::{affinity_of, coerce, InputValue};

use crate::store::WorkspaceStore;
use crate::validate::validate_record_data;

impl WorkspaceStore {
    /// Coerces every field present in `input` against `table_id`'s schema,
    /// dropping fields that name no property (spec.md §4.3: coercion is
    /// keyed by property name, unknown keys are not stored).
    fn coerce_against_schema(
        &self,
        table_id: NodeId,
        input: &Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>, StoreError> {
        let schema = self.load_table_schema(table_id)?;
        let affinities: HashMap<&str, _> = schema
            .properties
            .iter()
            .map(|p| (p.name.as_str(), affinity_of(p.property_type)))
            .collect();

        let mut out = Map::new();
        for (key, value) in input {
            if let Some(affinity) = affinities.get(key.as_str()) {
                let input_value = InputValue::from(value.clone());
                out.insert(key.clone(), coerce(&input_value, *affinity));
            }
        }
        Ok(out)
    }

    /// `AppendRecord(tableID, data)` (spec.md §4.1, §4.2): coerces `data`
    /// against the table schema, preflights the per-table record count and
    /// storage bytes, and appends one line to `data.jsonl`.
    pub fn append_record(
        &self,
        table_id: NodeId,
        data: Map<String, JsonValue>,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<DataRecord, StoreError> {
        validate_record_data(&data)?;
        let coerced = self.coerce_against_schema(table_id, &data)?;

        let log = self.record_log(table_id)?;
        let existing = log.len()?;
        quota_policy::check_records_per_table(&self.quotas, existing as u64)?;

        let next_id = log
            .iter()?
            .into_iter()
            .map(|r| r.id.0)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let record = DataRecord {
            id: RecordId(next_id),
            data: coerced,
            created: now,
            modified: now,
        };

        let encoded_len = record_log::RecordLog::encoded_len(&record)? as u64;
        self.preflight_storage_bytes(encoded_len + 1)?;

        let dir_rel = self.node_dir_rel(table_id)?;
        let record_for_commit = record.clone();
        let log_for_commit = log.clone();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                log_for_commit.append(&record_for_commit)?;
                Ok((
                    format!("update: record {}", record_for_commit.id),
                    vec![dir_rel.join("data.jsonl")],
                ))
            }),
        )?;

        Ok(record)
    }

    /// `UpdateRecord(tableID, recordID, data)`: re-coerces `data` against
    /// the current schema and rewrites the record's slot in place when it
    /// fits, otherwise tombstone-and-append (spec.md §4.2).
    pub fn update_record(
        &self,
        table_id: NodeId,
        record_id: RecordId,
        data: Map<String, JsonValue>,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<DataRecord, StoreError> {
        validate_record_data(&data)?;
        let coerced = self.coerce_against_schema(table_id, &data)?;

        let log = self.record_log(table_id)?;
        let existing = log
            .iter()?
            .into_iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::RecordNotFound {
                id: record_id.to_string(),
            })?;

        let now = Utc::now();
        let record = DataRecord {
            id: record_id,
            data: coerced,
            created: existing.created,
            modified: now,
        };

        let old_len = record_log::RecordLog::encoded_len(&existing)? as u64;
        let new_len = record_log::RecordLog::encoded_len(&record)? as u64;
        self.preflight_storage_bytes(new_len.saturating_sub(old_len))?;

        let dir_rel = self.node_dir_rel(table_id)?;
        let record_for_commit = record.clone();
        let log_for_commit = log.clone();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                log_for_commit.update(&record_for_commit)?;
                Ok((
                    format!("update: record {record_id}"),
                    vec![dir_rel.join("data.jsonl")],
                ))
            }),
        )?;

        Ok(record)
    }

    /// `DeleteRecord(tableID, recordID)`: tombstones the record's slot.
    pub fn delete_record(
        &self,
        table_id: NodeId,
        record_id: RecordId,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), StoreError> {
        let log = self.record_log(table_id)?;
        let dir_rel = self.node_dir_rel(table_id)?;
        let log_for_commit = log.clone();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                log_for_commit.delete(record_id)?;
                Ok((
                    format!("delete: record {record_id}"),
                    vec![dir_rel.join("data.jsonl")],
                ))
            }),
        )
    }

    /// `IterRecords(tableID)`: every live record, insertion order.
    pub fn iter_records(&self, table_id: NodeId) -> Result<Vec<DataRecord>, StoreError> {
        self.record_log(table_id)?.iter()
    }

    /// `ReadRecordsPage(tableID, offset, limit)`.
    pub fn read_records_page(
        &self,
        table_id: NodeId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataRecord>, StoreError> {
        self.record_log(table_id)?.page(offset, limit)
    }
}
