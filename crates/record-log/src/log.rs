use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use store_core::{DataRecord, RecordId, StoreError};

/// A line recognizable as dead without decoding its payload (spec.md §4.2).
/// Short enough that every real encoded record (which always has at least
/// `{"id":`) is longer than it, so it always fits in a tombstoned slot.
const TOMBSTONE_MARKER: &str = "~DEL~";

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    /// Total bytes the slot occupies on disk, trailing newline included.
    len: u64,
}

#[derive(Default)]
struct Index {
    slots: HashMap<RecordId, Slot>,
    /// Offset -> id, kept sorted so iteration order matches on-disk order.
    order: BTreeMap<u64, RecordId>,
    loaded: bool,
}

/// The append-only `data.jsonl` engine described in spec.md §4.2. One
/// instance owns one table's record file and its in-memory offset index;
/// the index is built lazily by a single sequential scan on first access
/// and is never persisted across process restarts (spec.md §5).
pub struct RecordLog {
    path: PathBuf,
    index: RwLock<Index>,
}

impl RecordLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: RwLock::new(Index::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_loaded(&self) -> Result<(), StoreError> {
        {
            let index = self.index.read().expect("record-log index lock poisoned");
            if index.loaded {
                return Ok(());
            }
        }

        let (slots, order) = self.scan()?;
        let mut index = self.index.write().expect("record-log index lock poisoned");
        if !index.loaded {
            index.slots = slots;
            index.order = order;
            index.loaded = true;
        }
        Ok(())
    }

    fn scan(&self) -> Result<(HashMap<RecordId, Slot>, BTreeMap<u64, RecordId>), StoreError> {
        let mut slots = HashMap::new();
        let mut order = BTreeMap::new();

        if !self.path.exists() {
            return Ok((slots, order));
        }

        let mut file =
            File::open(&self.path).map_err(|e| StoreError::io("open record log", e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| StoreError::io("read record log", e))?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            let Some(rel_newline) = bytes[offset..].iter().position(|&b| b == b'\n') else {
                // Final line has no trailing newline: an interrupted write.
                // Corrupt, drop it.
                tracing::warn!(
                    path = %self.path.display(),
                    "skipping unterminated trailing line in record log"
                );
                break;
            };
            let line_end = offset + rel_newline;
            let line = &bytes[offset..line_end];
            let slot_len = (rel_newline + 1) as u64;

            if !is_tombstone(line) {
                match std::str::from_utf8(line)
                    .ok()
                    .and_then(|text| serde_json::from_str::<DataRecord>(text).ok())
                {
                    Some(record) => {
                        let slot = Slot {
                            offset: offset as u64,
                            len: slot_len,
                        };
                        slots.insert(record.id, slot);
                        order.insert(offset as u64, record.id);
                    }
                    None => {
                        if !line.is_empty() {
                            tracing::warn!(
                                path = %self.path.display(),
                                offset,
                                "skipping corrupt record log line"
                            );
                        }
                    }
                }
            }

            offset = line_end + 1;
        }

        Ok((slots, order))
    }

    /// Live record count (spec.md §4.2 `Len`).
    pub fn len(&self) -> Result<usize, StoreError> {
        self.ensure_loaded()?;
        Ok(self
            .index
            .read()
            .expect("record-log index lock poisoned")
            .slots
            .len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Encoded length of `record`, for storage-quota preflight before an
    /// append or update actually happens.
    pub fn encoded_len(record: &DataRecord) -> Result<usize, StoreError> {
        Ok(encode(record)?.len())
    }

    pub fn append(&self, record: &DataRecord) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        let content = encode(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open record log for append", e))?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|e| StoreError::io("seek record log", e))?;

        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::io("append record log", e))?;
        file.write_all(b"\n")
            .map_err(|e| StoreError::io("append record log", e))?;

        let slot = Slot {
            offset,
            len: content.len() as u64 + 1,
        };
        let mut index = self.index.write().expect("record-log index lock poisoned");
        index.slots.insert(record.id, slot);
        index.order.insert(offset, record.id);
        Ok(())
    }

    /// Overwrites in place if the new encoding still fits the old slot,
    /// otherwise tombstones the old slot and appends a fresh one
    /// (spec.md §4.2 `Update`).
    pub fn update(&self, record: &DataRecord) -> Result<(), StoreError> {
        self.ensure_loaded()?;

        let old_slot = {
            let index = self.index.read().expect("record-log index lock poisoned");
            *index
                .slots
                .get(&record.id)
                .ok_or_else(|| StoreError::RecordNotFound {
                    id: record.id.to_string(),
                })?
        };

        let content = encode(record)?;
        let fits_in_place = (content.len() as u64) + 1 <= old_slot.len;

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open record log for update", e))?;

        if fits_in_place {
            write_padded(&mut file, old_slot.offset, old_slot.len, content.as_bytes())?;
            // Slot offset/len unchanged, no index bookkeeping needed beyond this.
            return Ok(());
        }

        write_tombstone(&mut file, old_slot.offset, old_slot.len)?;

        let append_offset = file
            .seek(SeekFrom::End(0))
            .map_err(|e| StoreError::io("seek record log", e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::io("append record log", e))?;
        file.write_all(b"\n")
            .map_err(|e| StoreError::io("append record log", e))?;

        let new_slot = Slot {
            offset: append_offset,
            len: content.len() as u64 + 1,
        };
        let mut index = self.index.write().expect("record-log index lock poisoned");
        index.order.remove(&old_slot.offset);
        index.slots.insert(record.id, new_slot);
        index.order.insert(append_offset, record.id);
        Ok(())
    }

    pub fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.ensure_loaded()?;

        let slot = {
            let index = self.index.read().expect("record-log index lock poisoned");
            *index
                .slots
                .get(&id)
                .ok_or_else(|| StoreError::RecordNotFound { id: id.to_string() })?
        };

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open record log for delete", e))?;
        write_tombstone(&mut file, slot.offset, slot.len)?;

        let mut index = self.index.write().expect("record-log index lock poisoned");
        index.slots.remove(&id);
        index.order.remove(&slot.offset);
        Ok(())
    }

    /// Finite, single-pass, in insertion order, tombstones skipped
    /// (spec.md §4.2 `Iter`).
    pub fn iter(&self) -> Result<Vec<DataRecord>, StoreError> {
        self.ensure_loaded()?;
        let offsets: Vec<u64> = {
            let index = self.index.read().expect("record-log index lock poisoned");
            index.order.keys().copied().collect()
        };

        if offsets.is_empty() {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .map_err(|e| StoreError::io("open record log for iteration", e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| StoreError::io("read record log", e))?;

        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let start = offset as usize;
            let Some(rel_newline) = bytes[start..].iter().position(|&b| b == b'\n') else {
                continue;
            };
            let line = &bytes[start..start + rel_newline];
            if let Some(record) = std::str::from_utf8(line)
                .ok()
                .and_then(|text| serde_json::from_str::<DataRecord>(text).ok())
            {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// `ReadRecordsPage`: materializes at most `limit` records starting at
    /// `offset` over the same order as `iter` (spec.md §4.1).
    pub fn page(&self, offset: usize, limit: usize) -> Result<Vec<DataRecord>, StoreError> {
        let all = self.iter()?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

fn encode(record: &DataRecord) -> Result<String, StoreError> {
    serde_json::to_string(record)
        .map_err(|e| StoreError::corrupt("encode record", e.to_string()))
}

fn is_tombstone(line: &[u8]) -> bool {
    line.starts_with(TOMBSTONE_MARKER.as_bytes())
}

fn write_padded(file: &mut File, offset: u64, slot_len: u64, content: &[u8]) -> Result<(), StoreError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StoreError::io("seek record log", e))?;
    file.write_all(content)
        .map_err(|e| StoreError::io("write record log", e))?;
    let padding_len = slot_len - 1 - content.len() as u64;
    if padding_len > 0 {
        let padding = vec![b' '; padding_len as usize];
        file.write_all(&padding)
            .map_err(|e| StoreError::io("write record log", e))?;
    }
    file.write_all(b"\n")
        .map_err(|e| StoreError::io("write record log", e))?;
    Ok(())
}

fn write_tombstone(file: &mut File, offset: u64, slot_len: u64) -> Result<(), StoreError> {
    write_padded(file, offset, slot_len, TOMBSTONE_MARKER.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(id: u64, data: serde_json::Value) -> DataRecord {
        let now = Utc::now();
        DataRecord {
            id: RecordId(id),
            data: data.as_object().cloned().unwrap_or_default(),
            created: now,
            modified: now,
        }
    }

    #[test]
    fn given_missing_file_when_reading_then_table_is_empty() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));
        assert_eq!(log.len().unwrap(), 0);
        assert!(log.iter().unwrap().is_empty());
    }

    #[test]
    fn given_appended_records_when_iterating_then_insertion_order_is_preserved() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));

        log.append(&record(1, json!({"name": "a"}))).unwrap();
        log.append(&record(2, json!({"name": "b"}))).unwrap();
        log.append(&record(3, json!({"name": "c"}))).unwrap();

        let records = log.iter().unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(log.len().unwrap(), 3);
    }

    #[test]
    fn given_update_that_fits_in_place_when_updating_then_file_size_is_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let log = RecordLog::open(&path);

        let long_value = "x".repeat(20);
        log.append(&record(1, json!({"v": long_value}))).unwrap();
        let size_after_append = std::fs::metadata(&path).unwrap().len();

        log.update(&record(1, json!({"v": "short"}))).unwrap();
        let size_after_update = std::fs::metadata(&path).unwrap().len();

        assert_eq!(size_after_append, size_after_update);
        let records = log.iter().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data.get("v").unwrap(), "short");
    }

    #[test]
    fn given_update_too_large_for_slot_when_updating_then_old_slot_is_tombstoned_and_new_appended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let log = RecordLog::open(&path);

        log.append(&record(1, json!({"v": "short"}))).unwrap();
        let size_after_append = std::fs::metadata(&path).unwrap().len();

        let long_value = "y".repeat(100);
        log.update(&record(1, json!({"v": long_value}))).unwrap();
        let size_after_update = std::fs::metadata(&path).unwrap().len();

        assert!(size_after_update > size_after_append);
        let records = log.iter().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, 1);
    }

    #[test]
    fn given_update_on_missing_id_when_updating_then_returns_not_found() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));
        let err = log.update(&record(99, json!({}))).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }

    #[test]
    fn given_delete_on_missing_id_when_deleting_then_returns_not_found() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));
        let err = log.delete(RecordId(1)).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }

    #[test]
    fn given_deleted_record_when_iterating_then_it_is_skipped() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));

        log.append(&record(1, json!({"name": "a"}))).unwrap();
        log.append(&record(2, json!({"name": "b"}))).unwrap();
        log.delete(RecordId(1)).unwrap();

        let records = log.iter().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, 2);
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn given_offset_and_limit_when_paging_then_matches_drop_take_of_iter() {
        let dir = tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("data.jsonl"));
        for i in 1..=5u64 {
            log.append(&record(i, json!({"i": i}))).unwrap();
        }

        let page = log.page(2, 2).unwrap();
        let ids: Vec<u64> = page.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 4]);

        let empty = log.page(10, 2).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn given_corrupt_line_when_scanning_then_it_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(&path, b"not json at all\n{\"id\":1,\"data\":{},\"created\":\"2024-01-01T00:00:00Z\",\"modified\":\"2024-01-01T00:00:00Z\"}\n").unwrap();

        let log = RecordLog::open(&path);
        let records = log.iter().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, 1);
    }

    #[test]
    fn given_rebuilt_index_after_reopen_when_reading_then_state_matches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        {
            let log = RecordLog::open(&path);
            log.append(&record(1, json!({"name": "a"}))).unwrap();
            log.append(&record(2, json!({"name": "b"}))).unwrap();
            log.delete(RecordId(1)).unwrap();
        }

        let reopened = RecordLog::open(&path);
        let records = reopened.iter().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, 2);
    }
}
