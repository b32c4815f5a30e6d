use std::fs;

use chrono::Utc;
use store_core::{Author, Node, NodeType, Property, StoreError, TableSchema};
use tokio_util::sync::CancellationToken;

use crate::store::WorkspaceStore;
use crate::validate::validate_title;

impl WorkspaceStore {
    /// `WriteTable(id, parentID, title, properties)` (spec.md §4.1):
    /// creates a new table node or rewrites an existing one's schema,
    /// preserving `created` across a rewrite.
    pub fn write_table(
        &self,
        id: store_core::NodeId,
        parent_id: store_core::NodeId,
        title: &str,
        properties: Vec<Property>,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<Node, StoreError> {
        validate_title(title)?;

        let existed_as_node = self
            .hierarchy
            .parent_of(id)
            .map_err(|e| StoreError::io("hierarchy lookup", crate::store::to_io_error(e)))?
            .is_some();

        let (dir_rel, effective_parent) = if existed_as_node {
            (self.node_dir_rel(id)?, self.node_parent(id)?)
        } else {
            self.ensure_parent_exists(parent_id)?;
            (self.new_node_dir_rel(parent_id, id)?, parent_id)
        };
        let dir_abs = self.root.join(&dir_rel);
        let metadata_path = dir_abs.join("metadata.json");

        let table_existed = metadata_path.is_file();
        let old_len = if table_existed {
            fs::metadata(&metadata_path)
                .map_err(|e| StoreError::io("stat metadata.json", e))?
                .len()
        } else {
            0
        };
        let created = if table_existed {
            let raw = fs::read_to_string(&metadata_path).map_err(|e| StoreError::io("read metadata.json", e))?;
            let existing: TableSchema = serde_json::from_str(&raw)
                .map_err(|e| StoreError::corrupt("decode metadata.json", e.to_string()))?;
            existing.created
        } else {
            Utc::now()
        };

        let now = Utc::now();
        let schema = TableSchema {
            title: title.to_string(),
            version: "1.0".to_string(),
            created,
            modified: now,
            properties: properties.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&schema)
            .map_err(|e| StoreError::corrupt("encode metadata.json", e.to_string()))?;
        let new_len = encoded.len() as u64;

        self.preflight_storage_bytes(new_len.saturating_sub(old_len))?;

        let title_owned = title.to_string();
        let message = if table_existed {
            format!("update: table {id}")
        } else {
            format!("create: table {id} - {title_owned}")
        };

        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::create_dir_all(&dir_abs).map_err(|e| StoreError::io("create node directory", e))?;
                fs::write(&metadata_path, &encoded).map_err(|e| StoreError::io("write metadata.json", e))?;
                Ok((message, vec![dir_rel.join("metadata.json")]))
            }),
        )?;

        if !existed_as_node {
            self.hierarchy.insert(id, effective_parent);
        }

        Ok(Node {
            id,
            parent_id: effective_parent,
            title: title.to_string(),
            node_type: NodeType::Table,
            created,
            modified: now,
            tags: None,
            icon_url: None,
            favicon_url: None,
            cover_url: None,
            body: None,
            schema: Some(properties),
            views: None,
        })
    }

    pub(crate) fn load_table_schema(&self, id: store_core::NodeId) -> Result<TableSchema, StoreError> {
        let dir_rel = self.node_dir_rel(id)?;
        let metadata_path = self.root.join(&dir_rel).join("metadata.json");
        if !metadata_path.is_file() {
            return Err(StoreError::TableNotFound { id: id.to_string() });
        }
        let raw = fs::read_to_string(&metadata_path).map_err(|e| StoreError::io("read metadata.json", e))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::corrupt("decode metadata.json", e.to_string()))
    }

    /// `DeleteTable(id)`: removes `metadata.json` and its `data.jsonl`
    /// sibling; if `index.md` is also absent afterward, the node directory
    /// is removed and the hierarchy cache entry evicted.
    pub fn delete_table(
        &self,
        id: store_core::NodeId,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), StoreError> {
        let dir_rel = self.node_dir_rel(id)?;
        let dir_abs = self.root.join(&dir_rel);
        let metadata_path = dir_abs.join("metadata.json");
        if !metadata_path.is_file() {
            return Err(StoreError::TableNotFound { id: id.to_string() });
        }
        let data_path = dir_abs.join("data.jsonl");

        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::remove_file(&metadata_path).map_err(|e| StoreError::io("remove metadata.json", e))?;
                let mut touched = vec![dir_rel.join("metadata.json")];

                if data_path.is_file() {
                    fs::remove_file(&data_path).map_err(|e| StoreError::io("remove data.jsonl", e))?;
                    touched.push(dir_rel.join("data.jsonl"));
                }

                let has_page = dir_abs.join("index.md").is_file();
                if !has_page {
                    let remaining = fs::read_dir(&dir_abs)
                        .map_err(|e| StoreError::io("read node directory", e))?
                        .count();
                    if remaining == 0 {
                        fs::remove_dir(&dir_abs).map_err(|e| StoreError::io("remove node directory", e))?;
                        touched.push(dir_rel.clone());
                    }
                }

                Ok((format!("delete: table {id}"), touched))
            }),
        )?;

        self.record_logs
            .write()
            .expect("record log cache lock poisoned")
            .remove(&id);

        let has_page = self.root.join(&dir_rel).join("index.md").is_file();
        let still_exists = self.root.join(&dir_rel).is_dir();
        if !has_page && !still_exists {
            self.hierarchy.evict(id);
        }

        Ok(())
    }
}
