use std::fs;

use chrono::Utc;
use store_core::{Author, Node, NodeType, StoreError};
use tokio_util::sync::CancellationToken;

use crate::store::WorkspaceStore;
use crate::validate::validate_title;

impl WorkspaceStore {
    /// `CreateNode(title, type, parentID)` (spec.md §4.1): preflights the
    /// page-count and storage-bytes quotas against the artifacts the new
    /// type requires, then creates the node directory and artifacts inside
    /// one commit.
    pub fn create_node(
        &self,
        title: &str,
        node_type: NodeType,
        parent_id: store_core::NodeId,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<Node, StoreError> {
        validate_title(title)?;
        self.ensure_parent_exists(parent_id)?;

        let id = self.id_gen.next_id();
        let now = Utc::now();

        let page_bytes = if node_type.has_page() {
            let fm = markdown_page::FrontMatter {
                title: title.to_string(),
                created: now,
                modified: now,
                tags: None,
            };
            markdown_page::encode(&fm, "").len() as u64
        } else {
            0
        };

        let table_bytes = if node_type.has_table() {
            let schema = store_core::TableSchema {
                title: title.to_string(),
                version: "1.0".to_string(),
                created: now,
                modified: now,
                properties: Vec::new(),
            };
            serde_json::to_vec_pretty(&schema)
                .map_err(|e| StoreError::corrupt("encode metadata.json", e.to_string()))?
                .len() as u64
        } else {
            0
        };

        if node_type.has_page() {
            quota_policy::check_page_count(&self.quotas, self.count_pages()?)?;
        }
        self.preflight_storage_bytes(page_bytes + table_bytes)?;

        let dir_rel = self.new_node_dir_rel(parent_id, id)?;
        let dir_abs = self.root.join(&dir_rel);

        let title_owned = title.to_string();
        let type_label = node_type_label(node_type);
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::create_dir_all(&dir_abs).map_err(|e| StoreError::io("create node directory", e))?;
                let mut touched = Vec::new();

                if node_type.has_page() {
                    let fm = markdown_page::FrontMatter {
                        title: title_owned.clone(),
                        created: now,
                        modified: now,
                        tags: None,
                    };
                    let content = markdown_page::encode(&fm, "");
                    let path = dir_abs.join("index.md");
                    fs::write(&path, content).map_err(|e| StoreError::io("write index.md", e))?;
                    touched.push(dir_rel.join("index.md"));
                }

                if node_type.has_table() {
                    let schema = store_core::TableSchema {
                        title: title_owned.clone(),
                        version: "1.0".to_string(),
                        created: now,
                        modified: now,
                        properties: Vec::new(),
                    };
                    let content = serde_json::to_vec_pretty(&schema)
                        .map_err(|e| StoreError::corrupt("encode metadata.json", e.to_string()))?;
                    let path = dir_abs.join("metadata.json");
                    fs::write(&path, content).map_err(|e| StoreError::io("write metadata.json", e))?;
                    touched.push(dir_rel.join("metadata.json"));
                }

                Ok((
                    format!("create: {type_label} {id} - {title_owned}"),
                    touched,
                ))
            }),
        )?;

        self.hierarchy.insert(id, parent_id);

        Ok(Node {
            id,
            parent_id,
            title: title.to_string(),
            node_type,
            created: now,
            modified: now,
            tags: None,
            icon_url: None,
            favicon_url: None,
            cover_url: None,
            body: node_type.has_page().then(String::new),
            schema: node_type.has_table().then(Vec::new),
            views: None,
        })
    }
}

fn node_type_label(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Document => "document",
        NodeType::Table => "table",
        NodeType::Hybrid => "hybrid",
    }
}
