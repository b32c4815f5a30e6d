use std::fs;

use chrono::Utc;
use markdown_page::FrontMatter;
use store_core::{Author, Node, NodeId, NodeType, StoreError};
use tokio_util::sync::CancellationToken;

use crate::store::WorkspaceStore;
use crate::validate::validate_title;

impl WorkspaceStore {
    /// `WritePage(id, parentID, title, content)` (spec.md §4.1): creates a
    /// new document node or rewrites an existing page's content.
    pub fn write_page(
        &self,
        id: NodeId,
        parent_id: NodeId,
        title: &str,
        content: &str,
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
            let parent = self.node_parent(id)?;
            (self.node_dir_rel(id)?, parent)
        } else {
            self.ensure_parent_exists(parent_id)?;
            (self.new_node_dir_rel(parent_id, id)?, parent_id)
        };
        let dir_abs = self.root.join(&dir_rel);
        let index_path = dir_abs.join("index.md");

        let page_existed = index_path.is_file();
        let old_len = if page_existed {
            fs::metadata(&index_path)
                .map_err(|e| StoreError::io("stat index.md", e))?
                .len()
        } else {
            0
        };
        let created = if page_existed {
            let raw = fs::read_to_string(&index_path).map_err(|e| StoreError::io("read index.md", e))?;
            let (fm, _) = markdown_page::decode(&raw, &id.to_string());
            fm.created
        } else {
            Utc::now()
        };

        let now = Utc::now();
        let fm = FrontMatter {
            title: title.to_string(),
            created,
            modified: now,
            tags: None,
        };
        let encoded = markdown_page::encode(&fm, content);
        let new_len = encoded.len() as u64;

        if !page_existed {
            quota_policy::check_page_count(&self.quotas, self.count_pages()?)?;
        }
        self.preflight_storage_bytes(new_len.saturating_sub(old_len))?;

        let title_owned = title.to_string();
        let message = if page_existed {
            format!("update: page {id}")
        } else {
            format!("create: document {id} - {title_owned}")
        };

        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::create_dir_all(&dir_abs).map_err(|e| StoreError::io("create node directory", e))?;
                fs::write(&index_path, &encoded).map_err(|e| StoreError::io("write index.md", e))?;
                Ok((message, vec![dir_rel.join("index.md")]))
            }),
        )?;

        if !existed_as_node {
            self.hierarchy.insert(id, effective_parent);
        }

        Ok(Node {
            id,
            parent_id: effective_parent,
            title: title.to_string(),
            node_type: NodeType::Document,
            created,
            modified: now,
            tags: None,
            icon_url: None,
            favicon_url: None,
            cover_url: None,
            body: Some(content.to_string()),
            schema: None,
            views: None,
        })
    }

    /// `UpdatePage(id, title, content)`: rewrites an existing page,
    /// preserving `created` (spec.md §4.1, §8 invariant 5).
    pub fn update_page(
        &self,
        id: NodeId,
        title: &str,
        content: &str,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<Node, StoreError> {
        let parent_id = self.node_parent(id)?;
        let dir_rel = self.node_dir_rel(id)?;
        if !self.root.join(&dir_rel).join("index.md").is_file() {
            return Err(StoreError::PageNotFound { id: id.to_string() });
        }
        self.write_page(id, parent_id, title, content, author, cancel)
    }

    /// Reads `index.md` for `id` directly from disk (reads bypass the VCS
    /// layer per spec.md §4 "Data flow").
    pub fn read_page(&self, id: NodeId) -> Result<Node, StoreError> {
        let parent_id = self.node_parent(id)?;
        let dir_rel = self.node_dir_rel(id)?;
        let index_path = self.root.join(&dir_rel).join("index.md");
        if !index_path.is_file() {
            return Err(StoreError::PageNotFound { id: id.to_string() });
        }
        let raw = fs::read_to_string(&index_path).map_err(|e| StoreError::io("read index.md", e))?;
        let (fm, body) = markdown_page::decode(&raw, &id.to_string());
        let has_table = self.root.join(&dir_rel).join("metadata.json").is_file();
        Ok(Node {
            id,
            parent_id,
            title: fm.title,
            node_type: if has_table { NodeType::Hybrid } else { NodeType::Document },
            created: fm.created,
            modified: fm.modified,
            tags: fm.tags,
            icon_url: None,
            favicon_url: None,
            cover_url: None,
            body: Some(body),
            schema: None,
            views: None,
        })
    }

    /// `DeletePage(id)`: removes `index.md`; if the directory holds
    /// neither `metadata.json` nor any asset afterwards, removes the
    /// directory entirely and evicts the hierarchy cache entry.
    pub fn delete_page(
        &self,
        id: NodeId,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), StoreError> {
        let dir_rel = self.node_dir_rel(id)?;
        let dir_abs = self.root.join(&dir_rel);
        let index_path = dir_abs.join("index.md");
        if !index_path.is_file() {
            return Err(StoreError::PageNotFound { id: id.to_string() });
        }

        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::remove_file(&index_path).map_err(|e| StoreError::io("remove index.md", e))?;
                let mut touched = vec![dir_rel.join("index.md")];

                let has_table = dir_abs.join("metadata.json").is_file();
                if !has_table {
                    let remaining = fs::read_dir(&dir_abs)
                        .map_err(|e| StoreError::io("read node directory", e))?
                        .count();
                    if remaining == 0 {
                        fs::remove_dir(&dir_abs).map_err(|e| StoreError::io("remove node directory", e))?;
                        touched.push(dir_rel.clone());
                    }
                }

                Ok((format!("delete: page {id}"), touched))
            }),
        )?;

        let has_table = self.root.join(&dir_rel).join("metadata.json").is_file();
        let still_exists = self.root.join(&dir_rel).is_dir();
        if !has_table && !still_exists {
            self.hierarchy.evict(id);
        }

        Ok(())
    }

    pub(crate) fn node_parent(&self, id: NodeId) -> Result<NodeId, StoreError> {
        self.hierarchy
            .parent_of(id)
            .map_err(|e| StoreError::io("hierarchy lookup", crate::store::to_io_error(e)))?
            .ok_or_else(|| StoreError::PageNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorkspaceStoreConfig;
    use crate::test_support::{test_author, InMemoryRepo};
    use std::sync::Arc;
    use store_core::{EffectiveQuotas, MonotonicIdGenerator, OrgId};
    use tempfile::tempdir;

    fn store(root: std::path::PathBuf) -> WorkspaceStore {
        WorkspaceStore::new(WorkspaceStoreConfig {
            workspace_root: root.clone(),
            repo: Arc::new(InMemoryRepo::at(root)),
            id_gen: Arc::new(MonotonicIdGenerator::new()),
            quotas: EffectiveQuotas::default(),
            org_id: OrgId::from("org-1"),
            org_storage_quota_bytes: 0,
            server_storage_quota_bytes: 0,
            usage: None,
        })
    }

    #[test]
    fn given_new_page_when_writing_then_read_back_matches() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        let id = NodeId(1);
        s.write_page(id, NodeId::ROOT, "T", "# C", &test_author(), None).unwrap();

        let page = s.read_page(id).unwrap();
        assert_eq!(page.id, id);
        assert_eq!(page.title, "T");
        assert_eq!(page.body.unwrap(), "\n\n# C");
    }

    #[test]
    fn given_existing_page_when_updating_then_title_changes_and_created_preserved() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        let id = NodeId(1);
        s.write_page(id, NodeId::ROOT, "T", "# C", &test_author(), None).unwrap();
        let before = s.read_page(id).unwrap();

        s.update_page(id, "U", "x", &test_author(), None).unwrap();
        let after = s.read_page(id).unwrap();

        assert_eq!(after.title, "U");
        assert_eq!(after.body.unwrap(), "\n\nx");
        assert_eq!(after.created, before.created);
        assert!(after.modified >= before.modified);
    }

    #[test]
    fn given_deleted_page_when_reading_then_not_found() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        let id = NodeId(1);
        s.write_page(id, NodeId::ROOT, "T", "# C", &test_author(), None).unwrap();
        s.delete_page(id, &test_author(), None).unwrap();

        let err = s.read_page(id).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }

    #[test]
    fn given_update_on_missing_page_then_not_found() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        let err = s.update_page(NodeId(42), "U", "x", &test_author(), None).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }
}
