use std::fs;
use std::path::PathBuf;

use store_core::{Author, StoreError};
use tokio_util::sync::CancellationToken;

use crate::store::WorkspaceStore;

/// Fixed content for the workspace-root `AGENTS.md` (spec.md §4.1, §6):
/// committed once, on workspace initialization, and never rewritten by the
/// core afterward.
const AGENTS_MD: &str = "\
# AGENTS.md

This workspace is a versioned document-and-table store. Each top-level
directory under this one is a node, named by its numeric identifier:

- `index.md` — page content, if the node is a document (or hybrid)
- `metadata.json` — table schema, if the node is a table (or hybrid)
- `data.jsonl` — the table's append-only record log, created on first write
- any other file — an asset attached to the node

Nested directories are child nodes. Every mutation here is committed; use
the store's history API rather than editing these files by hand.
";

impl WorkspaceStore {
    /// `InitWorkspace(workspaceID)` (spec.md §4.6): writes the fixed
    /// `AGENTS.md` at the workspace root and commits it with the
    /// compat-critical message `initial: add AGENTS.md`. A no-op if
    /// `AGENTS.md` is already present — initialization only ever happens
    /// once per workspace.
    pub fn init_workspace(
        &self,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), StoreError> {
        let path = self.root.join("AGENTS.md");
        if path.is_file() {
            return Ok(());
        }

        let root = self.root.clone();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::create_dir_all(&root).map_err(|e| StoreError::io("create workspace root", e))?;
                fs::write(root.join("AGENTS.md"), AGENTS_MD)
                    .map_err(|e| StoreError::io("write AGENTS.md", e))?;
                Ok(("initial: add AGENTS.md".to_string(), vec![PathBuf::from("AGENTS.md")]))
            }),
        )
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

    fn store(root: PathBuf) -> WorkspaceStore {
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
    fn given_fresh_workspace_when_initializing_then_agents_md_is_written() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        s.init_workspace(&test_author(), None).unwrap();

        let content = std::fs::read_to_string(dir.path().join("AGENTS.md")).unwrap();
        assert!(content.contains("AGENTS.md"));
    }

    #[test]
    fn given_already_initialized_workspace_when_initializing_again_then_no_op() {
        let dir = tempdir().unwrap();
        let s = store(dir.path().to_path_buf());
        s.init_workspace(&test_author(), None).unwrap();
        let first_modified = std::fs::metadata(dir.path().join("AGENTS.md")).unwrap().modified().unwrap();

        s.init_workspace(&test_author(), None).unwrap();
        let second_modified = std::fs::metadata(dir.path().join("AGENTS.md")).unwrap().modified().unwrap();
        assert_eq!(first_modified, second_modified);
    }
}
