use store_core::{CommitInfo, NodeId, StoreError};

use crate::store::WorkspaceStore;

impl WorkspaceStore {
    /// `GetHistory(nodeID, n)` (spec.md §4.1, §4.5): the `n` most recent
    /// commits touching `nodeID`'s page content, newest first. Delegates to
    /// the injected [`store_core::Repo`]; this store keeps no history of
    /// its own.
    pub fn get_history(&self, node_id: NodeId, n: usize) -> Result<Vec<CommitInfo>, StoreError> {
        let dir_rel = self.node_dir_rel(node_id)?;
        self.repo.get_history(&dir_rel.join("index.md"), n)
    }

    /// `GetFileAtCommit(hash, path)`: raw bytes of `path` as committed at
    /// `hash`. `path` is workspace-root-relative, matching what
    /// `commit_tx` reports as touched.
    pub fn get_file_at_commit(&self, hash: &str, path: &std::path::Path) -> Result<Vec<u8>, StoreError> {
        self.repo.get_file_at_commit(hash, path)
    }
}
