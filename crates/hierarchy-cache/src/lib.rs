//! Per-workspace `nodeID -> parentID` map, lazily built from the on-disk
//! directory tree (spec.md §4.5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::Context;
use store_core::NodeId;
use walkdir::WalkDir;

/// Guarded by a single `RwLock`: many concurrent readers, one writer at a
/// time for inserts, evictions, and full rebuilds.
pub struct HierarchyCache {
    workspace_root: PathBuf,
    map: RwLock<HashMap<NodeId, NodeId>>,
}

impl HierarchyCache {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up the cached parent of `id`, rebuilding from disk once on a
    /// miss before giving up.
    pub fn parent_of(&self, id: NodeId) -> anyhow::Result<Option<NodeId>> {
        if let Some(parent) = self.map.read().expect("hierarchy cache lock poisoned").get(&id).copied() {
            return Ok(Some(parent));
        }
        self.rebuild()?;
        Ok(self.map.read().expect("hierarchy cache lock poisoned").get(&id).copied())
    }

    pub fn insert(&self, id: NodeId, parent: NodeId) {
        self.map.write().expect("hierarchy cache lock poisoned").insert(id, parent);
    }

    pub fn evict(&self, id: NodeId) {
        self.map.write().expect("hierarchy cache lock poisoned").remove(&id);
    }

    /// Walks the workspace tree depth-first. Every directory whose name
    /// decodes as a `NodeId` is a node; its parent is the decoded name of
    /// its containing directory, or `NodeId::ROOT` if that directory is
    /// the workspace root.
    pub fn rebuild(&self) -> anyhow::Result<()> {
        let mut fresh = HashMap::new();

        for entry in WalkDir::new(&self.workspace_root).follow_links(false) {
            let entry = entry.with_context(|| "failed to traverse workspace tree")?;
            if !entry.file_type().is_dir() || entry.path() == self.workspace_root {
                continue;
            }

            let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<NodeId>().ok()) else {
                continue;
            };

            let parent_id = entry
                .path()
                .parent()
                .filter(|p| *p != self.workspace_root.as_path())
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<NodeId>().ok())
                .unwrap_or(NodeId::ROOT);

            fresh.insert(id, parent_id);
        }

        *self.map.write().expect("hierarchy cache lock poisoned") = fresh;
        Ok(())
    }
}
