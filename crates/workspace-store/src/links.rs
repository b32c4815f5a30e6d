use std::fs;

use store_core::{NodeId, StoreError};
use walkdir::WalkDir;

use crate::store::WorkspaceStore;

impl WorkspaceStore {
    /// Rebuilds the optional backlink index (spec.md §2 "Link Cache
    /// (optional)") from every `index.md` currently on disk. Not wired
    /// into any mutation path — callers refresh it explicitly, e.g. after
    /// a batch of page writes, the way the hierarchy cache is refreshed
    /// lazily rather than on every write.
    pub fn refresh_link_cache(&self) -> Result<(), StoreError> {
        let mut pages = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| StoreError::io("walk workspace for link scan", e.into()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<NodeId>().ok()) else {
                continue;
            };
            let index_path = entry.path().join("index.md");
            if !index_path.is_file() {
                continue;
            }
            let raw = fs::read_to_string(&index_path).map_err(|e| StoreError::io("read index.md", e))?;
            let (fm, body) = markdown_page::decode(&raw, &id.to_string());
            pages.push((id, fm.title, body));
        }

        let sources: Vec<link_cache::LinkSource<'_>> = pages
            .iter()
            .map(|(id, title, body)| link_cache::LinkSource {
                id: *id,
                title: title.as_str(),
                body: body.as_str(),
            })
            .collect();
        self.link_cache.rebuild(&sources);
        Ok(())
    }

    /// Nodes whose body links to `id`, per the most recent
    /// [`Self::refresh_link_cache`] call.
    pub fn backlinks(&self, id: NodeId) -> Vec<NodeId> {
        self.link_cache.backlinks(id)
    }
}
