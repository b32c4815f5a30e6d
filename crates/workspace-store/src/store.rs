use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use hierarchy_cache::HierarchyCache;
use link_cache::LinkCache;
use record_log::RecordLog;
use store_core::{
    EffectiveQuotas, IdGenerator, NodeId, OrgId, Repo, StoreError, UsageAggregator,
};
use walkdir::WalkDir;

/// Construction input for a [`WorkspaceStore`] (spec.md §9's note on
/// preferring named input structs over positional args, mirroring the
/// teacher's `CreateNoteInput`).
pub struct WorkspaceStoreConfig {
    pub workspace_root: PathBuf,
    pub repo: Arc<dyn Repo>,
    pub id_gen: Arc<dyn IdGenerator>,
    pub quotas: EffectiveQuotas,
    pub org_id: OrgId,
    /// Org-layer storage ceiling; `0` means unset at that layer.
    pub org_storage_quota_bytes: u64,
    /// Server-layer storage ceiling; `0` means unset at that layer.
    pub server_storage_quota_bytes: u64,
    /// Only required when either aggregate quota above is non-zero.
    pub usage: Option<Arc<dyn UsageAggregator>>,
}

/// One workspace's filesystem tree, VCS binding, and quota snapshot
/// (spec.md §4.1). Owns the directory exclusively: the spec's concurrency
/// model (§5) forbids sharing the path across processes or instances.
pub struct WorkspaceStore {
    pub(crate) root: PathBuf,
    pub(crate) repo: Arc<dyn Repo>,
    pub(crate) id_gen: Arc<dyn IdGenerator>,
    pub(crate) quotas: EffectiveQuotas,
    pub(crate) org_id: OrgId,
    pub(crate) org_storage_quota_bytes: u64,
    pub(crate) server_storage_quota_bytes: u64,
    pub(crate) usage: Option<Arc<dyn UsageAggregator>>,
    pub(crate) hierarchy: HierarchyCache,
    pub(crate) link_cache: LinkCache,
    pub(crate) record_logs: RwLock<HashMap<NodeId, Arc<RecordLog>>>,
}

impl WorkspaceStore {
    pub fn new(config: WorkspaceStoreConfig) -> Self {
        Self {
            hierarchy: HierarchyCache::new(config.workspace_root.clone()),
            link_cache: LinkCache::new(),
            root: config.workspace_root,
            repo: config.repo,
            id_gen: config.id_gen,
            quotas: config.quotas,
            org_id: config.org_id,
            org_storage_quota_bytes: config.org_storage_quota_bytes,
            server_storage_quota_bytes: config.server_storage_quota_bytes,
            usage: config.usage,
            record_logs: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hierarchy(&self) -> &HierarchyCache {
        &self.hierarchy
    }

    pub fn link_cache(&self) -> &LinkCache {
        &self.link_cache
    }

    /// Absolute path to `id`'s node directory, whether or not it exists yet.
    pub(crate) fn node_dir_abs(&self, id: NodeId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(self.node_dir_rel(id)?))
    }

    /// Path, relative to the workspace root, built by walking the
    /// hierarchy cache up to the root (spec.md §4.1 "Directory layout").
    pub(crate) fn node_dir_rel(&self, id: NodeId) -> Result<PathBuf, StoreError> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let parent = self
                .hierarchy
                .parent_of(current)
                .map_err(|e| StoreError::io("hierarchy lookup", to_io_error(e)))?
                .ok_or_else(|| StoreError::InvalidIdentifier {
                    reason: format!("unknown node: {current}"),
                })?;
            if parent.is_root() {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Ok(chain.iter().map(|id| id.to_string()).collect())
    }

    /// Path for a not-yet-created node `id` directly under `parent_id`.
    pub(crate) fn new_node_dir_rel(&self, parent_id: NodeId, id: NodeId) -> Result<PathBuf, StoreError> {
        if parent_id.is_root() {
            Ok(PathBuf::from(id.to_string()))
        } else {
            self.ensure_parent_exists(parent_id)?;
            Ok(self.node_dir_rel(parent_id)?.join(id.to_string()))
        }
    }

    pub(crate) fn ensure_parent_exists(&self, parent_id: NodeId) -> Result<(), StoreError> {
        if parent_id.is_root() {
            return Ok(());
        }
        let exists = self
            .hierarchy
            .parent_of(parent_id)
            .map_err(|e| StoreError::io("hierarchy lookup", to_io_error(e)))?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(StoreError::ParentNotFound {
                parent_id: parent_id.to_string(),
            })
        }
    }

    /// Number of nodes with an `index.md` on disk right now (document or
    /// hybrid), used for the `max_pages` quota preflight.
    pub(crate) fn count_pages(&self) -> Result<u64, StoreError> {
        let mut count = 0u64;
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| StoreError::io("walk workspace for page count", e.into()))?;
            if entry.file_type().is_dir() && entry.path().join("index.md").is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Total bytes this workspace's tree occupies right now.
    pub(crate) fn current_storage_bytes(&self) -> Result<u64, StoreError> {
        dir_size(&self.root)
    }

    /// Storage-bytes preflight across all three layers (spec.md §4.6):
    /// workspace always, organization/server only when their quota is set.
    pub(crate) fn preflight_storage_bytes(&self, delta_bytes: u64) -> Result<(), StoreError> {
        let current = self.current_storage_bytes()?;
        quota_policy::check_storage_bytes(&self.quotas, current, delta_bytes)?;

        if self.org_storage_quota_bytes > 0 {
            if let Some(usage) = &self.usage {
                let org_current = usage.org_usage_bytes(&self.org_id)?;
                quota_policy::check_aggregate_storage_bytes(
                    "org_max_total_storage_bytes",
                    self.org_storage_quota_bytes,
                    org_current,
                    delta_bytes,
                )?;
            }
        }

        if self.server_storage_quota_bytes > 0 {
            if let Some(usage) = &self.usage {
                let server_current = usage.server_usage_bytes()?;
                quota_policy::check_aggregate_storage_bytes(
                    "server_max_total_storage_bytes",
                    self.server_storage_quota_bytes,
                    server_current,
                    delta_bytes,
                )?;
            }
        }

        Ok(())
    }

    /// The record log for `table_id`, opened lazily and cached for the
    /// lifetime of this `WorkspaceStore` (spec.md §5: never persisted
    /// across restarts, rebuilt on first access per process lifetime).
    pub(crate) fn record_log(&self, table_id: NodeId) -> Result<Arc<RecordLog>, StoreError> {
        if let Some(log) = self
            .record_logs
            .read()
            .expect("record log cache lock poisoned")
            .get(&table_id)
        {
            return Ok(log.clone());
        }

        let dir = self.node_dir_abs(table_id)?;
        let log = Arc::new(RecordLog::open(dir.join("data.jsonl")));
        let mut logs = self.record_logs.write().expect("record log cache lock poisoned");
        Ok(logs.entry(table_id).or_insert(log).clone())
    }
}

pub(crate) fn to_io_error(error: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, error.to_string())
}

pub(crate) fn dir_size(root: &Path) -> Result<u64, StoreError> {
    if !root.exists() {
        return Ok(0);
    }
    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| StoreError::io("walk workspace for size", e.into()))?;
        if entry.file_type().is_file() {
            total += fs::metadata(entry.path())
                .map_err(|e| StoreError::io("stat workspace file", e))?
                .len();
        }
    }
    Ok(total)
}
