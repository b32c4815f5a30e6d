use std::fs;

use chrono::{DateTime, Utc};
use store_core::{Asset, Author, NodeId, StoreError};
use tokio_util::sync::CancellationToken;

use crate::store::WorkspaceStore;
use crate::validate::validate_asset_name;

impl WorkspaceStore {
    /// `SaveAsset(nodeID, name, bytes)` (spec.md §4.1, §4.4): writes a
    /// binary blob into the node's directory under its given name,
    /// preflighted against both the single-asset-size and workspace
    /// storage-bytes quotas.
    pub fn save_asset(
        &self,
        node_id: NodeId,
        name: &str,
        bytes: &[u8],
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<Asset, StoreError> {
        validate_asset_name(name)?;
        self.node_parent(node_id)?;

        let size = bytes.len() as u64;
        quota_policy::check_single_asset_size(&self.quotas, size)?;

        let dir_rel = self.node_dir_rel(node_id)?;
        let dir_abs = self.root.join(&dir_rel);
        let asset_path = dir_abs.join(name);

        let old_len = if asset_path.is_file() {
            fs::metadata(&asset_path)
                .map_err(|e| StoreError::io("stat asset", e))?
                .len()
        } else {
            0
        };
        self.preflight_storage_bytes(size.saturating_sub(old_len))?;

        let mime_type = mime_guess::from_path(name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let name_owned = name.to_string();
        let bytes_owned = bytes.to_vec();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::create_dir_all(&dir_abs).map_err(|e| StoreError::io("create node directory", e))?;
                fs::write(&asset_path, &bytes_owned).map_err(|e| StoreError::io("write asset", e))?;
                Ok((
                    format!("update: asset {name_owned}"),
                    vec![dir_rel.join(&name_owned)],
                ))
            }),
        )?;

        Ok(Asset {
            name: name.to_string(),
            mime_type,
            size,
            modified: Utc::now(),
        })
    }

    /// `IterAssets(nodeID)`: the non-reserved files directly inside the
    /// node's directory. A node with no directory on disk yields an empty
    /// list, not an error (spec.md §4.4 edge case).
    pub fn iter_assets(&self, node_id: NodeId) -> Result<Vec<Asset>, StoreError> {
        let dir_rel = match self.node_dir_rel(node_id) {
            Ok(rel) => rel,
            Err(e) if e.kind() == store_core::StoreErrorKind::Validation => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let dir_abs = self.root.join(&dir_rel);
        if !dir_abs.is_dir() {
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        for entry in fs::read_dir(&dir_abs).map_err(|e| StoreError::io("read node directory", e))? {
            let entry = entry.map_err(|e| StoreError::io("read node directory entry", e))?;
            if !entry.file_type().map_err(|e| StoreError::io("stat directory entry", e))?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if store_core::is_reserved_asset_name(&name) {
                continue;
            }
            let meta = entry.metadata().map_err(|e| StoreError::io("stat asset", e))?;
            let modified: DateTime<Utc> = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            assets.push(Asset {
                mime_type: mime_guess::from_path(&name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                size: meta.len(),
                modified,
                name,
            });
        }
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    /// `ReadAsset(nodeID, name)`: raw bytes of one asset.
    pub fn read_asset(&self, node_id: NodeId, name: &str) -> Result<Vec<u8>, StoreError> {
        let dir_rel = self.node_dir_rel(node_id)?;
        let asset_path = self.root.join(&dir_rel).join(name);
        if !asset_path.is_file() {
            return Err(StoreError::AssetNotFound {
                node_id: node_id.to_string(),
                name: name.to_string(),
            });
        }
        fs::read(&asset_path).map_err(|e| StoreError::io("read asset", e))
    }

    /// `DeleteAsset(nodeID, name)`.
    pub fn delete_asset(
        &self,
        node_id: NodeId,
        name: &str,
        author: &Author,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), StoreError> {
        let dir_rel = self.node_dir_rel(node_id)?;
        let asset_path = self.root.join(&dir_rel).join(name);
        if !asset_path.is_file() {
            return Err(StoreError::AssetNotFound {
                node_id: node_id.to_string(),
                name: name.to_string(),
            });
        }
        let name_owned = name.to_string();
        self.repo.commit_tx(
            author,
            cancel,
            Box::new(move || {
                fs::remove_file(&asset_path).map_err(|e| StoreError::io("remove asset", e))?;
                Ok((
                    format!("delete: asset {name_owned}"),
                    vec![dir_rel.join(&name_owned)],
                ))
            }),
        )
    }
}
