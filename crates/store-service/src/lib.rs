//! Cross-workspace registry (spec.md §4.6): resolves and caches one
//! [`WorkspaceStore`] per workspace, computes each workspace's effective
//! quotas from [`IdentityService`], and aggregates storage usage up to the
//! organization and server layers. Modeled on the teacher's
//! `app-storage::vault` get-or-create-then-cache registry, generalized
//! from a sqlite row to an in-process `WorkspaceStore` cache guarded by
//! `parking_lot`'s double-checked-lock pattern.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use store_core::{
    Author, EffectiveQuotas, IdGenerator, IdentityService, OrgId, Repo, StoreError, StoreErrorKind,
    UsageAggregator, WorkspaceId,
};
use walkdir::WalkDir;
use workspace_store::{WorkspaceStore, WorkspaceStoreConfig};

/// Opens (or initializes) the [`Repo`] backing one workspace's directory.
/// Kept as an injected trait so `store-service` does not depend on a
/// concrete VCS backend (`vcs-git` implements this in terms of `git2`).
pub trait RepoFactory: Send + Sync {
    fn open(&self, root: &Path) -> Result<Arc<dyn Repo>, StoreError>;
}

pub struct StoreServiceConfig {
    /// Directory under which every workspace gets its own subdirectory
    /// named by its [`WorkspaceId`].
    pub base_dir: PathBuf,
    pub identity: Arc<dyn IdentityService>,
    pub repo_factory: Arc<dyn RepoFactory>,
    pub id_gen: Arc<dyn IdGenerator>,
}

/// Resolves and caches [`WorkspaceStore`]s, and serves as the
/// [`UsageAggregator`] a `WorkspaceStore` consults for org/server storage
/// preflights (spec.md §4.6).
pub struct StoreService {
    base_dir: PathBuf,
    identity: Arc<dyn IdentityService>,
    repo_factory: Arc<dyn RepoFactory>,
    id_gen: Arc<dyn IdGenerator>,
    stores: RwLock<std::collections::HashMap<WorkspaceId, Arc<WorkspaceStore>>>,
    /// Set only by [`Self::new_arc`]; lets `build_store` hand each
    /// `WorkspaceStore` a handle back to this service as its
    /// [`UsageAggregator`] for org/server storage preflights.
    self_weak: Weak<StoreService>,
}

impl StoreService {
    pub fn new(config: StoreServiceConfig) -> Self {
        Self {
            base_dir: config.base_dir,
            identity: config.identity,
            repo_factory: config.repo_factory,
            id_gen: config.id_gen,
            stores: RwLock::new(std::collections::HashMap::new()),
            self_weak: Weak::new(),
        }
    }

    /// Constructs a `StoreService` that wires itself in as the
    /// [`UsageAggregator`] each `WorkspaceStore` it builds uses for
    /// org/server storage preflights (spec.md §4.6). Prefer this over
    /// [`Self::new`] whenever org or server storage quotas are in play.
    pub fn new_arc(config: StoreServiceConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            base_dir: config.base_dir,
            identity: config.identity,
            repo_factory: config.repo_factory,
            id_gen: config.id_gen,
            stores: RwLock::new(std::collections::HashMap::new()),
            self_weak: weak.clone(),
        })
    }

    pub fn workspace_root(&self, workspace_id: &WorkspaceId) -> PathBuf {
        self.base_dir.join(&workspace_id.0)
    }

    /// `GetWorkspaceStore(workspaceID)` (spec.md §4.6): returns the cached
    /// store if present, otherwise builds one from the identity service's
    /// current quotas and caches it. Double-checked: the cheap read-lock
    /// path handles the common warm-cache case.
    pub fn get_workspace_store(&self, workspace_id: &WorkspaceId) -> Result<Arc<WorkspaceStore>, StoreError> {
        if let Some(store) = self.stores.read().get(workspace_id) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write();
        if let Some(store) = stores.get(workspace_id) {
            return Ok(store.clone());
        }

        let store = Arc::new(self.build_store(workspace_id)?);
        stores.insert(workspace_id.clone(), store.clone());
        Ok(store)
    }

    fn build_store(&self, workspace_id: &WorkspaceId) -> Result<WorkspaceStore, StoreError> {
        let workspace = self.identity.get_workspace(workspace_id)?;
        let org = self.identity.get_org(&workspace.org_id)?;
        let server_quotas = self.identity.server_quotas();
        let quotas = EffectiveQuotas::compute(&server_quotas, &org.quotas, &workspace.quotas);

        let root = self.workspace_root(workspace_id);
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io("create workspace root", e))?;
        let repo = self.repo_factory.open(&root)?;

        Ok(WorkspaceStore::new(WorkspaceStoreConfig {
            workspace_root: root,
            repo,
            id_gen: self.id_gen.clone(),
            quotas,
            org_id: workspace.org_id,
            org_storage_quota_bytes: org.quotas.max_total_storage_bytes,
            server_storage_quota_bytes: server_quotas.max_total_storage_bytes,
            usage: self.self_weak.upgrade().map(|svc| svc as Arc<dyn UsageAggregator>),
        }))
    }

    /// `InvalidateWorkspaceStore(workspaceID)`: evicts one cached store,
    /// e.g. after its quotas change in the identity service.
    pub fn invalidate_workspace_store(&self, workspace_id: &WorkspaceId) {
        self.stores.write().remove(workspace_id);
    }

    /// `InvalidateAllStores()`.
    pub fn invalidate_all_stores(&self) {
        self.stores.write().clear();
    }

    /// `InitWorkspace(workspaceID)` (spec.md §4.6): ensures the workspace's
    /// root directory and VCS binding exist, warms the cache, and writes +
    /// commits the fixed `AGENTS.md` via [`WorkspaceStore::init_workspace`]
    /// with the compat-critical message `initial: add AGENTS.md`. Safe to
    /// call more than once; the `AGENTS.md` commit only happens the first
    /// time.
    pub fn init_workspace(&self, workspace_id: &WorkspaceId) -> Result<Arc<WorkspaceStore>, StoreError> {
        let store = self.get_workspace_store(workspace_id)?;
        store.init_workspace(&Author::system(), None)?;
        Ok(store)
    }

    /// `GetOrganizationUsage(orgID)` (spec.md §4.6): sums the on-disk size
    /// of every workspace belonging to `org_id`.
    pub fn get_organization_usage(&self, org_id: &OrgId) -> Result<u64, StoreError> {
        let workspaces = self.identity.iter_workspaces_by_org(org_id)?;
        let mut total = 0u64;
        for workspace in workspaces {
            total += dir_size(&self.workspace_root(&workspace.id))?;
        }
        Ok(total)
    }

    /// `GetServerUsage()`: total bytes across every workspace root on this
    /// server, regardless of organization.
    pub fn get_server_usage(&self) -> Result<u64, StoreError> {
        dir_size(&self.base_dir)
    }

    /// `CheckOrgStorageQuota(orgID, addBytes)`.
    pub fn check_org_storage_quota(&self, org_id: &OrgId, add_bytes: u64) -> Result<(), StoreError> {
        let org = self.identity.get_org(org_id)?;
        if org.quotas.max_total_storage_bytes == 0 {
            return Ok(());
        }
        let current = self.get_organization_usage(org_id)?;
        quota_policy::check_aggregate_storage_bytes(
            "org_max_total_storage_bytes",
            org.quotas.max_total_storage_bytes,
            current,
            add_bytes,
        )
    }

    /// `CheckServerStorageQuota(addBytes)`.
    pub fn check_server_storage_quota(&self, add_bytes: u64) -> Result<(), StoreError> {
        let limit = self.identity.server_quotas().max_total_storage_bytes;
        if limit == 0 {
            return Ok(());
        }
        let current = self.get_server_usage()?;
        quota_policy::check_aggregate_storage_bytes("server_max_total_storage_bytes", limit, current, add_bytes)
    }
}

impl UsageAggregator for StoreService {
    fn org_usage_bytes(&self, org_id: &OrgId) -> Result<u64, StoreError> {
        self.get_organization_usage(org_id)
    }

    fn server_usage_bytes(&self) -> Result<u64, StoreError> {
        self.get_server_usage()
    }
}

fn dir_size(root: &Path) -> Result<u64, StoreError> {
    if !root.exists() {
        return Ok(0);
    }
    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| StoreError::io("walk for size", e.into()))?;
        if entry.file_type().is_file() {
            total += std::fs::metadata(entry.path())
                .map_err(|e| StoreError::io("stat file", e))?
                .len();
        }
    }
    Ok(total)
}

/// True if `error` represents a workspace that is simply not yet known to
/// the identity service (as opposed to a hard failure).
pub fn is_unknown_workspace(error: &StoreError) -> bool {
    error.kind() == StoreErrorKind::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity_memory::InMemoryIdentityService;
    use store_core::{Author, CommitFn, CommitInfo, MonotonicIdGenerator, OrgQuotas, ServerQuotas, WorkspaceQuotas};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    struct NullRepo {
        root: PathBuf,
        messages: std::sync::Mutex<Vec<String>>,
    }

    impl Repo for NullRepo {
        fn commit_tx(
            &self,
            _author: &Author,
            _cancel: Option<&CancellationToken>,
            f: CommitFn<'_>,
        ) -> Result<(), StoreError> {
            let (message, _touched) = f()?;
            self.messages.lock().expect("messages lock poisoned").push(message);
            Ok(())
        }

        fn get_history(&self, _path: &Path, _n: usize) -> Result<Vec<CommitInfo>, StoreError> {
            Ok(Vec::new())
        }

        fn get_file_at_commit(&self, hash: &str, path: &Path) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::CommitNotFound {
                hash: hash.to_string(),
                path: path.to_path_buf(),
            })
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    struct NullRepoFactory;

    impl RepoFactory for NullRepoFactory {
        fn open(&self, root: &Path) -> Result<Arc<dyn Repo>, StoreError> {
            Ok(Arc::new(NullRepo {
                root: root.to_path_buf(),
                messages: std::sync::Mutex::new(Vec::new()),
            }))
        }
    }

    fn service(base_dir: PathBuf, identity: Arc<InMemoryIdentityService>) -> StoreService {
        StoreService::new(StoreServiceConfig {
            base_dir,
            identity,
            repo_factory: Arc::new(NullRepoFactory),
            id_gen: Arc::new(MonotonicIdGenerator::new()),
        })
    }

    #[test]
    fn given_registered_workspace_when_getting_store_twice_then_same_instance_cached() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W",
            WorkspaceQuotas::default(),
        );
        let svc = service(dir.path().to_path_buf(), identity);

        let first = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        let second = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn given_unknown_workspace_when_getting_store_then_not_found() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        let svc = service(dir.path().to_path_buf(), identity);

        let err = svc.get_workspace_store(&WorkspaceId::from("missing")).unwrap_err();
        assert!(is_unknown_workspace(&err));
    }

    #[test]
    fn given_cached_store_when_invalidated_then_next_get_rebuilds() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W",
            WorkspaceQuotas::default(),
        );
        let svc = service(dir.path().to_path_buf(), identity);

        let first = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        svc.invalidate_workspace_store(&WorkspaceId::from("ws-1"));
        let second = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn given_two_workspaces_in_same_org_when_getting_org_usage_then_sums_both() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W1",
            WorkspaceQuotas::default(),
        );
        identity.register_workspace(
            WorkspaceId::from("ws-2"),
            OrgId::from("org-1"),
            "W2",
            WorkspaceQuotas::default(),
        );
        let svc = service(dir.path().to_path_buf(), identity);

        let s1 = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        s1.create_node(
            "N",
            store_core::NodeType::Document,
            store_core::NodeId::ROOT,
            &Author::new("a", "a@example.com"),
            None,
        )
        .unwrap();

        let usage = svc.get_organization_usage(&OrgId::from("org-1")).unwrap();
        assert!(usage > 0);
    }

    #[test]
    fn given_new_arc_service_when_org_quota_tight_then_workspace_store_rejects_write() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(
            OrgId::from("org-1"),
            "Acme",
            OrgQuotas {
                max_total_storage_bytes: 1,
                ..Default::default()
            },
        );
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W",
            WorkspaceQuotas::default(),
        );
        let svc = StoreService::new_arc(StoreServiceConfig {
            base_dir: dir.path().to_path_buf(),
            identity,
            repo_factory: Arc::new(NullRepoFactory),
            id_gen: Arc::new(MonotonicIdGenerator::new()),
        });

        let store = svc.get_workspace_store(&WorkspaceId::from("ws-1")).unwrap();
        let err = store
            .create_node(
                "N",
                store_core::NodeType::Document,
                store_core::NodeId::ROOT,
                &Author::new("a", "a@example.com"),
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::QuotaExceeded);
    }

    #[test]
    fn given_zero_org_quota_when_checking_then_unconstrained() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        let svc = service(dir.path().to_path_buf(), identity);

        assert!(svc.check_org_storage_quota(&OrgId::from("org-1"), u64::MAX / 2).is_ok());
    }

    #[test]
    fn given_new_workspace_when_initializing_then_agents_md_committed_with_template_message() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W",
            WorkspaceQuotas::default(),
        );
        let svc = service(dir.path().to_path_buf(), identity);

        let store = svc.init_workspace(&WorkspaceId::from("ws-1")).unwrap();
        assert!(store.root().join("AGENTS.md").is_file());
    }

    #[test]
    fn given_workspace_initialized_twice_then_agents_md_commit_happens_once() {
        let dir = tempdir().unwrap();
        let identity = Arc::new(InMemoryIdentityService::new(ServerQuotas::default()));
        identity.register_org(OrgId::from("org-1"), "Acme", OrgQuotas::default());
        identity.register_workspace(
            WorkspaceId::from("ws-1"),
            OrgId::from("org-1"),
            "W",
            WorkspaceQuotas::default(),
        );
        let svc = service(dir.path().to_path_buf(), identity);

        svc.init_workspace(&WorkspaceId::from("ws-1")).unwrap();
        let store = svc.init_workspace(&WorkspaceId::from("ws-1")).unwrap();
        assert!(store.root().join("AGENTS.md").is_file());
    }
}
