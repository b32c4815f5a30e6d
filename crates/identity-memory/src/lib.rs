//! In-memory reference [`IdentityService`] (spec.md §1): an
//! Organization/Workspace registry the core consumes as an external
//! collaborator. Modeled on the teacher's `app-storage::vault` registry
//! CRUD, with a `HashMap` standing in for the sqlite table.

use std::collections::HashMap;
use std::sync::RwLock;

use store_core::{
    IdentityService, OrgId, OrgQuotas, Organization, ServerQuotas, StoreError, Workspace,
    WorkspaceId, WorkspaceQuotas,
};

struct Registry {
    orgs: HashMap<OrgId, Organization>,
    workspaces: HashMap<WorkspaceId, Workspace>,
}

/// An in-process identity registry, guarded by a single `RwLock`. Not
/// persisted: a fresh process starts with an empty registry and relies on
/// the caller to re-register organizations and workspaces on startup.
pub struct InMemoryIdentityService {
    registry: RwLock<Registry>,
    server_quotas: ServerQuotas,
}

impl InMemoryIdentityService {
    pub fn new(server_quotas: ServerQuotas) -> Self {
        Self {
            registry: RwLock::new(Registry {
                orgs: HashMap::new(),
                workspaces: HashMap::new(),
            }),
            server_quotas,
        }
    }

    pub fn register_org(&self, id: OrgId, name: impl Into<String>, quotas: OrgQuotas) {
        let mut registry = self.registry.write().expect("identity registry lock poisoned");
        registry.orgs.insert(
            id.clone(),
            Organization {
                id,
                name: name.into(),
                quotas,
            },
        );
    }

    pub fn register_workspace(
        &self,
        id: WorkspaceId,
        org_id: OrgId,
        name: impl Into<String>,
        quotas: WorkspaceQuotas,
    ) {
        let mut registry = self.registry.write().expect("identity registry lock poisoned");
        registry.workspaces.insert(
            id.clone(),
            Workspace {
                id,
                org_id,
                name: name.into(),
                quotas,
            },
        );
    }

    pub fn update_workspace_quotas(&self, id: &WorkspaceId, quotas: WorkspaceQuotas) -> Result<(), StoreError> {
        let mut registry = self.registry.write().expect("identity registry lock poisoned");
        let workspace = registry
            .workspaces
            .get_mut(id)
            .ok_or_else(|| StoreError::WorkspaceNotFound { id: id.to_string() })?;
        workspace.quotas = quotas;
        Ok(())
    }

    pub fn remove_workspace(&self, id: &WorkspaceId) {
        self.registry
            .write()
            .expect("identity registry lock poisoned")
            .workspaces
            .remove(id);
    }
}

impl IdentityService for InMemoryIdentityService {
    fn get_org(&self, id: &OrgId) -> Result<Organization, StoreError> {
        self.registry
            .read()
            .expect("identity registry lock poisoned")
            .orgs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::OrganizationNotFound { id: id.to_string() })
    }

    fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace, StoreError> {
        self.registry
            .read()
            .expect("identity registry lock poisoned")
            .workspaces
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::WorkspaceNotFound { id: id.to_string() })
    }

    fn iter_workspaces_by_org(&self, org_id: &OrgId) -> Result<Vec<Workspace>, StoreError> {
        Ok(self
            .registry
            .read()
            .expect("identity registry lock poisoned")
            .workspaces
            .values()
            .filter(|w| &w.org_id == org_id)
            .cloned()
            .collect())
    }

    fn server_quotas(&self) -> ServerQuotas {
        self.server_quotas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn workspace_id() -> WorkspaceId {
        WorkspaceId::from(Uuid::new_v4().to_string())
    }

    #[test]
    fn given_registered_org_when_getting_then_returns_it() {
        let service = InMemoryIdentityService::new(ServerQuotas::default());
        let org_id = OrgId::from("org-1");
        service.register_org(org_id.clone(), "Acme", OrgQuotas::default());

        let org = service.get_org(&org_id).unwrap();
        assert_eq!(org.name, "Acme");
    }

    #[test]
    fn given_unknown_org_when_getting_then_not_found() {
        let service = InMemoryIdentityService::new(ServerQuotas::default());
        let err = service.get_org(&OrgId::from("missing")).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }

    #[test]
    fn given_workspaces_in_two_orgs_when_iterating_by_org_then_only_matching_returned() {
        let service = InMemoryIdentityService::new(ServerQuotas::default());
        let org_a = OrgId::from("org-a");
        let org_b = OrgId::from("org-b");
        let w1 = workspace_id();
        let w2 = workspace_id();
        service.register_workspace(w1.clone(), org_a.clone(), "W1", WorkspaceQuotas::default());
        service.register_workspace(w2, org_b, "W2", WorkspaceQuotas::default());

        let workspaces = service.iter_workspaces_by_org(&org_a).unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].id, w1);
    }

    #[test]
    fn given_updated_quotas_when_getting_workspace_then_reflects_update() {
        let service = InMemoryIdentityService::new(ServerQuotas::default());
        let id = workspace_id();
        service.register_workspace(id.clone(), OrgId::from("org-1"), "W", WorkspaceQuotas::default());

        let mut quotas = WorkspaceQuotas::default();
        quotas.max_pages = 5;
        service.update_workspace_quotas(&id, quotas).unwrap();

        assert_eq!(service.get_workspace(&id).unwrap().quotas.max_pages, 5);
    }

    #[test]
    fn given_removed_workspace_when_getting_then_not_found() {
        let service = InMemoryIdentityService::new(ServerQuotas::default());
        let id = workspace_id();
        service.register_workspace(id.clone(), OrgId::from("org-1"), "W", WorkspaceQuotas::default());
        service.remove_workspace(&id);

        let err = service.get_workspace(&id).unwrap_err();
        assert_eq!(err.kind(), store_core::StoreErrorKind::NotFound);
    }
}
