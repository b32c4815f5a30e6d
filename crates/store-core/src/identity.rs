use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{OrgId, WorkspaceId};
use crate::quota::{OrgQuotas, ServerQuotas, WorkspaceQuotas};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub quotas: OrgQuotas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub org_id: OrgId,
    pub name: String,
    pub quotas: WorkspaceQuotas,
}

/// The external identity service the core consumes but does not own, per
/// spec.md §1. `identity-memory` ships one reference implementation.
pub trait IdentityService: Send + Sync {
    fn get_org(&self, id: &OrgId) -> Result<Organization, StoreError>;
    fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace, StoreError>;
    fn iter_workspaces_by_org(&self, org_id: &OrgId) -> Result<Vec<Workspace>, StoreError>;
    fn server_quotas(&self) -> ServerQuotas;
}
