use crate::error::StoreError;
use crate::ids::OrgId;

/// The aggregation surface `store-service` exposes back to a
/// `WorkspaceStore` so it can preflight organization- and server-layer
/// storage quotas without depending on `store-service` itself (spec.md
/// §4.6 `GetOrganizationUsage` / `GetServerUsage`).
pub trait UsageAggregator: Send + Sync {
    fn org_usage_bytes(&self, org_id: &OrgId) -> Result<u64, StoreError>;
    fn server_usage_bytes(&self) -> Result<u64, StoreError>;
}
