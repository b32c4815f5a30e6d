use serde::{Deserialize, Serialize};

/// Server-layer quota: zero means "no constraint from this layer" per
/// spec.md §3's "Effective quota" rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerQuotas {
    pub max_total_storage_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgQuotas {
    pub max_workspaces: u64,
    pub max_members: u64,
    pub max_total_storage_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceQuotas {
    pub max_pages: u64,
    pub max_storage_mb: u64,
    pub max_records_per_table: u64,
    pub max_single_asset_size_mb: u64,
}

impl WorkspaceQuotas {
    pub fn max_storage_bytes(&self) -> u64 {
        self.max_storage_mb.saturating_mul(1024 * 1024)
    }

    pub fn max_single_asset_size_bytes(&self) -> u64 {
        self.max_single_asset_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Take the elementwise minimum of the three quota layers, treating zero at
/// any one layer as "unset at that layer" rather than "zero allowed" (spec.md
/// §3's glossary entry for "Effective quota").
fn effective(values: &[u64]) -> u64 {
    let mut result: Option<u64> = None;
    for &v in values {
        if v == 0 {
            continue;
        }
        result = Some(match result {
            Some(current) => current.min(v),
            None => v,
        });
    }
    result.unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveQuotas {
    pub max_pages: u64,
    pub max_storage_bytes: u64,
    pub max_records_per_table: u64,
    pub max_single_asset_size_bytes: u64,
}

impl EffectiveQuotas {
    pub fn compute(
        server: &ServerQuotas,
        org: &OrgQuotas,
        workspace: &WorkspaceQuotas,
    ) -> Self {
        Self {
            max_pages: effective(&[workspace.max_pages]),
            max_storage_bytes: effective(&[
                server.max_total_storage_bytes,
                org.max_total_storage_bytes,
                workspace.max_storage_bytes(),
            ]),
            max_records_per_table: effective(&[workspace.max_records_per_table]),
            max_single_asset_size_bytes: effective(&[workspace.max_single_asset_size_bytes()]),
        }
    }

    /// `0` means "no constraint"; anything else is the binding limit.
    pub fn within(limit: u64, projected_total: u64) -> bool {
        limit == 0 || projected_total <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_all_layers_unset_when_computing_effective_then_zero() {
        let effective = EffectiveQuotas::compute(
            &ServerQuotas::default(),
            &OrgQuotas::default(),
            &WorkspaceQuotas::default(),
        );
        assert_eq!(effective.max_storage_bytes, 0);
        assert!(EffectiveQuotas::within(effective.max_storage_bytes, u64::MAX));
    }

    #[test]
    fn given_mixed_layers_when_computing_effective_then_takes_min_of_set_layers() {
        // Server caps total storage tighter than the workspace's own
        // max_storage_mb, so the server layer is the binding minimum.
        let server = ServerQuotas {
            max_total_storage_bytes: 1_000_000,
        };
        let org = OrgQuotas {
            max_workspaces: 10,
            max_members: 5,
            max_total_storage_bytes: 0,
        };
        let workspace = WorkspaceQuotas {
            max_pages: 2,
            max_storage_mb: 1,
            max_records_per_table: 100,
            max_single_asset_size_mb: 10,
        };
        let effective = EffectiveQuotas::compute(&server, &org, &workspace);
        assert_eq!(effective.max_storage_bytes, 1_000_000);
        assert_eq!(effective.max_pages, 2);
        assert_eq!(effective.max_records_per_table, 100);
        assert_eq!(effective.max_single_asset_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn given_workspace_page_quota_of_two_when_checking_boundary_then_third_page_rejected() {
        let effective = EffectiveQuotas {
            max_pages: 2,
            ..Default::default()
        };
        assert!(EffectiveQuotas::within(effective.max_pages, 1));
        assert!(EffectiveQuotas::within(effective.max_pages, 2));
        assert!(!EffectiveQuotas::within(effective.max_pages, 3));
    }
}
