//! Preflight quota checks (spec.md §4.7, "(a) quota failures occur before
//! any filesystem write"). Each function compares a *projected* post-write
//! total against an effective limit and returns a [`store_core::StoreError`]
//! naming the offending dimension so callers can distinguish by
//! [`StoreError::quota_name`] without matching the enum.

use store_core::{EffectiveQuotas, StoreError};

/// Generic preflight: `limit == 0` means "no constraint from this layer"
/// (spec.md §3's Effective quota rule), otherwise the projected total must
/// not exceed it.
fn preflight(quota_name: &str, limit: u64, projected_total: u64) -> Result<(), StoreError> {
    if EffectiveQuotas::within(limit, projected_total) {
        Ok(())
    } else {
        Err(StoreError::QuotaExceeded {
            quota_name: quota_name.to_string(),
            limit,
            requested: projected_total,
        })
    }
}

/// `CreateNode`/`WritePage` preflight: rejects the *next* page if it would
/// put the workspace's page count over `max_pages`.
pub fn check_page_count(effective: &EffectiveQuotas, pages_before_write: u64) -> Result<(), StoreError> {
    preflight("max_pages", effective.max_pages, pages_before_write + 1)
}

/// Storage-bytes preflight shared by every write path: `delta_bytes` is the
/// projected growth (new encoded size minus old, when an old size exists),
/// added to the workspace's current total usage.
pub fn check_storage_bytes(
    effective: &EffectiveQuotas,
    current_total_bytes: u64,
    delta_bytes: u64,
) -> Result<(), StoreError> {
    preflight(
        "max_storage_bytes",
        effective.max_storage_bytes,
        current_total_bytes.saturating_add(delta_bytes),
    )
}

/// `AppendRecord` preflight: rejects the append if it would put the
/// table's record count over `max_records_per_table`.
pub fn check_records_per_table(
    effective: &EffectiveQuotas,
    records_before_append: u64,
) -> Result<(), StoreError> {
    preflight(
        "max_records_per_table",
        effective.max_records_per_table,
        records_before_append + 1,
    )
}

/// `SaveAsset` preflight against the single-asset size ceiling.
pub fn check_single_asset_size(effective: &EffectiveQuotas, asset_size_bytes: u64) -> Result<(), StoreError> {
    preflight(
        "max_single_asset_size_bytes",
        effective.max_single_asset_size_bytes,
        asset_size_bytes,
    )
}

/// Organization- or server-layer storage preflight (spec.md §4.6
/// `CheckOrgStorageQuota` / `CheckServerStorageQuota`); `max_bytes == 0`
/// means that layer does not constrain storage.
pub fn check_aggregate_storage_bytes(
    quota_name: &str,
    max_bytes: u64,
    current_total_bytes: u64,
    add_bytes: u64,
) -> Result<(), StoreError> {
    preflight(quota_name, max_bytes, current_total_bytes.saturating_add(add_bytes))
}
