use store_core::{is_reserved_asset_name, StoreError};

/// Validation happens before any filesystem or VCS work (spec.md §4.1),
/// independent of the commit envelope.
pub(crate) fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        Err(StoreError::EmptyTitle)
    } else {
        Ok(())
    }
}

pub(crate) fn validate_asset_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::EmptyFilename);
    }
    if is_reserved_asset_name(name) {
        return Err(StoreError::ReservedFilename {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn validate_record_data(
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), StoreError> {
    if data.is_empty() {
        Err(StoreError::EmptyRecordData)
    } else {
        Ok(())
    }
}
