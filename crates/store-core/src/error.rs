use std::path::PathBuf;

use thiserror::Error;

/// Coarse error classification shared across every entry point, so callers
/// can dispatch on `kind()` instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Validation,
    QuotaExceeded,
    IoFailure,
    VcsFailure,
    CorruptData,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("page not found: {id}")]
    PageNotFound { id: String },

    #[error("table not found: {id}")]
    TableNotFound { id: String },

    #[error("record not found: {id}")]
    RecordNotFound { id: String },

    #[error("asset not found: {name} on node {node_id}")]
    AssetNotFound { node_id: String, name: String },

    #[error("organization not found: {id}")]
    OrganizationNotFound { id: String },

    #[error("workspace not found: {id}")]
    WorkspaceNotFound { id: String },

    #[error("commit not found for hash {hash} at path {path}", path = path.display())]
    CommitNotFound { hash: String, path: PathBuf },

    #[error("invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("filename must not be empty")]
    EmptyFilename,

    #[error("filename is reserved: {name}")]
    ReservedFilename { name: String },

    #[error("record data must not be empty")]
    EmptyRecordData,

    #[error("parent node does not exist: {parent_id}")]
    ParentNotFound { parent_id: String },

    #[error("quota exceeded: {quota_name} (limit {limit}, requested total {requested})")]
    QuotaExceeded {
        quota_name: String,
        limit: u64,
        requested: u64,
    },

    #[error("I/O failure: {context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("VCS failure: {context}: {message}")]
    VcsFailure { context: String, message: String },

    #[error("corrupt data: {context}: {message}")]
    CorruptData { context: String, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::PageNotFound { .. }
            | Self::TableNotFound { .. }
            | Self::RecordNotFound { .. }
            | Self::AssetNotFound { .. }
            | Self::OrganizationNotFound { .. }
            | Self::WorkspaceNotFound { .. }
            | Self::CommitNotFound { .. } => StoreErrorKind::NotFound,

            Self::InvalidIdentifier { .. }
            | Self::EmptyTitle
            | Self::EmptyFilename
            | Self::ReservedFilename { .. }
            | Self::EmptyRecordData
            | Self::ParentNotFound { .. } => StoreErrorKind::Validation,

            Self::QuotaExceeded { .. } => StoreErrorKind::QuotaExceeded,
            Self::IoFailure { .. } => StoreErrorKind::IoFailure,
            Self::VcsFailure { .. } => StoreErrorKind::VcsFailure,
            Self::CorruptData { .. } => StoreErrorKind::CorruptData,
            Self::Cancelled => StoreErrorKind::IoFailure,
        }
    }

    /// Name of the quota dimension that was exceeded, if this is a
    /// quota-exceeded error. Lets callers distinguish without matching the
    /// enum, per spec.md's "callers may distinguish by the offending quota
    /// name in an attached field" contract.
    pub fn quota_name(&self) -> Option<&str> {
        match self {
            Self::QuotaExceeded { quota_name, .. } => Some(quota_name),
            _ => None,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }

    pub fn vcs(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VcsFailure {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn corrupt(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptData {
            context: context.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(error: anyhow::Error) -> Self {
        Self::VcsFailure {
            context: "adapter".to_string(),
            message: error.to_string(),
        }
    }
}
