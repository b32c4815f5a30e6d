mod error;
mod identity;
mod ids;
mod model;
mod quota;
mod repo;
mod usage;

pub use error::{StoreError, StoreErrorKind};
pub use identity::{IdentityService, Organization, Workspace};
pub use ids::{IdGenerator, MonotonicIdGenerator, NodeId, OrgId, RecordId, WorkspaceId};
pub use model::{
    is_reserved_asset_name, Asset, ColumnVisibility, DataRecord, FilterCombinator, FilterNode,
    FilterOperator, GroupSpec, Node, NodeType, Property, PropertyType, SelectOption, SortDirection,
    SortKey, TableSchema, View, ViewLayout, RESERVED_ASSET_NAMES,
};
pub use quota::{EffectiveQuotas, OrgQuotas, ServerQuotas, WorkspaceQuotas};
pub use repo::{Author, CommitFn, CommitInfo, CommitPayload, Repo};
pub use usage::UsageAggregator;
