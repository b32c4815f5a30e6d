//! The per-workspace façade (spec.md §4.1): page/table/record/asset
//! operations, each wrapped in a [`store_core::Repo::commit_tx`] envelope,
//! preflighted against the workspace's effective quotas.

mod asset;
mod create_node;
mod history;
mod init;
mod links;
mod page;
mod record;
mod store;
mod table;
mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use store::{WorkspaceStore, WorkspaceStoreConfig};
