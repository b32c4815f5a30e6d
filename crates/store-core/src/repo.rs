use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// The author attributed to commits the core makes on its own behalf
    /// rather than a caller's (e.g. `InitWorkspace`'s `AGENTS.md` commit).
    pub fn system() -> Self {
        Self::new("store-service", "store-service@localhost")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: Author,
    pub time: DateTime<Utc>,
}

/// What a `CommitTx` closure hands back to the adapter: the commit message
/// and the set of paths (relative to the repo root) to stage.
pub type CommitPayload = (String, Vec<PathBuf>);

/// The staged-write closure passed to `Repo::commit_tx`. Modeled as a
/// builder that *returns* the commit payload rather than as a callback that
/// the adapter must drive interactively, per spec.md §9's note that this
/// avoids callbacks across the VCS boundary while keeping the same
/// all-or-nothing staging contract.
pub type CommitFn<'a> = Box<dyn FnOnce() -> Result<CommitPayload, StoreError> + 'a>;

/// The VCS adapter contract (spec.md §6). Any type implementing this trait
/// may back a `WorkspaceStore`; `vcs-git` ships a `git2`-backed reference
/// implementation.
pub trait Repo: Send + Sync {
    /// Runs `f`, stages the paths it returns, and commits with `author`.
    /// Rolls back all staged changes if `f` errors or the commit itself
    /// fails. Must honor `cancel` cooperatively.
    fn commit_tx(
        &self,
        author: &Author,
        cancel: Option<&CancellationToken>,
        f: CommitFn<'_>,
    ) -> Result<(), StoreError>;

    /// Finite, newest-first history for `path`, at most `n` entries.
    fn get_history(&self, path: &Path, n: usize) -> Result<Vec<CommitInfo>, StoreError>;

    /// The bytes of `path` as they existed at `hash`.
    fn get_file_at_commit(&self, hash: &str, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// Absolute path to the repository's working tree root.
    fn root(&self) -> &Path;
}
