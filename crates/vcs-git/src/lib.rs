//! A [`store_core::Repo`] backed by a real git working tree (spec.md §6's
//! VCS adapter contract): stage the paths a commit closure reports
//! touching, commit them atomically, and roll the working tree back to
//! `HEAD` if anything past that point fails.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Signature};
use store_core::{Author, CommitFn, CommitInfo, Repo, StoreError};
use tokio_util::sync::CancellationToken;

pub struct GitRepo {
    root: PathBuf,
    repo: Mutex<Repository>,
}

impl GitRepo {
    /// Opens `root` as a git working tree, initializing one (with an empty
    /// initial commit so `HEAD` always resolves) if none exists yet.
    pub fn open_or_init(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let repository = match Repository::open(&root) {
            Ok(repo) => repo,
            Err(_) => {
                let repo = Repository::init(&root).map_err(to_vcs_error("init repository"))?;
                create_initial_commit(&repo)?;
                repo
            }
        };
        Ok(Self {
            root,
            repo: Mutex::new(repository),
        })
    }
}

fn create_initial_commit(repo: &Repository) -> Result<(), StoreError> {
    let mut index = repo.index().map_err(to_vcs_error("open index"))?;
    let tree_oid = index.write_tree().map_err(to_vcs_error("write initial tree"))?;
    let tree = repo.find_tree(tree_oid).map_err(to_vcs_error("find initial tree"))?;
    let signature =
        Signature::now("store-core", "store-core@localhost").map_err(to_vcs_error("build signature"))?;
    repo.commit(Some("HEAD"), &signature, &signature, "initial commit", &tree, &[])
        .map_err(to_vcs_error("create initial commit"))?;
    Ok(())
}

impl Repo for GitRepo {
    fn commit_tx(
        &self,
        author: &Author,
        cancel: Option<&CancellationToken>,
        f: CommitFn<'_>,
    ) -> Result<(), StoreError> {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(StoreError::Cancelled);
        }

        let (message, touched) = f()?;

        let repo = self.repo.lock().expect("git repository lock poisoned");
        if let Err(err) = stage_and_commit(&repo, author, &message, &touched) {
            restore_paths(&repo, &self.root, &touched);
            return Err(err);
        }
        Ok(())
    }

    fn get_history(&self, path: &Path, n: usize) -> Result<Vec<CommitInfo>, StoreError> {
        let repo = self.repo.lock().expect("git repository lock poisoned");
        let mut revwalk = repo.revwalk().map_err(to_vcs_error("start revwalk"))?;
        revwalk.push_head().map_err(to_vcs_error("push HEAD"))?;
        revwalk
            .set_sorting(git2::Sort::TIME)
            .map_err(to_vcs_error("set revwalk sort order"))?;

        let mut out = Vec::new();
        for oid in revwalk {
            if out.len() >= n {
                break;
            }
            let oid = oid.map_err(to_vcs_error("walk revision"))?;
            let commit = repo.find_commit(oid).map_err(to_vcs_error("find commit"))?;
            if commit_touches_path(&repo, &commit, path)? {
                out.push(commit_info(&commit)?);
            }
        }
        Ok(out)
    }

    fn get_file_at_commit(&self, hash: &str, path: &Path) -> Result<Vec<u8>, StoreError> {
        let repo = self.repo.lock().expect("git repository lock poisoned");
        let oid = git2::Oid::from_str(hash).map_err(to_vcs_error("parse commit hash"))?;
        let commit = repo.find_commit(oid).map_err(|_| StoreError::CommitNotFound {
            hash: hash.to_string(),
            path: path.to_path_buf(),
        })?;
        let tree = commit.tree().map_err(to_vcs_error("load commit tree"))?;
        let entry = tree.get_path(path).map_err(|_| StoreError::CommitNotFound {
            hash: hash.to_string(),
            path: path.to_path_buf(),
        })?;
        let object = entry.to_object(&repo).map_err(to_vcs_error("load tree entry"))?;
        let blob = object.peel_to_blob().map_err(to_vcs_error("peel blob"))?;
        Ok(blob.content().to_vec())
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

fn stage_and_commit(
    repo: &Repository,
    author: &Author,
    message: &str,
    touched: &[PathBuf],
) -> Result<(), StoreError> {
    let mut index = repo.index().map_err(to_vcs_error("open index"))?;
    for path in touched {
        let absolute = repo.workdir().unwrap_or_else(|| Path::new(".")).join(path);
        if absolute.is_file() {
            index.add_path(path).map_err(to_vcs_error("stage path"))?;
        } else {
            let _ = index.remove_path(path);
        }
    }
    index.write().map_err(to_vcs_error("write index"))?;

    let tree_oid = index.write_tree().map_err(to_vcs_error("write tree"))?;
    let tree = repo.find_tree(tree_oid).map_err(to_vcs_error("find tree"))?;
    let signature =
        Signature::now(&author.name, &author.email).map_err(to_vcs_error("build signature"))?;

    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .map_err(to_vcs_error("create commit"))?;
    Ok(())
}

/// Reverts `touched` back to their last-committed state: checks out each
/// still-tracked path from `HEAD`, and removes any path that did not exist
/// in `HEAD` (i.e. a file `f` created before the git step failed).
fn restore_paths(repo: &Repository, root: &Path, touched: &[PathBuf]) {
    let Ok(head_tree) = repo.head().and_then(|h| h.peel_to_tree()) else {
        return;
    };

    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    let mut any_tracked = false;
    for path in touched {
        if head_tree.get_path(path).is_ok() {
            checkout.path(path);
            any_tracked = true;
        } else {
            let _ = std::fs::remove_file(root.join(path));
        }
    }

    if any_tracked {
        let _ = repo.checkout_tree(head_tree.as_object(), Some(&mut checkout));
    }
}

fn commit_touches_path(repo: &Repository, commit: &git2::Commit, path: &Path) -> Result<bool, StoreError> {
    let tree = commit.tree().map_err(to_vcs_error("load commit tree"))?;
    match commit.parent(0) {
        Ok(parent) => {
            let parent_tree = parent.tree().map_err(to_vcs_error("load parent tree"))?;
            let diff = repo
                .diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)
                .map_err(to_vcs_error("diff commit trees"))?;
            Ok(diff
                .deltas()
                .any(|d| d.new_file().path() == Some(path) || d.old_file().path() == Some(path)))
        }
        Err(_) => Ok(tree.get_path(path).is_ok()),
    }
}

fn commit_info(commit: &git2::Commit) -> Result<CommitInfo, StoreError> {
    let sig = commit.author();
    let time: DateTime<Utc> = Utc
        .timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now);
    Ok(CommitInfo {
        hash: commit.id().to_string(),
        message: commit.message().unwrap_or_default().to_string(),
        author: Author::new(
            sig.name().unwrap_or_default().to_string(),
            sig.email().unwrap_or_default().to_string(),
        ),
        time,
    })
}

fn to_vcs_error(context: &'static str) -> impl Fn(git2::Error) -> StoreError {
    move |e| StoreError::vcs(context, e.to_string())
}
