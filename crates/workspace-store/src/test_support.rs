//! A minimal in-memory [`Repo`] test double: records one entry per
//! successful `commit_tx`, snapshotting the bytes of each touched path at
//! commit time so `get_file_at_commit` can serve historical reads without
//! a real VCS. Mirrors the teacher's `tempfile`-backed `Harness` pattern
//! (`local-api-core::services::test_support::Harness`) adapted to a
//! `Repo` double instead of a sqlite fixture.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use store_core::{Author, CommitFn, CommitInfo, Repo, StoreError};
use tokio_util::sync::CancellationToken;

struct CommitRecord {
    info: CommitInfo,
    snapshots: HashMap<PathBuf, Vec<u8>>,
}

pub(crate) struct InMemoryRepo {
    root: PathBuf,
    next_hash: AtomicU64,
    history: Mutex<HashMap<PathBuf, Vec<CommitRecord>>>,
}

impl InMemoryRepo {
    pub(crate) fn at(root: PathBuf) -> Self {
        Self {
            root,
            next_hash: AtomicU64::new(1),
            history: Mutex::new(HashMap::new()),
        }
    }
}

impl Repo for InMemoryRepo {
    fn commit_tx(
        &self,
        author: &Author,
        _cancel: Option<&CancellationToken>,
        f: CommitFn<'_>,
    ) -> Result<(), StoreError> {
        let (message, touched) = f()?;
        let hash = self.next_hash.fetch_add(1, Ordering::SeqCst).to_string();
        let info = CommitInfo {
            hash,
            message,
            author: author.clone(),
            time: Utc::now(),
        };

        let mut snapshots = HashMap::new();
        for path in &touched {
            let abs = self.root.join(path);
            if let Ok(bytes) = fs::read(&abs) {
                snapshots.insert(path.clone(), bytes);
            }
        }

        let mut history = self.history.lock().expect("history lock poisoned");
        for path in touched {
            history
                .entry(path)
                .or_default()
                .push(CommitRecord {
                    info: info.clone(),
                    snapshots: snapshots.clone(),
                });
        }
        Ok(())
    }

    fn get_history(&self, path: &Path, n: usize) -> Result<Vec<CommitInfo>, StoreError> {
        let history = self.history.lock().expect("history lock poisoned");
        Ok(history
            .get(path)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .take(n)
                    .map(|r| r.info.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_file_at_commit(&self, hash: &str, path: &Path) -> Result<Vec<u8>, StoreError> {
        let history = self.history.lock().expect("history lock poisoned");
        history
            .get(path)
            .and_then(|records| records.iter().find(|r| r.info.hash == hash))
            .and_then(|record| record.snapshots.get(path).cloned())
            .ok_or_else(|| StoreError::CommitNotFound {
                hash: hash.to_string(),
                path: path.to_path_buf(),
            })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

pub(crate) fn test_author() -> Author {
    Author::new("Test Author", "test@example.com")
}
