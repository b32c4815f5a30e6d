//! Optional bidirectional backlink index over page bodies (spec.md §4.6's
//! analog in §2: "Link Cache (optional)"). Lazily built from a scan of page
//! bodies the caller supplies; not wired into quota or commit paths.
//!
//! Link targets use the same `[[target]]` wiki-link syntax the teacher's
//! desktop indexer recognizes (`src-tauri/src/indexing/links.rs`), narrowed
//! to resolve against node titles or raw node ids instead of file paths.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use store_core::NodeId;

/// One page as fed into [`LinkCache::rebuild`]: its id, title (used to
/// resolve `[[Title]]`-style targets), and markdown body.
pub struct LinkSource<'a> {
    pub id: NodeId,
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Default)]
struct Index {
    forward: HashMap<NodeId, HashSet<NodeId>>,
    backward: HashMap<NodeId, HashSet<NodeId>>,
}

/// Guarded by a single `RwLock`, mirroring [`hierarchy_cache::HierarchyCache`]'s
/// reader/writer split: rebuilds replace the whole index, reads never block
/// each other.
pub struct LinkCache {
    index: RwLock<Index>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
        }
    }

    /// Rebuilds the whole index from scratch given the current set of page
    /// bodies. Unresolved targets (no matching id or title) are dropped
    /// silently, matching the teacher's "unresolved link" handling.
    pub fn rebuild(&self, sources: &[LinkSource<'_>]) {
        let title_index: HashMap<String, NodeId> = sources
            .iter()
            .map(|s| (s.title.trim().to_ascii_lowercase(), s.id))
            .collect();

        let mut forward: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        let mut backward: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();

        for source in sources {
            let targets: HashSet<NodeId> = extract_wiki_targets(source.body)
                .into_iter()
                .filter_map(|raw| resolve_target(&raw, &title_index))
                .filter(|&target| target != source.id)
                .collect();

            for &target in &targets {
                backward.entry(target).or_default().insert(source.id);
            }
            if !targets.is_empty() {
                forward.insert(source.id, targets);
            }
        }

        let mut index = self.index.write().expect("link cache lock poisoned");
        index.forward = forward;
        index.backward = backward;
    }

    /// Nodes whose body links to `id`, in no particular order.
    pub fn backlinks(&self, id: NodeId) -> Vec<NodeId> {
        self.index
            .read()
            .expect("link cache lock poisoned")
            .backward
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes that `id`'s body links to.
    pub fn forward_links(&self, id: NodeId) -> Vec<NodeId> {
        self.index
            .read()
            .expect("link cache lock poisoned")
            .forward
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_target(raw: &str, title_index: &HashMap<String, NodeId>) -> Option<NodeId> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<u64>() {
        return Some(NodeId(id));
    }
    title_index.get(&trimmed.to_ascii_lowercase()).copied()
}

/// Scans `body` for `[[target]]` / `[[target|alias]]` wiki-link targets,
/// skipping fenced code blocks, the way
/// `src-tauri/src/indexing/links.rs::extract_wiki_candidates` does.
fn extract_wiki_targets(body: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut in_fence = false;
    let mut fence_char = '\0';
    let mut fence_len = 0usize;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some((ch, len)) = detect_fence(trimmed) {
            if !in_fence {
                in_fence = true;
                fence_char = ch;
                fence_len = len;
            } else if ch == fence_char && len >= fence_len {
                in_fence = false;
                fence_char = '\0';
                fence_len = 0;
            }
            continue;
        }
        if in_fence {
            continue;
        }
        extract_wiki_targets_from_line(line, &mut targets);
    }

    targets
}

fn detect_fence(line: &str) -> Option<(char, usize)> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let len = line.chars().take_while(|ch| *ch == first).count();
    if len >= 3 {
        Some((first, len))
    } else {
        None
    }
}

fn extract_wiki_targets_from_line(line: &str, out: &mut Vec<String>) {
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'[' && i + 1 < bytes.len() && bytes[i + 1] == b'[' {
            let start = i + 2;
            if let Some(end) = find_closing(bytes, start) {
                if let Some(raw) = line.get(start..end) {
                    let target = raw.split('|').next().unwrap_or(raw).trim();
                    if !target.is_empty() {
                        out.push(target.to_string());
                    }
                }
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }
}

fn find_closing(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b']' && bytes[i + 1] == b']' {
            return Some(i);
        }
        i += 1;
    }
    None
}
