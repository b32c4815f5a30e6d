use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A node identifier: 64-bit, sortable, decodable from its string (directory
/// name) form. Zero means "none/root" per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Directory names must be plain decimal digits: no sign, no
        // leading zero padding ambiguity, no whitespace.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StoreError::InvalidIdentifier {
                reason: format!("not a valid node id: {s:?}"),
            });
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(StoreError::InvalidIdentifier {
                reason: format!("node id has leading zero: {s:?}"),
            });
        }
        s.parse::<u64>()
            .map(NodeId)
            .map_err(|_| StoreError::InvalidIdentifier {
                reason: format!("node id out of range: {s:?}"),
            })
    }
}

/// Opaque workspace identifier, supplied by the identity service. Modeled as
/// an owned string rather than a numeric type since the identity service is
/// an external collaborator whose id scheme the core does not control.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub String);

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkspaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque organization identifier, supplied by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrgId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OrgId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A record identifier within a table. Non-zero per spec.md §3 invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces globally unique, sortable node identifiers with a decodable
/// string form (spec.md §1's "ID generator" external collaborator). Zero
/// is reserved for [`NodeId::ROOT`] and is never returned.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> NodeId;
}

/// Reference generator: a millisecond timestamp in the high bits and an
/// atomic sequence counter in the low 12 bits, giving ids that sort in
/// creation order within a single process. Real deployments needing
/// cross-process uniqueness supply their own [`IdGenerator`].
pub struct MonotonicIdGenerator {
    sequence: AtomicU64,
}

impl MonotonicIdGenerator {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for MonotonicIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&self) -> NodeId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) & 0xFFF;
        NodeId((millis << 12) | seq)
    }
}
