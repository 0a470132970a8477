//! Remote control plane contracts.
//!
//! The reconcilers only ever talk to the remote API through these traits:
//! - `StorageAccountsApi`: create/update/delete/get plus key listing
//! - `SnapshotsApi`: merged create-or-update, delete, get
//!
//! Writes are long-running: they return an `OperationHandle` that must be
//! awaited with `wait`. `InMemoryCloud` implements both contracts locally.

pub mod memory;
pub mod snapshots;
pub mod storage;

use std::fmt;

use uuid::Uuid;

pub use crate::error::ClientError;
pub use memory::InMemoryCloud;
pub use snapshots::SnapshotsApi;
pub use storage::StorageAccountsApi;

use crate::model::Coordinates;

/// Which kind of write an operation handle tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => f.write_str("create"),
            OperationKind::Update => f.write_str("update"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Correlation token for an accepted long-running write.
///
/// Owns nothing remotely; discarded once the operation has been awaited.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    pub id: String,
    pub kind: OperationKind,
    pub target: Coordinates,
}

impl OperationHandle {
    pub fn new(kind: OperationKind, target: Coordinates) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            target,
        }
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} of {}", self.kind, self.id, self.target)
    }
}
