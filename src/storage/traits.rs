//! Storage trait definitions

use crate::audit::AuditRecord;
use crate::canon::Entity;
use crate::store::CommittedTriple;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for graph durability backends.
///
/// The in-memory engine is the source of truth; a backend persists
/// materialized snapshots and the audit trail. Implementations must be
/// thread-safe (Send + Sync).
pub trait SnapshotStore: Send + Sync {
    /// Persist the full set of entities and triples, replacing any
    /// previously saved graph
    fn save_graph(&self, entities: &[Entity], triples: &[CommittedTriple]) -> StorageResult<()>;

    /// Load the persisted graph
    fn load_graph(&self) -> StorageResult<(Vec<Entity>, Vec<CommittedTriple>)>;

    /// Append audit records to the persisted trail
    fn append_audit(&self, records: &[AuditRecord]) -> StorageResult<()>;

    /// Load the persisted audit trail, oldest first
    fn load_audit(&self) -> StorageResult<Vec<AuditRecord>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: SnapshotStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
