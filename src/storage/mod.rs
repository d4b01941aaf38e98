//! Durability backends for the committed graph and audit trail
//!
//! The in-memory `GraphStore` is the single source of truth; backends
//! implementing `SnapshotStore` persist materialized snapshots of it.
//! The primary implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, SnapshotStore, StorageError, StorageResult};
