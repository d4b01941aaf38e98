//! Ontograph: Ontology-Governed Knowledge Graph Curation Engine
//!
//! An in-memory engine that sits between noisy triple extraction and a
//! clean knowledge graph: every candidate triple is validated against a
//! versioned ontology, its entity mentions are canonicalized to stable
//! identities, and anything that cannot be committed outright is either
//! queued for repair or discarded with an audit trail.
//!
//! # Core Concepts
//!
//! - **Schema snapshots**: immutable, versioned views of the ontology;
//!   a batch validates entirely against the snapshot it was admitted under
//! - **Canonical entities**: one live identity per real-world referent,
//!   with surface-form aliases and redirect tombstones after merges
//! - **Repairs**: deterministic, reversible fixes (predicate synonym
//!   substitution, entity merges) gated on explicit acceptance
//!
//! # Example
//!
//! ```
//! use ontograph::{CancellationToken, CanonConfig, CuratorEngine};
//!
//! let source = r#"
//! version: event-v1
//! classes:
//!   - name: Event
//! predicates: []
//! "#;
//! let snapshot = ontograph::schema::load(source).unwrap();
//! let engine = CuratorEngine::new(snapshot, CanonConfig::default());
//! let outcome = engine.submit_batch(Vec::new(), &CancellationToken::new());
//! assert_eq!(outcome.total(), 0);
//! ```

pub mod api;
pub mod audit;
pub mod candidate;
pub mod canon;
pub mod pipeline;
pub mod repair;
pub mod schema;
pub mod storage;
pub mod store;
pub mod validate;

pub use api::CuratorApi;
pub use audit::{AuditEvent, AuditLog, AuditRecord, RepairSubject};
pub use candidate::{
    CandidateId, CandidateRecord, DocumentCatalog, GroundingSpan, Mention, ObjectTerm,
    TripleCandidate,
};
pub use canon::{CanonConfig, CanonError, Entity, EntityId, EntityRegistry, EntityStatus};
pub use pipeline::{BatchOutcome, CancellationToken, CuratorEngine, CuratorError, CuratorResult};
pub use repair::{PendingRepair, RepairAction, RepairOutcome, Repairer};
pub use schema::{LiteralType, OntologyParseError, SchemaSnapshot, SchemaVersion};
pub use storage::{OpenStore, SnapshotStore, SqliteStore, StorageError, StorageResult};
pub use store::{CommittedTriple, GraphSnapshot, GraphStore, ObjectRef, TripleId, TriplePattern};
pub use validate::{InvalidReason, RepairFinding, ValidationContext, Validator, Verdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
