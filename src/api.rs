//! Transport-independent API layer.
//!
//! `CuratorApi` is the single entry point for consumer-facing
//! operations. Transports (the CLI, direct embedding) call `CuratorApi`
//! methods — they never reach into the engine's parts directly. It also
//! wires the optional durability backend: the engine stays the source
//! of truth, the backend persists snapshots and the audit trail.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audit::AuditRecord;
use crate::candidate::{CandidateId, CandidateRecord, TripleCandidate};
use crate::canon::{Entity, EntityId};
use crate::pipeline::{BatchOutcome, CancellationToken, CuratorEngine, CuratorResult};
use crate::repair::{PendingRepair, RepairAction, RepairOutcome};
use crate::schema::{OntologyParseError, SchemaSnapshot, SchemaVersion};
use crate::storage::{SnapshotStore, StorageResult};
use crate::store::{CommittedTriple, GraphSnapshot, TripleId, TriplePattern};

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct CuratorApi {
    engine: Arc<CuratorEngine>,
    backend: Option<Arc<dyn SnapshotStore>>,
    /// Audit records already persisted, so `save` appends only new ones
    persisted_audit: Arc<AtomicUsize>,
}

impl CuratorApi {
    /// Create an API over an engine with no durability backend.
    pub fn new(engine: Arc<CuratorEngine>) -> Self {
        Self {
            engine,
            backend: None,
            persisted_audit: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an API over an engine with a durability backend.
    pub fn with_backend(engine: Arc<CuratorEngine>, backend: Arc<dyn SnapshotStore>) -> Self {
        Self {
            engine,
            backend: Some(backend),
            persisted_audit: Arc::new(AtomicUsize::new(0)),
        }
    }

    // --- Schema ---

    pub fn schema(&self) -> Arc<SchemaSnapshot> {
        self.engine.schema()
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.engine.schema().version().clone()
    }

    /// Reload the ontology. In-flight batches keep validating against
    /// the snapshot they were admitted under.
    pub fn reload_schema(&self, source: &str) -> Result<Arc<SchemaSnapshot>, OntologyParseError> {
        self.engine.reload_schema(source)
    }

    // --- Write ---

    pub fn register_document(&self, doc_id: impl Into<String>, length: usize) {
        self.engine.register_document(doc_id, length);
    }

    /// The single write endpoint: validate and route a candidate batch.
    pub fn submit(
        &self,
        candidates: Vec<TripleCandidate>,
        token: &CancellationToken,
    ) -> BatchOutcome {
        self.engine.submit_batch(candidates, token)
    }

    /// Submit wire-format records from an external generator.
    pub fn submit_records(
        &self,
        records: Vec<CandidateRecord>,
        token: &CancellationToken,
    ) -> BatchOutcome {
        let candidates = records.into_iter().map(|r| r.into_candidate()).collect();
        self.engine.submit_batch(candidates, token)
    }

    // --- Repair decisions ---

    pub fn pending_repairs(&self) -> Vec<PendingRepair> {
        self.engine.pending_repairs()
    }

    pub fn accept_repair(&self, id: CandidateId) -> CuratorResult<TripleId> {
        self.engine.accept_repair(id)
    }

    pub fn reject_repair(&self, id: CandidateId) -> CuratorResult<()> {
        self.engine.reject_repair(id)
    }

    pub fn apply_repair(&self, action: RepairAction) -> CuratorResult<RepairOutcome> {
        self.engine.apply_repair(action)
    }

    // --- Reads ---

    /// Pattern query over committed triples; any position may be a
    /// wildcard.
    pub fn find(&self, pattern: &TriplePattern) -> Vec<CommittedTriple> {
        self.engine.find(pattern)
    }

    /// Immutable materialized view for export and inspection.
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.engine.graph_snapshot()
    }

    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.engine.registry().entity(id)
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.engine.audit().records()
    }

    pub fn triple_count(&self) -> usize {
        self.engine.store().len()
    }

    pub fn entity_count(&self) -> usize {
        self.engine.registry().live_count()
    }

    // --- Durability ---

    /// Persist the current graph snapshot and any audit records not yet
    /// written. No-op without a backend.
    pub fn save(&self) -> StorageResult<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let snapshot = self.engine.graph_snapshot();
        backend.save_graph(&snapshot.entities, &snapshot.triples)?;

        let records = self.engine.audit().records();
        let from = self.persisted_audit.load(Ordering::Acquire);
        if from < records.len() {
            backend.append_audit(&records[from..])?;
            self.persisted_audit.store(records.len(), Ordering::Release);
        }
        Ok(())
    }

    /// Load a persisted graph and audit trail into the engine.
    ///
    /// Intended for a freshly created engine; restored triples were
    /// already committed under their recorded schema versions and skip
    /// re-validation.
    pub fn load(&self) -> StorageResult<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let (entities, triples) = backend.load_graph()?;
        for entity in entities {
            self.engine.registry().restore_entity(entity);
        }
        for triple in triples {
            self.engine.store().restore_triple(triple);
        }
        let audit = backend.load_audit()?;
        self.persisted_audit.store(audit.len(), Ordering::Release);
        for record in audit {
            self.engine.audit().restore_record(record);
        }
        Ok(())
    }
}
