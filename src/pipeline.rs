//! CuratorEngine: batch processing of candidate triples under one
//! schema snapshot
//!
//! The engine owns the moving parts (schema slot, registry, store,
//! repair queue, audit log) and drives the per-candidate state machine:
//! `Generated -> {Valid, Repairable, Invalid}`, `Valid -> Committed`,
//! `Repairable -> Committed | Discarded`, `Invalid -> Discarded`.
//! `Committed` and `Discarded` are terminal.

use crate::audit::AuditLog;
use crate::candidate::{CandidateId, DocumentCatalog, TripleCandidate};
use crate::canon::{CanonConfig, CanonError, EntityRegistry, SourceMention};
use crate::candidate::ObjectTerm;
use crate::repair::{PendingRepair, RepairAction, RepairError, RepairOutcome, RepairQueue, Repairer};
use crate::schema::{self, OntologyParseError, SchemaSnapshot};
use crate::store::{CommitError, CommittedTriple, GraphStore, ObjectRef, TripleId, TriplePattern};
use crate::validate::{RepairFinding, ValidationContext, Validator, Verdict};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// A cooperative cancellation token for an in-flight batch.
///
/// The caller sets the token; the engine checks it between candidates.
/// Already-committed triples are never retroactively removed by a
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Errors from accept/reject and repair entry points
#[derive(Debug, Error)]
pub enum CuratorError {
    #[error(transparent)]
    Repair(#[from] RepairError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("candidate is not pending repair: {0}")]
    NotPending(CandidateId),
}

/// Result type for engine operations
pub type CuratorResult<T> = Result<T, CuratorError>;

/// What happened to each candidate of a submitted batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub committed: Vec<(CandidateId, TripleId)>,
    pub queued: Vec<CandidateId>,
    pub discarded: Vec<(CandidateId, String)>,
    pub cancelled: Vec<CandidateId>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.committed.len() + self.queued.len() + self.discarded.len() + self.cancelled.len()
    }
}

/// The curation engine.
///
/// All interior mutability: shared behind an `Arc`, callable from any
/// thread. Validation is pure over a snapshot; the registry serializes
/// same-bucket writes; repairs run as single transactions.
#[derive(Debug)]
pub struct CuratorEngine {
    schema: RwLock<Arc<SchemaSnapshot>>,
    registry: EntityRegistry,
    store: GraphStore,
    validator: Validator,
    queue: RepairQueue,
    repairer: Repairer,
    audit: AuditLog,
    documents: RwLock<DocumentCatalog>,
    merge_threshold: f64,
}

impl CuratorEngine {
    /// Create an engine over an initial schema snapshot
    pub fn new(snapshot: SchemaSnapshot, config: CanonConfig) -> Self {
        Self {
            schema: RwLock::new(Arc::new(snapshot)),
            registry: EntityRegistry::new(&config),
            store: GraphStore::new(),
            validator: Validator::new(),
            queue: RepairQueue::new(),
            repairer: Repairer::new(),
            audit: AuditLog::new(),
            documents: RwLock::new(DocumentCatalog::new()),
            merge_threshold: config.merge_threshold,
        }
    }

    /// The snapshot current right now. Batches capture this once at
    /// admission and finish under it.
    pub fn schema(&self) -> Arc<SchemaSnapshot> {
        self.schema.read().expect("schema slot lock poisoned").clone()
    }

    /// Parse a new ontology source and swap it in as the current
    /// snapshot. The previous snapshot stays valid for in-flight work;
    /// on parse failure the active snapshot is untouched.
    pub fn reload_schema(&self, source: &str) -> Result<Arc<SchemaSnapshot>, OntologyParseError> {
        let next = Arc::new(schema::load(source)?);
        let mut slot = self.schema.write().expect("schema slot lock poisoned");
        info!(from = %slot.version(), to = %next.version(), "schema reloaded");
        *slot = next.clone();
        Ok(next)
    }

    /// Register a source document and its text length for grounding
    /// bounds checks
    pub fn register_document(&self, doc_id: impl Into<String>, length: usize) {
        self.documents
            .write()
            .expect("document catalog lock poisoned")
            .register(doc_id, length);
    }

    /// Validate and route a batch of candidates under one snapshot.
    ///
    /// Candidates after a cancellation signal are discarded from the
    /// pending work; nothing already committed is touched.
    pub fn submit_batch(
        &self,
        candidates: Vec<TripleCandidate>,
        token: &CancellationToken,
    ) -> BatchOutcome {
        let snapshot = self.schema();
        let mut outcome = BatchOutcome::default();
        for candidate in candidates {
            if token.is_cancelled() {
                self.audit
                    .record_discard(candidate.id, "batch cancelled before validation");
                outcome.cancelled.push(candidate.id);
                continue;
            }
            self.process_candidate(candidate, &snapshot, &mut outcome, true);
        }
        info!(
            schema = %snapshot.version(),
            committed = outcome.committed.len(),
            queued = outcome.queued.len(),
            discarded = outcome.discarded.len(),
            cancelled = outcome.cancelled.len(),
            "batch finished"
        );
        outcome
    }

    /// Validate one candidate under a snapshot and route it per the
    /// state machine. A stale commit is revalidated once under the
    /// then-current snapshot.
    fn process_candidate(
        &self,
        candidate: TripleCandidate,
        snapshot: &Arc<SchemaSnapshot>,
        outcome: &mut BatchOutcome,
        allow_revalidation: bool,
    ) {
        let verdict = {
            let documents = self.documents.read().expect("document catalog lock poisoned");
            let ctx = ValidationContext {
                schema: snapshot,
                registry: &self.registry,
                documents: &documents,
                merge_threshold: self.merge_threshold,
            };
            self.validator.validate(&candidate, &ctx)
        };
        self.audit
            .record_verdict(&candidate, snapshot.version(), &verdict);

        match verdict {
            Verdict::Valid => {
                let id = candidate.id;
                match self.commit_candidate(&candidate, &candidate.predicate) {
                    Ok(triple_id) => {
                        self.audit.record_commit(id, triple_id);
                        outcome.committed.push((id, triple_id));
                    }
                    Err(CommitError::StaleValidation { detail }) if allow_revalidation => {
                        // A reload slipped in between validation and
                        // commit; revalidate under the current snapshot.
                        warn!(candidate = %id, detail, "stale validation, revalidating");
                        let current = self.schema();
                        self.process_candidate(candidate, &current, outcome, false);
                    }
                    Err(CommitError::EndpointNotLive(entity)) if allow_revalidation => {
                        // A merge raced the commit; on the retry,
                        // resolution follows the redirect to the
                        // surviving entity.
                        warn!(candidate = %id, %entity, "endpoint merged during commit, revalidating");
                        let current = self.schema();
                        self.process_candidate(candidate, &current, outcome, false);
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        self.audit.record_discard(id, reason.clone());
                        outcome.discarded.push((id, reason));
                    }
                }
            }
            Verdict::Repairable { findings } => {
                outcome.queued.push(candidate.id);
                self.queue.enqueue(candidate, findings);
            }
            Verdict::Invalid { reason } => {
                let reason = reason.to_string();
                self.audit.record_discard(candidate.id, reason.clone());
                outcome.discarded.push((candidate.id, reason));
            }
        }
    }

    /// Canonicalize endpoints and insert the triple, re-validated by the
    /// store against the schema current at this moment.
    fn commit_candidate(
        &self,
        candidate: &TripleCandidate,
        predicate: &str,
    ) -> Result<TripleId, CommitError> {
        let current = self.schema();
        let documents = self.documents.read().expect("document catalog lock poisoned");

        let provenance = |raw: &str| SourceMention {
            doc_id: candidate.grounding.doc_id.clone(),
            start: candidate.grounding.start,
            end: candidate.grounding.end,
            raw: raw.to_string(),
        };

        let subject = self
            .registry
            .resolve(
                &candidate.subject.text,
                &candidate.subject.class,
                &current,
                Some(provenance(&candidate.subject.text)),
            )
            .map_err(stale_from_canon)?;

        let object = match &candidate.object {
            ObjectTerm::Mention(m) => {
                let resolved = self
                    .registry
                    .resolve(&m.text, &m.class, &current, Some(provenance(&m.text)))
                    .map_err(stale_from_canon)?;
                ObjectRef::Entity(resolved.id)
            }
            ObjectTerm::Literal {
                value,
                literal_type,
            } => ObjectRef::Literal {
                value: value.clone(),
                literal_type: *literal_type,
            },
        };

        let triple = CommittedTriple {
            id: TripleId::new(),
            subject: subject.id,
            predicate: predicate.to_string(),
            object,
            grounding: candidate.grounding.clone(),
            committed_at: Utc::now(),
            schema_version: current.version().clone(),
            candidate: candidate.id,
        };
        self.store
            .insert(triple, &self.registry, &current, &documents)
    }

    // --- Repair entry points ---

    /// Pending repairable candidates, oldest first
    pub fn pending_repairs(&self) -> Vec<PendingRepair> {
        self.queue.list()
    }

    /// Accept a pending candidate's proposed fixes, then commit it.
    ///
    /// Applies the findings in order: predicate substitutions rewrite
    /// the predicate used for commit; entity-merge findings bind the
    /// mention to the existing entity (merging a separately created
    /// duplicate, rewriting its committed references, if one exists).
    pub fn accept_repair(&self, id: CandidateId) -> CuratorResult<TripleId> {
        let pending = self.queue.take(id).ok_or(CuratorError::NotPending(id))?;
        let current = self.schema();

        let mut predicate = pending.candidate.predicate.clone();
        for finding in &pending.findings {
            match finding {
                RepairFinding::PredicateSubstitution { canonical, .. } => {
                    predicate = canonical.clone();
                }
                RepairFinding::EntityMerge {
                    mention,
                    class,
                    existing,
                } => {
                    self.bind_mention(mention, class, existing, &current)
                        .inspect_err(|_| {
                            // The candidate stays repairable pending a
                            // different decision.
                            self.queue
                                .enqueue(pending.candidate.clone(), pending.findings.clone());
                        })?;
                }
            }
        }

        match self.commit_candidate(&pending.candidate, &predicate) {
            Ok(triple_id) => {
                self.audit.record_commit(id, triple_id);
                if predicate != pending.candidate.predicate {
                    self.audit.record_repair(
                        &RepairAction::SubstitutePredicate {
                            triple: triple_id,
                            predicate: predicate.clone(),
                        },
                        true,
                        "applied on accepted candidate",
                    );
                }
                Ok(triple_id)
            }
            Err(err) => {
                // Back to the queue; acceptance failed without commit.
                self.queue.enqueue(pending.candidate, pending.findings);
                Err(err.into())
            }
        }
    }

    /// Bind a mention to an existing entity: alias-attach when no
    /// duplicate exists, full merge (with reference rewrite) when a
    /// separately created live duplicate does.
    fn bind_mention(
        &self,
        mention: &str,
        class: &str,
        existing: &crate::canon::EntityId,
        current: &SchemaSnapshot,
    ) -> CuratorResult<()> {
        let resolved = self
            .registry
            .resolve(mention, class, current, None)
            .map_err(|e| {
                CuratorError::Repair(RepairError::Precondition {
                    detail: e.to_string(),
                })
            })?;
        if &resolved.id == existing {
            return Ok(());
        }
        let action = RepairAction::MergeEntities {
            keep: existing.clone(),
            absorb: resolved.id,
        };
        let result = self
            .repairer
            .apply(action.clone(), &self.registry, &self.store, current);
        match result {
            Ok(outcome) => {
                self.audit
                    .record_repair(&action, true, format!("rewrote {} triples", outcome.rewritten));
                Ok(())
            }
            Err(err) => {
                self.audit
                    .record_repair(&action, true, format!("failed: {}", err));
                Err(err.into())
            }
        }
    }

    /// Reject a pending candidate: terminal Discarded. The rejected
    /// findings are audited alongside the discard.
    pub fn reject_repair(&self, id: CandidateId) -> CuratorResult<()> {
        let pending = self.queue.take(id).ok_or(CuratorError::NotPending(id))?;
        self.audit.record_rejection(id, &pending.findings);
        self.audit
            .record_discard(pending.candidate.id, "repair rejected by user");
        Ok(())
    }

    /// Apply an accepted repair action against the committed graph
    pub fn apply_repair(&self, action: RepairAction) -> CuratorResult<RepairOutcome> {
        let current = self.schema();
        let result = self
            .repairer
            .apply(action.clone(), &self.registry, &self.store, &current);
        match &result {
            Ok(outcome) => self.audit.record_repair(
                &action,
                true,
                format!("rewrote {} triples", outcome.rewritten),
            ),
            Err(err) => self
                .audit
                .record_repair(&action, true, format!("failed: {}", err)),
        }
        result.map_err(CuratorError::from)
    }

    // --- Read API ---

    pub fn find(&self, pattern: &TriplePattern) -> Vec<CommittedTriple> {
        self.store.find(pattern)
    }

    pub fn graph_snapshot(&self) -> crate::store::GraphSnapshot {
        self.store.snapshot(&self.registry)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

fn stale_from_canon(err: CanonError) -> CommitError {
    // An endpoint class can only become unknown through a reload between
    // validation and commit.
    CommitError::StaleValidation {
        detail: err.to_string(),
    }
}
