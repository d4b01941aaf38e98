//! Repair actions: user-accepted corrections applied atomically
//!
//! Nothing here runs automatically. Repairable candidates wait in the
//! pending queue until an external accept/reject call arrives, and
//! committed-graph repairs (`MergeEntities`, `SubstitutePredicate`) are
//! applied only on explicit acceptance, as one transaction each.

use crate::candidate::{CandidateId, TripleCandidate};
use crate::canon::{EntityId, EntityRegistry};
use crate::schema::{RangeConstraint, SchemaSnapshot};
use crate::store::{GraphStore, MergeRollbackError, ObjectRef, TripleId};
use crate::validate::RepairFinding;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// An accepted corrective action over the committed graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    MergeEntities { keep: EntityId, absorb: EntityId },
    SubstitutePredicate { triple: TripleId, predicate: String },
}

/// Errors from repair application
#[derive(Debug, Error)]
pub enum RepairError {
    /// The repair's preconditions are not satisfied; the target reverts
    /// to its prior state pending a different decision
    #[error("repair precondition failed: {detail}")]
    Precondition { detail: String },

    #[error(transparent)]
    MergeRollback(#[from] MergeRollbackError),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("unknown triple: {0}")]
    UnknownTriple(TripleId),

    #[error("candidate is not pending repair: {0}")]
    NotPending(CandidateId),
}

/// Result type for repair operations
pub type RepairResult<T> = Result<T, RepairError>;

/// What a successful repair did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub action: RepairAction,
    /// Triples whose references or predicate were rewritten
    pub rewritten: usize,
}

/// A repairable candidate awaiting an external decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRepair {
    pub candidate: TripleCandidate,
    pub findings: Vec<RepairFinding>,
    pub queued_at: DateTime<Utc>,
}

/// The persisted pending-action queue.
///
/// Unaccepted candidates remain queued indefinitely: never silently
/// committed, never silently discarded.
#[derive(Debug, Default)]
pub struct RepairQueue {
    pending: DashMap<CandidateId, PendingRepair>,
}

impl RepairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, candidate: TripleCandidate, findings: Vec<RepairFinding>) {
        self.pending.insert(
            candidate.id,
            PendingRepair {
                candidate,
                findings,
                queued_at: Utc::now(),
            },
        );
    }

    /// Remove and return a pending entry (accept/reject paths)
    pub fn take(&self, id: CandidateId) -> Option<PendingRepair> {
        self.pending.remove(&id).map(|(_, p)| p)
    }

    pub fn get(&self, id: CandidateId) -> Option<PendingRepair> {
        self.pending.get(&id).map(|p| p.value().clone())
    }

    /// All pending entries, oldest first
    pub fn list(&self) -> Vec<PendingRepair> {
        let mut entries: Vec<PendingRepair> =
            self.pending.iter().map(|p| p.value().clone()).collect();
        entries.sort_by_key(|p| p.queued_at);
        entries
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies accepted repair actions as atomic transactions over the
/// graph and entity registry.
#[derive(Debug, Default)]
pub struct Repairer {
    /// Merges and substitutions are serialized: no resolution or
    /// insertion affecting the same entities may interleave with a
    /// transaction in progress.
    tx: Mutex<()>,
}

impl Repairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an accepted repair action.
    ///
    /// Either the whole action commits or the graph and registry are
    /// left exactly as before.
    pub fn apply(
        &self,
        action: RepairAction,
        registry: &EntityRegistry,
        store: &GraphStore,
        schema: &SchemaSnapshot,
    ) -> RepairResult<RepairOutcome> {
        let _tx = self.tx.lock().expect("repair transaction lock poisoned");
        match &action {
            RepairAction::MergeEntities { keep, absorb } => {
                let rewritten = self.merge(keep, absorb, registry, store)?;
                info!(%keep, %absorb, rewritten, "entities merged");
                Ok(RepairOutcome { action, rewritten })
            }
            RepairAction::SubstitutePredicate { triple, predicate } => {
                let rewritten = self.substitute(triple, predicate, registry, store, schema)?;
                info!(%triple, predicate, "predicate substituted");
                Ok(RepairOutcome { action, rewritten })
            }
        }
    }

    fn merge(
        &self,
        keep: &EntityId,
        absorb: &EntityId,
        registry: &EntityRegistry,
        store: &GraphStore,
    ) -> RepairResult<usize> {
        if keep == absorb {
            return Err(RepairError::Precondition {
                detail: "cannot merge an entity into itself".to_string(),
            });
        }
        let keep_entity = registry
            .entity(keep)
            .ok_or_else(|| RepairError::UnknownEntity(keep.clone()))?;
        let absorb_entity = registry
            .entity(absorb)
            .ok_or_else(|| RepairError::UnknownEntity(absorb.clone()))?;
        if !keep_entity.is_live() || !absorb_entity.is_live() {
            return Err(RepairError::Precondition {
                detail: "both entities must be live to merge".to_string(),
            });
        }
        if keep_entity.class != absorb_entity.class {
            return Err(RepairError::Precondition {
                detail: format!(
                    "cannot merge across classes: {} vs {}",
                    keep_entity.class, absorb_entity.class
                ),
            });
        }

        // Registry first: the redirect routes new resolutions at the
        // survivor while the triple rewrite proceeds. A failed rewrite
        // restores the registry from the undo state.
        let undo = registry
            .merge_into(keep, absorb)
            .map_err(|e| RepairError::Precondition {
                detail: e.to_string(),
            })?;

        let absorbed = absorb.clone();
        let result = store.rewrite_references(absorb, keep, |t| {
            let subject_ok = t.subject != absorbed && registry.is_live(&t.subject);
            let object_ok = match &t.object {
                ObjectRef::Entity(id) => id != &absorbed && registry.is_live(id),
                ObjectRef::Literal { .. } => true,
            };
            subject_ok && object_ok
        });

        match result {
            Ok(rewritten) => Ok(rewritten),
            Err(rollback) => {
                registry.restore_merge(undo);
                Err(RepairError::MergeRollback(rollback))
            }
        }
    }

    fn substitute(
        &self,
        triple_id: &TripleId,
        predicate: &str,
        registry: &EntityRegistry,
        store: &GraphStore,
        schema: &SchemaSnapshot,
    ) -> RepairResult<usize> {
        let triple = store
            .get(triple_id)
            .ok_or_else(|| RepairError::UnknownTriple(*triple_id))?;
        let def = schema
            .predicate(predicate)
            .ok_or_else(|| RepairError::Precondition {
                detail: format!("predicate {} not in schema {}", predicate, schema.version()),
            })?;

        let subject_class = registry
            .class_of(&triple.subject)
            .ok_or_else(|| RepairError::UnknownEntity(triple.subject.clone()))?;
        if !schema.is_class_or_descendant(&subject_class, &def.domain) {
            return Err(RepairError::Precondition {
                detail: format!(
                    "subject class {} does not satisfy domain {} of {}",
                    subject_class, def.domain, predicate
                ),
            });
        }

        let range_ok = match (&def.range, &triple.object) {
            (RangeConstraint::Class(expected), ObjectRef::Entity(id)) => {
                let object_class = registry
                    .class_of(id)
                    .ok_or_else(|| RepairError::UnknownEntity(id.clone()))?;
                schema.is_class_or_descendant(&object_class, expected)
            }
            (RangeConstraint::Literal { literal }, ObjectRef::Literal { literal_type, .. }) => {
                literal_type == literal
            }
            _ => false,
        };
        if !range_ok {
            return Err(RepairError::Precondition {
                detail: format!(
                    "existing object does not satisfy range {} of {}",
                    def.range, predicate
                ),
            });
        }

        store
            .set_predicate(triple_id, predicate)
            .ok_or(RepairError::UnknownTriple(*triple_id))?;
        Ok(1)
    }
}
