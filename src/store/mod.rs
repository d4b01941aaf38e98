//! The committed knowledge graph: entities and triples under one schema
//! version lineage
//!
//! The store enforces the graph invariants at write time, independent of
//! the validator's earlier pass — a schema reload may have happened in
//! between, so `insert` re-checks everything against the snapshot that
//! is current at the moment of insertion.

use crate::candidate::{CandidateId, DocumentCatalog, GroundingSpan};
use crate::canon::{Entity, EntityId, EntityRegistry};
use crate::schema::{LiteralType, RangeConstraint, SchemaSnapshot, SchemaVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier for a committed triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripleId(Uuid);

impl TripleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TripleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TripleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The object endpoint of a committed triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ObjectRef {
    Entity(EntityId),
    Literal {
        value: String,
        literal_type: LiteralType,
    },
}

/// A committed assertion in the knowledge graph.
///
/// Immutable after commit except for endpoint/predicate rewrites applied
/// atomically by the repairer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedTriple {
    pub id: TripleId,
    pub subject: EntityId,
    pub predicate: String,
    pub object: ObjectRef,
    pub grounding: GroundingSpan,
    pub committed_at: DateTime<Utc>,
    /// Schema version active at commit time
    pub schema_version: SchemaVersion,
    /// The candidate this triple was committed from
    pub candidate: CandidateId,
}

/// Errors raised at insert time
#[derive(Debug, Error)]
pub enum CommitError {
    /// The triple no longer satisfies the schema current at insertion
    /// (a reload happened between validation and commit)
    #[error("stale validation: {detail}")]
    StaleValidation { detail: String },

    #[error("grounding span is empty or out of bounds: {doc_id} [{start}, {end}]")]
    MissingGrounding {
        doc_id: String,
        start: usize,
        end: usize,
    },

    #[error("endpoint entity is not live: {0}")]
    EndpointNotLive(EntityId),
}

/// Result type for commit operations
pub type CommitResult<T> = Result<T, CommitError>;

/// Merge rollback: a reference rewrite failed its consistency check and
/// every change was undone
#[derive(Debug, Error)]
#[error("merge rolled back: {detail}")]
pub struct MergeRollbackError {
    pub detail: String,
}

/// A query pattern over (subject, predicate, object); `None` is a wildcard
#[derive(Debug, Clone, Default)]
pub struct TriplePattern {
    pub subject: Option<EntityId>,
    pub predicate: Option<String>,
    pub object: Option<ObjectRef>,
}

impl TriplePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: EntityId) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }

    fn matches(&self, triple: &CommittedTriple) -> bool {
        if let Some(s) = &self.subject {
            if &triple.subject != s {
                return false;
            }
        }
        if let Some(p) = &self.predicate {
            if &triple.predicate != p {
                return false;
            }
        }
        if let Some(o) = &self.object {
            if &triple.object != o {
                return false;
            }
        }
        true
    }
}

/// Immutable materialized view of the graph for downstream
/// visualization/export collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub triples: Vec<CommittedTriple>,
    pub taken_at: DateTime<Utc>,
}

/// The committed triple store.
///
/// Thread-safe: all access goes through one `RwLock`; repair rewrites
/// hold the write lock for their whole transaction.
#[derive(Debug, Default)]
pub struct GraphStore {
    triples: RwLock<HashMap<TripleId, CommittedTriple>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple, re-validating against the schema current at this
    /// moment (defense in depth, independent of the validator's pass).
    ///
    /// Endpoints must already be canonical entity ids — the store never
    /// accepts raw mention strings.
    pub fn insert(
        &self,
        triple: CommittedTriple,
        registry: &EntityRegistry,
        current_schema: &SchemaSnapshot,
        documents: &DocumentCatalog,
    ) -> CommitResult<TripleId> {
        if triple.grounding.is_empty() || !documents.span_in_bounds(&triple.grounding) {
            return Err(CommitError::MissingGrounding {
                doc_id: triple.grounding.doc_id.clone(),
                start: triple.grounding.start,
                end: triple.grounding.end,
            });
        }

        let def = current_schema.predicate(&triple.predicate).ok_or_else(|| {
            CommitError::StaleValidation {
                detail: format!(
                    "predicate {} absent from schema {}",
                    triple.predicate,
                    current_schema.version()
                ),
            }
        })?;

        if !registry.is_live(&triple.subject) {
            return Err(CommitError::EndpointNotLive(triple.subject.clone()));
        }
        let subject_class = registry.class_of(&triple.subject).unwrap_or_default();
        if !current_schema.is_class_or_descendant(&subject_class, &def.domain) {
            return Err(CommitError::StaleValidation {
                detail: format!(
                    "subject class {} no longer satisfies domain {} of {}",
                    subject_class, def.domain, def.name
                ),
            });
        }

        match (&def.range, &triple.object) {
            (RangeConstraint::Class(expected), ObjectRef::Entity(id)) => {
                if !registry.is_live(id) {
                    return Err(CommitError::EndpointNotLive(id.clone()));
                }
                let object_class = registry.class_of(id).unwrap_or_default();
                if !current_schema.is_class_or_descendant(&object_class, expected) {
                    return Err(CommitError::StaleValidation {
                        detail: format!(
                            "object class {} no longer satisfies range {} of {}",
                            object_class, expected, def.name
                        ),
                    });
                }
            }
            (RangeConstraint::Literal { literal }, ObjectRef::Literal { literal_type, .. }) => {
                if literal_type != literal {
                    return Err(CommitError::StaleValidation {
                        detail: format!(
                            "literal type {} no longer satisfies range literal:{} of {}",
                            literal_type, literal, def.name
                        ),
                    });
                }
            }
            (expected, _) => {
                return Err(CommitError::StaleValidation {
                    detail: format!(
                        "object shape no longer satisfies range {} of {}",
                        expected, def.name
                    ),
                });
            }
        }

        let id = triple.id;
        debug!(triple = %id, predicate = %triple.predicate, "triple committed");
        self.triples
            .write()
            .expect("graph store lock poisoned")
            .insert(id, triple);
        Ok(id)
    }

    /// Get a triple by id
    pub fn get(&self, id: &TripleId) -> Option<CommittedTriple> {
        self.triples
            .read()
            .expect("graph store lock poisoned")
            .get(id)
            .cloned()
    }

    /// Pattern query: any of (subject, predicate, object) may be a wildcard
    pub fn find(&self, pattern: &TriplePattern) -> Vec<CommittedTriple> {
        self.triples
            .read()
            .expect("graph store lock poisoned")
            .values()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect()
    }

    /// Number of committed triples
    pub fn len(&self) -> usize {
        self.triples.read().expect("graph store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immutable materialized view of entities and triples
    pub fn snapshot(&self, registry: &EntityRegistry) -> GraphSnapshot {
        GraphSnapshot {
            entities: registry.all_entities(),
            triples: self
                .triples
                .read()
                .expect("graph store lock poisoned")
                .values()
                .cloned()
                .collect(),
            taken_at: Utc::now(),
        }
    }

    /// Re-insert a previously exported triple (used when loading a
    /// persisted graph). Skips re-validation: the triple was already
    /// committed under its recorded schema version.
    pub fn restore_triple(&self, triple: CommittedTriple) {
        self.triples
            .write()
            .expect("graph store lock poisoned")
            .insert(triple.id, triple);
    }

    /// Rewrite every reference to `from` so it points at `to`, as one
    /// transaction: either every affected triple passes `verify` after
    /// the rewrite and the change commits, or every triple is restored
    /// to its prior state.
    ///
    /// Returns the number of rewritten triples.
    pub fn rewrite_references(
        &self,
        from: &EntityId,
        to: &EntityId,
        verify: impl Fn(&CommittedTriple) -> bool,
    ) -> Result<usize, MergeRollbackError> {
        let mut triples = self.triples.write().expect("graph store lock poisoned");

        let affected: Vec<TripleId> = triples
            .values()
            .filter(|t| {
                &t.subject == from || matches!(&t.object, ObjectRef::Entity(id) if id == from)
            })
            .map(|t| t.id)
            .collect();

        let mut previous: Vec<CommittedTriple> = Vec::with_capacity(affected.len());
        for id in &affected {
            if let Some(t) = triples.get_mut(id) {
                previous.push(t.clone());
                if &t.subject == from {
                    t.subject = to.clone();
                }
                if matches!(&t.object, ObjectRef::Entity(e) if e == from) {
                    t.object = ObjectRef::Entity(to.clone());
                }
            }
        }

        for id in &affected {
            let consistent = triples.get(id).map(|t| verify(t)).unwrap_or(false);
            if !consistent {
                for prior in previous.drain(..) {
                    triples.insert(prior.id, prior);
                }
                warn!(%from, %to, "merge rewrite failed consistency check, rolled back");
                return Err(MergeRollbackError {
                    detail: format!("triple {} failed referential consistency after rewrite", id),
                });
            }
        }

        Ok(affected.len())
    }

    /// Replace a triple's predicate in place (repairer only; caller has
    /// already checked domain/range preconditions).
    pub(crate) fn set_predicate(&self, id: &TripleId, predicate: &str) -> Option<CommittedTriple> {
        let mut triples = self.triples.write().expect("graph store lock poisoned");
        let triple = triples.get_mut(id)?;
        triple.predicate = predicate.to_string();
        Some(triple.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::CanonConfig;
    use crate::schema;

    const SCHEMA: &str = r#"
version: event-v1
classes:
  - name: Event
  - name: Agent
  - name: Place
predicates:
  - name: hasAgent
    domain: Event
    range: Agent
  - name: occurredIn
    domain: Event
    range: Place
"#;

    const NARROW_SCHEMA: &str = r#"
version: event-v2
classes:
  - name: Event
  - name: Place
predicates:
  - name: occurredIn
    domain: Event
    range: Place
"#;

    struct Fixture {
        schema: SchemaSnapshot,
        registry: EntityRegistry,
        documents: DocumentCatalog,
        store: GraphStore,
    }

    impl Fixture {
        fn new() -> Self {
            let mut documents = DocumentCatalog::new();
            documents.register("doc-1", 500);
            Self {
                schema: schema::load(SCHEMA).unwrap(),
                registry: EntityRegistry::new(&CanonConfig::default()),
                documents,
                store: GraphStore::new(),
            }
        }

        fn entity(&self, label: &str, class: &str) -> EntityId {
            self.registry
                .resolve(label, class, &self.schema, None)
                .unwrap()
                .id
        }

        fn triple(&self, subject: EntityId, predicate: &str, object: ObjectRef) -> CommittedTriple {
            CommittedTriple {
                id: TripleId::new(),
                subject,
                predicate: predicate.to_string(),
                object,
                grounding: GroundingSpan::new("doc-1", 120, 160),
                committed_at: Utc::now(),
                schema_version: self.schema.version().clone(),
                candidate: CandidateId::new(),
            }
        }
    }

    #[test]
    fn insert_and_pattern_query() {
        let f = Fixture::new();
        let event = f.entity("Event_1", "Event");
        let agent = f.entity("Palestinian Civilians", "Agent");
        let triple = f.triple(event.clone(), "hasAgent", ObjectRef::Entity(agent.clone()));
        f.store
            .insert(triple, &f.registry, &f.schema, &f.documents)
            .unwrap();

        let hits = f.store.find(&TriplePattern::new().with_subject(event));
        assert_eq!(hits.len(), 1);
        let hits = f
            .store
            .find(&TriplePattern::new().with_object(ObjectRef::Entity(agent)));
        assert_eq!(hits.len(), 1);
        assert!(f
            .store
            .find(&TriplePattern::new().with_predicate("occurredIn"))
            .is_empty());
    }

    #[test]
    fn insert_rejects_stale_predicate_after_reload() {
        let f = Fixture::new();
        let event = f.entity("Event_1", "Event");
        let agent = f.entity("Someone", "Agent");
        let triple = f.triple(event, "hasAgent", ObjectRef::Entity(agent));

        // Validation happened under event-v1; commit happens under the
        // narrowed schema where hasAgent no longer exists.
        let narrowed = schema::load(NARROW_SCHEMA).unwrap();
        let err = f
            .store
            .insert(triple, &f.registry, &narrowed, &f.documents)
            .unwrap_err();
        assert!(matches!(err, CommitError::StaleValidation { .. }));
        assert!(f.store.is_empty());
    }

    #[test]
    fn insert_rejects_empty_grounding() {
        let f = Fixture::new();
        let event = f.entity("Event_1", "Event");
        let agent = f.entity("Someone", "Agent");
        let mut triple = f.triple(event, "hasAgent", ObjectRef::Entity(agent));
        triple.grounding = GroundingSpan::new("doc-1", 80, 80);
        assert!(matches!(
            f.store
                .insert(triple, &f.registry, &f.schema, &f.documents)
                .unwrap_err(),
            CommitError::MissingGrounding { .. }
        ));
    }

    #[test]
    fn rewrite_references_updates_both_endpoints() {
        let f = Fixture::new();
        let event = f.entity("Event_1", "Event");
        let old_place = f.entity("al-Quds", "Place");
        let new_place = f.entity("Jerusalem", "Place");
        let t = f.triple(event, "occurredIn", ObjectRef::Entity(old_place.clone()));
        let tid = f
            .store
            .insert(t, &f.registry, &f.schema, &f.documents)
            .unwrap();

        let rewritten = f
            .store
            .rewrite_references(&old_place, &new_place, |_| true)
            .unwrap();
        assert_eq!(rewritten, 1);
        assert_eq!(
            f.store.get(&tid).unwrap().object,
            ObjectRef::Entity(new_place)
        );
    }

    #[test]
    fn failed_rewrite_restores_graph_exactly() {
        let f = Fixture::new();
        let event = f.entity("Event_1", "Event");
        let old_place = f.entity("al-Quds", "Place");
        let new_place = f.entity("Jerusalem", "Place");
        let t = f.triple(event, "occurredIn", ObjectRef::Entity(old_place.clone()));
        f.store
            .insert(t, &f.registry, &f.schema, &f.documents)
            .unwrap();
        let before = f.store.snapshot(&f.registry).triples;

        let err = f.store.rewrite_references(&old_place, &new_place, |_| false);
        assert!(err.is_err());

        let mut after = f.store.snapshot(&f.registry).triples;
        let mut before = before;
        before.sort_by_key(|t| t.id.to_string());
        after.sort_by_key(|t| t.id.to_string());
        assert_eq!(before, after);
    }
}
