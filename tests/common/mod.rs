//! Common test fixtures: a small event ontology and candidate builders.

use ontograph::{
    CanonConfig, CuratorEngine, GroundingSpan, Mention, ObjectTerm, TripleCandidate,
};

/// A small event ontology covering the curated test scenarios.
pub const EVENT_SCHEMA: &str = r#"
version: event-v1
classes:
  - name: Thing
  - name: Event
    parent: Thing
  - name: Agent
    parent: Thing
  - name: Place
    parent: Thing
predicates:
  - name: hasAgent
    domain: Event
    range: Agent
  - name: occurredIn
    domain: Event
    range: Place
  - name: occurredOn
    domain: Event
    range:
      literal: date
  - name: involves
    domain: Event
    range: Thing
synonyms:
  "happened in": occurredIn
  "وقع في": occurredIn
"#;

/// Engine over the event ontology with one registered document.
pub fn engine_with(config: CanonConfig) -> CuratorEngine {
    let snapshot = ontograph::schema::load(EVENT_SCHEMA).unwrap();
    let engine = CuratorEngine::new(snapshot, config);
    engine.register_document("doc-1", 2000);
    engine
}

pub fn engine() -> CuratorEngine {
    engine_with(CanonConfig::default())
}

/// Candidate with an Event subject and a grounded span in doc-1.
pub fn event_candidate(subject: &str, predicate: &str, object: ObjectTerm) -> TripleCandidate {
    TripleCandidate::new(
        Mention::new(subject, "Event"),
        predicate,
        object,
        GroundingSpan::new("doc-1", 100, 180),
    )
}
