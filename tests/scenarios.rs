//! End-to-end curation scenarios: batches flowing through validation,
//! canonicalization, repair decisions, and the committed graph.

mod common;

use common::{engine, engine_with, event_candidate, EVENT_SCHEMA};
use ontograph::{
    CancellationToken, CanonConfig, EntityStatus, LiteralType, ObjectTerm, RepairAction,
    RepairFinding, TriplePattern,
};

// ============================================================================
// Valid candidates
// ============================================================================

#[test]
fn valid_candidate_commits_with_canonical_endpoints() {
    let engine = engine();
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "hasAgent",
            ObjectTerm::mention("Palestinian Civilians", "Agent"),
        )],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.committed.len(), 1);

    let (_, triple_id) = outcome.committed[0];
    let triple = engine.store().get(&triple_id).unwrap();
    assert_eq!(triple.predicate, "hasAgent");
    assert_eq!(triple.schema_version.as_str(), "event-v1");
    assert_eq!(
        engine.registry().class_of(&triple.subject),
        Some("Event".to_string())
    );
}

#[test]
fn repeated_mentions_resolve_to_one_entity() {
    let engine = engine();
    let batch = vec![
        event_candidate(
            "Event_1",
            "hasAgent",
            ObjectTerm::mention("Palestinian Civilians", "Agent"),
        ),
        event_candidate(
            "Event_2",
            "hasAgent",
            ObjectTerm::mention("palestinian   civilians", "Agent"),
        ),
    ];
    let outcome = engine.submit_batch(batch, &CancellationToken::new());
    assert_eq!(outcome.committed.len(), 2);

    let agents: Vec<_> = engine
        .registry()
        .live_entities()
        .into_iter()
        .filter(|e| e.class == "Agent")
        .collect();
    assert_eq!(agents.len(), 1);
}

#[test]
fn entity_ids_are_deterministic_across_engines() {
    let first = engine();
    let second = engine();
    for e in [&first, &second] {
        e.submit_batch(
            vec![event_candidate(
                "Event_1",
                "hasAgent",
                ObjectTerm::mention("Palestinian Civilians", "Agent"),
            )],
            &CancellationToken::new(),
        );
    }
    let ids = |e: &ontograph::CuratorEngine| {
        let mut v: Vec<String> = e
            .registry()
            .live_entities()
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        v.sort();
        v
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn literal_object_commits_without_creating_an_entity() {
    let engine = engine();
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "occurredOn",
            ObjectTerm::literal("1948-05-14", LiteralType::Date),
        )],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.committed.len(), 1);
    // Only the subject became an entity.
    assert_eq!(engine.registry().live_count(), 1);
}

#[test]
fn subclass_satisfies_range_constraint() {
    let engine = engine();
    // `involves` ranges over Thing; Place is a descendant of Thing.
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "involves",
            ObjectTerm::mention("Jerusalem", "Place"),
        )],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.committed.len(), 1);
}

// ============================================================================
// Invalid candidates
// ============================================================================

#[test]
fn unknown_predicate_is_discarded_and_audited() {
    let engine = engine();
    let c = event_candidate(
        "Event_1",
        "influencedBy",
        ObjectTerm::mention("Someone", "Agent"),
    );
    let id = c.id;
    let outcome = engine.submit_batch(vec![c], &CancellationToken::new());

    assert!(outcome.committed.is_empty());
    assert_eq!(outcome.discarded.len(), 1);
    assert!(outcome.discarded[0].1.contains("influencedBy"));
    assert_eq!(engine.store().len(), 0);
    // No entity is minted for a discarded candidate.
    assert_eq!(engine.registry().live_count(), 0);

    // Verdict plus discard, both traceable to the candidate.
    let trail = engine.audit().for_candidate(id);
    assert_eq!(trail.len(), 2);
}

#[test]
fn grounding_failures_are_invalid() {
    let engine = engine();
    let cases = vec![
        // Empty span.
        ontograph::TripleCandidate::new(
            ontograph::Mention::new("Event_1", "Event"),
            "hasAgent",
            ObjectTerm::mention("Someone", "Agent"),
            ontograph::GroundingSpan::new("doc-1", 50, 50),
        ),
        // Unknown document.
        ontograph::TripleCandidate::new(
            ontograph::Mention::new("Event_1", "Event"),
            "hasAgent",
            ObjectTerm::mention("Someone", "Agent"),
            ontograph::GroundingSpan::new("doc-unknown", 0, 10),
        ),
        // Out of bounds.
        ontograph::TripleCandidate::new(
            ontograph::Mention::new("Event_1", "Event"),
            "hasAgent",
            ObjectTerm::mention("Someone", "Agent"),
            ontograph::GroundingSpan::new("doc-1", 1990, 2050),
        ),
    ];
    let outcome = engine.submit_batch(cases, &CancellationToken::new());
    assert_eq!(outcome.discarded.len(), 3);
    assert_eq!(engine.store().len(), 0);
}

#[test]
fn domain_violation_is_invalid() {
    let engine = engine();
    let c = ontograph::TripleCandidate::new(
        ontograph::Mention::new("Jerusalem", "Place"),
        "hasAgent",
        ObjectTerm::mention("Someone", "Agent"),
        ontograph::GroundingSpan::new("doc-1", 100, 180),
    );
    let outcome = engine.submit_batch(vec![c], &CancellationToken::new());
    assert_eq!(outcome.discarded.len(), 1);
}

#[test]
fn literal_type_mismatch_is_invalid() {
    let engine = engine();
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "occurredOn",
            ObjectTerm::literal("yesterday", LiteralType::String),
        )],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.discarded.len(), 1);
}

// ============================================================================
// Repairable candidates
// ============================================================================

#[test]
fn synonym_predicate_queues_and_commits_canonical_on_accept() {
    let engine = engine();
    let c = event_candidate(
        "Event_1",
        "happened in",
        ObjectTerm::mention("Jerusalem", "Place"),
    );
    let id = c.id;
    let outcome = engine.submit_batch(vec![c], &CancellationToken::new());
    assert_eq!(outcome.queued, vec![id]);

    let pending = engine.pending_repairs();
    assert_eq!(pending.len(), 1);
    assert!(matches!(
        pending[0].findings[0],
        RepairFinding::PredicateSubstitution { .. }
    ));

    let triple_id = engine.accept_repair(id).unwrap();
    assert_eq!(
        engine.store().get(&triple_id).unwrap().predicate,
        "occurredIn"
    );
}

#[test]
fn alias_group_mention_binds_to_existing_entity_on_accept() {
    let engine = engine_with(CanonConfig {
        alias_groups: vec![vec!["Jerusalem".to_string(), "al-Quds".to_string()]],
        ..CanonConfig::default()
    });

    // First batch establishes the canonical entity.
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "occurredIn",
            ObjectTerm::mention("Jerusalem", "Place"),
        )],
        &CancellationToken::new(),
    );
    let (_, first_triple) = outcome.committed[0];
    let jerusalem = match engine.store().get(&first_triple).unwrap().object {
        ontograph::ObjectRef::Entity(id) => id,
        other => panic!("expected entity object, got {:?}", other),
    };

    // The alternate surface form is flagged rather than silently merged.
    let c = event_candidate(
        "Event_2",
        "occurredIn",
        ObjectTerm::mention("al-Quds", "Place"),
    );
    let id = c.id;
    let outcome = engine.submit_batch(vec![c], &CancellationToken::new());
    assert_eq!(outcome.queued, vec![id]);

    let triple_id = engine.accept_repair(id).unwrap();
    let second = engine.store().get(&triple_id).unwrap();
    assert_eq!(second.object, ontograph::ObjectRef::Entity(jerusalem.clone()));

    // One Place entity, carrying both surface forms.
    let places: Vec<_> = engine
        .registry()
        .live_entities()
        .into_iter()
        .filter(|e| e.class == "Place")
        .collect();
    assert_eq!(places.len(), 1);
    assert!(places[0].aliases.iter().any(|a| a == "al-Quds"));
}

#[test]
fn near_duplicate_mention_queues_for_review() {
    let engine = engine();
    engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "hasAgent",
            ObjectTerm::mention("Palestinian Civilians", "Agent"),
        )],
        &CancellationToken::new(),
    );
    let c = event_candidate(
        "Event_2",
        "hasAgent",
        ObjectTerm::mention("Palestinian Civilian", "Agent"),
    );
    let outcome = engine.submit_batch(vec![c], &CancellationToken::new());
    assert_eq!(outcome.queued.len(), 1);
    // Nothing merged until someone decides.
    assert_eq!(engine.registry().live_count(), 2);
}

// ============================================================================
// Merges against the committed graph
// ============================================================================

#[test]
fn accepted_merge_rewrites_committed_references() {
    let engine = engine();
    // Two clearly distinct places, each referenced by a committed triple.
    let outcome = engine.submit_batch(
        vec![
            event_candidate("Event_1", "occurredIn", ObjectTerm::mention("Jerusalem", "Place")),
            event_candidate("Event_2", "occurredIn", ObjectTerm::mention("Haifa", "Place")),
        ],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.committed.len(), 2);

    let place_id = |label: &str| {
        engine
            .registry()
            .live_entities()
            .into_iter()
            .find(|e| e.class == "Place" && e.label == label)
            .map(|e| e.id)
            .unwrap()
    };
    let keep = place_id("Jerusalem");
    let absorb = place_id("Haifa");

    let result = engine
        .apply_repair(RepairAction::MergeEntities {
            keep: keep.clone(),
            absorb: absorb.clone(),
        })
        .unwrap();
    assert_eq!(result.rewritten, 1);

    // Every committed reference now points at the survivor.
    let pattern = TriplePattern::new().with_object(ontograph::ObjectRef::Entity(keep.clone()));
    assert_eq!(engine.find(&pattern).len(), 2);
    let stale = TriplePattern::new().with_object(ontograph::ObjectRef::Entity(absorb.clone()));
    assert!(engine.find(&stale).is_empty());

    // The absorbed entity is a tombstone redirecting to the survivor.
    let absorbed = engine.registry().entity(&absorb).unwrap();
    assert_eq!(absorbed.status, EntityStatus::Redirect { to: keep.clone() });
    assert_eq!(engine.registry().follow_redirects(&absorb), keep);

    // New resolutions of the absorbed surface land on the survivor.
    let outcome = engine.submit_batch(
        vec![event_candidate("Event_3", "occurredIn", ObjectTerm::mention("Haifa", "Place"))],
        &CancellationToken::new(),
    );
    let (_, t) = outcome.committed[0];
    assert_eq!(
        engine.store().get(&t).unwrap().object,
        ontograph::ObjectRef::Entity(keep)
    );
}

#[test]
fn merge_preconditions_reject_cross_class_and_self_merges() {
    let engine = engine();
    engine.submit_batch(
        vec![
            event_candidate("Event_1", "occurredIn", ObjectTerm::mention("Jerusalem", "Place")),
            event_candidate("Event_2", "hasAgent", ObjectTerm::mention("Someone", "Agent")),
        ],
        &CancellationToken::new(),
    );
    let by_label = |label: &str| {
        engine
            .registry()
            .live_entities()
            .into_iter()
            .find(|e| e.label == label)
            .map(|e| e.id)
            .unwrap()
    };
    let place = by_label("Jerusalem");
    let agent = by_label("Someone");

    assert!(engine
        .apply_repair(RepairAction::MergeEntities {
            keep: place.clone(),
            absorb: agent,
        })
        .is_err());
    assert!(engine
        .apply_repair(RepairAction::MergeEntities {
            keep: place.clone(),
            absorb: place,
        })
        .is_err());
}

// ============================================================================
// Schema reloads mid-stream
// ============================================================================

#[test]
fn committed_triples_keep_their_validation_version_after_reload() {
    let engine = engine();
    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "hasAgent",
            ObjectTerm::mention("Someone", "Agent"),
        )],
        &CancellationToken::new(),
    );
    let (_, t1) = outcome.committed[0];

    engine
        .reload_schema(&EVENT_SCHEMA.replace("event-v1", "event-v2"))
        .unwrap();

    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_2",
            "hasAgent",
            ObjectTerm::mention("Someone", "Agent"),
        )],
        &CancellationToken::new(),
    );
    let (_, t2) = outcome.committed[0];

    assert_eq!(engine.store().get(&t1).unwrap().schema_version.as_str(), "event-v1");
    assert_eq!(engine.store().get(&t2).unwrap().schema_version.as_str(), "event-v2");
}

#[test]
fn predicate_removed_by_reload_invalidates_new_candidates() {
    let engine = engine();
    let narrowed = r#"
version: event-v2
classes:
  - name: Event
  - name: Agent
predicates:
  - name: hasAgent
    domain: Event
    range: Agent
"#;
    engine.reload_schema(narrowed).unwrap();

    let outcome = engine.submit_batch(
        vec![event_candidate(
            "Event_1",
            "occurredIn",
            ObjectTerm::mention("Jerusalem", "Place"),
        )],
        &CancellationToken::new(),
    );
    assert_eq!(outcome.discarded.len(), 1);
}
