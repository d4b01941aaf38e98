//! Ontology loading: YAML source -> validated SchemaSnapshot
//!
//! Loading is atomic. Every referential check (unknown classes, duplicate
//! names, cyclic hierarchy) runs against the parsed source before a
//! snapshot is assembled, so a partially parsed schema is never exposed.

use super::types::{PredicateDef, RangeConstraint, SchemaSnapshot, SchemaVersion};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors produced while loading an ontology source
#[derive(Debug, Error)]
pub enum OntologyParseError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("schema version must not be empty")]
    EmptyVersion,

    #[error("duplicate class definition: {0}")]
    DuplicateClass(String),

    #[error("duplicate predicate definition: {0}")]
    DuplicatePredicate(String),

    #[error("predicate '{predicate}' references unknown class: {class}")]
    UnknownClassInPredicate { predicate: String, class: String },

    #[error("class '{class}' references unknown parent: {parent}")]
    UnknownParent { class: String, parent: String },

    #[error("cyclic class hierarchy through: {0}")]
    CyclicHierarchy(String),

    #[error("synonym '{surface}' maps to unknown predicate: {canonical}")]
    UnknownSynonymTarget { surface: String, canonical: String },
}

/// Result type for schema loading
pub type SchemaResult<T> = Result<T, OntologyParseError>;

/// Declarative ontology source as written in YAML
#[derive(Debug, Deserialize)]
struct OntologySource {
    version: String,
    #[serde(default)]
    classes: Vec<ClassSource>,
    #[serde(default)]
    predicates: Vec<PredicateSource>,
    #[serde(default)]
    synonyms: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ClassSource {
    name: String,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredicateSource {
    name: String,
    domain: String,
    range: RangeConstraint,
}

/// Parse and validate an ontology description.
///
/// Returns a new snapshot on success; on any error the previously active
/// snapshot (held by the caller) is untouched.
pub fn load(source: &str) -> SchemaResult<SchemaSnapshot> {
    let parsed: OntologySource = serde_yaml::from_str(source)?;

    if parsed.version.trim().is_empty() {
        return Err(OntologyParseError::EmptyVersion);
    }

    // Classes first: parents and predicates reference them.
    let mut classes: HashMap<String, Option<String>> = HashMap::new();
    for class in &parsed.classes {
        if classes.contains_key(&class.name) {
            return Err(OntologyParseError::DuplicateClass(class.name.clone()));
        }
        classes.insert(class.name.clone(), class.parent.clone());
    }

    for class in &parsed.classes {
        if let Some(parent) = &class.parent {
            if !classes.contains_key(parent) {
                return Err(OntologyParseError::UnknownParent {
                    class: class.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    detect_cycles(&classes)?;

    let mut predicates: HashMap<String, PredicateDef> = HashMap::new();
    for pred in &parsed.predicates {
        if predicates.contains_key(&pred.name) {
            return Err(OntologyParseError::DuplicatePredicate(pred.name.clone()));
        }
        if !classes.contains_key(&pred.domain) {
            return Err(OntologyParseError::UnknownClassInPredicate {
                predicate: pred.name.clone(),
                class: pred.domain.clone(),
            });
        }
        if let RangeConstraint::Class(range_class) = &pred.range {
            if !classes.contains_key(range_class) {
                return Err(OntologyParseError::UnknownClassInPredicate {
                    predicate: pred.name.clone(),
                    class: range_class.clone(),
                });
            }
        }
        predicates.insert(
            pred.name.clone(),
            PredicateDef {
                name: pred.name.clone(),
                domain: pred.domain.clone(),
                range: pred.range.clone(),
            },
        );
    }

    for (surface, canonical) in &parsed.synonyms {
        if !predicates.contains_key(canonical) {
            return Err(OntologyParseError::UnknownSynonymTarget {
                surface: surface.clone(),
                canonical: canonical.clone(),
            });
        }
    }

    Ok(SchemaSnapshot::assemble(
        SchemaVersion::from_string(parsed.version),
        classes,
        predicates,
        parsed.synonyms,
    ))
}

/// Walk each parent chain; a chain longer than the class count means a cycle.
fn detect_cycles(classes: &HashMap<String, Option<String>>) -> SchemaResult<()> {
    for start in classes.keys() {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current: Option<&str> = Some(start.as_str());
        while let Some(c) = current {
            if !seen.insert(c) {
                return Err(OntologyParseError::CyclicHierarchy(start.clone()));
            }
            current = classes.get(c).and_then(|p| p.as_deref());
        }
    }
    Ok(())
}
