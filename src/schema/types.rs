//! Schema snapshot types: classes, predicates, and synonym tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version identifier for a loaded schema
///
/// Serializes as a plain string (e.g. "event-v1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Create a SchemaVersion from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SchemaVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Literal types a predicate range may name instead of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralType {
    String,
    Date,
    Number,
}

impl std::fmt::Display for LiteralType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Date => write!(f, "date"),
            Self::Number => write!(f, "number"),
        }
    }
}

/// The range side of a predicate: either a class or a literal type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeConstraint {
    /// Objects must be entity mentions of this class (or a descendant)
    Class(String),
    /// Objects must be literals of this type
    Literal { literal: LiteralType },
}

impl std::fmt::Display for RangeConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class(c) => write!(f, "{}", c),
            Self::Literal { literal } => write!(f, "literal:{}", literal),
        }
    }
}

/// A predicate definition: name plus domain/range constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDef {
    /// Canonical predicate name (e.g. "hasAgent")
    pub name: String,
    /// Class the subject must belong to
    pub domain: String,
    /// Class or literal type the object must satisfy
    pub range: RangeConstraint,
}

/// An immutable in-memory snapshot of one loaded ontology.
///
/// Snapshots are never mutated: a reload produces a new, independently
/// addressable snapshot, and in-flight work keeps its own `Arc` to the
/// snapshot it started under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    version: SchemaVersion,
    /// Class name -> optional parent class (single-inheritance hierarchy)
    classes: HashMap<String, Option<String>>,
    /// Canonical predicate name -> definition
    predicates: HashMap<String, PredicateDef>,
    /// Surface predicate label -> canonical predicate name
    synonyms: HashMap<String, String>,
    loaded_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Assemble a snapshot from already-validated parts.
    ///
    /// Only the loader constructs snapshots; it performs all referential
    /// checks before calling this.
    pub(crate) fn assemble(
        version: SchemaVersion,
        classes: HashMap<String, Option<String>>,
        predicates: HashMap<String, PredicateDef>,
        synonyms: HashMap<String, String>,
    ) -> Self {
        Self {
            version,
            classes,
            predicates,
            synonyms,
            loaded_at: Utc::now(),
        }
    }

    /// The version identifier of this snapshot
    pub fn version(&self) -> &SchemaVersion {
        &self.version
    }

    /// When this snapshot was loaded
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Whether the schema defines the given class
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Look up a predicate definition by canonical name
    pub fn predicate(&self, name: &str) -> Option<&PredicateDef> {
        self.predicates.get(name)
    }

    /// Resolve a surface label through the synonym table
    pub fn canonical_for(&self, surface: &str) -> Option<&str> {
        self.synonyms.get(surface).map(|s| s.as_str())
    }

    /// Whether `class` equals `ancestor` or descends from it through
    /// the parent chain.
    pub fn is_class_or_descendant(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.classes.get(c).and_then(|p| p.as_deref());
        }
        false
    }

    /// Iterate class names
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|s| s.as_str())
    }

    /// Iterate predicate definitions
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateDef> {
        self.predicates.values()
    }

    /// Number of classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of predicates
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    /// Number of synonym mappings
    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SchemaSnapshot {
        let mut classes = HashMap::new();
        classes.insert("Thing".to_string(), None);
        classes.insert("Agent".to_string(), Some("Thing".to_string()));
        classes.insert("Organization".to_string(), Some("Agent".to_string()));
        let mut predicates = HashMap::new();
        predicates.insert(
            "hasAgent".to_string(),
            PredicateDef {
                name: "hasAgent".to_string(),
                domain: "Thing".to_string(),
                range: RangeConstraint::Class("Agent".to_string()),
            },
        );
        SchemaSnapshot::assemble(
            SchemaVersion::from("test-v1"),
            classes,
            predicates,
            HashMap::new(),
        )
    }

    #[test]
    fn descendant_walks_parent_chain() {
        let s = snapshot();
        assert!(s.is_class_or_descendant("Organization", "Thing"));
        assert!(s.is_class_or_descendant("Agent", "Agent"));
        assert!(!s.is_class_or_descendant("Thing", "Agent"));
    }

    #[test]
    fn unknown_class_is_not_descendant() {
        let s = snapshot();
        assert!(!s.is_class_or_descendant("Nonexistent", "Thing"));
    }

    #[test]
    fn predicate_lookup() {
        let s = snapshot();
        assert!(s.predicate("hasAgent").is_some());
        assert!(s.predicate("influencedBy").is_none());
    }
}
