//! Verdicts: the tagged outcome of validating one candidate

use crate::canon::EntityId;
use serde::{Deserialize, Serialize};

/// Why a candidate was rejected outright
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidReason {
    /// Predicate absent from the schema with no synonym mapping
    UnknownPredicate { predicate: String },
    /// Grounding span empty, out of bounds, or naming an unknown document
    MissingGrounding { detail: String },
    /// Subject class fails the predicate's domain constraint
    DomainViolation {
        predicate: String,
        expected: String,
        found: String,
    },
    /// Object class or literal type fails the predicate's range constraint
    RangeViolation {
        predicate: String,
        expected: String,
        found: String,
    },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPredicate { predicate } => {
                write!(f, "unknown predicate: {}", predicate)
            }
            Self::MissingGrounding { detail } => write!(f, "missing grounding: {}", detail),
            Self::DomainViolation {
                predicate,
                expected,
                found,
            } => write!(
                f,
                "domain violation on {}: expected {}, found {}",
                predicate, expected, found
            ),
            Self::RangeViolation {
                predicate,
                expected,
                found,
            } => write!(
                f,
                "range violation on {}: expected {}, found {}",
                predicate, expected, found
            ),
        }
    }
}

/// A proposed fix for an otherwise-acceptable candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fix", rename_all = "snake_case")]
pub enum RepairFinding {
    /// Replace the surface predicate with its canonical form
    PredicateSubstitution { surface: String, canonical: String },
    /// The object mention nearly collides with an existing entity;
    /// merging them needs review
    EntityMerge {
        mention: String,
        class: String,
        existing: EntityId,
    },
}

/// The verdict over one candidate under one schema version.
///
/// Repair findings accumulate: an otherwise-acceptable candidate carries
/// every repair opportunity in a single verdict, so a reviewer sees one
/// suggestion per triple rather than one per rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Valid,
    Repairable { findings: Vec<RepairFinding> },
    Invalid { reason: InvalidReason },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::Repairable { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}
