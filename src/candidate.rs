//! Candidate triples as produced by the external triple generator

use crate::schema::LiteralType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a candidate triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(Uuid);

impl CandidateId {
    /// Create a new random CandidateId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The source-text offset range proving a triple's textual evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSpan {
    /// Source document identifier
    pub doc_id: String,
    /// Byte offset of the span start
    pub start: usize,
    /// Byte offset one past the span end
    pub end: usize,
}

impl GroundingSpan {
    pub fn new(doc_id: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            doc_id: doc_id.into(),
            start,
            end,
        }
    }

    /// A span is empty when it covers no text
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A textual mention with its inferred class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    pub class: String,
}

impl Mention {
    pub fn new(text: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: class.into(),
        }
    }
}

/// The object side of a candidate: an entity mention or a literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObjectTerm {
    Mention(Mention),
    Literal {
        value: String,
        literal_type: LiteralType,
    },
}

impl ObjectTerm {
    pub fn mention(text: impl Into<String>, class: impl Into<String>) -> Self {
        Self::Mention(Mention::new(text, class))
    }

    pub fn literal(value: impl Into<String>, literal_type: LiteralType) -> Self {
        Self::Literal {
            value: value.into(),
            literal_type,
        }
    }
}

/// A machine-proposed (subject, predicate, object) assertion.
///
/// Immutable once produced; the engine only ever reads it and records a
/// verdict against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleCandidate {
    pub id: CandidateId,
    pub subject: Mention,
    pub predicate: String,
    pub object: ObjectTerm,
    pub grounding: GroundingSpan,
    pub confidence: f32,
    /// Identifier of the event block the generator derived this from
    pub event_block: String,
}

impl TripleCandidate {
    pub fn new(
        subject: Mention,
        predicate: impl Into<String>,
        object: ObjectTerm,
        grounding: GroundingSpan,
    ) -> Self {
        Self {
            id: CandidateId::new(),
            subject,
            predicate: predicate.into(),
            object,
            grounding,
            confidence: 1.0,
            event_block: String::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_event_block(mut self, event_block: impl Into<String>) -> Self {
        self.event_block = event_block.into();
        self
    }
}

/// Wire format of the candidate stream.
///
/// Field names follow the generator's records; `into_candidate` assigns
/// the internal id and folds the object fields into an `ObjectTerm`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub subject: String,
    pub subject_class: String,
    pub predicate: String,
    pub object: String,
    /// Either a class name or "literal:<type>" (string, date, number)
    pub object_class_or_literal: String,
    pub grounding_span: WireSpan,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub source_event_block_id: String,
}

fn default_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpan {
    pub doc_id: String,
    pub start: usize,
    pub end: usize,
}

impl CandidateRecord {
    /// Convert the wire record into an internal candidate.
    pub fn into_candidate(self) -> TripleCandidate {
        let object = match self.object_class_or_literal.strip_prefix("literal:") {
            Some(lit) => {
                let literal_type = match lit {
                    "date" => LiteralType::Date,
                    "number" => LiteralType::Number,
                    _ => LiteralType::String,
                };
                ObjectTerm::literal(self.object, literal_type)
            }
            None => ObjectTerm::mention(self.object, self.object_class_or_literal),
        };
        TripleCandidate::new(
            Mention::new(self.subject, self.subject_class),
            self.predicate,
            object,
            GroundingSpan::new(self.grounding_span.doc_id, self.grounding_span.start, self.grounding_span.end),
        )
        .with_confidence(self.confidence)
        .with_event_block(self.source_event_block_id)
    }
}

/// Known source documents and their text lengths, for grounding bounds checks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentCatalog {
    lengths: HashMap<String, usize>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document and its text length
    pub fn register(&mut self, doc_id: impl Into<String>, length: usize) {
        self.lengths.insert(doc_id.into(), length);
    }

    /// Whether the document is known
    pub fn contains(&self, doc_id: &str) -> bool {
        self.lengths.contains_key(doc_id)
    }

    /// Whether a span lies within the named document's bounds
    pub fn span_in_bounds(&self, span: &GroundingSpan) -> bool {
        match self.lengths.get(&span.doc_id) {
            Some(&len) => !span.is_empty() && span.end <= len,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_record_parses_mention_object() {
        let json = r#"{
            "subject": "Event_1",
            "subjectClass": "Event",
            "predicate": "hasAgent",
            "object": "Palestinian Civilians",
            "objectClassOrLiteral": "Agent",
            "groundingSpan": {"docId": "doc-1", "start": 120, "end": 160},
            "confidence": 0.9,
            "sourceEventBlockId": "blk-3"
        }"#;
        let record: CandidateRecord = serde_json::from_str(json).unwrap();
        let candidate = record.into_candidate();
        assert_eq!(candidate.subject.class, "Event");
        assert_eq!(
            candidate.object,
            ObjectTerm::mention("Palestinian Civilians", "Agent")
        );
        assert_eq!(candidate.grounding.start, 120);
        assert_eq!(candidate.event_block, "blk-3");
    }

    #[test]
    fn wire_record_parses_literal_object() {
        let json = r#"{
            "subject": "Event_1",
            "subjectClass": "Event",
            "predicate": "occurredOn",
            "object": "1948-05-14",
            "objectClassOrLiteral": "literal:date",
            "groundingSpan": {"docId": "doc-1", "start": 10, "end": 20}
        }"#;
        let record: CandidateRecord = serde_json::from_str(json).unwrap();
        let candidate = record.into_candidate();
        assert_eq!(
            candidate.object,
            ObjectTerm::literal("1948-05-14", LiteralType::Date)
        );
        assert_eq!(candidate.confidence, 1.0);
    }

    #[test]
    fn span_bounds() {
        let mut docs = DocumentCatalog::new();
        docs.register("doc-1", 200);
        assert!(docs.span_in_bounds(&GroundingSpan::new("doc-1", 120, 160)));
        assert!(!docs.span_in_bounds(&GroundingSpan::new("doc-1", 150, 250)));
        assert!(!docs.span_in_bounds(&GroundingSpan::new("doc-1", 50, 50)));
        assert!(!docs.span_in_bounds(&GroundingSpan::new("doc-2", 0, 10)));
    }
}
