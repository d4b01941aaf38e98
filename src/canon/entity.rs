//! Canonical entities and their stable identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable canonical identifier for a resolved entity.
///
/// Derived deterministically from (class, normalized label) via a
/// namespaced UUID, rendered as `ontograph:<Class>/<uuid>`. Resolving the
/// same normalized mention under the same registry state always yields
/// the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Derive the canonical identifier for a (class, normalized label) pair
    pub fn derive(class: &str, normalized_label: &str) -> Self {
        let key = format!("ontograph:{}:{}", class, normalized_label);
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes());
        Self(format!("ontograph:{}/{}", class, uuid))
    }

    /// Reconstruct an EntityId from its serialized form
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A provenance record: where a mention of this entity appeared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMention {
    pub doc_id: String,
    pub start: usize,
    pub end: usize,
    /// The raw surface form as it appeared in the text
    pub raw: String,
}

/// Lifecycle status of an entity.
///
/// Entities are never deleted. A merged entity becomes a redirect to its
/// survivor; a redirect id is never reused as a live identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntityStatus {
    Live,
    Redirect { to: EntityId },
}

/// A canonical, deduplicated real-world referent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub class: String,
    /// Primary label: the first surface form that created this entity
    pub label: String,
    /// Normalization key of the primary label
    pub normalized_label: String,
    /// Alternate surface forms accumulated through merges and re-mentions
    pub aliases: BTreeSet<String>,
    /// Source mentions backing this entity
    pub mentions: Vec<SourceMention>,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new live entity for a first-seen referent
    pub fn new(class: impl Into<String>, label: impl Into<String>, normalized_label: impl Into<String>) -> Self {
        let class = class.into();
        let normalized_label = normalized_label.into();
        Self {
            id: EntityId::derive(&class, &normalized_label),
            class,
            label: label.into(),
            normalized_label,
            aliases: BTreeSet::new(),
            mentions: Vec::new(),
            status: EntityStatus::Live,
            created_at: Utc::now(),
        }
    }

    /// Record an alternate surface form
    pub fn add_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        if alias != self.label {
            self.aliases.insert(alias);
        }
    }

    /// Record a source mention
    pub fn add_mention(&mut self, mention: SourceMention) {
        if !self.mentions.contains(&mention) {
            self.mentions.push(mention);
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == EntityStatus::Live
    }
}

/// Result of a resolution: the canonical id plus whether it was created
/// by this call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub id: EntityId,
    pub created: bool,
}
