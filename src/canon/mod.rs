//! Entity canonicalization: mention -> stable canonical identity
//!
//! The registry is the single contention point of the engine. Writes are
//! serialized per (class, normalized-label) bucket through the bucket
//! map's entry locking, so two concurrent resolutions of the same
//! referent cannot create two distinct entities. Lock order is always
//! buckets -> entities.

mod entity;
mod normalize;

pub use entity::{Entity, EntityId, EntityRef, EntityStatus, SourceMention};
pub use normalize::{normalize_label, similarity};

use crate::schema::SchemaSnapshot;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Errors from entity resolution
#[derive(Debug, Error)]
pub enum CanonError {
    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}

/// Result type for canonicalization operations
pub type CanonResult<T> = Result<T, CanonError>;

/// Tunable resolution parameters.
///
/// The similarity threshold and the alias table are configuration, not
/// fixed policy; defaults are validated against the curated scenarios
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    /// Minimum similarity score at which a mention attaches to an
    /// existing entity instead of creating a new one
    pub merge_threshold: f64,
    /// Groups of surface forms naming the same referent
    /// (e.g. ["Jerusalem", "al-Quds"]). Normalized at construction.
    pub alias_groups: Vec<Vec<String>>,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 0.85,
            alias_groups: Vec::new(),
        }
    }
}

type BucketKey = (String, String); // (class, normalized label)

/// Undo state captured before a merge, so a failed merge transaction can
/// restore the registry byte-for-byte.
#[derive(Debug)]
pub struct MergeUndo {
    keep_before: Entity,
    absorb_before: Entity,
    repointed: Vec<BucketKey>,
}

/// The transactional entity registry.
///
/// Holds every entity ever created (live or redirect) plus the bucket
/// index used for single-writer resolution.
#[derive(Debug)]
pub struct EntityRegistry {
    entities: DashMap<EntityId, Entity>,
    buckets: DashMap<BucketKey, EntityId>,
    /// Normalized alias groups from configuration
    alias_groups: Vec<BTreeSet<String>>,
    merge_threshold: f64,
}

impl EntityRegistry {
    pub fn new(config: &CanonConfig) -> Self {
        let alias_groups = config
            .alias_groups
            .iter()
            .map(|group| group.iter().map(|s| normalize_label(s)).collect())
            .collect();
        Self {
            entities: DashMap::new(),
            buckets: DashMap::new(),
            alias_groups,
            merge_threshold: config.merge_threshold,
        }
    }

    /// Resolve a mention of `class` to a canonical entity, creating one
    /// if no existing live entity matches at or above the merge threshold.
    ///
    /// Idempotent: the same normalized mention under the same registry
    /// state always returns the same canonical identifier.
    pub fn resolve(
        &self,
        mention: &str,
        class: &str,
        schema: &SchemaSnapshot,
        provenance: Option<SourceMention>,
    ) -> CanonResult<EntityRef> {
        if !schema.has_class(class) {
            return Err(CanonError::UnknownClass(class.to_string()));
        }
        let norm = normalize_label(mention);
        let key = (class.to_string(), norm.clone());

        // The entry holds its shard lock for the rest of the resolution,
        // which is the single-writer section for this bucket.
        match self.buckets.entry(key) {
            Entry::Occupied(occupied) => {
                let id = occupied.get().clone();
                let id = self.follow_redirects(&id);
                self.record_surface(&id, mention, provenance);
                Ok(EntityRef { id, created: false })
            }
            Entry::Vacant(vacant) => {
                if let Some((id, score)) = self.best_match(class, &norm) {
                    if score >= self.merge_threshold {
                        debug!(mention, %id, score, "attached mention to existing entity");
                        vacant.insert(id.clone());
                        self.record_surface(&id, mention, provenance);
                        return Ok(EntityRef { id, created: false });
                    }
                }
                let mut entity = Entity::new(class, mention, norm);
                if let Some(p) = provenance {
                    entity.add_mention(p);
                }
                let id = entity.id.clone();
                debug!(mention, %id, "created new entity");
                self.entities.insert(id.clone(), entity);
                vacant.insert(id.clone());
                Ok(EntityRef { id, created: true })
            }
        }
    }

    /// Best live entity of `class` for a normalized mention, with score.
    ///
    /// Score combines normalized-string equality, alias-set membership,
    /// configured alias groups (all 1.0), and bigram overlap otherwise.
    pub fn best_match(&self, class: &str, norm: &str) -> Option<(EntityId, f64)> {
        let group = self.group_of(norm);
        let mut best: Option<(EntityId, f64)> = None;
        for entry in self.entities.iter() {
            let e = entry.value();
            if !e.is_live() || e.class != class {
                continue;
            }
            let score = self.score_against(e, norm, group);
            if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                best = Some((e.id.clone(), score));
            }
        }
        best
    }

    fn score_against(&self, entity: &Entity, norm: &str, group: Option<usize>) -> f64 {
        if entity.normalized_label == norm {
            return 1.0;
        }
        let mut score = similarity(norm, &entity.normalized_label);
        for alias in &entity.aliases {
            let alias_norm = normalize_label(alias);
            if alias_norm == norm {
                return 1.0;
            }
            score = score.max(similarity(norm, &alias_norm));
        }
        if let Some(g) = group {
            let same_group = self.alias_groups[g].contains(&entity.normalized_label)
                || entity
                    .aliases
                    .iter()
                    .any(|a| self.alias_groups[g].contains(&normalize_label(a)));
            if same_group {
                return 1.0;
            }
        }
        score
    }

    fn group_of(&self, norm: &str) -> Option<usize> {
        self.alias_groups.iter().position(|g| g.contains(norm))
    }

    /// Record a surface form and provenance on an already-resolved entity
    fn record_surface(&self, id: &EntityId, raw: &str, provenance: Option<SourceMention>) {
        if let Some(mut entity) = self.entities.get_mut(id) {
            entity.add_alias(raw);
            if let Some(p) = provenance {
                entity.add_mention(p);
            }
        }
    }

    /// Follow redirect links to the live survivor
    pub fn follow_redirects(&self, id: &EntityId) -> EntityId {
        let mut current = id.clone();
        loop {
            let next = match self.entities.get(&current) {
                Some(e) => match &e.status {
                    EntityStatus::Live => return current,
                    EntityStatus::Redirect { to } => to.clone(),
                },
                None => return current,
            };
            current = next;
        }
    }

    /// Fetch an entity by id
    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.entities.get(id).map(|e| e.clone())
    }

    /// The class of an entity, following redirects
    pub fn class_of(&self, id: &EntityId) -> Option<String> {
        let live = self.follow_redirects(id);
        self.entities.get(&live).map(|e| e.class.clone())
    }

    /// Whether the entity exists and is live
    pub fn is_live(&self, id: &EntityId) -> bool {
        self.entities
            .get(id)
            .map(|e| e.is_live())
            .unwrap_or(false)
    }

    /// All live entities (cloned view)
    pub fn live_entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|e| e.value().is_live())
            .map(|e| e.value().clone())
            .collect()
    }

    /// All entities including redirects (cloned view)
    pub fn all_entities(&self) -> Vec<Entity> {
        self.entities.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of live entities
    pub fn live_count(&self) -> usize {
        self.entities.iter().filter(|e| e.value().is_live()).count()
    }

    /// Re-insert a previously exported entity (used when loading a
    /// persisted graph).
    pub fn restore_entity(&self, entity: Entity) {
        if entity.is_live() {
            self.buckets.insert(
                (entity.class.clone(), entity.normalized_label.clone()),
                entity.id.clone(),
            );
            for alias in &entity.aliases {
                self.buckets
                    .entry((entity.class.clone(), normalize_label(alias)))
                    .or_insert_with(|| entity.id.clone());
            }
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Merge `absorb` into `keep`: union aliases and provenance, mark
    /// `absorb` as a redirect, and re-point its buckets at `keep`.
    ///
    /// Returns undo state so the caller can restore the registry if a
    /// later step of the merge transaction fails. The caller serializes
    /// merges; this method performs only the data movement.
    pub fn merge_into(&self, keep: &EntityId, absorb: &EntityId) -> CanonResult<MergeUndo> {
        let keep_before = self
            .entity(keep)
            .ok_or_else(|| CanonError::UnknownEntity(keep.clone()))?;
        let absorb_before = self
            .entity(absorb)
            .ok_or_else(|| CanonError::UnknownEntity(absorb.clone()))?;

        {
            let mut keep_entity = self
                .entities
                .get_mut(keep)
                .ok_or_else(|| CanonError::UnknownEntity(keep.clone()))?;
            keep_entity.add_alias(absorb_before.label.clone());
            for alias in &absorb_before.aliases {
                keep_entity.add_alias(alias.clone());
            }
            for mention in &absorb_before.mentions {
                keep_entity.add_mention(mention.clone());
            }
        }
        {
            let mut absorb_entity = self
                .entities
                .get_mut(absorb)
                .ok_or_else(|| CanonError::UnknownEntity(absorb.clone()))?;
            absorb_entity.status = EntityStatus::Redirect { to: keep.clone() };
        }

        let mut repointed = Vec::new();
        for mut bucket in self.buckets.iter_mut() {
            if bucket.value() == absorb {
                *bucket.value_mut() = keep.clone();
                repointed.push(bucket.key().clone());
            }
        }

        Ok(MergeUndo {
            keep_before,
            absorb_before,
            repointed,
        })
    }

    /// Restore registry state captured by `merge_into`
    pub fn restore_merge(&self, undo: MergeUndo) {
        let absorb_id = undo.absorb_before.id.clone();
        self.entities
            .insert(undo.keep_before.id.clone(), undo.keep_before);
        self.entities.insert(absorb_id.clone(), undo.absorb_before);
        for key in undo.repointed {
            self.buckets.insert(key, absorb_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn test_schema() -> SchemaSnapshot {
        schema::load(
            r#"
version: test-v1
classes:
  - name: Agent
  - name: Place
predicates: []
"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve_is_idempotent() {
        let registry = EntityRegistry::new(&CanonConfig::default());
        let schema = test_schema();
        let first = registry
            .resolve("Palestinian Civilians", "Agent", &schema, None)
            .unwrap();
        let second = registry
            .resolve("palestinian   civilians", "Agent", &schema, None)
            .unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn resolve_rejects_unknown_class() {
        let registry = EntityRegistry::new(&CanonConfig::default());
        let schema = test_schema();
        assert!(matches!(
            registry.resolve("x", "Nope", &schema, None),
            Err(CanonError::UnknownClass(_))
        ));
    }

    #[test]
    fn same_label_different_class_stays_distinct() {
        let registry = EntityRegistry::new(&CanonConfig::default());
        let schema = test_schema();
        let a = registry.resolve("Jordan", "Agent", &schema, None).unwrap();
        let b = registry.resolve("Jordan", "Place", &schema, None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn alias_group_members_resolve_to_one_entity() {
        let config = CanonConfig {
            alias_groups: vec![vec!["Jerusalem".to_string(), "al-Quds".to_string()]],
            ..Default::default()
        };
        let registry = EntityRegistry::new(&config);
        let schema = test_schema();
        let a = registry
            .resolve("Jerusalem", "Place", &schema, None)
            .unwrap();
        let b = registry.resolve("al-Quds", "Place", &schema, None).unwrap();
        assert_eq!(a.id, b.id);
        let entity = registry.entity(&a.id).unwrap();
        assert!(entity.aliases.contains("al-Quds"));
    }

    #[test]
    fn merge_marks_redirect_and_unions_aliases() {
        let registry = EntityRegistry::new(&CanonConfig::default());
        let schema = test_schema();
        let keep = registry
            .resolve("Jerusalem", "Place", &schema, None)
            .unwrap();
        let absorb = registry.resolve("al-Quds", "Place", &schema, None).unwrap();
        assert_ne!(keep.id, absorb.id);

        registry.merge_into(&keep.id, &absorb.id).unwrap();
        assert!(!registry.is_live(&absorb.id));
        assert_eq!(registry.follow_redirects(&absorb.id), keep.id);
        let survivor = registry.entity(&keep.id).unwrap();
        assert!(survivor.aliases.contains("al-Quds"));

        // New mentions of the absorbed form land on the survivor.
        let again = registry.resolve("al-Quds", "Place", &schema, None).unwrap();
        assert_eq!(again.id, keep.id);
    }

    #[test]
    fn restore_merge_recovers_prior_state() {
        let registry = EntityRegistry::new(&CanonConfig::default());
        let schema = test_schema();
        let keep = registry
            .resolve("Jerusalem", "Place", &schema, None)
            .unwrap();
        let absorb = registry.resolve("al-Quds", "Place", &schema, None).unwrap();
        let keep_before = registry.entity(&keep.id).unwrap();
        let absorb_before = registry.entity(&absorb.id).unwrap();

        let undo = registry.merge_into(&keep.id, &absorb.id).unwrap();
        registry.restore_merge(undo);

        assert_eq!(registry.entity(&keep.id).unwrap(), keep_before);
        assert_eq!(registry.entity(&absorb.id).unwrap(), absorb_before);
        assert!(registry.is_live(&absorb.id));
    }
}
