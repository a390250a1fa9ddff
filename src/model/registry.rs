use std::collections::HashMap;

use lru::LruCache;
use tracing::debug;

use crate::core::EntityId;

use super::Entity;

/// Identity map of one unit of work: at most one resident [`Entity`] per
/// `(kind, id)`.
///
/// Each kind keeps its entities in insertion order. Once a kind holds more
/// than `capacity` entities, the oldest unmodified ones are dropped. Modified
/// entities and the entity being registered are never dropped, so a kind may
/// exceed its capacity while dirty work is pending.
pub struct Registry {
    capacity: usize,
    kinds: HashMap<String, LruCache<EntityId, Entity>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            kinds: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&mut self, kind: &str) -> &mut LruCache<EntityId, Entity> {
        self.kinds
            .entry(kind.to_string())
            .or_insert_with(LruCache::unbounded)
    }

    pub fn lookup(&self, kind: &str, id: EntityId) -> Option<Entity> {
        self.kinds.get(kind).and_then(|map| map.peek(&id)).cloned()
    }

    pub fn contains(&self, kind: &str, id: EntityId) -> bool {
        self.kinds.get(kind).is_some_and(|map| map.contains(&id))
    }

    /// Returns the resident entity, registering the one built by `make` when
    /// there is none.
    pub fn get_or_insert_with(
        &mut self,
        kind: &str,
        id: EntityId,
        make: impl FnOnce() -> Entity,
    ) -> Entity {
        if let Some(entity) = self.lookup(kind, id) {
            return entity;
        }
        let entity = make();
        self.insert(kind, id, entity.clone());
        entity
    }

    /// Registers `entity`, replacing any resident instance for the same id.
    pub fn insert(&mut self, kind: &str, id: EntityId, entity: Entity) {
        // `put` on an existing key would only refresh it; re-registration
        // moves the id to the newest position.
        let map = self.slot(kind);
        map.pop(&id);
        map.put(id, entity);
        self.evict(kind, Some(id));
    }

    pub fn remove(&mut self, kind: &str, id: EntityId) -> Option<Entity> {
        self.kinds.get_mut(kind).and_then(|map| map.pop(&id))
    }

    /// Drops the oldest unmodified entities of `kind` until it is back within
    /// capacity. Returns the number dropped.
    pub fn cleanup(&mut self, kind: &str) -> usize {
        self.evict(kind, None)
    }

    /// `keep` is exempt: a just-registered entity is never its own victim.
    fn evict(&mut self, kind: &str, keep: Option<EntityId>) -> usize {
        let capacity = self.capacity;
        let Some(map) = self.kinds.get_mut(kind) else {
            return 0;
        };
        if map.len() <= capacity {
            return 0;
        }

        let excess = map.len() - capacity;
        let victims: Vec<EntityId> = map
            .iter()
            .rev()
            .filter(|(id, entity)| Some(**id) != keep && !entity.is_modified())
            .map(|(id, _)| *id)
            .take(excess)
            .collect();

        for id in &victims {
            map.pop(id);
        }
        if !victims.is_empty() {
            debug!(kind, evicted = victims.len(), resident = map.len(), "registry cleanup");
        }
        victims.len()
    }

    /// Drops every entity of `kind`; with `force = false` modified entities stay.
    pub fn reset_all(&mut self, kind: &str, force: bool) -> usize {
        let Some(map) = self.kinds.get_mut(kind) else {
            return 0;
        };

        let victims: Vec<EntityId> = map
            .iter()
            .filter(|(_, entity)| force || !entity.is_modified())
            .map(|(id, _)| *id)
            .collect();

        for id in &victims {
            if let Some(entity) = map.pop(id) {
                if force {
                    entity.release();
                }
            }
        }
        victims.len()
    }

    pub fn len(&self, kind: &str) -> usize {
        self.kinds.get(kind).map(LruCache::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(LruCache::is_empty)
    }

    /// Ids of `kind` from oldest to newest registration.
    pub fn ids(&self, kind: &str) -> Vec<EntityId> {
        self.kinds
            .get(kind)
            .map(|map| map.iter().rev().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }
}
