// Entity store: owns entities keyed by id, in deterministic id order.

use crate::domain::entity::{DeserializeReport, Entity, EntityId, EntityKind, SerializedEntity};
use crate::domain::registry::ComponentRegistry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    /// Creates an empty entity with a fresh id and returns it for setup.
    pub fn spawn(&mut self, kind: EntityKind) -> &mut Entity {
        let id = self.allocate_id();
        self.entities
            .entry(id)
            .or_insert_with(|| Entity::new(id, kind))
    }

    pub fn insert(&mut self, entity: Entity) {
        if entity.id().0 >= self.next_id {
            self.next_id = entity.id().0 + 1;
        }
        self.entities.insert(entity.id(), entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn serialize_all(&self, dirty_only: bool) -> Vec<SerializedEntity> {
        self.entities
            .values()
            .map(|entity| entity.serialize(dirty_only))
            .collect()
    }

    pub fn mark_all_clean(&mut self) {
        for entity in self.entities.values_mut() {
            entity.mark_clean();
        }
    }

    /// Applies a serialized entity, creating it when unknown.
    pub fn apply(
        &mut self,
        data: &SerializedEntity,
        registry: &ComponentRegistry,
        partial: bool,
    ) -> DeserializeReport {
        if data.id.0 >= self.next_id {
            self.next_id = data.id.0 + 1;
        }
        self.entities
            .entry(data.id)
            .or_insert_with(|| Entity::new(data.id, data.kind))
            .deserialize(data, registry, partial)
    }
}
