use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, PlayerId};
use crate::error::{CoreError, CoreResult};

/// The entity registry. Owns every entity the engine can see.
///
/// Ids are assigned sequentially at insertion and iteration is in id order
/// (`BTreeMap` storage), so any pass over the world visits entities in the
/// same order on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, assigning it the next sequential id. Returns the id.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Get a reference to an entity by id.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether an entity with this id exists.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Remove an entity, returning it.
    pub fn despawn(&mut self, id: EntityId) -> CoreResult<Entity> {
        self.entities
            .remove(&id)
            .ok_or(CoreError::EntityNotFound(id))
    }

    /// Iterate all entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate all entities mutably, in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Iterate the entities owned by a given player, in id order.
    pub fn owned_by(&self, owner: PlayerId) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |e| e.owner == Some(owner))
    }

    /// Number of entities in the world.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the world holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Pose;
    use glam::Vec3;

    fn sample_entity(name: &str) -> Entity {
        Entity::new(name, Pose::at(Vec3::ZERO))
    }

    #[test]
    fn spawn_assigns_sequential_ids() {
        let mut world = World::new();
        let a = world.spawn(sample_entity("a"));
        let b = world.spawn(sample_entity("b"));
        assert_eq!(a, EntityId(1));
        assert_eq!(b, EntityId(2));
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn despawn_removes_and_errors_on_missing() {
        let mut world = World::new();
        let id = world.spawn(sample_entity("a"));
        assert!(world.despawn(id).is_ok());
        assert!(matches!(
            world.despawn(id),
            Err(CoreError::EntityNotFound(_))
        ));
    }

    #[test]
    fn despawn_does_not_recycle_ids() {
        let mut world = World::new();
        let a = world.spawn(sample_entity("a"));
        world.despawn(a).unwrap();
        let b = world.spawn(sample_entity("b"));
        assert!(b > a);
    }

    #[test]
    fn iteration_is_in_id_order() {
        let mut world = World::new();
        for name in ["a", "b", "c"] {
            world.spawn(sample_entity(name));
        }
        let ids: Vec<u64> = world.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn owned_by_filters_on_owner() {
        let mut world = World::new();
        world.spawn(sample_entity("free"));
        world.spawn(sample_entity("mine").owned_by(PlayerId(7)));
        world.spawn(sample_entity("theirs").owned_by(PlayerId(8)));

        let mine: Vec<&str> = world.owned_by(PlayerId(7)).map(|e| e.name.as_str()).collect();
        assert_eq!(mine, vec!["mine"]);
    }
}
