use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Unique identifier for every entity in the world.
///
/// Ids are assigned sequentially by the [`World`](crate::world::World) so that
/// two runs built from the same inputs produce the same ids. Replay depends on
/// this: ids participate in tie-breaks and map ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier attributing ownership of an entity or time bubble to a player.
///
/// The engine runs a single authoritative timeline; this is an attribution
/// hook for authority-scoped bubbles, not a replication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A simulated entity: the minimal authoritative record the time-control
/// engine knows about.
///
/// Everything else an entity means (stats, inventory, AI state) lives in
/// collaborator systems; the engine only needs a pose to resolve bubbles
/// against and an optional owner for authority checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier, assigned by the registry.
    pub id: EntityId,
    /// Display name. Names are labels, not keys.
    pub name: String,
    /// The player this entity belongs to, if any.
    pub owner: Option<PlayerId>,
    /// Current spatial pose.
    pub pose: Pose,
}

impl Entity {
    /// Create an entity record with a placeholder id.
    ///
    /// The real id is assigned when the entity is inserted into a
    /// [`World`](crate::world::World).
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            id: EntityId::default(),
            name: name.into(),
            owner: None,
            pose,
        }
    }

    /// Attribute this entity to a player.
    pub fn owned_by(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "e42");
        assert_eq!(PlayerId(3).to_string(), "p3");
    }

    #[test]
    fn owned_by_sets_owner() {
        let entity = Entity::new("Kael", Pose::at(Vec3::ZERO)).owned_by(PlayerId(1));
        assert_eq!(entity.owner, Some(PlayerId(1)));
    }

    #[test]
    fn entity_ids_order_numerically() {
        assert!(EntityId(2) < EntityId(10));
    }
}
