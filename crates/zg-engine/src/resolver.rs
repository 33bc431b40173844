use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use zg_core::entity::PlayerId;

use crate::bubble::{BubbleId, BubbleMode, BubbleSpec, TimeBubble, raw_id_seed};

/// The effective time rate for one entity on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeFlow {
    /// Tick-rate multiplier. 0 for frozen entities, negative while a rewind
    /// bubble drives the entity backward.
    pub multiplier: f32,
    /// The entity is frozen and additionally non-interactable for collision
    /// purposes. Exposed here; enforced by the collision collaborator.
    pub stasis: bool,
    /// How many ticks in the past the entity's state should be read from,
    /// when held by a rewind bubble.
    pub rewind_offset: i32,
    /// The bubble that won resolution, if any.
    pub bubble: Option<BubbleId>,
}

impl TimeFlow {
    /// Flow for an entity matched by no bubble: the global speed scale.
    pub fn global(scale: f32) -> Self {
        Self {
            multiplier: scale,
            stasis: false,
            rewind_offset: 0,
            bubble: None,
        }
    }

    /// Whether the entity advances at all this tick.
    pub fn is_frozen(&self) -> bool {
        self.multiplier == 0.0
    }

    /// Whether a rewind bubble is holding the entity in its own past.
    pub fn is_rewinding(&self) -> bool {
        self.rewind_offset > 0
    }
}

/// Maintains the live time-bubble set and resolves overlaps.
///
/// Bubbles are stored by id in a `BTreeMap`, so every pass over the set is
/// in id order regardless of spawn interleaving; resolution must be
/// bit-identical across runs given the same command stream.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BubbleResolver {
    bubbles: BTreeMap<BubbleId, TimeBubble>,
}

impl BubbleResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a fresh id for a spawn at `center` on `tick`.
    ///
    /// Starts from the spatial-hash seed and probes upward (skipping zero)
    /// until the id collides with neither a live bubble nor one already
    /// reserved by a still-queued spawn. Distinct same-tick spawns therefore
    /// never alias, even when their hash seeds collide.
    pub fn allocate_id(
        &self,
        center: Vec3,
        tick: u64,
        reserved: &BTreeSet<BubbleId>,
    ) -> BubbleId {
        let mut raw = raw_id_seed(center, tick);
        loop {
            if let Some(id) = BubbleId::from_raw(raw)
                && !self.bubbles.contains_key(&id)
                && !reserved.contains(&id)
            {
                return id;
            }
            raw = raw.wrapping_add(1);
        }
    }

    /// Bring a validated bubble alive under a previously allocated id.
    pub fn spawn(&mut self, id: BubbleId, spec: BubbleSpec, tick: u64) {
        self.bubbles.insert(
            id,
            TimeBubble {
                id,
                created_at_tick: tick,
                spec,
            },
        );
    }

    /// Remove a bubble by handle. Returns it if it was live.
    pub fn destroy(&mut self, id: BubbleId) -> Option<TimeBubble> {
        self.bubbles.remove(&id)
    }

    /// Remove every bubble whose lifetime has run out at `now`, returning
    /// their ids. Runs at the start of the tick, never mid-resolution.
    pub fn expire(&mut self, now: u64) -> Vec<BubbleId> {
        let expired: Vec<BubbleId> = self
            .bubbles
            .values()
            .filter(|b| b.expired(now))
            .map(|b| b.id)
            .collect();
        for id in &expired {
            self.bubbles.remove(id);
        }
        expired
    }

    /// Compute the effective time flow for an entity at `position` owned by
    /// `owner`.
    ///
    /// Among bubbles containing the position whose authority admits the
    /// entity, the highest priority wins; ties break toward the smaller id
    /// so replay never depends on insertion order. Entities matched by no
    /// bubble run at the global scale.
    pub fn resolve(
        &self,
        position: Vec3,
        owner: Option<PlayerId>,
        global_scale: f32,
    ) -> TimeFlow {
        let winner = self
            .bubbles
            .values()
            .filter(|b| b.contains(position) && b.admits(owner))
            .max_by_key(|b| (b.spec.priority, Reverse(b.id)));

        match winner {
            None => TimeFlow::global(global_scale),
            Some(bubble) => match bubble.spec.mode {
                BubbleMode::Scale => TimeFlow {
                    multiplier: bubble.spec.scale,
                    stasis: false,
                    rewind_offset: 0,
                    bubble: Some(bubble.id),
                },
                BubbleMode::Pause => TimeFlow {
                    multiplier: 0.0,
                    stasis: false,
                    rewind_offset: 0,
                    bubble: Some(bubble.id),
                },
                BubbleMode::Stasis => TimeFlow {
                    multiplier: 0.0,
                    stasis: true,
                    rewind_offset: 0,
                    bubble: Some(bubble.id),
                },
                BubbleMode::Rewind => TimeFlow {
                    multiplier: -1.0,
                    stasis: false,
                    rewind_offset: bubble.spec.rewind_offset_ticks,
                    bubble: Some(bubble.id),
                },
            },
        }
    }

    /// The live bubble behind a handle.
    pub fn get(&self, id: BubbleId) -> Option<&TimeBubble> {
        self.bubbles.get(&id)
    }

    /// Iterate live bubbles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeBubble> {
        self.bubbles.values()
    }

    /// Number of live bubbles.
    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    /// True if no bubbles are live.
    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> BubbleId {
        BubbleId::from_raw(raw).unwrap()
    }

    #[test]
    fn unmatched_entity_uses_global_scale() {
        let resolver = BubbleResolver::new();
        let flow = resolver.resolve(Vec3::ZERO, None, 2.0);
        assert_eq!(flow.multiplier, 2.0);
        assert_eq!(flow.bubble, None);
    }

    #[test]
    fn containment_and_mode_mapping() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(id(1), BubbleSpec::scale(Vec3::ZERO, 5.0, 0.25), 0);

        let inside = resolver.resolve(Vec3::new(1.0, 0.0, 0.0), None, 1.0);
        assert_eq!(inside.multiplier, 0.25);
        assert_eq!(inside.bubble, Some(id(1)));

        let outside = resolver.resolve(Vec3::new(10.0, 0.0, 0.0), None, 1.0);
        assert_eq!(outside.multiplier, 1.0);
        assert_eq!(outside.bubble, None);
    }

    #[test]
    fn pause_and_stasis_freeze() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(id(1), BubbleSpec::pause(Vec3::ZERO, 2.0), 0);
        resolver.spawn(id(2), BubbleSpec::stasis(Vec3::new(10.0, 0.0, 0.0), 2.0), 0);

        let paused = resolver.resolve(Vec3::ZERO, None, 1.0);
        assert!(paused.is_frozen());
        assert!(!paused.stasis);

        let stasis = resolver.resolve(Vec3::new(10.0, 0.0, 0.0), None, 1.0);
        assert!(stasis.is_frozen());
        assert!(stasis.stasis);
    }

    #[test]
    fn rewind_bubble_yields_negative_flow() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(id(1), BubbleSpec::rewind(Vec3::ZERO, 2.0, 30), 0);

        let flow = resolver.resolve(Vec3::ZERO, None, 1.0);
        assert!(flow.multiplier < 0.0);
        assert!(flow.is_rewinding());
        assert_eq!(flow.rewind_offset, 30);
    }

    #[test]
    fn higher_priority_wins_overlap() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(id(1), BubbleSpec::scale(Vec3::ZERO, 5.0, 0.5).with_priority(1), 0);
        resolver.spawn(id(2), BubbleSpec::pause(Vec3::ZERO, 5.0).with_priority(9), 0);

        let flow = resolver.resolve(Vec3::ZERO, None, 1.0);
        assert_eq!(flow.bubble, Some(id(2)));
        assert!(flow.is_frozen());
    }

    #[test]
    fn equal_priority_breaks_toward_smaller_id() {
        let mut resolver = BubbleResolver::new();
        // Insertion order must not matter: insert the larger id first.
        resolver.spawn(id(9), BubbleSpec::scale(Vec3::ZERO, 5.0, 2.0).with_priority(4), 0);
        resolver.spawn(id(5), BubbleSpec::scale(Vec3::ZERO, 5.0, 0.5).with_priority(4), 0);

        for _ in 0..3 {
            let flow = resolver.resolve(Vec3::ZERO, None, 1.0);
            assert_eq!(flow.bubble, Some(id(5)));
            assert_eq!(flow.multiplier, 0.5);
        }
    }

    #[test]
    fn authority_filters_candidates() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(
            id(1),
            BubbleSpec::pause(Vec3::ZERO, 5.0)
                .with_owner(PlayerId(1), true)
                .with_priority(9),
            0,
        );
        resolver.spawn(id(2), BubbleSpec::scale(Vec3::ZERO, 5.0, 3.0), 0);

        // Owned by the bubble's player: the high-priority pause wins.
        let owned = resolver.resolve(Vec3::ZERO, Some(PlayerId(1)), 1.0);
        assert_eq!(owned.bubble, Some(id(1)));

        // Everyone else only matches the scale bubble.
        let other = resolver.resolve(Vec3::ZERO, Some(PlayerId(2)), 1.0);
        assert_eq!(other.bubble, Some(id(2)));
        assert_eq!(other.multiplier, 3.0);
    }

    #[test]
    fn expire_removes_only_run_out_bubbles() {
        let mut resolver = BubbleResolver::new();
        resolver.spawn(id(1), BubbleSpec::pause(Vec3::ZERO, 1.0).with_duration(5), 10);
        resolver.spawn(id(2), BubbleSpec::pause(Vec3::ZERO, 1.0), 10);

        assert!(resolver.expire(14).is_empty());
        assert_eq!(resolver.len(), 2);

        let expired = resolver.expire(15);
        assert_eq!(expired, vec![id(1)]);
        assert_eq!(resolver.len(), 1);
        assert!(resolver.get(id(2)).is_some());
    }

    #[test]
    fn allocate_id_avoids_live_and_reserved() {
        let mut resolver = BubbleResolver::new();
        let center = Vec3::new(3.0, 1.0, -2.0);
        let first = resolver.allocate_id(center, 7, &BTreeSet::new());
        resolver.spawn(first, BubbleSpec::pause(center, 1.0), 7);

        // Same center and tick: the seed collides with the live bubble and
        // must probe to a different id.
        let mut reserved = BTreeSet::new();
        let second = resolver.allocate_id(center, 7, &reserved);
        assert_ne!(second, first);

        reserved.insert(second);
        let third = resolver.allocate_id(center, 7, &reserved);
        assert_ne!(third, first);
        assert_ne!(third, second);
    }

    #[test]
    fn allocated_ids_are_deterministic() {
        let resolver = BubbleResolver::new();
        let a = resolver.allocate_id(Vec3::new(1.0, 2.0, 3.0), 42, &BTreeSet::new());
        let b = resolver.allocate_id(Vec3::new(1.0, 2.0, 3.0), 42, &BTreeSet::new());
        assert_eq!(a, b);
    }
}
