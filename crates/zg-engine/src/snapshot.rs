use std::any::Any;
use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use zg_core::entity::EntityId;
use zg_core::pose::Pose;
use zg_core::world::World;

/// A fixed-size state record that can live in a snapshot ring.
pub trait SnapshotRecord: Clone {
    /// The tick this record was captured at.
    fn tick(&self) -> u64;
}

/// Bookkeeping view of a ring: newest captured tick and slot capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// The most recently written tick, if anything was captured.
    pub head_tick: Option<u64>,
    /// Maximum number of live records. 0 disables the ring.
    pub capacity: u32,
}

/// A bounded, tick-indexed history buffer for one entity.
///
/// Records append until the buffer is full; after that each capture
/// overwrites the slot at `tick % capacity`. For gappy tick sequences this
/// lossy compaction can evict a record newer than the one written. This is
/// not a strict FIFO, and changing it would change the history-retention
/// guarantees every consumer sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRing<R> {
    capacity: u32,
    head_tick: Option<u64>,
    slots: Vec<R>,
}

impl<R: SnapshotRecord> SnapshotRing<R> {
    /// Create an empty ring. Capacity 0 disables capture and restore.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            head_tick: None,
            slots: Vec::new(),
        }
    }

    /// The ring's bookkeeping header.
    pub fn header(&self) -> SnapshotHeader {
        SnapshotHeader {
            head_tick: self.head_tick,
            capacity: self.capacity,
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Store a record. Appends while below capacity, then overwrites the
    /// slot at `tick % capacity`. No-op when the ring is disabled.
    pub fn capture(&mut self, record: R) {
        if self.capacity == 0 {
            return;
        }
        let tick = record.tick();
        if self.slots.len() < self.capacity as usize {
            self.slots.push(record);
        } else {
            let slot = (tick % self.capacity as u64) as usize;
            self.slots[slot] = record;
        }
        self.head_tick = Some(tick);
    }

    /// The live record with the greatest tick not after `target`, or `None`
    /// if the target predates everything captured.
    pub fn restore(&self, target: u64) -> Option<&R> {
        self.slots
            .iter()
            .filter(|r| r.tick() <= target)
            .max_by_key(|r| r.tick())
    }
}

/// Per-entity snapshot rings for one record kind.
///
/// Rings are exclusively owned by their entity; capture and restore for
/// different entities never interact. Entities opt out of history by setting
/// their capacity to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStore<R> {
    default_capacity: u32,
    rings: BTreeMap<EntityId, SnapshotRing<R>>,
}

impl<R: SnapshotRecord> SnapshotStore<R> {
    /// Create a store whose rings default to `default_capacity` slots.
    pub fn new(default_capacity: u32) -> Self {
        Self {
            default_capacity,
            rings: BTreeMap::new(),
        }
    }

    /// Override one entity's ring capacity (0 = opt out of history).
    ///
    /// Replaces any existing ring for that entity; history captured so far
    /// is discarded.
    pub fn set_capacity(&mut self, entity: EntityId, capacity: u32) {
        self.rings.insert(entity, SnapshotRing::new(capacity));
    }

    /// Store a record for an entity, creating its ring on first capture.
    pub fn capture(&mut self, entity: EntityId, record: R) {
        let capacity = self.default_capacity;
        self.rings
            .entry(entity)
            .or_insert_with(|| SnapshotRing::new(capacity))
            .capture(record);
    }

    /// Look up the record to restore for `entity` at `target`.
    pub fn restore(&self, entity: EntityId, target: u64) -> Option<&R> {
        self.rings.get(&entity).and_then(|ring| ring.restore(target))
    }

    /// The ring backing an entity, if one exists.
    pub fn ring(&self, entity: EntityId) -> Option<&SnapshotRing<R>> {
        self.rings.get(&entity)
    }

    /// Whether the entity participates in history (a ring with capacity > 0).
    pub fn tracks(&self, entity: EntityId) -> bool {
        match self.rings.get(&entity) {
            Some(ring) => ring.capacity() > 0,
            None => self.default_capacity > 0,
        }
    }

    /// Drop the ring for a despawned entity.
    pub fn forget(&mut self, entity: EntityId) {
        self.rings.remove(&entity);
    }
}

/// The built-in record kind: an entity's spatial pose at a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// The tick this pose was captured at.
    pub tick: u64,
    /// Captured position.
    pub position: Vec3,
    /// Captured orientation.
    pub orientation: Quat,
}

impl PoseRecord {
    /// Capture a pose at a tick.
    pub fn new(tick: u64, pose: Pose) -> Self {
        Self {
            tick,
            position: pose.position,
            orientation: pose.orientation,
        }
    }

    /// The captured pose.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }
}

impl SnapshotRecord for PoseRecord {
    fn tick(&self) -> u64 {
        self.tick
    }
}

/// What a channel's restore pass did: which entities were restored (and from
/// which record tick), and which had no history old enough.
#[derive(Debug, Default, Clone)]
pub struct RestoreReport {
    /// Entities whose state was overwritten, with the record tick applied.
    pub restored: Vec<(EntityId, u64)>,
    /// Entities whose captured history starts after the target tick; their
    /// state was left untouched.
    pub underruns: Vec<EntityId>,
}

/// A history-backed rewind participant.
///
/// Collaborators that want their state captured and restored register a
/// channel with the engine. The engine guarantees the bookkeeping contract
/// (capture is invoked only in record mode, restore only in rewind mode, and
/// neither during catch-up) while the channel owns record semantics.
pub trait HistoryChannel: std::fmt::Debug {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Capture this channel's records for the given tick.
    fn capture(&mut self, world: &World, tick: u64);

    /// Restore state to the newest records not after `target`.
    fn restore(&mut self, world: &mut World, target: u64) -> RestoreReport;

    /// Restore a single entity to the newest record not after `target`,
    /// leaving everything else alone. Used for entities a rewind bubble
    /// holds in their own past while the rest of the world runs forward.
    /// Returns whether a record was applied.
    fn restore_entity(&mut self, world: &mut World, entity: EntityId, target: u64) -> bool;

    /// Support downcasting to concrete channel types.
    fn as_any(&self) -> &dyn Any;

    /// Support downcasting to concrete channel types.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The built-in channel: captures and restores every entity's pose.
#[derive(Debug)]
pub struct PoseChannel {
    store: SnapshotStore<PoseRecord>,
}

impl PoseChannel {
    /// Create a pose channel with the given default ring capacity.
    pub fn new(default_capacity: u32) -> Self {
        Self {
            store: SnapshotStore::new(default_capacity),
        }
    }

    /// The underlying store, for capacity overrides and inspection.
    pub fn store(&self) -> &SnapshotStore<PoseRecord> {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut SnapshotStore<PoseRecord> {
        &mut self.store
    }
}

impl HistoryChannel for PoseChannel {
    fn name(&self) -> &str {
        "pose"
    }

    fn capture(&mut self, world: &World, tick: u64) {
        for entity in world.iter() {
            if self.store.tracks(entity.id) {
                self.store.capture(entity.id, PoseRecord::new(tick, entity.pose));
            }
        }
    }

    fn restore(&mut self, world: &mut World, target: u64) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entity in world.iter_mut() {
            if !self.store.tracks(entity.id) {
                continue;
            }
            match self.store.restore(entity.id, target) {
                Some(record) => {
                    entity.pose = record.pose();
                    report.restored.push((entity.id, record.tick));
                }
                None => report.underruns.push(entity.id),
            }
        }
        report
    }

    fn restore_entity(&mut self, world: &mut World, entity: EntityId, target: u64) -> bool {
        let Some(record) = self.store.restore(entity, target).copied() else {
            return false;
        };
        match world.get_mut(entity) {
            Some(e) => {
                e.pose = record.pose();
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zg_core::entity::Entity;

    fn record(tick: u64) -> PoseRecord {
        PoseRecord::new(tick, Pose::at(Vec3::new(tick as f32, 0.0, 0.0)))
    }

    #[test]
    fn restore_finds_latest_not_after_target() {
        let mut ring = SnapshotRing::new(4);
        for tick in [2, 4, 6, 8] {
            ring.capture(record(tick));
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.restore(5).map(|r| r.tick), Some(4));
        assert_eq!(ring.restore(8).map(|r| r.tick), Some(8));
        assert_eq!(ring.restore(1), None, "target predates history");
    }

    #[test]
    fn ring_len_stabilizes_at_capacity() {
        let mut ring = SnapshotRing::new(3);
        for tick in 0..10 {
            ring.capture(record(tick));
            assert!(ring.len() <= 3);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.header().head_tick, Some(9));
    }

    #[test]
    fn full_ring_overwrites_slot_by_tick_modulo() {
        let mut ring = SnapshotRing::new(2);
        ring.capture(record(0));
        ring.capture(record(1));
        // Full. Tick 4 lands on slot 0, evicting tick 0.
        ring.capture(record(4));
        let ticks: Vec<u64> = ring.slots.iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![4, 1]);
        // Lossy compaction: tick 7 lands on slot 1, evicting tick 1 even
        // though tick 4 in slot 0 is older history than what slot 1 held.
        ring.capture(record(7));
        let ticks: Vec<u64> = ring.slots.iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![4, 7]);
    }

    #[test]
    fn zero_capacity_ring_is_inert() {
        let mut ring = SnapshotRing::new(0);
        ring.capture(record(1));
        assert!(ring.is_empty());
        assert_eq!(ring.restore(10), None);
        assert_eq!(ring.header().head_tick, None);
    }

    #[test]
    fn store_per_entity_rings_are_independent() {
        let mut store = SnapshotStore::new(4);
        store.capture(EntityId(1), record(1));
        store.capture(EntityId(2), record(2));
        assert_eq!(store.restore(EntityId(1), 10).map(|r| r.tick), Some(1));
        assert_eq!(store.restore(EntityId(2), 10).map(|r| r.tick), Some(2));
        assert_eq!(store.restore(EntityId(3), 10), None);
    }

    #[test]
    fn store_capacity_override_opts_out() {
        let mut store = SnapshotStore::new(4);
        store.set_capacity(EntityId(1), 0);
        assert!(!store.tracks(EntityId(1)));
        store.capture(EntityId(1), record(1));
        assert_eq!(store.restore(EntityId(1), 10), None);
    }

    #[test]
    fn pose_channel_capture_and_restore() {
        let mut world = World::new();
        let id = world.spawn(Entity::new("mover", Pose::at(Vec3::ZERO)));

        let mut channel = PoseChannel::new(8);
        for tick in 1..=5u64 {
            world.get_mut(id).unwrap().pose = Pose::at(Vec3::new(tick as f32, 0.0, 0.0));
            channel.capture(&world, tick);
        }

        let report = channel.restore(&mut world, 3);
        assert_eq!(report.restored, vec![(id, 3)]);
        assert!(report.underruns.is_empty());
        assert_eq!(world.get(id).unwrap().pose.position.x, 3.0);
    }

    #[test]
    fn pose_channel_underrun_leaves_state_untouched() {
        let mut world = World::new();
        let id = world.spawn(Entity::new("late", Pose::at(Vec3::new(9.0, 0.0, 0.0))));

        let mut channel = PoseChannel::new(8);
        channel.capture(&world, 10);

        let report = channel.restore(&mut world, 5);
        assert_eq!(report.underruns, vec![id]);
        assert!(report.restored.is_empty());
        assert_eq!(world.get(id).unwrap().pose.position.x, 9.0);
    }

    #[test]
    fn pose_channel_skips_opted_out_entities() {
        let mut world = World::new();
        let id = world.spawn(Entity::new("ghost", Pose::at(Vec3::ZERO)));

        let mut channel = PoseChannel::new(8);
        channel.store_mut().set_capacity(id, 0);
        channel.capture(&world, 1);

        let report = channel.restore(&mut world, 1);
        assert!(report.restored.is_empty());
        assert!(report.underruns.is_empty(), "opt-out is not an underrun");
    }

    #[test]
    fn store_serde_round_trip() {
        let mut store = SnapshotStore::new(4);
        store.capture(EntityId(1), record(3));
        let json = serde_json::to_string(&store).unwrap();
        let back: SnapshotStore<PoseRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.restore(EntityId(1), 10).map(|r| r.tick), Some(3));
    }

    proptest! {
        #[test]
        fn ring_never_exceeds_capacity(capacity in 0u32..16, ticks in proptest::collection::vec(0u64..1000, 0..64)) {
            let mut ring = SnapshotRing::new(capacity);
            for tick in ticks {
                ring.capture(record(tick));
                prop_assert!(ring.len() <= capacity as usize);
            }
        }

        #[test]
        fn restore_result_is_never_after_target(ticks in proptest::collection::vec(0u64..100, 1..32), target in 0u64..100) {
            let mut ring = SnapshotRing::new(8);
            for tick in ticks {
                ring.capture(record(tick));
            }
            if let Some(found) = ring.restore(target) {
                prop_assert!(found.tick <= target);
            }
        }
    }
}
