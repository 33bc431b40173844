use std::collections::BTreeMap;

use rand::rngs::StdRng;
use zg_core::entity::EntityId;
use zg_core::world::World;

use crate::clock::TickClock;
use crate::event::{EngineEvent, EngineEventKind, EventLog};
use crate::mode::RewindMode;
use crate::resolver::TimeFlow;

/// Mutable context passed to each system during a tick.
///
/// The flow map was resolved before any system ran, so every entity's
/// effective tick rate is known up front; systems scale their work by
/// [`flow`](Self::flow) and skip frozen entities.
pub struct TickContext<'a> {
    /// The entity registry.
    pub world: &'a mut World,
    /// Read-only clock for this tick.
    pub clock: &'a TickClock,
    /// The execution mode this tick runs under.
    pub mode: RewindMode,
    /// Per-entity effective time flow, resolved before systems run.
    pub flows: &'a BTreeMap<EntityId, TimeFlow>,
    /// The global speed scale in force this tick.
    pub global_scale: f32,
    /// The engine event log.
    pub events: &'a mut EventLog,
    /// Seeded RNG; the only sanctioned source of randomness in a tick.
    pub rng: &'a mut StdRng,
}

impl TickContext<'_> {
    /// Emit an engine event at the current tick.
    pub fn emit(&mut self, kind: EngineEventKind, description: impl Into<String>) {
        self.events
            .push(EngineEvent::new(self.clock.tick(), kind, description));
    }

    /// The current tick number.
    pub fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// The effective time flow for an entity. Entities matched by no bubble
    /// run at the global scale.
    pub fn flow(&self, entity: EntityId) -> TimeFlow {
        self.flows
            .get(&entity)
            .copied()
            .unwrap_or_else(|| TimeFlow::global(self.global_scale))
    }

    /// The scaled time step for an entity this tick, in seconds. Zero for
    /// frozen or rewinding entities.
    pub fn scaled_dt(&self, entity: EntityId) -> f32 {
        let flow = self.flow(entity);
        if flow.multiplier > 0.0 {
            self.clock.tick_duration() * flow.multiplier
        } else {
            0.0
        }
    }
}
