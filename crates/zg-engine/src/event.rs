use serde::{Deserialize, Serialize};
use zg_core::entity::EntityId;

use crate::bubble::BubbleId;
use crate::mode::RewindMode;

/// What kind of engine event occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEventKind {
    /// The derived execution mode changed.
    ModeChanged {
        /// The previous execution mode.
        from: RewindMode,
        /// The new execution mode.
        to: RewindMode,
    },
    /// The global speed scale changed.
    SpeedChanged {
        /// The new effective global scale, after clamping.
        scale: f32,
    },
    /// A time bubble came alive.
    BubbleSpawned {
        /// The new bubble's handle.
        id: BubbleId,
    },
    /// A time bubble reached the end of its lifetime.
    BubbleExpired {
        /// The expired bubble's handle.
        id: BubbleId,
    },
    /// A time bubble was destroyed by command.
    BubbleDestroyed {
        /// The destroyed bubble's handle.
        id: BubbleId,
    },
    /// A command failed validation and was discarded.
    CommandDropped {
        /// Why the command was dropped.
        reason: String,
    },
    /// A rewind target predates an entity's captured history; its state was
    /// left untouched.
    HistoryUnderrun {
        /// The entity whose history ran out.
        entity: EntityId,
        /// The tick the rewind asked for.
        target: u64,
    },
    /// An entity's state was restored from a captured record.
    EntityRestored {
        /// The restored entity.
        entity: EntityId,
        /// The tick of the record that was applied.
        tick: u64,
    },
}

impl EngineEventKind {
    /// Check whether a given entity is involved in this event.
    pub fn involves(&self, id: EntityId) -> bool {
        match self {
            Self::HistoryUnderrun { entity, .. } | Self::EntityRestored { entity, .. } => {
                *entity == id
            }
            _ => false,
        }
    }
}

/// A record of something the engine did during a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// The tick when this event occurred.
    pub tick: u64,
    /// The specific kind of event.
    pub kind: EngineEventKind,
    /// A human-readable description.
    pub description: String,
}

impl EngineEvent {
    /// Create a new event with the given tick, kind, and description.
    pub fn new(tick: u64, kind: EngineEventKind, description: impl Into<String>) -> Self {
        Self {
            tick,
            kind,
            description: description.into(),
        }
    }
}

/// Accumulates engine events, visible to collaborators within the same tick.
///
/// Event emission is synchronous and ordered; consumers that want
/// mode-change notifications poll [`events_at_tick`](Self::events_at_tick)
/// after each engine tick instead of registering callbacks.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EngineEvent>,
    max_events: usize,
}

impl EventLog {
    /// Create a new event log with the given maximum capacity (0 = unlimited).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
        }
    }

    /// Append an event, dropping the oldest events if the log exceeds its
    /// capacity.
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
        if self.max_events > 0 && self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(..drain_count);
        }
    }

    /// Return a slice of all recorded events.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Return all events that occurred at the given tick.
    pub fn events_at_tick(&self, tick: u64) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.tick == tick).collect()
    }

    /// Return all events involving the given entity.
    pub fn events_for_entity(&self, id: EntityId) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.kind.involves(id)).collect()
    }

    /// Return the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Return `true` if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_push_and_query() {
        let mut log = EventLog::new(0);
        let id = EntityId(1);
        log.push(EngineEvent::new(
            4,
            EngineEventKind::HistoryUnderrun {
                entity: id,
                target: 2,
            },
            "test",
        ));
        assert_eq!(log.len(), 1);
        assert_eq!(log.events_at_tick(4).len(), 1);
        assert_eq!(log.events_for_entity(id).len(), 1);
    }

    #[test]
    fn event_log_max_events_trims() {
        let mut log = EventLog::new(2);
        for i in 0..5 {
            log.push(EngineEvent::new(
                i,
                EngineEventKind::SpeedChanged { scale: 1.0 },
                "test",
            ));
        }
        assert_eq!(log.len(), 2);
        // Oldest events were dropped, newest remain
        assert_eq!(log.events()[0].tick, 3);
        assert_eq!(log.events()[1].tick, 4);
    }

    #[test]
    fn involves_matches_entity_events_only() {
        let e1 = EntityId(1);
        let e2 = EntityId(2);
        let kind = EngineEventKind::EntityRestored { entity: e1, tick: 3 };
        assert!(kind.involves(e1));
        assert!(!kind.involves(e2));

        let kind = EngineEventKind::SpeedChanged { scale: 2.0 };
        assert!(!kind.involves(e1));
    }

    #[test]
    fn event_log_clear() {
        let mut log = EventLog::new(0);
        log.push(EngineEvent::new(
            1,
            EngineEventKind::CommandDropped {
                reason: "test".into(),
            },
            "test",
        ));
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
    }
}
