use serde::{Deserialize, Serialize};

/// Self-throttling helper for collaborator systems that do not need to run
/// every tick.
///
/// A system with cadence 4 and phase offset 1 runs on ticks 1, 5, 9, ...
/// Spreading offsets across systems keeps per-tick load even. The helper
/// only consumes the tick counter; it owns no engine state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateCadence {
    /// Run every `cadence` ticks. 0 and 1 both mean every tick.
    pub cadence: u32,
    /// Offset within the cadence window.
    pub phase_offset: u32,
    /// The tick this cadence last ran on.
    pub last_update_tick: u64,
}

impl UpdateCadence {
    /// Create a cadence that runs every `cadence` ticks at the given offset.
    pub fn new(cadence: u32, phase_offset: u32) -> Self {
        Self {
            cadence,
            phase_offset,
            last_update_tick: 0,
        }
    }

    /// A cadence that runs every tick.
    pub fn every_tick() -> Self {
        Self::new(1, 0)
    }

    /// Whether this cadence is due on the given tick.
    pub fn due(&self, tick: u64) -> bool {
        if self.cadence <= 1 {
            return true;
        }
        tick % self.cadence as u64 == self.phase_offset as u64 % self.cadence as u64
    }

    /// Record that the owning system ran on `tick`.
    pub fn mark(&mut self, tick: u64) {
        self.last_update_tick = tick;
    }
}
