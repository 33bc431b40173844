use serde::{Deserialize, Serialize};

/// Which way the clock moves on an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickDirection {
    /// Normal forward simulation.
    Forward,
    /// Rewind: the tick counter walks backward.
    Backward,
}

/// The simulation clock: a tick counter with a fixed tick duration.
///
/// Created once at world start and mutated only by the engine's tick-advance
/// step. `elapsed_seconds` always equals `tick * tick_duration`; during a
/// rewind it tracks the restored tick back down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickClock {
    tick: u64,
    tick_duration: f32,
    elapsed_seconds: f64,
    paused: bool,
}

impl TickClock {
    /// Create a clock at tick 0 with the given tick duration in seconds.
    pub fn new(tick_duration: f32) -> Self {
        Self {
            tick: 0,
            tick_duration,
            elapsed_seconds: 0.0,
            paused: false,
        }
    }

    /// Move the clock by exactly one tick in the given direction.
    ///
    /// Never skips ticks. A backward advance at tick 0 is a no-op; the
    /// counter does not underflow. Returns the new tick number.
    pub(crate) fn advance(&mut self, direction: TickDirection) -> u64 {
        match direction {
            TickDirection::Forward => self.tick += 1,
            TickDirection::Backward => self.tick = self.tick.saturating_sub(1),
        }
        self.elapsed_seconds = self.tick as f64 * self.tick_duration as f64;
        self.tick
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Configured tick duration in seconds.
    pub fn tick_duration(&self) -> f32 {
        self.tick_duration
    }

    /// Elapsed simulation time in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Whether the clock is currently frozen.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_initial_state() {
        let clock = TickClock::new(0.05);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.elapsed_seconds(), 0.0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn forward_advance_tracks_elapsed() {
        let mut clock = TickClock::new(0.5);
        clock.advance(TickDirection::Forward);
        clock.advance(TickDirection::Forward);
        clock.advance(TickDirection::Forward);
        assert_eq!(clock.tick(), 3);
        assert!((clock.elapsed_seconds() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn backward_advance_decrements_and_saturates() {
        let mut clock = TickClock::new(1.0);
        clock.advance(TickDirection::Forward);
        clock.advance(TickDirection::Forward);
        clock.advance(TickDirection::Backward);
        assert_eq!(clock.tick(), 1);
        assert!((clock.elapsed_seconds() - 1.0).abs() < 1e-9);

        clock.advance(TickDirection::Backward);
        clock.advance(TickDirection::Backward);
        assert_eq!(clock.tick(), 0, "clock must not underflow");
        assert_eq!(clock.elapsed_seconds(), 0.0);
    }

    #[test]
    fn elapsed_equals_tick_times_duration() {
        let mut clock = TickClock::new(1.0 / 60.0);
        for _ in 0..120 {
            clock.advance(TickDirection::Forward);
        }
        let expected = 120.0 * (1.0 / 60.0f32) as f64;
        assert!((clock.elapsed_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn clock_serde_round_trip() {
        let mut clock = TickClock::new(0.25);
        clock.advance(TickDirection::Forward);
        let json = serde_json::to_string(&clock).unwrap();
        let back: TickClock = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tick(), 1);
        assert_eq!(back.tick_duration(), 0.25);
    }
}
