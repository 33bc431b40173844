use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::mode::TopMode;

/// Configuration for a time-engine instance, consumed at world start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Duration of one tick in seconds.
    pub tick_duration: f32,
    /// Default snapshot ring capacity per entity. Negative values are
    /// rejected; 0 disables history entirely.
    pub max_history_ticks: i32,
    /// Top-level mode the engine starts in.
    pub initial_mode: TopMode,
    /// Lower bound for the global speed scale.
    pub min_speed: f32,
    /// Upper bound for the global speed scale.
    pub max_speed: f32,
    /// RNG seed handed to collaborator systems for deterministic replay.
    pub seed: u64,
    /// Maximum event log size (oldest events dropped when exceeded).
    /// 0 = unlimited.
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_duration: 1.0 / 60.0,
            max_history_ticks: 600,
            initial_mode: TopMode::Paused,
            min_speed: 0.1,
            max_speed: 8.0,
            seed: 42,
            max_events: 0,
        }
    }
}

impl EngineConfig {
    /// Set the tick duration in seconds.
    pub fn with_tick_duration(mut self, seconds: f32) -> Self {
        self.tick_duration = seconds;
        self
    }

    /// Set the default per-entity history capacity in ticks.
    pub fn with_max_history_ticks(mut self, ticks: i32) -> Self {
        self.max_history_ticks = ticks;
        self
    }

    /// Set the initial top-level mode.
    pub fn with_initial_mode(mut self, mode: TopMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Set the global speed bounds.
    pub fn with_speed_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_speed = min;
        self.max_speed = max;
        self
    }

    /// Set the RNG seed for deterministic replay.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum event log size (0 = unlimited).
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Check the configuration, rejecting values that would corrupt the
    /// simulation. Called by the engine constructor; failure means no
    /// engine is built at all.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.tick_duration.is_finite() || self.tick_duration <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "tick_duration must be positive and finite, got {}",
                self.tick_duration
            )));
        }
        if self.max_history_ticks < 0 {
            return Err(EngineError::InvalidConfig(format!(
                "max_history_ticks must be non-negative, got {}",
                self.max_history_ticks
            )));
        }
        if !self.min_speed.is_finite() || self.min_speed <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "min_speed must be positive and finite, got {}",
                self.min_speed
            )));
        }
        if !self.max_speed.is_finite() || self.max_speed < self.min_speed {
            return Err(EngineError::InvalidConfig(format!(
                "max_speed must be finite and at least min_speed, got {}",
                self.max_speed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = EngineConfig::default()
            .with_tick_duration(0.05)
            .with_max_history_ticks(120)
            .with_initial_mode(TopMode::Play)
            .with_speed_bounds(0.5, 4.0)
            .with_seed(123)
            .with_max_events(500);
        assert_eq!(config.tick_duration, 0.05);
        assert_eq!(config.max_history_ticks, 120);
        assert_eq!(config.initial_mode, TopMode::Play);
        assert_eq!(config.min_speed, 0.5);
        assert_eq!(config.max_speed, 4.0);
        assert_eq!(config.seed, 123);
        assert_eq!(config.max_events, 500);
    }

    #[test]
    fn rejects_non_positive_tick_duration() {
        assert!(EngineConfig::default().with_tick_duration(0.0).validate().is_err());
        assert!(EngineConfig::default().with_tick_duration(-1.0).validate().is_err());
        assert!(EngineConfig::default().with_tick_duration(f32::NAN).validate().is_err());
    }

    #[test]
    fn rejects_negative_history() {
        assert!(EngineConfig::default().with_max_history_ticks(-1).validate().is_err());
        assert!(EngineConfig::default().with_max_history_ticks(0).validate().is_ok());
    }

    #[test]
    fn rejects_inverted_speed_bounds() {
        assert!(EngineConfig::default().with_speed_bounds(2.0, 1.0).validate().is_err());
        assert!(EngineConfig::default().with_speed_bounds(0.0, 1.0).validate().is_err());
    }
}
