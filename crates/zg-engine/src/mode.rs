use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The externally-selected top-level mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopMode {
    /// Normal forward simulation.
    Play,
    /// Hold the clock, advancing one tick at a time on demand.
    Step,
    /// Hold the clock entirely.
    Paused,
}

/// The full mode vocabulary of the engine.
///
/// `Play`, `Step`, and `Paused` are requested from outside; `Record`,
/// `CatchUp`, and `Rewind` are the execution modes the state machine derives
/// from the top-level mode and the distance to the target tick. The phase
/// gate reads the derived execution mode, never the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewindMode {
    /// Requested: run forward.
    Play,
    /// Requested: single-step.
    Step,
    /// Derived or requested: clock frozen, nothing runs.
    Paused,
    /// Derived: advancing forward and capturing new history.
    Record,
    /// Derived: replaying skipped ticks forward without recapturing.
    CatchUp,
    /// Derived: walking backward, restoring from history.
    Rewind,
}

impl fmt::Display for RewindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Play => "play",
            Self::Step => "step",
            Self::Paused => "paused",
            Self::Record => "record",
            Self::CatchUp => "catch-up",
            Self::Rewind => "rewind",
        };
        write!(f, "{name}")
    }
}

/// Derives the execution mode once per tick.
///
/// Transition rules: a target below the current tick forces `Rewind` until
/// the clock reaches it, then falls back to the top-level mode captured when
/// the rewind was requested, never directly into `CatchUp`. A target above
/// the current tick while playing forces `CatchUp` until caught up, then
/// `Record`. The machine starts `Paused` at tick 0 with no pending target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeMachine {
    top: TopMode,
    target: Option<u64>,
    resume: TopMode,
    step_armed: bool,
    exec: RewindMode,
}

impl ModeMachine {
    /// Create a machine with the given initial top-level mode.
    pub fn new(initial: TopMode) -> Self {
        Self {
            top: initial,
            target: None,
            resume: initial,
            step_armed: false,
            exec: RewindMode::Paused,
        }
    }

    /// The current top-level mode.
    pub fn top_mode(&self) -> TopMode {
        self.top
    }

    /// The execution mode derived by the last [`evaluate`](Self::evaluate).
    pub fn exec_mode(&self) -> RewindMode {
        self.exec
    }

    /// The pending target tick, if a rewind or seek is in flight.
    pub fn target_tick(&self) -> Option<u64> {
        self.target
    }

    /// Whether the machine is currently walking backward.
    pub fn is_rewinding(&self) -> bool {
        self.exec == RewindMode::Rewind
    }

    /// Select a new top-level mode.
    ///
    /// While a rewind is in flight this changes where the machine lands when
    /// the target is reached, not the rewind itself.
    pub fn request_mode(&mut self, mode: TopMode) {
        if self.is_rewinding() {
            self.resume = mode;
        } else {
            self.top = mode;
        }
    }

    /// Arm a single forward step. Implies `Step` mode.
    pub fn request_step(&mut self) {
        self.request_mode(TopMode::Step);
        self.step_armed = true;
    }

    /// Request a rewind to `target`. Returns false (and changes nothing) if
    /// the target is not in the past.
    pub fn request_rewind(&mut self, target: u64, current: u64) -> bool {
        if target >= current {
            return false;
        }
        if !self.is_rewinding() {
            self.resume = self.top;
        }
        self.target = Some(target);
        true
    }

    /// Request a forward seek to `target`. Returns false if the target is
    /// not in the future, or if a rewind is still in flight (a rewind must
    /// land on its top-level mode before any catch-up starts).
    pub fn request_seek(&mut self, target: u64, current: u64) -> bool {
        if target <= current || self.is_rewinding() {
            return false;
        }
        self.target = Some(target);
        true
    }

    /// Derive the execution mode for this tick. Called exactly once per
    /// engine tick, before the clock moves; its output is the single source
    /// of truth the phase gate reads.
    pub fn evaluate(&mut self, current_tick: u64) -> RewindMode {
        if let Some(target) = self.target {
            match target.cmp(&current_tick) {
                Ordering::Less => {
                    self.exec = RewindMode::Rewind;
                    return self.exec;
                }
                Ordering::Equal => {
                    // Target reached: the pending request resolves, and a
                    // completed rewind lands on its captured top-level mode.
                    if self.exec == RewindMode::Rewind {
                        self.top = self.resume;
                    }
                    self.target = None;
                }
                Ordering::Greater => {
                    if self.top == TopMode::Play {
                        self.exec = RewindMode::CatchUp;
                    } else {
                        // Seek pending but not playing: hold until play
                        // resumes.
                        self.exec = RewindMode::Paused;
                    }
                    return self.exec;
                }
            }
        }

        self.exec = match self.top {
            TopMode::Play => RewindMode::Record,
            TopMode::Paused => RewindMode::Paused,
            TopMode::Step => {
                if self.step_armed {
                    self.step_armed = false;
                    RewindMode::Record
                } else {
                    RewindMode::Paused
                }
            }
        };
        self.exec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_with_no_target() {
        let mut machine = ModeMachine::new(TopMode::Paused);
        assert_eq!(machine.evaluate(0), RewindMode::Paused);
        assert_eq!(machine.target_tick(), None);
    }

    #[test]
    fn play_derives_record() {
        let mut machine = ModeMachine::new(TopMode::Play);
        assert_eq!(machine.evaluate(0), RewindMode::Record);
        assert_eq!(machine.evaluate(1), RewindMode::Record);
    }

    #[test]
    fn rewind_until_target_then_resume() {
        let mut machine = ModeMachine::new(TopMode::Play);
        machine.evaluate(100);
        assert!(machine.request_rewind(98, 100));

        assert_eq!(machine.evaluate(100), RewindMode::Rewind);
        assert_eq!(machine.evaluate(99), RewindMode::Rewind);
        // Target reached: falls back to the pre-rewind top mode.
        assert_eq!(machine.evaluate(98), RewindMode::Record);
        assert_eq!(machine.target_tick(), None);
    }

    #[test]
    fn rewind_resumes_paused_if_that_was_selected() {
        let mut machine = ModeMachine::new(TopMode::Paused);
        machine.evaluate(10);
        assert!(machine.request_rewind(9, 10));
        assert_eq!(machine.evaluate(10), RewindMode::Rewind);
        assert_eq!(machine.evaluate(9), RewindMode::Paused);
    }

    #[test]
    fn mode_change_during_rewind_lands_after_target() {
        let mut machine = ModeMachine::new(TopMode::Play);
        machine.evaluate(10);
        machine.request_rewind(8, 10);
        assert_eq!(machine.evaluate(10), RewindMode::Rewind);

        // A pause request mid-rewind changes the landing mode only.
        machine.request_mode(TopMode::Paused);
        assert_eq!(machine.evaluate(9), RewindMode::Rewind);
        assert_eq!(machine.evaluate(8), RewindMode::Paused);
    }

    #[test]
    fn rewind_request_rejects_future_targets() {
        let mut machine = ModeMachine::new(TopMode::Play);
        assert!(!machine.request_rewind(5, 5));
        assert!(!machine.request_rewind(6, 5));
    }

    #[test]
    fn seek_forces_catch_up_until_caught_up() {
        let mut machine = ModeMachine::new(TopMode::Play);
        machine.evaluate(10);
        assert!(machine.request_seek(13, 10));

        assert_eq!(machine.evaluate(10), RewindMode::CatchUp);
        assert_eq!(machine.evaluate(11), RewindMode::CatchUp);
        assert_eq!(machine.evaluate(12), RewindMode::CatchUp);
        assert_eq!(machine.evaluate(13), RewindMode::Record);
    }

    #[test]
    fn seek_rejected_while_rewinding() {
        let mut machine = ModeMachine::new(TopMode::Play);
        machine.evaluate(10);
        machine.request_rewind(5, 10);
        machine.evaluate(10);
        assert!(machine.is_rewinding());
        assert!(!machine.request_seek(20, 10));
    }

    #[test]
    fn seek_holds_while_paused() {
        let mut machine = ModeMachine::new(TopMode::Paused);
        machine.evaluate(10);
        assert!(machine.request_seek(12, 10));
        // Paused: the seek waits for play.
        assert_eq!(machine.evaluate(10), RewindMode::Paused);
        machine.request_mode(TopMode::Play);
        assert_eq!(machine.evaluate(10), RewindMode::CatchUp);
    }

    #[test]
    fn step_records_exactly_once() {
        let mut machine = ModeMachine::new(TopMode::Paused);
        machine.request_step();
        assert_eq!(machine.evaluate(5), RewindMode::Record);
        assert_eq!(machine.evaluate(6), RewindMode::Paused);
        assert_eq!(machine.evaluate(6), RewindMode::Paused);
    }
}
