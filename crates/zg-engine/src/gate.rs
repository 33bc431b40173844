use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::mode::RewindMode;

/// A set of execution phases a system declares it may run in.
///
/// Systems declare their affinity once at registration; the engine checks it
/// against the derived execution mode before every system tick. The same
/// check is exposed to external collaborators through
/// [`should_run`](crate::engine::TimeEngine::should_run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSet(u8);

impl PhaseSet {
    /// No phases: the system never runs. Useful for disabling a system
    /// without unregistering it.
    pub const NONE: Self = Self(0);
    /// Run while new history is being captured.
    pub const RECORD: Self = Self(1);
    /// Run while previously-skipped ticks are replayed forward.
    pub const CATCH_UP: Self = Self(1 << 1);
    /// Run while the clock walks backward. Almost always wrong for systems
    /// that mutate authoritative state; meant for presentation-adjacent
    /// observers.
    pub const REWIND: Self = Self(1 << 2);

    /// Whether every phase in `other` is contained in this set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The phase corresponding to an execution mode, if the mode is one in
    /// which systems can run at all.
    pub fn of_mode(mode: RewindMode) -> Option<Self> {
        match mode {
            RewindMode::Record => Some(Self::RECORD),
            RewindMode::CatchUp => Some(Self::CATCH_UP),
            RewindMode::Rewind => Some(Self::REWIND),
            RewindMode::Play | RewindMode::Step | RewindMode::Paused => None,
        }
    }
}

impl BitOr for PhaseSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PhaseSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self::RECORD
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::RECORD) {
            names.push("record");
        }
        if self.contains(Self::CATCH_UP) {
            names.push("catch-up");
        }
        if self.contains(Self::REWIND) {
            names.push("rewind");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// The phase-gating contract every collaborator calls before mutating
/// authoritative state.
///
/// Returns false whenever the simulation is paused, regardless of declared
/// phases; otherwise true iff the current execution mode maps into the
/// declared set.
pub fn should_run(declared: PhaseSet, mode: RewindMode, paused: bool) -> bool {
    if paused {
        return false;
    }
    match PhaseSet::of_mode(mode) {
        Some(phase) => declared.contains(phase),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_overrides_any_declared_set() {
        for declared in [
            PhaseSet::NONE,
            PhaseSet::RECORD,
            PhaseSet::CATCH_UP,
            PhaseSet::RECORD | PhaseSet::CATCH_UP | PhaseSet::REWIND,
        ] {
            assert!(!should_run(declared, RewindMode::Record, true));
        }
    }

    #[test]
    fn record_only_system_runs_in_record_only() {
        let declared = PhaseSet::RECORD;
        assert!(should_run(declared, RewindMode::Record, false));
        assert!(!should_run(declared, RewindMode::CatchUp, false));
        assert!(!should_run(declared, RewindMode::Rewind, false));
        assert!(!should_run(declared, RewindMode::Paused, false));
    }

    #[test]
    fn catch_up_eligible_system_runs_in_both() {
        let declared = PhaseSet::RECORD | PhaseSet::CATCH_UP;
        assert!(should_run(declared, RewindMode::Record, false));
        assert!(should_run(declared, RewindMode::CatchUp, false));
        assert!(!should_run(declared, RewindMode::Rewind, false));
    }

    #[test]
    fn empty_set_never_runs() {
        assert!(!should_run(PhaseSet::NONE, RewindMode::Record, false));
        assert!(!should_run(PhaseSet::NONE, RewindMode::CatchUp, false));
    }

    #[test]
    fn contains_and_union() {
        let set = PhaseSet::RECORD | PhaseSet::CATCH_UP;
        assert!(set.contains(PhaseSet::RECORD));
        assert!(set.contains(PhaseSet::CATCH_UP));
        assert!(!set.contains(PhaseSet::REWIND));
        assert!(set.contains(PhaseSet::NONE));
    }

    #[test]
    fn display_names_phases() {
        assert_eq!(PhaseSet::NONE.to_string(), "none");
        assert_eq!((PhaseSet::RECORD | PhaseSet::REWIND).to_string(), "record|rewind");
    }
}
