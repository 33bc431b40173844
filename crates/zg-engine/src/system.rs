use crate::context::TickContext;
use crate::error::EngineResult;
use crate::gate::PhaseSet;

/// A simulation subsystem that runs each tick, subject to the phase gate.
///
/// Systems are executed in registration order. Each system receives a
/// mutable context providing access to the world, clock, per-entity time
/// flows, RNG, and event log. A system runs only when the phase gate admits
/// its declared phases for the current execution mode.
pub trait System: std::fmt::Debug {
    /// Human-readable name for this system.
    fn name(&self) -> &str;

    /// The execution phases this system may run in. Declared once; the
    /// engine checks it against the derived mode before every tick. The
    /// default is record-only, the safe choice for anything that mutates
    /// authoritative state.
    fn phases(&self) -> PhaseSet {
        PhaseSet::RECORD
    }

    /// Called once per tick the gate admits.
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> EngineResult<()>;

    /// Called once when the engine initializes. Optional setup hook.
    fn init(&mut self, _ctx: &mut TickContext<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Support downcasting to concrete types for cross-system communication.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Support downcasting to concrete types for cross-system communication.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
