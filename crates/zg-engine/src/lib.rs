//! Deterministic tick-based time control and rewind for Zeitgeber.
//!
//! Provides the simulation clock, global and regional time dilation, per-tick
//! snapshot history with bounded ring buffers, and the phase-gating contract
//! every other subsystem consults before running. Given an identical command
//! stream and identical entity state, two runs produce bit-identical results;
//! everything in this crate is ordered to keep that true.

/// Time-dilation bubbles: regions, authority policies, and id derivation.
pub mod bubble;
/// Update cadence helper for self-throttling collaborator systems.
pub mod cadence;
/// The simulation clock.
pub mod clock;
/// Time-control commands and the per-tick command queue.
pub mod command;
/// Configuration for an engine instance.
pub mod config;
/// Mutable context passed to systems each tick.
pub mod context;
/// The engine orchestrator.
pub mod engine;
/// Error types for the engine crate.
pub mod error;
/// Engine event types and the event log.
pub mod event;
/// The phase gate: which systems may run in which execution mode.
pub mod gate;
/// The rewind mode state machine.
pub mod mode;
/// Bubble overlap resolution into per-entity time flows.
pub mod resolver;
/// Per-entity snapshot rings and history channels.
pub mod snapshot;
/// The trait all engine-driven systems implement.
pub mod system;

/// Re-export bubble types.
pub use bubble::{AuthorityPolicy, BubbleId, BubbleMode, BubbleSpec, TimeBubble};
/// Re-export of [`cadence::UpdateCadence`].
pub use cadence::UpdateCadence;
/// Re-exports of [`clock::TickClock`] and [`clock::TickDirection`].
pub use clock::{TickClock, TickDirection};
/// Re-export command types.
pub use command::{CommandKind, CommandQueue, CommandScope, CommandSource, TimeCommand};
/// Re-export of [`config::EngineConfig`].
pub use config::EngineConfig;
/// Re-export of [`context::TickContext`].
pub use context::TickContext;
/// Re-export of [`engine::TimeEngine`].
pub use engine::TimeEngine;
/// Re-exports of [`error::EngineError`] and [`error::EngineResult`].
pub use error::{EngineError, EngineResult};
/// Re-export event types.
pub use event::{EngineEvent, EngineEventKind, EventLog};
/// Re-exports of [`gate::PhaseSet`] and [`gate::should_run`].
pub use gate::{PhaseSet, should_run};
/// Re-exports of [`mode::ModeMachine`], [`mode::RewindMode`], and [`mode::TopMode`].
pub use mode::{ModeMachine, RewindMode, TopMode};
/// Re-exports of [`resolver::BubbleResolver`] and [`resolver::TimeFlow`].
pub use resolver::{BubbleResolver, TimeFlow};
/// Re-export snapshot types.
pub use snapshot::{
    HistoryChannel, PoseChannel, PoseRecord, RestoreReport, SnapshotHeader, SnapshotRecord,
    SnapshotRing, SnapshotStore,
};
/// Re-export of [`system::System`].
pub use system::System;
