use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use zg_core::entity::PlayerId;

use crate::bubble::{BubbleId, BubbleSpec};
use crate::mode::TopMode;

/// Whether a command affects the whole timeline or a local region.
///
/// Global commands sort before local ones at the drain point, so a global
/// speed change is in force before any bubble spawned the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandScope {
    /// Affects the global clock or mode.
    Global,
    /// Affects a spatial or ownership-scoped region.
    Local,
}

/// Who submitted a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    /// A player, via an input adapter.
    Player,
    /// Another simulation system.
    System,
}

/// The operation a time-control command requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Change the global speed scale. Clamped into the configured bounds
    /// when applied.
    SetSpeed(f32),
    /// Bring a time bubble alive. The id was reserved at submission and is
    /// already the caller's destroy handle.
    SpawnBubble {
        /// The validated spawn request.
        spec: BubbleSpec,
        /// The reserved handle.
        id: BubbleId,
    },
    /// Destroy a live bubble. Takes effect at the drain point, never
    /// mid-resolution.
    DestroyBubble(BubbleId),
    /// Select a new top-level mode.
    SetMode(TopMode),
    /// Walk the clock backward to a past tick, restoring history.
    RewindTo(u64),
    /// Fast-replay forward to a future tick without recapturing history.
    SeekTo(u64),
    /// Advance exactly one tick, then hold.
    Step,
}

/// A queued time-control request: an operation plus its routing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCommand {
    /// The requested operation.
    pub kind: CommandKind,
    /// Global or local routing; globals apply first.
    pub scope: CommandScope,
    /// Who submitted the command.
    pub source: CommandSource,
    /// The submitting player, when the source is a player.
    pub player: Option<PlayerId>,
    /// Higher priority wins ties between commands drained the same tick.
    pub priority: u8,
}

impl TimeCommand {
    /// A system-sourced command with default routing.
    pub fn new(kind: CommandKind) -> Self {
        let scope = match kind {
            CommandKind::SpawnBubble { .. } | CommandKind::DestroyBubble(_) => CommandScope::Local,
            _ => CommandScope::Global,
        };
        Self {
            kind,
            scope,
            source: CommandSource::System,
            player: None,
            priority: 0,
        }
    }

    /// Attribute the command to a player.
    pub fn from_player(mut self, player: PlayerId) -> Self {
        self.source = CommandSource::Player;
        self.player = Some(player);
        self
    }

    /// Set the tie-break priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Pending time-control requests, drained at one fixed point per tick.
///
/// Appends are FIFO and unvalidated; validation happens when the engine
/// applies the drained batch. The drain order is `(scope, priority
/// descending, enqueue order)`, so simultaneous conflicting global commands
/// resolve by priority and exact ties by submission order.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<(u64, TimeCommand)>,
    next_seq: u64,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command without validation.
    pub fn push(&mut self, command: TimeCommand) {
        self.pending.push((self.next_seq, command));
        self.next_seq += 1;
    }

    /// Remove and return every pending command in application order.
    pub fn drain(&mut self) -> Vec<TimeCommand> {
        let mut batch = std::mem::take(&mut self.pending);
        batch.sort_by_key(|(seq, cmd)| (cmd.scope, Reverse(cmd.priority), *seq));
        batch.into_iter().map(|(_, cmd)| cmd).collect()
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
