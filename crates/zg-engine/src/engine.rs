use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use zg_core::entity::EntityId;
use zg_core::world::World;

use crate::bubble::{BubbleId, BubbleSpec};
use crate::clock::{TickClock, TickDirection};
use crate::command::{CommandKind, CommandQueue, TimeCommand};
use crate::config::EngineConfig;
use crate::context::TickContext;
use crate::error::{EngineError, EngineResult};
use crate::event::{EngineEvent, EngineEventKind, EventLog};
use crate::gate::{self, PhaseSet};
use crate::mode::{ModeMachine, RewindMode, TopMode};
use crate::resolver::{BubbleResolver, TimeFlow};
use crate::snapshot::{HistoryChannel, PoseChannel};
use crate::system::System;

/// The time-control engine: the single authority over the simulation clock,
/// time-dilation regions, and per-entity history.
///
/// Owns the world, clock, command queue, bubble resolver, mode machine,
/// event log, RNG, registered systems, and history channels. Every tick runs
/// the same strict sequence (drain commands, derive the execution mode, move
/// the clock, expire bubbles, resolve per-entity flows, then dispatch
/// gameplay and capture/restore), and all work for tick N completes before
/// tick N+1 begins.
pub struct TimeEngine {
    world: World,
    clock: TickClock,
    config: EngineConfig,
    queue: CommandQueue,
    resolver: BubbleResolver,
    modes: ModeMachine,
    global_scale: f32,
    events: EventLog,
    rng: StdRng,
    systems: Vec<Box<dyn System>>,
    channels: Vec<Box<dyn HistoryChannel>>,
    flows: BTreeMap<EntityId, TimeFlow>,
    reserved_ids: BTreeSet<BubbleId>,
    dropped_commands: u64,
    initialized: bool,
}

impl std::fmt::Debug for TimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeEngine")
            .field("tick", &self.clock.tick())
            .field("mode", &self.modes.exec_mode())
            .field("bubbles", &self.resolver.len())
            .field("systems", &self.systems.len())
            .finish()
    }
}

impl TimeEngine {
    /// Create an engine from a world and configuration.
    ///
    /// Fails fast on an invalid configuration: no partial engine exists
    /// afterwards. The built-in pose channel is registered with the
    /// configured default history capacity.
    pub fn new(world: World, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut clock = TickClock::new(config.tick_duration);
        clock.set_paused(config.initial_mode != TopMode::Play);
        let modes = ModeMachine::new(config.initial_mode);
        let rng = StdRng::seed_from_u64(config.seed);
        let events = EventLog::new(config.max_events);
        let global_scale = 1.0f32.clamp(config.min_speed, config.max_speed);
        let channels: Vec<Box<dyn HistoryChannel>> =
            vec![Box::new(PoseChannel::new(config.max_history_ticks as u32))];
        Ok(Self {
            world,
            clock,
            config,
            queue: CommandQueue::new(),
            resolver: BubbleResolver::new(),
            modes,
            global_scale,
            events,
            rng,
            systems: Vec::new(),
            channels,
            flows: BTreeMap::new(),
            reserved_ids: BTreeSet::new(),
            dropped_commands: 0,
            initialized: false,
        })
    }

    /// Register a system. Systems are ticked in registration order.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.systems.push(Box::new(system));
    }

    /// Register an additional history channel.
    pub fn add_channel<C: HistoryChannel + 'static>(&mut self, channel: C) {
        self.channels.push(Box::new(channel));
    }

    /// Initialize all registered systems.
    pub fn init(&mut self) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }
        for i in 0..self.systems.len() {
            let mut system = std::mem::replace(&mut self.systems[i], Box::new(NoopSystem));
            let mut ctx = TickContext {
                world: &mut self.world,
                clock: &self.clock,
                mode: self.modes.exec_mode(),
                flows: &self.flows,
                global_scale: self.global_scale,
                events: &mut self.events,
                rng: &mut self.rng,
            };
            let result = system.init(&mut ctx);
            self.systems[i] = system;
            result?;
        }
        self.initialized = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Command submission
    // -----------------------------------------------------------------------

    /// Enqueue a raw command. No validation happens here; malformed commands
    /// are dropped with a diagnostic at the next drain point.
    pub fn submit(&mut self, command: TimeCommand) {
        self.queue.push(command);
    }

    /// Request a global speed change, clamped into the configured bounds at
    /// the drain point.
    pub fn set_speed(&mut self, speed: f32) {
        self.submit(TimeCommand::new(CommandKind::SetSpeed(speed)));
    }

    /// Request a top-level mode change.
    pub fn request_mode(&mut self, mode: TopMode) {
        self.submit(TimeCommand::new(CommandKind::SetMode(mode)));
    }

    /// Request a rewind to a past tick.
    pub fn rewind_to(&mut self, target: u64) {
        self.submit(TimeCommand::new(CommandKind::RewindTo(target)));
    }

    /// Request a fast-replay forward to a future tick.
    pub fn seek_to(&mut self, target: u64) {
        self.submit(TimeCommand::new(CommandKind::SeekTo(target)));
    }

    /// Request a single forward step.
    pub fn step_once(&mut self) {
        self.submit(TimeCommand::new(CommandKind::Step));
    }

    /// Validate a bubble spec, reserve its id, and enqueue the spawn.
    ///
    /// The returned id is the caller's destroy handle; the bubble itself
    /// comes alive at the next drain point. Ids are reserved eagerly so two
    /// spawns submitted the same tick can never alias, even when their
    /// spatial-hash seeds collide.
    pub fn spawn_bubble(&mut self, spec: BubbleSpec) -> EngineResult<BubbleId> {
        spec.validate()?;
        let id = self
            .resolver
            .allocate_id(spec.volume.center, self.clock.tick(), &self.reserved_ids);
        self.reserved_ids.insert(id);
        self.submit(TimeCommand::new(CommandKind::SpawnBubble { spec, id }));
        Ok(id)
    }

    /// Request destruction of a live bubble. Takes effect at the next drain
    /// point, never mid-resolution.
    pub fn destroy_bubble(&mut self, id: BubbleId) {
        self.submit(TimeCommand::new(CommandKind::DestroyBubble(id)));
    }

    /// Override an entity's pose-history ring capacity. 0 opts the entity
    /// out of rewind entirely, which also frees any history captured so far.
    pub fn set_history_capacity(&mut self, entity: EntityId, capacity: u32) -> EngineResult<()> {
        if !self.world.contains(entity) {
            return Err(EngineError::EntityNotFound(entity));
        }
        if let Some(channel) = self.get_channel_mut::<PoseChannel>() {
            channel.store_mut().set_capacity(entity, capacity);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick loop
    // -----------------------------------------------------------------------

    /// Advance the engine by one tick.
    pub fn tick(&mut self) -> EngineResult<()> {
        if !self.initialized {
            self.init()?;
        }

        self.drain_commands();

        let previous = self.modes.exec_mode();
        let exec = self.modes.evaluate(self.clock.tick());
        self.clock.set_paused(exec == RewindMode::Paused);
        if exec != previous {
            let description = format!("{previous} -> {exec}");
            self.push_event(
                EngineEventKind::ModeChanged {
                    from: previous,
                    to: exec,
                },
                description,
            );
        }

        match exec {
            RewindMode::Record => {
                self.clock.advance(TickDirection::Forward);
                self.expire_bubbles();
                self.resolve_flows();
                self.run_systems(exec)?;
                self.apply_bubble_rewinds();
                self.capture_channels();
            }
            RewindMode::CatchUp => {
                self.clock.advance(TickDirection::Forward);
                self.expire_bubbles();
                self.resolve_flows();
                self.run_systems(exec)?;
            }
            RewindMode::Rewind => {
                let target = self.clock.advance(TickDirection::Backward);
                self.restore_channels(target);
            }
            RewindMode::Paused | RewindMode::Play | RewindMode::Step => {
                // Clock frozen: bubbles age with the tick counter, so they
                // neither expire nor resolve differently while held.
                self.expire_bubbles();
                self.resolve_flows();
            }
        }
        Ok(())
    }

    /// Advance the engine by `n` ticks.
    pub fn run(&mut self, n: u64) -> EngineResult<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The clock: tick, elapsed seconds, pause flag.
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// The current tick number.
    pub fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    /// The execution mode derived on the last tick.
    pub fn mode(&self) -> RewindMode {
        self.modes.exec_mode()
    }

    /// The externally-selected top-level mode.
    pub fn top_mode(&self) -> TopMode {
        self.modes.top_mode()
    }

    /// The phase-gate check for external collaborators: may a system with
    /// the declared phases run right now?
    pub fn should_run(&self, declared: PhaseSet) -> bool {
        gate::should_run(declared, self.modes.exec_mode(), self.clock.is_paused())
    }

    /// The effective global speed scale.
    pub fn global_scale(&self) -> f32 {
        self.global_scale
    }

    /// The entity registry.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the entity registry.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The engine event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The live bubble set.
    pub fn resolver(&self) -> &BubbleResolver {
        &self.resolver
    }

    /// Per-entity flows resolved this tick.
    pub fn flows(&self) -> &BTreeMap<EntityId, TimeFlow> {
        &self.flows
    }

    /// The effective flow for one entity this tick.
    pub fn flow(&self, entity: EntityId) -> TimeFlow {
        self.flows
            .get(&entity)
            .copied()
            .unwrap_or_else(|| TimeFlow::global(self.global_scale))
    }

    /// How many commands have been dropped since world start. Observable so
    /// rejected input degrades loudly rather than vanishing.
    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    /// Access a system by downcasting to a concrete type.
    pub fn get_system<T: System + 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<T>())
    }

    /// Access a system mutably by downcasting to a concrete type.
    pub fn get_system_mut<T: System + 'static>(&mut self) -> Option<&mut T> {
        self.systems
            .iter_mut()
            .find_map(|s| s.as_any_mut().downcast_mut::<T>())
    }

    /// Access a history channel by downcasting to a concrete type.
    pub fn get_channel<T: HistoryChannel + 'static>(&self) -> Option<&T> {
        self.channels
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Access a history channel mutably by downcasting to a concrete type.
    pub fn get_channel_mut<T: HistoryChannel + 'static>(&mut self) -> Option<&mut T> {
        self.channels
            .iter_mut()
            .find_map(|c| c.as_any_mut().downcast_mut::<T>())
    }

    /// Extract the world, consuming the engine.
    pub fn into_world(self) -> World {
        self.world
    }

    // -----------------------------------------------------------------------
    // Tick phases
    // -----------------------------------------------------------------------

    fn drain_commands(&mut self) {
        let batch = self.queue.drain();
        let mut speed_set = false;
        for command in batch {
            self.apply_command(command, &mut speed_set);
        }
    }

    fn apply_command(&mut self, command: TimeCommand, speed_set: &mut bool) {
        match command.kind {
            CommandKind::SetSpeed(speed) => {
                if !speed.is_finite() {
                    self.drop_command(format!("speed is not finite: {speed}"));
                    return;
                }
                if *speed_set {
                    // The batch is priority-ordered, so the first speed
                    // command already won this tick's tie.
                    log::debug!("speed command superseded by higher priority");
                    return;
                }
                *speed_set = true;
                let clamped = speed.clamp(self.config.min_speed, self.config.max_speed);
                if clamped != self.global_scale {
                    self.global_scale = clamped;
                    self.push_event(
                        EngineEventKind::SpeedChanged { scale: clamped },
                        format!("global speed scale set to {clamped}"),
                    );
                }
            }
            CommandKind::SpawnBubble { spec, id } => {
                self.reserved_ids.remove(&id);
                if let Err(err) = spec.validate() {
                    self.drop_command(err.to_string());
                    return;
                }
                if let Some(source) = spec.source_entity
                    && !self.world.contains(source)
                {
                    // The spawner died between submission and drain. Not an
                    // authoring error; count it but stay quiet.
                    self.dropped_commands += 1;
                    log::debug!("bubble spawn dropped: source entity {source} is gone");
                    return;
                }
                if self.resolver.get(id).is_some() {
                    self.drop_command(format!("bubble id {id} is already live"));
                    return;
                }
                self.resolver.spawn(id, spec, self.clock.tick());
                self.push_event(
                    EngineEventKind::BubbleSpawned { id },
                    format!("bubble {id} spawned"),
                );
            }
            CommandKind::DestroyBubble(id) => match self.resolver.destroy(id) {
                Some(_) => {
                    self.push_event(
                        EngineEventKind::BubbleDestroyed { id },
                        format!("bubble {id} destroyed"),
                    );
                }
                None => self.drop_command(format!("no live bubble {id}")),
            },
            CommandKind::SetMode(mode) => self.modes.request_mode(mode),
            CommandKind::RewindTo(target) => {
                if !self.modes.request_rewind(target, self.clock.tick()) {
                    self.drop_command(format!(
                        "rewind target {target} is not in the past (tick {})",
                        self.clock.tick()
                    ));
                }
            }
            CommandKind::SeekTo(target) => {
                if !self.modes.request_seek(target, self.clock.tick()) {
                    self.drop_command(format!(
                        "seek target {target} is not ahead of tick {}",
                        self.clock.tick()
                    ));
                }
            }
            CommandKind::Step => self.modes.request_step(),
        }
    }

    fn drop_command(&mut self, reason: String) {
        self.dropped_commands += 1;
        log::warn!("time command dropped: {reason}");
        self.push_event(
            EngineEventKind::CommandDropped {
                reason: reason.clone(),
            },
            reason,
        );
    }

    fn expire_bubbles(&mut self) {
        let now = self.clock.tick();
        for id in self.resolver.expire(now) {
            self.push_event(
                EngineEventKind::BubbleExpired { id },
                format!("bubble {id} expired"),
            );
        }
    }

    fn resolve_flows(&mut self) {
        let flows: BTreeMap<EntityId, TimeFlow> = self
            .world
            .iter()
            .map(|e| {
                (
                    e.id,
                    self.resolver
                        .resolve(e.pose.position, e.owner, self.global_scale),
                )
            })
            .collect();
        self.flows = flows;
    }

    fn run_systems(&mut self, exec: RewindMode) -> EngineResult<()> {
        let paused = self.clock.is_paused();
        for i in 0..self.systems.len() {
            let mut system = std::mem::replace(&mut self.systems[i], Box::new(NoopSystem));
            let admitted = gate::should_run(system.phases(), exec, paused);
            let result = if admitted {
                let mut ctx = TickContext {
                    world: &mut self.world,
                    clock: &self.clock,
                    mode: exec,
                    flows: &self.flows,
                    global_scale: self.global_scale,
                    events: &mut self.events,
                    rng: &mut self.rng,
                };
                system.tick(&mut ctx)
            } else {
                Ok(())
            };
            self.systems[i] = system;
            result?;
        }
        Ok(())
    }

    /// Hold entities caught in rewind bubbles at their historical state.
    /// Runs before capture so their held-back pose is what this tick
    /// records.
    fn apply_bubble_rewinds(&mut self) {
        let held: Vec<(EntityId, i32)> = self
            .flows
            .iter()
            .filter(|(_, flow)| flow.is_rewinding())
            .map(|(id, flow)| (*id, flow.rewind_offset))
            .collect();
        for (entity, offset) in held {
            let target = self.clock.tick().saturating_sub(offset as u64);
            for channel in &mut self.channels {
                if !channel.restore_entity(&mut self.world, entity, target) {
                    log::debug!(
                        "no {} history for {entity} at or before tick {target}",
                        channel.name()
                    );
                }
            }
        }
    }

    fn capture_channels(&mut self) {
        let tick = self.clock.tick();
        for channel in &mut self.channels {
            channel.capture(&self.world, tick);
        }
    }

    fn restore_channels(&mut self, target: u64) {
        for i in 0..self.channels.len() {
            let report = {
                let channel = &mut self.channels[i];
                channel.restore(&mut self.world, target)
            };
            for (entity, tick) in report.restored {
                self.push_event(
                    EngineEventKind::EntityRestored { entity, tick },
                    format!("{entity} restored to tick {tick}"),
                );
            }
            for entity in report.underruns {
                log::debug!("history underrun for {entity} at target {target}");
                self.push_event(
                    EngineEventKind::HistoryUnderrun { entity, target },
                    format!("{entity} has no history at or before tick {target}"),
                );
            }
        }
    }

    fn push_event(&mut self, kind: EngineEventKind, description: String) {
        self.events
            .push(EngineEvent::new(self.clock.tick(), kind, description));
    }
}

/// Placeholder system used during the swap-and-tick pattern.
#[derive(Debug)]
struct NoopSystem;

impl System for NoopSystem {
    fn name(&self) -> &str {
        "noop"
    }
    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> EngineResult<()> {
        Ok(())
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
