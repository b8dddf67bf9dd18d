#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Frame-loop session that wires the world to every gameplay system.
//!
//! A [`Session`] owns the authoritative world plus the pure systems and pumps
//! commands through them until the frame settles. Presentation layers either
//! poll the world through [`Session::world`] or subscribe to the event stream.

use std::time::Duration;

use cube_roll_core::{Command, Event, EventChannel, GridPos, RollTrigger, SubscriptionId, TaskId};
use cube_roll_level::{level_name, LevelError, LevelSource};
use cube_roll_system_pressure::{Config as PressureConfig, PressureController};
use cube_roll_system_reaction::ReactionEngine;
use cube_roll_system_rolling::RollOrchestrator;
use cube_roll_system_sequencer::{Config as SequencerConfig, LevelSequencer, SequencerState};
use cube_roll_world::{self as world, query, World, WorldConfig};

/// Upper bound on pump rounds for a single submitted command.
const MAX_PUMP_ROUNDS: usize = 1_024;

/// Aggregated configuration for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    world: WorldConfig,
    pressure: PressureConfig,
    sequencer: SequencerConfig,
    advance_levels: bool,
}

impl SessionConfig {
    /// Creates a configuration from the per-system parts.
    #[must_use]
    pub const fn new(
        world: WorldConfig,
        pressure: PressureConfig,
        sequencer: SequencerConfig,
    ) -> Self {
        Self {
            world,
            pressure,
            sequencer,
            advance_levels: false,
        }
    }

    /// Makes the session load `Level_{n+1}` once level `n` is complete.
    #[must_use]
    pub const fn with_level_advance(mut self, advance: bool) -> Self {
        self.advance_levels = advance;
        self
    }

    /// World configuration.
    #[must_use]
    pub const fn world(&self) -> WorldConfig {
        self.world
    }

    /// Pressure configuration.
    #[must_use]
    pub const fn pressure(&self) -> PressureConfig {
        self.pressure
    }

    /// Sequencer configuration.
    #[must_use]
    pub const fn sequencer(&self) -> SequencerConfig {
        self.sequencer
    }

    /// Reports whether completed levels advance to the next number.
    #[must_use]
    pub const fn advances_levels(&self) -> bool {
        self.advance_levels
    }
}

/// A running game: world, systems, level source and event subscribers.
pub struct Session<S> {
    config: SessionConfig,
    world: World,
    rolling: RollOrchestrator,
    reaction: ReactionEngine,
    pressure: PressureController,
    sequencer: LevelSequencer,
    source: S,
    channel: EventChannel<Event>,
    level_number: Option<u32>,
    elapsed: Duration,
}

impl<S> Session<S>
where
    S: LevelSource,
{
    /// Creates an idle session reading levels from `source`.
    #[must_use]
    pub fn new(source: S, config: SessionConfig) -> Self {
        Self {
            config,
            world: World::with_config(config.world()),
            rolling: RollOrchestrator::new(),
            reaction: ReactionEngine::new(),
            pressure: PressureController::new(config.pressure()),
            sequencer: LevelSequencer::new(config.sequencer()),
            source,
            channel: EventChannel::new(),
            level_number: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Starts part 1 of the named level.
    pub fn start_level(&mut self, name: &str) -> Result<(), LevelError> {
        self.pressure = PressureController::new(self.config.pressure());
        let mut commands = Vec::new();
        let started = self.sequencer.start(name, &self.source, &mut commands);
        self.pump(commands);
        started
    }

    /// Starts part 1 of `Level_{number}`.
    pub fn start_level_number(&mut self, number: u32) -> Result<(), LevelError> {
        self.level_number = Some(number);
        self.start_level(&level_name(number))
    }

    /// Advances the simulation by `dt`.
    pub fn step(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.submit(Command::Tick { dt });
    }

    /// Applies a command and lets every system react until the frame settles.
    pub fn submit(&mut self, command: Command) {
        self.pump(vec![command]);
        self.advance_level_if_complete();
    }

    /// Requests a manual roll of the playing layer.
    pub fn request_roll(&mut self) {
        self.submit(Command::RequestRoll {
            trigger: RollTrigger::Manual,
        });
    }

    /// Toggles the selection of the ground cube at `cell`.
    pub fn toggle_selection(&mut self, cell: GridPos) {
        self.submit(Command::ToggleSelection { cell });
    }

    /// Blows the selected ground cube.
    pub fn blow_selection(&mut self) {
        self.submit(Command::BlowSelection);
    }

    /// Blows every green ground cube regardless of the selection.
    pub fn trigger_green_reaction(&mut self) {
        self.submit(Command::TriggerGreenReaction);
    }

    /// Reports an externally driven animation as finished.
    pub fn complete_animation(&mut self, task: TaskId) {
        self.submit(Command::CompleteAnimation { task });
    }

    /// Registers a handler invoked for every event the world emits.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.channel.subscribe(handler)
    }

    /// Removes exactly the handler registered under `id`.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    /// Remaining pressure in `0.0..=1.0`.
    #[must_use]
    pub fn pressure_value(&self) -> f32 {
        self.pressure.normalized()
    }

    /// Read-only access to the world for queries.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Phase of the level sequencer.
    #[must_use]
    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// Part of the current level being played.
    #[must_use]
    pub fn part(&self) -> u32 {
        self.sequencer.part()
    }

    /// Number of the level when it was started by number.
    #[must_use]
    pub fn level_number(&self) -> Option<u32> {
        self.level_number
    }

    /// Simulated time since the session was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Reports whether a roll sequence is being staged.
    #[must_use]
    pub fn is_rolling(&self) -> bool {
        self.rolling.is_active()
    }

    fn pump(&mut self, mut commands: Vec<Command>) {
        let mut events = Vec::new();
        let mut rounds = 0;
        while !commands.is_empty() {
            rounds += 1;
            if rounds > MAX_PUMP_ROUNDS {
                tracing::warn!(pending = commands.len(), "frame did not settle");
                return;
            }

            for command in commands.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
            for event in &events {
                self.channel.publish(event);
            }

            let cubes = query::cube_view(&self.world);
            self.rolling.handle(&events, &cubes, &mut commands);
            self.reaction.handle(&events, &cubes, &mut commands);
            self.pressure.handle(&events, &mut commands);
            self.sequencer.handle(&events, &self.source, &mut commands);
            events.clear();
        }
    }

    fn advance_level_if_complete(&mut self) {
        if !self.config.advances_levels() || self.sequencer.state() != SequencerState::Complete {
            return;
        }
        let Some(number) = self.level_number else {
            return;
        };
        let next = number.saturating_add(1);
        match self.start_level_number(next) {
            Ok(()) => tracing::info!(level = next, "advanced to next level"),
            Err(LevelError::LevelNotFound { .. }) => {
                tracing::info!(last = number, "no further levels");
                self.level_number = None;
            }
            Err(error) => {
                tracing::warn!(level = next, %error, "next level could not be started");
                self.level_number = None;
            }
        }
    }
}
