#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level part sequencing: load, spawn ground, spawn cubes, rise, arm pressure.
//!
//! Each phase waits for the world to confirm the previous one, so a part is
//! never armed before every cube finished rising.

use std::time::Duration;

use cube_roll_core::{Command, Event};
use cube_roll_level::{load, LevelDefinition, LevelError, LevelSource};

/// Pause between spawning the cubes and rising them, and after the rise.
pub const DEFAULT_PHASE_DELAY: Duration = Duration::from_millis(500);
/// Extra pause after the rise before pressure is armed.
pub const DEFAULT_ARM_DELAY: Duration = Duration::from_secs(2);

/// Configuration parameters required to construct the sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    phase_delay: Duration,
    arm_delay: Duration,
}

impl Config {
    /// Creates a configuration with the provided delays.
    #[must_use]
    pub const fn new(phase_delay: Duration, arm_delay: Duration) -> Self {
        Self {
            phase_delay,
            arm_delay,
        }
    }

    /// Pause around the rise phase.
    #[must_use]
    pub const fn phase_delay(&self) -> Duration {
        self.phase_delay
    }

    /// Extra pause before pressure is armed.
    #[must_use]
    pub const fn arm_delay(&self) -> Duration {
        self.arm_delay
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_DELAY, DEFAULT_ARM_DELAY)
    }
}

/// Observable phase of the sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequencerState {
    /// No level has been started.
    Idle,
    /// Waiting for the ground layer.
    SpawningGround,
    /// Waiting for the playing cubes.
    SpawningCubes,
    /// Waiting for every playing cube to finish rising.
    Rising,
    /// Waiting out the delay before pressure is armed.
    Arming,
    /// The part is being played.
    Armed,
    /// Every part of the level was cleared.
    Complete,
    /// The level could not be read any further.
    Halted,
}

#[derive(Debug)]
enum Phase {
    Idle,
    SpawningGround,
    SpawningCubes,
    Rising {
        delay: Duration,
        dispatched: bool,
    },
    Arming {
        remaining: Duration,
    },
    Armed,
    Complete,
    Halted,
}

/// Pure system that walks a level through its parts.
#[derive(Debug)]
pub struct LevelSequencer {
    config: Config,
    phase: Phase,
    level: Option<String>,
    part: u32,
    current: Option<LevelDefinition>,
}

impl LevelSequencer {
    /// Creates an idle sequencer.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            level: None,
            part: 0,
            current: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> SequencerState {
        match self.phase {
            Phase::Idle => SequencerState::Idle,
            Phase::SpawningGround => SequencerState::SpawningGround,
            Phase::SpawningCubes => SequencerState::SpawningCubes,
            Phase::Rising { .. } => SequencerState::Rising,
            Phase::Arming { .. } => SequencerState::Arming,
            Phase::Armed => SequencerState::Armed,
            Phase::Complete => SequencerState::Complete,
            Phase::Halted => SequencerState::Halted,
        }
    }

    /// Name of the level being played.
    #[must_use]
    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    /// Index of the part being played.
    #[must_use]
    pub fn part(&self) -> u32 {
        self.part
    }

    /// Definition of the part being played.
    #[must_use]
    pub fn current(&self) -> Option<&LevelDefinition> {
        self.current.as_ref()
    }

    /// Loads part 1 of `level` and starts spawning it.
    pub fn start<S>(
        &mut self,
        level: &str,
        source: &S,
        out: &mut Vec<Command>,
    ) -> Result<(), LevelError>
    where
        S: LevelSource + ?Sized,
    {
        self.level = Some(level.to_owned());
        match load(source, level, 1) {
            Ok(definition) => {
                self.begin_part(definition, out);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(name = level, %error, "level could not be started");
                self.phase = Phase::Halted;
                Err(error)
            }
        }
    }

    /// Consumes world confirmations and time to drive the phases.
    pub fn handle<S>(&mut self, events: &[Event], source: &S, out: &mut Vec<Command>)
    where
        S: LevelSource + ?Sized,
    {
        for event in events {
            match event {
                Event::GroundSpawned { .. } if matches!(self.phase, Phase::SpawningGround) => {
                    let cubes = self
                        .current
                        .as_ref()
                        .map(LevelDefinition::cube_spawns)
                        .unwrap_or_default();
                    self.phase = Phase::SpawningCubes;
                    out.push(Command::SpawnPlayingCubes { cubes });
                }
                Event::PlayingCubesSpawned { .. } if matches!(self.phase, Phase::SpawningCubes) => {
                    self.phase = Phase::Rising {
                        delay: self.config.phase_delay(),
                        dispatched: false,
                    };
                }
                Event::RiseCompleted { count } => {
                    if let Phase::Rising {
                        dispatched: true, ..
                    } = self.phase
                    {
                        tracing::debug!(count, "part risen");
                        self.phase = Phase::Arming {
                            remaining: self
                                .config
                                .phase_delay()
                                .saturating_add(self.config.arm_delay()),
                        };
                    }
                }
                Event::TimeAdvanced { dt } => self.advance(*dt, out),
                Event::LevelPartFinished if matches!(self.phase, Phase::Armed) => {
                    self.next_part(source, out);
                }
                _ => {}
            }
        }
    }

    fn begin_part(&mut self, definition: LevelDefinition, out: &mut Vec<Command>) {
        self.part = definition.part_index();
        tracing::info!(
            name = self.level.as_deref().unwrap_or_default(),
            part = self.part,
            "spawning level part"
        );
        out.push(Command::SpawnGround {
            width: definition.width(),
            depth: definition.ground_depth(),
        });
        self.current = Some(definition);
        self.phase = Phase::SpawningGround;
    }

    fn next_part<S>(&mut self, source: &S, out: &mut Vec<Command>)
    where
        S: LevelSource + ?Sized,
    {
        let Some(level) = self.level.clone() else {
            return;
        };
        let next = self.part.saturating_add(1);
        match load(source, &level, next) {
            Ok(definition) => self.begin_part(definition, out),
            Err(LevelError::PartNotFound { .. }) => {
                tracing::info!(name = %level, parts = self.part, "level complete");
                self.current = None;
                self.phase = Phase::Complete;
            }
            Err(error) => {
                tracing::warn!(name = %level, part = next, %error, "level halted");
                self.current = None;
                self.phase = Phase::Halted;
            }
        }
    }

    fn advance(&mut self, dt: Duration, out: &mut Vec<Command>) {
        match &mut self.phase {
            Phase::Rising { delay, dispatched } if !*dispatched => {
                *delay = delay.saturating_sub(dt);
                if delay.is_zero() {
                    *dispatched = true;
                    out.push(Command::RiseCubes);
                }
            }
            Phase::Arming { remaining } => {
                *remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    self.phase = Phase::Armed;
                    out.push(Command::ArmPressure);
                }
            }
            _ => {}
        }
    }
}

impl Default for LevelSequencer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
