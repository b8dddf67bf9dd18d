#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pressure countdown that forces the playing layer to roll forward.
//!
//! The countdown only runs once armed and never while a roll is in flight.
//! When it expires it requests a roll and waits for the roll lifecycle to
//! restart it.

use std::time::Duration;

use cube_roll_core::{Command, Event, InvalidOperation, RollTrigger};

/// Countdown length used when none is configured.
pub const DEFAULT_MAX_PRESSURE: Duration = Duration::from_secs(5);

/// Configuration parameters required to construct the pressure controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    max: Duration,
}

impl Config {
    /// Creates a configuration with the provided countdown length.
    #[must_use]
    pub const fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Countdown length.
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRESSURE)
    }
}

/// Pure system that owns the pressure countdown.
#[derive(Debug)]
pub struct PressureController {
    max: Duration,
    remaining: Duration,
    paused: bool,
    armed: bool,
    awaiting_roll: bool,
}

impl PressureController {
    /// Creates a paused, disarmed controller.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            max: config.max(),
            remaining: config.max(),
            paused: true,
            armed: false,
            awaiting_roll: false,
        }
    }

    /// Refills the countdown.
    pub fn reset(&mut self) {
        self.remaining = self.max;
    }

    /// Counts down by `dt` while running.
    ///
    /// Returns `true` when the countdown expired; the controller is then
    /// paused and refilled until the roll lifecycle resumes it.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.paused || !self.armed {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(dt);
        if !self.remaining.is_zero() {
            return false;
        }
        self.paused = true;
        self.awaiting_roll = true;
        self.reset();
        tracing::info!("pressure timed out");
        true
    }

    /// Remaining share of the countdown in `0.0..=1.0`.
    #[must_use]
    pub fn normalized(&self) -> f32 {
        if self.max.is_zero() {
            return 0.0;
        }
        (self.remaining.as_secs_f32() / self.max.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Time left before the next automatic roll.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Reports whether the countdown is frozen.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Reports whether the level armed the countdown.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consumes roll lifecycle events and emits roll requests on timeout.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => {
                    if self.tick(*dt) {
                        out.push(Command::RequestRoll {
                            trigger: RollTrigger::Pressure,
                        });
                    }
                }
                Event::RollStarted => {
                    self.paused = true;
                    self.awaiting_roll = false;
                    self.reset();
                }
                Event::RollFinished => {
                    self.reset();
                    self.resume();
                }
                Event::OperationRejected {
                    reason: InvalidOperation::RollInProgress,
                } if self.awaiting_roll => {
                    tracing::debug!("automatic roll refused, restarting countdown");
                    self.awaiting_roll = false;
                    self.reset();
                    self.resume();
                }
                Event::PressureArmed => {
                    self.armed = true;
                    self.reset();
                    self.resume();
                    tracing::info!(max = ?self.max, "pressure armed");
                }
                Event::LevelPartFinished => {
                    self.armed = false;
                    self.paused = true;
                    self.awaiting_roll = false;
                    self.reset();
                }
                _ => {}
            }
        }
    }

    fn resume(&mut self) {
        if self.armed {
            self.paused = false;
        }
    }
}

impl Default for PressureController {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> PressureController {
        let mut pressure = PressureController::new(Config::new(Duration::from_secs(2)));
        let mut commands = Vec::new();
        pressure.handle(&[Event::PressureArmed], &mut commands);
        assert!(commands.is_empty());
        pressure
    }

    #[test]
    fn starts_paused_and_disarmed() {
        let mut pressure = PressureController::default();
        assert!(pressure.is_paused());
        assert!(!pressure.is_armed());
        assert!(!pressure.tick(Duration::from_secs(60)));
        assert_eq!(pressure.remaining(), DEFAULT_MAX_PRESSURE);
        assert_eq!(pressure.normalized(), 1.0);
    }

    #[test]
    fn expiry_requests_a_pressure_roll_once() {
        let mut pressure = armed();
        let mut commands = Vec::new();
        pressure.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_millis(500),
            }],
            &mut commands,
        );
        assert!(commands.is_empty());
        assert!((pressure.normalized() - 0.75).abs() < 1e-6);

        pressure.handle(
            &[
                Event::TimeAdvanced {
                    dt: Duration::from_secs(3),
                },
                Event::TimeAdvanced {
                    dt: Duration::from_secs(3),
                },
            ],
            &mut commands,
        );
        assert_eq!(
            commands,
            vec![Command::RequestRoll {
                trigger: RollTrigger::Pressure
            }]
        );
        assert!(pressure.is_paused());
        assert_eq!(pressure.remaining(), Duration::from_secs(2));
    }

    #[test]
    fn roll_lifecycle_pauses_and_resumes() {
        let mut pressure = armed();
        let mut commands = Vec::new();
        pressure.handle(
            &[
                Event::TimeAdvanced {
                    dt: Duration::from_secs(1),
                },
                Event::RollStarted,
                Event::TimeAdvanced {
                    dt: Duration::from_secs(10),
                },
            ],
            &mut commands,
        );
        assert!(commands.is_empty());
        assert!(pressure.is_paused());
        assert_eq!(pressure.remaining(), Duration::from_secs(2));

        pressure.handle(&[Event::RollFinished], &mut commands);
        assert!(!pressure.is_paused());
    }

    #[test]
    fn refused_automatic_roll_restarts_countdown() {
        let mut pressure = armed();
        let mut commands = Vec::new();
        let rejected = Event::OperationRejected {
            reason: InvalidOperation::RollInProgress,
        };

        pressure.handle(&[rejected.clone()], &mut commands);
        assert!(!pressure.is_paused());

        pressure.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(2),
            }],
            &mut commands,
        );
        assert!(pressure.is_paused());
        pressure.handle(&[rejected], &mut commands);
        assert!(!pressure.is_paused());
        assert_eq!(pressure.remaining(), Duration::from_secs(2));
    }

    #[test]
    fn manual_rejection_during_a_roll_keeps_it_paused() {
        let mut pressure = armed();
        let mut commands = Vec::new();
        pressure.handle(
            &[
                Event::RollStarted,
                Event::OperationRejected {
                    reason: InvalidOperation::RollInProgress,
                },
            ],
            &mut commands,
        );
        assert!(pressure.is_paused());
    }

    #[test]
    fn finished_part_disarms() {
        let mut pressure = armed();
        let mut commands = Vec::new();
        pressure.handle(
            &[
                Event::LevelPartFinished,
                Event::RollFinished,
                Event::TimeAdvanced {
                    dt: Duration::from_secs(10),
                },
            ],
            &mut commands,
        );
        assert!(commands.is_empty());
        assert!(!pressure.is_armed());
        assert!(pressure.is_paused());
    }
}
