use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use cube_roll_core::RollSpeed;
use cube_roll_headless::SessionConfig;
use cube_roll_system_pressure::{Config as PressureConfig, DEFAULT_MAX_PRESSURE};
use cube_roll_system_sequencer::{Config as SequencerConfig, DEFAULT_ARM_DELAY, DEFAULT_PHASE_DELAY};
use cube_roll_world::{CompletionMode, WorldConfig};
use serde::Deserialize;

const SUPPORTED_SETTINGS_VERSION: u32 = 1;

/// Session tunables read from a TOML settings file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    version: u32,
    world: WorldSettings,
    pressure: PressureSettings,
    sequencer: SequencerSettings,
    advance_levels: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WorldSettings {
    roll_speed: u32,
    rise_seconds: f32,
    melt_seconds: f32,
    completion: Completion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Completion {
    Timed,
    External,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PressureSettings {
    max_seconds: f32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SequencerSettings {
    phase_delay_seconds: f32,
    arm_delay_seconds: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SUPPORTED_SETTINGS_VERSION,
            world: WorldSettings::default(),
            pressure: PressureSettings::default(),
            sequencer: SequencerSettings::default(),
            advance_levels: true,
        }
    }
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            roll_speed: RollSpeed::DEFAULT.degrees_per_second(),
            rise_seconds: 1.0,
            melt_seconds: 1.0,
            completion: Completion::Timed,
        }
    }
}

impl Default for PressureSettings {
    fn default() -> Self {
        Self {
            max_seconds: DEFAULT_MAX_PRESSURE.as_secs_f32(),
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            phase_delay_seconds: DEFAULT_PHASE_DELAY.as_secs_f32(),
            arm_delay_seconds: DEFAULT_ARM_DELAY.as_secs_f32(),
        }
    }
}

impl Settings {
    /// Reads settings from the TOML file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings at {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(contents).context("failed to parse settings toml contents")?;
        if settings.version != SUPPORTED_SETTINGS_VERSION {
            bail!(
                "unsupported settings version {}; expected {}",
                settings.version,
                SUPPORTED_SETTINGS_VERSION
            );
        }
        Ok(settings)
    }

    /// Converts the settings into a session configuration.
    pub(crate) fn session_config(&self) -> Result<SessionConfig> {
        if self.world.roll_speed == 0 {
            bail!("world.roll_speed must be positive");
        }
        // Nothing in the headless runner reports animation completions.
        let completion = match self.world.completion {
            Completion::Timed => CompletionMode::Timed,
            Completion::External => {
                bail!("world.completion = \"external\" is not supported by the headless runner")
            }
        };
        let world = WorldConfig::new(
            RollSpeed::from_degrees_per_second(self.world.roll_speed),
            completion,
        )
        .with_rise_duration(seconds("world.rise_seconds", self.world.rise_seconds)?)
        .with_melt_duration(seconds("world.melt_seconds", self.world.melt_seconds)?);
        let max = seconds("pressure.max_seconds", self.pressure.max_seconds)?;
        let phase_delay = seconds(
            "sequencer.phase_delay_seconds",
            self.sequencer.phase_delay_seconds,
        )?;
        let arm_delay = seconds(
            "sequencer.arm_delay_seconds",
            self.sequencer.arm_delay_seconds,
        )?;
        let pressure = PressureConfig::new(max);
        let sequencer = SequencerConfig::new(phase_delay, arm_delay);

        Ok(SessionConfig::new(world, pressure, sequencer).with_level_advance(self.advance_levels))
    }
}

fn seconds(field: &str, value: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(value)
        .with_context(|| format!("{field} must be a finite, non-negative number of seconds"))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::parse("").expect("empty settings parse");
        assert_eq!(settings, Settings::default());
        let config = settings.session_config().expect("defaults convert");
        assert_eq!(config.pressure().max(), DEFAULT_MAX_PRESSURE);
        assert_eq!(config.sequencer().phase_delay(), DEFAULT_PHASE_DELAY);
        assert_eq!(config.world().roll_speed(), RollSpeed::DEFAULT);
        assert!(config.advances_levels());
    }

    #[test]
    fn sections_override_their_fields() {
        let settings = Settings::parse(concat!(
            "version = 1\n",
            "advance_levels = false\n",
            "[world]\n",
            "roll_speed = 360\n",
            "completion = \"timed\"\n",
            "[pressure]\n",
            "max_seconds = 2.5\n",
        ))
        .expect("settings parse");
        let config = settings.session_config().expect("settings convert");
        assert_eq!(config.world().roll_speed().degrees_per_second(), 360);
        assert_eq!(config.world().completion_mode(), CompletionMode::Timed);
        assert_eq!(config.world().rise_duration(), Duration::from_secs(1));
        assert_eq!(config.pressure().max(), Duration::from_millis(2_500));
        assert!(!config.advances_levels());
    }

    #[test]
    fn external_completion_is_rejected_for_headless_runs() {
        let settings =
            Settings::parse("[world]\ncompletion = \"external\"\n").expect("settings parse");
        let error = settings
            .session_config()
            .expect_err("headless runs cannot complete external animations");
        assert!(error.to_string().contains("world.completion"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let error = Settings::parse("version = 2\n").expect_err("version 2 is unknown");
        assert!(error.to_string().contains("unsupported settings version"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Settings::parse("[pressure]\nmaximum = 3.0\n").is_err());
    }

    #[test]
    fn negative_durations_are_rejected() {
        let settings = Settings::parse("[sequencer]\narm_delay_seconds = -1.0\n")
            .expect("settings parse");
        let error = settings
            .session_config()
            .expect_err("negative delay is invalid");
        assert!(error.to_string().contains("sequencer.arm_delay_seconds"));
    }

    #[test]
    fn load_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[pressure]\nmax_seconds = 3.0\n")
            .expect("write settings");
        let settings = Settings::load(file.path()).expect("settings load");
        let config = settings.session_config().expect("settings convert");
        assert_eq!(config.pressure().max(), Duration::from_secs(3));

        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.toml");
        let error = Settings::load(&missing).expect_err("file is missing");
        assert!(error.to_string().contains("missing.toml"));
    }
}
