#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that inspects cube-roll levels and plays them headless.

mod settings;

use std::{cell::RefCell, path::PathBuf, rc::Rc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cube_roll_core::Event;
use cube_roll_headless::{Session, SessionConfig};
use cube_roll_level::{load, DirectorySource, LevelDefinition};
use cube_roll_system_sequencer::SequencerState;
use cube_roll_world::query;
use settings::Settings;
use tracing_subscriber::EnvFilter;

/// Cube-roll puzzle runner.
#[derive(Parser)]
#[command(name = "cube-roll")]
#[command(about = "Inspect and simulate cube-roll levels", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a parsed level part
    Inspect(InspectArgs),

    /// Play a level headless and log its events
    Run(RunArgs),
}

#[derive(Args)]
struct InspectArgs {
    /// Directory holding `<level>.txt` files
    #[arg(long, default_value = "levels")]
    levels: PathBuf,

    /// Level name, e.g. `Level_01`
    #[arg(long, default_value = "Level_01")]
    level: String,

    /// Part index inside the level file
    #[arg(long, default_value_t = 1)]
    part: u32,

    /// Emit the parsed part as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding `<level>.txt` files
    #[arg(long, default_value = "levels")]
    levels: PathBuf,

    /// Level to start, e.g. `Level_01`
    #[arg(long, default_value = "Level_01")]
    level: String,

    /// Optional TOML settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Simulated milliseconds per frame
    #[arg(long, default_value_t = 16)]
    dt_ms: u64,

    /// Simulated seconds to run before stopping
    #[arg(long, default_value_t = 30)]
    seconds: u64,

    /// Trigger a green chain reaction every N frames
    #[arg(long)]
    green_reaction_every: Option<u64>,
}

/// Counters gathered from the event stream while a session runs.
#[derive(Debug, Default)]
struct Tally {
    rolls: u32,
    melts: u32,
    dropped: u32,
    parts_cleared: u32,
    rejections: u32,
}

impl Tally {
    fn record(&mut self, event: &Event) {
        match event {
            Event::RollStarted => self.rolls += 1,
            Event::MeltStarted { .. } => self.melts += 1,
            Event::CubeDroppedOff { .. } => self.dropped += 1,
            Event::LevelPartFinished => self.parts_cleared += 1,
            Event::OperationRejected { .. } => self.rejections += 1,
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect(args) => args.execute(),
        Command::Run(args) => args.execute(),
    }
}

impl InspectArgs {
    fn execute(self) -> Result<()> {
        let source = DirectorySource::new(&self.levels);
        let definition = load(&source, &self.level, self.part).with_context(|| {
            format!(
                "failed to load {} part {} from {}",
                self.level,
                self.part,
                self.levels.display()
            )
        })?;

        if self.json {
            let json = serde_json::to_string_pretty(&definition)
                .context("failed to serialize level part")?;
            println!("{json}");
        } else {
            print_part(&self.level, &definition);
        }
        Ok(())
    }
}

fn print_part(level: &str, definition: &LevelDefinition) {
    println!(
        "{level} part {}: {}x{} cells, {} playfield rows, ground {}x{}",
        definition.part_index(),
        definition.width(),
        definition.depth(),
        definition.playfield_depth(),
        definition.width(),
        definition.ground_depth()
    );
    for row in definition.to_glyph_rows() {
        println!("  {row}");
    }
}

impl RunArgs {
    fn execute(self) -> Result<()> {
        if self.dt_ms == 0 {
            bail!("--dt-ms must be positive");
        }
        let config = match &self.settings {
            Some(path) => Settings::load(path)?.session_config()?,
            None => Settings::default().session_config()?,
        };

        let mut session = Session::new(DirectorySource::new(&self.levels), config);
        let tally = Rc::new(RefCell::new(Tally::default()));
        let sink = Rc::clone(&tally);
        let _ = session.subscribe(move |event| {
            sink.borrow_mut().record(event);
            log_event(event);
        });

        start(&mut session, &self.level, config).with_context(|| {
            format!("failed to start {} from {}", self.level, self.levels.display())
        })?;

        let dt = Duration::from_millis(self.dt_ms);
        let frames = self.seconds.saturating_mul(1_000) / self.dt_ms;
        for frame in 1..=frames {
            session.step(dt);
            if let Some(every) = self.green_reaction_every.filter(|every| *every > 0) {
                if frame % every == 0 {
                    session.trigger_green_reaction();
                }
            }
            if matches!(
                session.sequencer_state(),
                SequencerState::Complete | SequencerState::Halted
            ) {
                tracing::info!(frame, state = ?session.sequencer_state(), "session stopped");
                break;
            }
        }

        let tally = tally.borrow();
        println!(
            "after {:.2}s: state {:?}, part {}, {} playing cubes, pressure {:.2}",
            session.elapsed().as_secs_f32(),
            session.sequencer_state(),
            session.part(),
            query::playing_count(session.world()),
            session.pressure_value()
        );
        println!(
            "rolls {}, melts {}, dropped {}, parts cleared {}, rejections {}",
            tally.rolls, tally.melts, tally.dropped, tally.parts_cleared, tally.rejections
        );
        Ok(())
    }
}

/// Starts by number when the name follows the `Level_NN` convention, so the
/// session can advance to the next level.
fn start(
    session: &mut Session<DirectorySource>,
    level: &str,
    config: SessionConfig,
) -> Result<()> {
    let number = level
        .strip_prefix("Level_")
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|_| config.advances_levels());
    match number {
        Some(number) => session.start_level_number(number)?,
        None => session.start_level(level)?,
    }
    Ok(())
}

fn log_event(event: &Event) {
    match event {
        Event::TimeAdvanced { .. } | Event::AnimationRequested { .. } => {}
        Event::RollStarted
        | Event::RollFinished
        | Event::PressureArmed
        | Event::PressureTimedOut
        | Event::LevelPartFinished
        | Event::RiseCompleted { .. }
        | Event::GroundSpawned { .. }
        | Event::PlayingCubesSpawned { .. }
        | Event::CubeDroppedOff { .. } => tracing::info!(?event),
        Event::OperationRejected { reason } => tracing::debug!(%reason, "operation rejected"),
        _ => tracing::debug!(?event),
    }
}
