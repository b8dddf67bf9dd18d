#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Cube Roll engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems and presentation layers to react to. Systems consume event
//! streams, query immutable [`CubeView`] snapshots, and respond exclusively
//! with new command batches.

mod channel;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use channel::{EventChannel, SubscriptionId};

/// Angular sweep performed by a cube during a single roll, in degrees.
pub const ROLL_SWEEP_DEGREES: u32 = 90;

/// Duration of the rise and melt animations expected from the visual layer.
pub const UNIT_ANIMATION: Duration = Duration::from_secs(1);

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Lays out the ground layer of the current level part.
    SpawnGround {
        /// Number of ground columns along the x axis.
        width: u32,
        /// Number of ground rows along the z axis.
        depth: u32,
    },
    /// Replaces the playing layer with freshly spawned cubes.
    SpawnPlayingCubes {
        /// Cubes to create, one per authored cell.
        cubes: Vec<CubeSpawn>,
    },
    /// Starts the rise animation of every playing cube still sunk in the ground.
    RiseCubes,
    /// Announces that the pressure countdown may start running.
    ArmPressure,
    /// Asks for every playing cube to roll one row forward.
    RequestRoll {
        /// Origin of the request.
        trigger: RollTrigger,
    },
    /// Opens a staged roll sequence.
    BeginRollSequence,
    /// Starts rolling every listed cube one cell in the provided direction.
    RollRow {
        /// Cubes sharing a row, in deterministic order.
        cubes: Vec<CubeId>,
        /// Direction applied to every cube of the row.
        direction: Direction,
    },
    /// Closes the active roll sequence.
    FinishRollSequence,
    /// Selects the ground cube at the provided cell, or unselects it if it was selected.
    ToggleSelection {
        /// Ground cell under the player.
        cell: GridPos,
    },
    /// Blows the currently selected ground cube.
    BlowSelection,
    /// Clears the current selection and restores the cube's identity type.
    ClearSelection,
    /// Blows the neighbourhood of every green ground cube.
    TriggerGreenReaction,
    /// Permanently changes the identity of a cube.
    ChangeCubeType {
        /// Cube whose identity changes.
        cube: CubeId,
        /// New identity type.
        kind: CubeType,
    },
    /// Melts a playing cube onto the ground cube below it.
    MeltCube {
        /// Playing cube that melts away.
        cube: CubeId,
        /// Ground cube receiving the melted type.
        onto: CubeId,
    },
    /// Reports that the visual layer finished playing an animation.
    CompleteAnimation {
        /// Identifier of the animation task that completed.
        task: TaskId,
    },
    /// Publishes a rejection detected by a system.
    ReportRejection {
        /// Reason the operation was refused.
        reason: InvalidOperation,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that the ground layer is in place.
    GroundSpawned {
        /// Number of ground columns.
        width: u32,
        /// Number of ground rows.
        depth: u32,
        /// Whether the previous ground matched the footprint and was kept.
        reused: bool,
    },
    /// Confirms that a cube entity was created.
    CubeSpawned {
        /// Identifier allocated to the cube.
        cube: CubeId,
        /// Layer the cube belongs to.
        layer: Layer,
        /// Grid cell the cube occupies.
        cell: GridPos,
        /// Identity type of the cube.
        kind: CubeType,
    },
    /// Asks the visual layer to play the fire-and-forget appear effect.
    AppearRequested {
        /// Cube that appeared.
        cube: CubeId,
    },
    /// Confirms that every playing cube of a level part was created.
    PlayingCubesSpawned {
        /// Number of cubes spawned.
        count: usize,
    },
    /// Reports that every cube of a rise batch finished rising.
    RiseCompleted {
        /// Number of cubes that rose.
        count: usize,
    },
    /// Announces that the pressure countdown is armed.
    PressureArmed,
    /// Announces that the pressure countdown expired.
    PressureTimedOut,
    /// Relays a roll request to the roll orchestrator.
    RollRequested {
        /// Origin of the request.
        trigger: RollTrigger,
    },
    /// Announces that a roll sequence started.
    RollStarted,
    /// Announces that a roll sequence finished.
    RollFinished,
    /// Confirms that a cube left its cell and reserved its destination.
    CubeRollStarted {
        /// Cube that started rolling.
        cube: CubeId,
        /// Cell the cube left.
        from: GridPos,
        /// Cell the cube reserved.
        to: GridPos,
    },
    /// Confirms that a cube completed its roll.
    CubeRollFinished {
        /// Cube that finished rolling.
        cube: CubeId,
        /// Cell the cube left.
        from: GridPos,
        /// Cell the cube now occupies.
        to: GridPos,
    },
    /// Reports a new grid position for a cube.
    CubePositionChanged {
        /// Cube that moved.
        cube: CubeId,
        /// Cell the cube now occupies.
        cell: GridPos,
    },
    /// Reports a new visual type for a cube.
    CubeTypeChanged {
        /// Cube whose type changed.
        cube: CubeId,
        /// Type to display.
        kind: CubeType,
    },
    /// Confirms that a cube entity was destroyed.
    CubeDestroyed {
        /// Cube that no longer exists.
        cube: CubeId,
        /// Last cell the cube occupied.
        cell: GridPos,
    },
    /// Reports that a cube rolled past the edge of the ground.
    CubeDroppedOff {
        /// Cube that fell.
        cube: CubeId,
        /// Cell beyond the ground the cube rolled into.
        cell: GridPos,
    },
    /// Reports the ground cube currently selected by the player.
    SelectionChanged {
        /// Selected ground cube, if any.
        selected: Option<CubeId>,
    },
    /// Relays a blow of the selected ground cube to the reaction engine.
    BlowRequested {
        /// Ground cube to blow from.
        ground: CubeId,
    },
    /// Relays a green chain reaction request to the reaction engine.
    GreenReactionRequested,
    /// Confirms that a playing cube started melting onto a ground cube.
    MeltStarted {
        /// Playing cube that melts.
        cube: CubeId,
        /// Ground cube receiving the type.
        onto: CubeId,
    },
    /// Asks the visual layer to play an animation and report its completion.
    AnimationRequested {
        /// Identifier the completion must reference.
        task: TaskId,
        /// Cube being animated.
        cube: CubeId,
        /// Animation to play.
        animation: Animation,
        /// Exact duration the visual transition must take.
        duration: Duration,
    },
    /// Confirms that an animation task completed.
    AnimationCompleted {
        /// Identifier of the completed task.
        task: TaskId,
        /// Cube that was animated.
        cube: CubeId,
    },
    /// Announces that the playing layer was cleared by the last roll.
    LevelPartFinished,
    /// Reports that an operation was refused without changing state.
    OperationRejected {
        /// Reason the operation was refused.
        reason: InvalidOperation,
    },
}

/// Visual and identity types a cube can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeType {
    /// Neutral cube.
    Gray,
    /// Cube that triggers a 3×3 chain reaction when blown from the ground.
    Green,
    /// Heavy cube.
    Black,
    /// Transient highlight of a selected ground cube.
    Selected,
}

impl CubeType {
    /// Reports whether the type may be the persistent identity of a cube.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        !matches!(self, Self::Selected)
    }
}

/// Layer a cube entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Static floor cubes, one per footprint cell.
    Ground,
    /// Dynamic cubes resting above the ground.
    Playing,
}

/// Cardinal directions on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward increasing z.
    North,
    /// Movement toward increasing x.
    East,
    /// Movement toward decreasing z.
    South,
    /// Movement toward decreasing x.
    West,
}

impl Direction {
    /// Direction every roll sequence advances the playing layer in.
    pub const FORWARD: Self = Self::North;

    /// Unit offset applied to a grid position as `(dx, dz)`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }
}

/// Location of a single grid cell on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    x: i32,
    z: i32,
}

impl GridPos {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Column index of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row index of the cell.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the neighbouring cell in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
    }

    /// Iterates over the inclusive 3×3 block centred on the cell, row by row.
    pub fn neighborhood(self) -> impl Iterator<Item = GridPos> {
        (-1..=1).flat_map(move |dz| {
            (-1..=1).map(move |dx| {
                GridPos::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
            })
        })
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Unique identifier assigned to a cube entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CubeId(u32);

impl CubeId {
    /// Creates a new cube identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CubeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier assigned to an in-flight animation task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates a new task identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Angular speed of a rolling cube expressed in degrees per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RollSpeed(u32);

impl RollSpeed {
    /// Speed used when nothing else is configured.
    pub const DEFAULT: Self = Self(180);

    /// Creates a roll speed; zero is raised to one degree per second.
    #[must_use]
    pub const fn from_degrees_per_second(degrees: u32) -> Self {
        if degrees == 0 {
            Self(1)
        } else {
            Self(degrees)
        }
    }

    /// Angular rate in degrees per second.
    #[must_use]
    pub const fn degrees_per_second(&self) -> u32 {
        self.0
    }

    /// Time needed to sweep a full roll at this speed.
    ///
    /// Computed in whole nanoseconds so that fractions of it stay exact.
    #[must_use]
    pub const fn roll_duration(self) -> Duration {
        let sweep_nanos = ROLL_SWEEP_DEGREES as u64 * 1_000_000_000;
        Duration::from_nanos(sweep_nanos / self.0 as u64)
    }
}

impl Default for RollSpeed {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Animations the visual layer plays on behalf of the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Animation {
    /// Quarter turn over the leading bottom edge.
    Roll {
        /// Direction of the roll.
        direction: Direction,
    },
    /// Linear lift from the ground to the playing layer.
    Rise,
    /// Linear slide of a playing cube into its ground cube.
    Melt {
        /// Ground cube receiving the melted cube.
        onto: CubeId,
    },
}

/// Origin of a roll request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RollTrigger {
    /// The pressure countdown expired.
    Pressure,
    /// The player asked for a roll.
    Manual,
}

/// Cube creation request derived from a level definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CubeSpawn {
    /// Cell the cube occupies.
    pub cell: GridPos,
    /// Identity type of the cube.
    pub kind: CubeType,
}

impl CubeSpawn {
    /// Creates a new spawn request.
    #[must_use]
    pub const fn new(cell: GridPos, kind: CubeType) -> Self {
        Self { cell, kind }
    }
}

/// Reasons an operation is refused. Every rejection leaves state untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum InvalidOperation {
    /// The cube already has a roll in flight.
    #[error("cube {cube} is already rolling")]
    AlreadyRolling {
        /// Cube that was asked to roll.
        cube: CubeId,
    },
    /// The destination cell is occupied or reserved by another cube.
    #[error("cube {cube} cannot roll into {target}: the cell is occupied or reserved")]
    DestinationBlocked {
        /// Cube that was asked to roll.
        cube: CubeId,
        /// Cell the cube would have reserved.
        target: GridPos,
    },
    /// A roll sequence is active or cubes from the previous one are still rolling.
    #[error("a roll sequence is still in progress")]
    RollInProgress,
    /// A blow was requested without a selected ground cube.
    #[error("no ground cube is selected")]
    NothingSelected,
    /// Only ground cubes at rest can be blown from.
    #[error("cube {cube} is not a ground cube at rest")]
    NotGroundCube {
        /// Cube that was blown from.
        cube: CubeId,
    },
    /// Only playing cubes roll or melt.
    #[error("cube {cube} is not a playing cube")]
    NotPlayingCube {
        /// Cube that was asked to roll or melt.
        cube: CubeId,
    },
    /// No ground cube exists at the cell.
    #[error("no ground cube at {cell}")]
    NoGroundCube {
        /// Cell that was looked up.
        cell: GridPos,
    },
    /// There is no cube resting above the blown ground cell.
    #[error("no cube rests above {cell}")]
    NoCubeAbove {
        /// Ground cell that was blown from.
        cell: GridPos,
    },
    /// The cube is already melting into the ground.
    #[error("cube {cube} is already melting")]
    AlreadyMelting {
        /// Cube that was asked to melt or roll.
        cube: CubeId,
    },
    /// No cube with the identifier exists.
    #[error("cube {cube} does not exist")]
    UnknownCube {
        /// Identifier that did not resolve.
        cube: CubeId,
    },
    /// `Selected` is a transient highlight and never an identity.
    #[error("cube {cube} cannot take `Selected` as its identity")]
    SelectedIsNotAnIdentity {
        /// Cube whose identity change was refused.
        cube: CubeId,
    },
}

/// Immutable representation of a single cube's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeSnapshot {
    /// Unique identifier assigned to the cube.
    pub id: CubeId,
    /// Layer the cube belongs to.
    pub layer: Layer,
    /// Grid cell the cube occupies, or left when rolling.
    pub cell: GridPos,
    /// Cell reserved by the cube while it rolls.
    pub target: Option<GridPos>,
    /// Persistent identity type.
    pub classic_type: CubeType,
    /// Type currently displayed.
    pub actual_type: CubeType,
    /// Elevation above the ground plane.
    pub height: f32,
    /// Indicates whether the cube is melting into the ground.
    pub melting: bool,
    /// Time the cube needs to complete a roll.
    pub roll_duration: Duration,
}

impl CubeSnapshot {
    /// Reports whether the cube has a roll in flight.
    #[must_use]
    pub const fn is_rolling(&self) -> bool {
        self.target.is_some()
    }

    /// Reports whether the cube can be blown as the cube above a ground cell.
    #[must_use]
    pub fn rests_above_ground(&self) -> bool {
        self.layer == Layer::Playing && !self.is_rolling() && !self.melting && self.height > 0.0
    }

    /// Reports whether the cube is a ground cube a player may blow from.
    #[must_use]
    pub fn is_ground_at_rest(&self) -> bool {
        self.layer == Layer::Ground && self.height <= 0.0
    }
}

/// Read-only snapshot describing every cube of the level.
#[derive(Clone, Debug, Default)]
pub struct CubeView {
    snapshots: Vec<CubeSnapshot>,
}

impl CubeView {
    /// Creates a new cube view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CubeSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &CubeSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<CubeSnapshot> {
        self.snapshots
    }

    /// Looks up a cube by identifier.
    #[must_use]
    pub fn cube(&self, id: CubeId) -> Option<&CubeSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Iterator over the ground layer.
    pub fn ground(&self) -> impl Iterator<Item = &CubeSnapshot> {
        self.snapshots
            .iter()
            .filter(|snapshot| snapshot.layer == Layer::Ground)
    }

    /// Iterator over the playing layer, including rolling and melting cubes.
    pub fn playing(&self) -> impl Iterator<Item = &CubeSnapshot> {
        self.snapshots
            .iter()
            .filter(|snapshot| snapshot.layer == Layer::Playing)
    }

    /// Returns the ground cube at the provided cell, if any.
    #[must_use]
    pub fn ground_at(&self, cell: GridPos) -> Option<&CubeSnapshot> {
        self.ground().find(|snapshot| snapshot.cell == cell)
    }

    /// Returns the playing cube resting directly above the provided ground cell.
    #[must_use]
    pub fn above(&self, cell: GridPos) -> Option<&CubeSnapshot> {
        self.playing()
            .find(|snapshot| snapshot.cell == cell && snapshot.rests_above_ground())
    }

    /// Reports whether any playing cube has a roll in flight.
    #[must_use]
    pub fn any_rolling(&self) -> bool {
        self.playing().any(CubeSnapshot::is_rolling)
    }

    /// Number of cubes captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no cubes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
