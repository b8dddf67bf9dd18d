#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Cube Roll.
//!
//! The world owns every cube entity, the ground and playing grid indices, the
//! current selection and the animation tasks the visual layer is expected to
//! play. It is mutated exclusively through [`apply`].

mod animation;
mod cube;
mod grid_index;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use cube_roll_core::{
    Animation, Command, CubeId, CubeSpawn, CubeType, Direction, Event, GridPos, InvalidOperation,
    Layer, RollSpeed, RollTrigger, TaskId, UNIT_ANIMATION,
};
use glam::Vec3;

use animation::{AnimationDriver, CompletionBatch};

pub use animation::CompletionMode;
pub use cube::{ground_position, CubeEntity};
pub use grid_index::GridIndex;

/// Tunables applied by the world when it creates cubes and animation tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    roll_speed: RollSpeed,
    rise_duration: Duration,
    melt_duration: Duration,
    completion_mode: CompletionMode,
}

impl WorldConfig {
    /// Creates a configuration with one-second rise and melt animations.
    #[must_use]
    pub const fn new(roll_speed: RollSpeed, completion_mode: CompletionMode) -> Self {
        Self {
            roll_speed,
            rise_duration: UNIT_ANIMATION,
            melt_duration: UNIT_ANIMATION,
            completion_mode,
        }
    }

    /// Overrides the duration of the rise animation.
    #[must_use]
    pub const fn with_rise_duration(mut self, duration: Duration) -> Self {
        self.rise_duration = duration;
        self
    }

    /// Overrides the duration of the melt animation.
    #[must_use]
    pub const fn with_melt_duration(mut self, duration: Duration) -> Self {
        self.melt_duration = duration;
        self
    }

    /// Roll speed given to every spawned cube.
    #[must_use]
    pub const fn roll_speed(&self) -> RollSpeed {
        self.roll_speed
    }

    /// Duration of the rise animation.
    #[must_use]
    pub const fn rise_duration(&self) -> Duration {
        self.rise_duration
    }

    /// Duration of the melt animation.
    #[must_use]
    pub const fn melt_duration(&self) -> Duration {
        self.melt_duration
    }

    /// Source of animation completions.
    #[must_use]
    pub const fn completion_mode(&self) -> CompletionMode {
        self.completion_mode
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new(RollSpeed::DEFAULT, CompletionMode::Timed)
    }
}

/// Represents the authoritative Cube Roll world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    cubes: BTreeMap<CubeId, CubeEntity>,
    ground: GridIndex,
    playing: GridIndex,
    footprint: Option<(u32, u32)>,
    animations: AnimationDriver,
    rise_batch: Option<CompletionBatch>,
    selected: Option<CubeId>,
    roll_sequence_active: bool,
    next_cube_id: u32,
    tick_index: u64,
}

impl World {
    /// Creates an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world with the provided configuration.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            cubes: BTreeMap::new(),
            ground: GridIndex::new(),
            playing: GridIndex::new(),
            footprint: None,
            animations: AnimationDriver::new(config.completion_mode()),
            rise_batch: None,
            selected: None,
            roll_sequence_active: false,
            next_cube_id: 0,
            tick_index: 0,
        }
    }

    fn index_mut(&mut self, layer: Layer) -> &mut GridIndex {
        match layer {
            Layer::Ground => &mut self.ground,
            Layer::Playing => &mut self.playing,
        }
    }

    fn playing_count(&self) -> usize {
        self.cubes
            .values()
            .filter(|cube| cube.layer() == Layer::Playing)
            .count()
    }

    fn spawn_cube(
        &mut self,
        layer: Layer,
        cell: GridPos,
        kind: CubeType,
        out_events: &mut Vec<Event>,
    ) -> CubeId {
        let id = CubeId::new(self.next_cube_id);
        self.next_cube_id = self.next_cube_id.wrapping_add(1);
        let entity = CubeEntity::new(id, layer, cell, kind, self.config.roll_speed());
        let _ = self.index_mut(layer).register(&entity);
        out_events.push(Event::CubeSpawned {
            cube: id,
            layer,
            cell,
            kind: entity.classic_type(),
        });
        let _ = self.cubes.insert(id, entity);
        id
    }

    fn destroy_cube(&mut self, id: CubeId, out_events: &mut Vec<Event>) {
        let Some(entity) = self.cubes.remove(&id) else {
            return;
        };
        let index = self.index_mut(entity.layer());
        let _ = index.unregister(&entity);
        let _ = index.release(&entity);
        let _ = self.animations.cancel_for(id);
        if self.selected == Some(id) {
            self.selected = None;
            out_events.push(Event::SelectionChanged { selected: None });
        }
        out_events.push(Event::CubeDestroyed {
            cube: id,
            cell: entity.grid_pos(),
        });
        self.forget_rising(id, out_events);
    }

    fn spawn_ground(&mut self, width: u32, depth: u32, out_events: &mut Vec<Event>) {
        if self.footprint == Some((width, depth)) && !self.ground.is_empty() {
            tracing::debug!(width, depth, "reusing ground layer");
            out_events.push(Event::GroundSpawned {
                width,
                depth,
                reused: true,
            });
            return;
        }

        let stale: Vec<CubeId> = self.ground.iter().map(|(_, cube)| cube).collect();
        for cube in stale {
            self.destroy_cube(cube, out_events);
        }

        for z in 0..depth {
            for x in 0..width {
                let cube =
                    self.spawn_cube(Layer::Ground, cell_at(x, z), CubeType::Gray, out_events);
                out_events.push(Event::AppearRequested { cube });
            }
        }
        self.footprint = Some((width, depth));
        tracing::info!(width, depth, "ground layer spawned");
        out_events.push(Event::GroundSpawned {
            width,
            depth,
            reused: false,
        });
    }

    fn spawn_playing(&mut self, cubes: Vec<CubeSpawn>, out_events: &mut Vec<Event>) {
        self.rise_batch = None;
        let leftovers: Vec<CubeId> = self
            .cubes
            .values()
            .filter(|cube| cube.layer() == Layer::Playing)
            .map(CubeEntity::id)
            .collect();
        if !leftovers.is_empty() {
            tracing::info!(count = leftovers.len(), "destroying leftover playing cubes");
        }
        for cube in leftovers {
            self.destroy_cube(cube, out_events);
        }

        let count = cubes.len();
        for spawn in cubes {
            let _ = self.spawn_cube(Layer::Playing, spawn.cell, spawn.kind, out_events);
        }
        out_events.push(Event::PlayingCubesSpawned { count });
    }

    fn rise(&mut self, out_events: &mut Vec<Event>) {
        if self.rise_batch.is_some() {
            tracing::debug!("rise already in progress");
            return;
        }

        let sunk: Vec<(CubeId, Vec3)> = self
            .cubes
            .values()
            .filter(|cube| {
                cube.layer() == Layer::Playing
                    && cube.height() <= 0.0
                    && !self.animations.is_animating(cube.id())
            })
            .map(|cube| (cube.id(), cube.position()))
            .collect();

        let duration = self.config.rise_duration();
        self.rise_batch = Some(CompletionBatch::new(
            sunk.iter().map(|(cube, _)| *cube).collect::<BTreeSet<_>>(),
        ));
        for (cube, start) in sunk {
            let task = self
                .animations
                .start(cube, Animation::Rise, duration, start, start + Vec3::Y);
            out_events.push(Event::AnimationRequested {
                task,
                cube,
                animation: Animation::Rise,
                duration,
            });
        }
        self.settle_rise_batch(out_events);
    }

    fn forget_rising(&mut self, cube: CubeId, out_events: &mut Vec<Event>) {
        if let Some(batch) = self.rise_batch.as_mut() {
            batch.forget(cube);
        }
        self.settle_rise_batch(out_events);
    }

    fn settle_rise_batch(&mut self, out_events: &mut Vec<Event>) {
        if !matches!(&self.rise_batch, Some(batch) if batch.is_complete()) {
            return;
        }
        if let Some(batch) = self.rise_batch.take() {
            tracing::info!(count = batch.finished(), "rise completed");
            out_events.push(Event::RiseCompleted {
                count: batch.finished(),
            });
        }
    }

    fn begin_roll_sequence(&mut self) -> Result<(), InvalidOperation> {
        if self.roll_sequence_active || self.cubes.values().any(CubeEntity::is_rolling) {
            return Err(InvalidOperation::RollInProgress);
        }
        self.roll_sequence_active = true;
        Ok(())
    }

    fn roll_cube(
        &mut self,
        id: CubeId,
        direction: Direction,
        out_events: &mut Vec<Event>,
    ) -> Result<(), InvalidOperation> {
        let entity = self
            .cubes
            .get_mut(&id)
            .ok_or(InvalidOperation::UnknownCube { cube: id })?;
        if entity.layer() != Layer::Playing {
            return Err(InvalidOperation::NotPlayingCube { cube: id });
        }
        if entity.is_melting() {
            return Err(InvalidOperation::AlreadyMelting { cube: id });
        }
        if entity.is_rolling() {
            return Err(InvalidOperation::AlreadyRolling { cube: id });
        }
        let from = entity.grid_pos();
        let target = from.step(direction);
        if self.playing.is_blocked(target) {
            return Err(InvalidOperation::DestinationBlocked { cube: id, target });
        }

        let _ = self.playing.unregister(entity);
        let to = entity.begin_roll(direction)?;
        let _ = self.playing.reserve(entity);
        let duration = entity.roll_duration();
        let position = entity.position();
        let animation = Animation::Roll { direction };
        let task = self
            .animations
            .start(id, animation, duration, position, position);

        out_events.push(Event::CubeRollStarted { cube: id, from, to });
        out_events.push(Event::AnimationRequested {
            task,
            cube: id,
            animation,
            duration,
        });
        Ok(())
    }

    fn finish_roll_sequence(&mut self, out_events: &mut Vec<Event>) {
        if !self.roll_sequence_active {
            tracing::debug!("no roll sequence to finish");
            return;
        }
        self.roll_sequence_active = false;
        out_events.push(Event::RollFinished);
        if self.playing_count() == 0 {
            tracing::info!("playing layer cleared");
            out_events.push(Event::LevelPartFinished);
        }
    }

    fn restyle(
        &mut self,
        id: CubeId,
        change: fn(&mut CubeEntity) -> bool,
        out_events: &mut Vec<Event>,
    ) {
        if let Some(entity) = self.cubes.get_mut(&id) {
            if change(entity) {
                out_events.push(Event::CubeTypeChanged {
                    cube: id,
                    kind: entity.actual_type(),
                });
            }
        }
    }

    fn toggle_selection(
        &mut self,
        cell: GridPos,
        out_events: &mut Vec<Event>,
    ) -> Result<(), InvalidOperation> {
        let ground = self
            .ground
            .occupant(cell)
            .ok_or(InvalidOperation::NoGroundCube { cell })?;

        if self.selected == Some(ground) {
            self.selected = None;
            self.restyle(ground, CubeEntity::unselect, out_events);
        } else {
            if let Some(previous) = self.selected.take() {
                self.restyle(previous, CubeEntity::unselect, out_events);
            }
            self.selected = Some(ground);
            self.restyle(ground, CubeEntity::select, out_events);
        }
        out_events.push(Event::SelectionChanged {
            selected: self.selected,
        });
        Ok(())
    }

    fn change_cube_type(
        &mut self,
        id: CubeId,
        kind: CubeType,
        out_events: &mut Vec<Event>,
    ) -> Result<(), InvalidOperation> {
        let entity = self
            .cubes
            .get_mut(&id)
            .ok_or(InvalidOperation::UnknownCube { cube: id })?;
        if entity.change_type(kind)? {
            out_events.push(Event::CubeTypeChanged { cube: id, kind });
        }
        Ok(())
    }

    fn melt_cube(
        &mut self,
        id: CubeId,
        onto: CubeId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), InvalidOperation> {
        let ground = self
            .cubes
            .get(&onto)
            .ok_or(InvalidOperation::UnknownCube { cube: onto })?;
        if ground.layer() != Layer::Ground {
            return Err(InvalidOperation::NotGroundCube { cube: onto });
        }
        let end = ground_position(ground.grid_pos());

        let entity = self
            .cubes
            .get_mut(&id)
            .ok_or(InvalidOperation::UnknownCube { cube: id })?;
        if entity.layer() != Layer::Playing {
            return Err(InvalidOperation::NotPlayingCube { cube: id });
        }
        if entity.height() <= 0.0 {
            return Err(InvalidOperation::NoCubeAbove {
                cell: entity.grid_pos(),
            });
        }
        entity.begin_melt()?;
        let start = entity.position();

        // A cube still rising melts from wherever it got to.
        if self.animations.cancel_for(id) > 0 {
            self.forget_rising(id, out_events);
        }

        let duration = self.config.melt_duration();
        let animation = Animation::Melt { onto };
        let task = self.animations.start(id, animation, duration, start, end);
        out_events.push(Event::MeltStarted { cube: id, onto });
        out_events.push(Event::AnimationRequested {
            task,
            cube: id,
            animation,
            duration,
        });
        Ok(())
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let progress = self.animations.advance(dt);
        for step in &progress {
            if matches!(step.animation, Animation::Roll { .. }) {
                continue;
            }
            if let Some(entity) = self.cubes.get_mut(&step.cube) {
                entity.set_height(step.position.y);
            }
        }

        if self.animations.mode() == CompletionMode::Timed {
            for step in progress.into_iter().filter(|step| step.due) {
                self.complete_task(step.task, out_events);
            }
        }
    }

    fn complete_task(&mut self, task: TaskId, out_events: &mut Vec<Event>) {
        let Some(state) = self.animations.take(task) else {
            tracing::debug!(task = task.get(), "ignoring completion of unknown animation task");
            return;
        };
        if !matches!(state.animation, Animation::Roll { .. }) {
            if let Some(entity) = self.cubes.get_mut(&state.cube) {
                entity.set_height(state.end.y);
            }
        }
        out_events.push(Event::AnimationCompleted {
            task,
            cube: state.cube,
        });

        match state.animation {
            Animation::Roll { .. } => self.finish_roll(state.cube, out_events),
            Animation::Rise => self.finish_rise(state.cube, out_events),
            Animation::Melt { onto } => self.finish_melt(state.cube, onto, out_events),
        }
    }

    fn finish_roll(&mut self, id: CubeId, out_events: &mut Vec<Event>) {
        let Some(entity) = self.cubes.get_mut(&id) else {
            return;
        };
        let _ = self.playing.release(entity);
        let Some((from, to)) = entity.complete_roll() else {
            return;
        };
        let _ = self.playing.register(entity);
        out_events.push(Event::CubePositionChanged { cube: id, cell: to });
        out_events.push(Event::CubeRollFinished { cube: id, from, to });

        if self.ground.occupant(to).is_none() {
            tracing::info!(cube = %id, cell = %to, "cube rolled off the ground");
            out_events.push(Event::CubeDroppedOff { cube: id, cell: to });
            self.destroy_cube(id, out_events);
            // The sequence may have settled before its last row landed.
            if !self.roll_sequence_active && self.playing_count() == 0 {
                tracing::info!("playing layer cleared by drop-off");
                out_events.push(Event::LevelPartFinished);
            }
        }
    }

    fn finish_rise(&mut self, id: CubeId, out_events: &mut Vec<Event>) {
        if let Some(batch) = self.rise_batch.as_mut() {
            let _ = batch.record(id);
        }
        self.settle_rise_batch(out_events);
    }

    fn finish_melt(&mut self, id: CubeId, onto: CubeId, out_events: &mut Vec<Event>) {
        let Some(kind) = self.cubes.get(&id).map(CubeEntity::classic_type) else {
            return;
        };
        self.destroy_cube(id, out_events);
        if let Err(reason) = self.change_cube_type(onto, kind, out_events) {
            reject(reason, out_events);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Refused operations leave the state untouched and are reported through
/// [`Event::OperationRejected`].
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    let outcome = match command {
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
            world.advance(dt, out_events);
            Ok(())
        }
        Command::SpawnGround { width, depth } => {
            world.spawn_ground(width, depth, out_events);
            Ok(())
        }
        Command::SpawnPlayingCubes { cubes } => {
            world.spawn_playing(cubes, out_events);
            Ok(())
        }
        Command::RiseCubes => {
            world.rise(out_events);
            Ok(())
        }
        Command::ArmPressure => {
            out_events.push(Event::PressureArmed);
            Ok(())
        }
        Command::RequestRoll { trigger } => {
            if trigger == RollTrigger::Pressure {
                out_events.push(Event::PressureTimedOut);
            }
            out_events.push(Event::RollRequested { trigger });
            Ok(())
        }
        Command::BeginRollSequence => world.begin_roll_sequence().map(|()| {
            out_events.push(Event::RollStarted);
        }),
        Command::RollRow { cubes, direction } => {
            for cube in cubes {
                if let Err(reason) = world.roll_cube(cube, direction, out_events) {
                    reject(reason, out_events);
                }
            }
            Ok(())
        }
        Command::FinishRollSequence => {
            world.finish_roll_sequence(out_events);
            Ok(())
        }
        Command::ToggleSelection { cell } => world.toggle_selection(cell, out_events),
        Command::BlowSelection => world
            .selected
            .ok_or(InvalidOperation::NothingSelected)
            .map(|ground| out_events.push(Event::BlowRequested { ground })),
        Command::ClearSelection => {
            match world.selected.take() {
                Some(previous) => {
                    world.restyle(previous, CubeEntity::unselect, out_events);
                    out_events.push(Event::SelectionChanged { selected: None });
                }
                None => tracing::debug!("nothing selected to clear"),
            }
            Ok(())
        }
        Command::TriggerGreenReaction => {
            out_events.push(Event::GreenReactionRequested);
            Ok(())
        }
        Command::ChangeCubeType { cube, kind } => world.change_cube_type(cube, kind, out_events),
        Command::MeltCube { cube, onto } => world.melt_cube(cube, onto, out_events),
        Command::CompleteAnimation { task } => {
            world.complete_task(task, out_events);
            Ok(())
        }
        Command::ReportRejection { reason } => Err(reason),
    };

    if let Err(reason) = outcome {
        reject(reason, out_events);
    }
}

fn reject(reason: InvalidOperation, out_events: &mut Vec<Event>) {
    tracing::debug!(%reason, "operation rejected");
    out_events.push(Event::OperationRejected { reason });
}

fn cell_at(x: u32, z: u32) -> GridPos {
    GridPos::new(
        i32::try_from(x).unwrap_or(i32::MAX),
        i32::try_from(z).unwrap_or(i32::MAX),
    )
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use cube_roll_core::{CubeId, CubeSnapshot, CubeView, GridPos};

    use super::{CubeEntity, GridIndex, World, WorldConfig};

    /// Captures a read-only view of every cube.
    #[must_use]
    pub fn cube_view(world: &World) -> CubeView {
        CubeView::from_snapshots(world.cubes.values().map(snapshot).collect())
    }

    /// Captures the snapshot of a single cube.
    #[must_use]
    pub fn snapshot(cube: &CubeEntity) -> CubeSnapshot {
        CubeSnapshot {
            id: cube.id(),
            layer: cube.layer(),
            cell: cube.grid_pos(),
            target: cube.target_grid_pos(),
            classic_type: cube.classic_type(),
            actual_type: cube.actual_type(),
            height: cube.height(),
            melting: cube.is_melting(),
            roll_duration: cube.roll_duration(),
        }
    }

    /// Provides read-only access to a cube entity.
    #[must_use]
    pub fn cube(world: &World, id: CubeId) -> Option<&CubeEntity> {
        world.cubes.get(&id)
    }

    /// Index of the ground layer.
    #[must_use]
    pub fn ground_index(world: &World) -> &GridIndex {
        &world.ground
    }

    /// Index of the playing layer.
    #[must_use]
    pub fn playing_index(world: &World) -> &GridIndex {
        &world.playing
    }

    /// Playing cube resting directly above the ground cell, if any.
    #[must_use]
    pub fn cube_above(world: &World, cell: GridPos) -> Option<CubeId> {
        world
            .playing
            .occupant(cell)
            .and_then(|id| world.cubes.get(&id))
            .filter(|cube| !cube.is_melting() && !cube.is_rolling() && cube.height() > 0.0)
            .map(CubeEntity::id)
    }

    /// Ground cube currently selected by the player.
    #[must_use]
    pub fn selected(world: &World) -> Option<CubeId> {
        world.selected
    }

    /// Width and depth of the spawned ground layer.
    #[must_use]
    pub fn footprint(world: &World) -> Option<(u32, u32)> {
        world.footprint
    }

    /// Reports whether a roll sequence is open.
    #[must_use]
    pub fn is_roll_sequence_active(world: &World) -> bool {
        world.roll_sequence_active
    }

    /// Reports whether a rise batch is still waiting for completions.
    #[must_use]
    pub fn is_rising(world: &World) -> bool {
        world.rise_batch.is_some()
    }

    /// Number of animation tasks awaiting completion.
    #[must_use]
    pub fn pending_animations(world: &World) -> usize {
        world.animations.len()
    }

    /// Number of playing cubes, including rolling and melting ones.
    #[must_use]
    pub fn playing_count(world: &World) -> usize {
        world.playing_count()
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &World) -> WorldConfig {
        world.config
    }
}
