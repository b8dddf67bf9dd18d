use std::time::Duration;

use cube_roll_core::{Command, CubeId, CubeSpawn, CubeType, Event, GridPos};
use cube_roll_system_reaction::ReactionEngine;
use cube_roll_world::{self as world, query, World};

fn pump(world: &mut World, engine: &mut ReactionEngine, command: Command) -> Vec<Event> {
    let mut log = Vec::new();
    let mut commands = vec![command];
    while !commands.is_empty() {
        let mut events = Vec::new();
        for command in commands.drain(..) {
            world::apply(world, command, &mut events);
        }
        let view = query::cube_view(world);
        engine.handle(&events, &view, &mut commands);
        log.extend(events);
    }
    log
}

fn ground_at(world: &World, x: i32, z: i32) -> CubeId {
    query::ground_index(world)
        .occupant(GridPos::new(x, z))
        .expect("ground cube exists")
}

/// Builds a ground of `width × depth` with risen playing cubes on `cells`.
fn level(width: u32, depth: u32, cells: &[(i32, i32, CubeType)]) -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    for command in [
        Command::SpawnGround { width, depth },
        Command::SpawnPlayingCubes {
            cubes: cells
                .iter()
                .map(|(x, z, kind)| CubeSpawn::new(GridPos::new(*x, *z), *kind))
                .collect(),
        },
        Command::RiseCubes,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    ] {
        world::apply(&mut world, command, &mut events);
    }
    world
}

fn paint_ground(world: &mut World, x: i32, z: i32, kind: CubeType) -> CubeId {
    let ground = ground_at(world, x, z);
    let mut events = Vec::new();
    world::apply(world, Command::ChangeCubeType { cube: ground, kind }, &mut events);
    assert_eq!(events, vec![Event::CubeTypeChanged { cube: ground, kind }]);
    ground
}

fn melts(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::MeltStarted { .. }))
        .count()
}

#[test]
fn blowing_black_ground_melts_the_green_cube_above() {
    let mut world = level(1, 1, &[(0, 0, CubeType::Green)]);
    let ground = paint_ground(&mut world, 0, 0, CubeType::Black);
    let mut engine = ReactionEngine::new();

    let _ = pump(
        &mut world,
        &mut engine,
        Command::ToggleSelection {
            cell: GridPos::new(0, 0),
        },
    );
    let blown = pump(&mut world, &mut engine, Command::BlowSelection);
    assert_eq!(melts(&blown), 1);
    assert!(blown.contains(&Event::SelectionChanged { selected: None }));
    assert!(!blown.contains(&Event::CubeTypeChanged {
        cube: ground,
        kind: CubeType::Gray
    }));

    let settled = pump(
        &mut world,
        &mut engine,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    );
    assert!(settled.contains(&Event::CubeTypeChanged {
        cube: ground,
        kind: CubeType::Green
    }));
    let ground_cube = query::cube(&world, ground).expect("ground survives");
    assert_eq!(ground_cube.classic_type(), CubeType::Green);
    assert_eq!(query::playing_count(&world), 0);
    assert_eq!(engine.melts_requested(), 1);
}

#[test]
fn blowing_green_ground_melts_every_neighbour_with_a_cube_above() {
    let above = [(0, 0), (2, 0), (1, 1), (0, 2), (2, 2)];
    let cells: Vec<_> = above
        .iter()
        .map(|(x, z)| (*x, *z, CubeType::Gray))
        .collect();
    let mut world = level(3, 3, &cells);
    let center = paint_ground(&mut world, 1, 1, CubeType::Green);
    let mut engine = ReactionEngine::new();

    let _ = pump(
        &mut world,
        &mut engine,
        Command::ToggleSelection {
            cell: GridPos::new(1, 1),
        },
    );
    let blown = pump(&mut world, &mut engine, Command::BlowSelection);
    assert_eq!(melts(&blown), 5);
    assert!(blown.contains(&Event::CubeTypeChanged {
        cube: center,
        kind: CubeType::Gray
    }));

    let _ = pump(
        &mut world,
        &mut engine,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    );
    assert_eq!(query::playing_count(&world), 0);
    let center_cube = query::cube(&world, center).expect("center survives");
    assert_eq!(center_cube.classic_type(), CubeType::Gray);
}

#[test]
fn blowing_without_cube_above_keeps_the_selection() {
    let mut world = level(2, 1, &[(1, 0, CubeType::Gray)]);
    let mut engine = ReactionEngine::new();
    let _ = pump(
        &mut world,
        &mut engine,
        Command::ToggleSelection {
            cell: GridPos::new(0, 0),
        },
    );
    let blown = pump(&mut world, &mut engine, Command::BlowSelection);
    assert_eq!(melts(&blown), 0);
    assert!(blown
        .iter()
        .any(|event| matches!(event, Event::OperationRejected { .. })));
    assert_eq!(query::selected(&world), Some(ground_at(&world, 0, 0)));
}

#[test]
fn green_reaction_ignores_selection() {
    let mut world = level(3, 1, &[(0, 0, CubeType::Black), (2, 0, CubeType::Gray)]);
    let _ = paint_ground(&mut world, 0, 0, CubeType::Green);
    let mut engine = ReactionEngine::new();

    let events = pump(&mut world, &mut engine, Command::TriggerGreenReaction);
    assert_eq!(melts(&events), 1);
    assert_eq!(query::selected(&world), None);

    let _ = pump(
        &mut world,
        &mut engine,
        Command::Tick {
            dt: Duration::from_secs(1),
        },
    );
    let far = query::cube_above(&world, GridPos::new(2, 0));
    assert!(far.is_some(), "cube outside the neighbourhood survives");
    let painted = query::cube(&world, ground_at(&world, 0, 0)).expect("ground survives");
    assert_eq!(painted.classic_type(), CubeType::Black);
}
