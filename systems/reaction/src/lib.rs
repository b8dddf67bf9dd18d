#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Blow, melt and green chain-reaction logic over the ground and playing layers.

use std::collections::BTreeSet;

use cube_roll_core::{Command, CubeId, CubeType, CubeView, Event, GridPos, InvalidOperation};

/// Pure system that resolves blows into type changes and melts.
#[derive(Debug, Default)]
pub struct ReactionEngine {
    melts_requested: u64,
}

impl ReactionEngine {
    /// Creates a new reaction engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of melts requested since creation.
    #[must_use]
    pub fn melts_requested(&self) -> u64 {
        self.melts_requested
    }

    /// Consumes blow and reaction requests to emit melt commands.
    pub fn handle(&mut self, events: &[Event], cubes: &CubeView, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::BlowRequested { ground } => {
                    if self.blow(cubes, *ground, out) {
                        out.push(Command::ClearSelection);
                    }
                }
                Event::GreenReactionRequested => {
                    let _ = self.trigger_green_reaction(cubes, out);
                }
                _ => {}
            }
        }
    }

    /// Blows from a ground cube at rest.
    ///
    /// A green ground cube blows its whole neighbourhood; any other one melts
    /// the cube resting above it. Returns `false` and reports the reason when
    /// nothing could be blown.
    pub fn blow(&mut self, cubes: &CubeView, ground: CubeId, out: &mut Vec<Command>) -> bool {
        let Some(center) = cubes.cube(ground).filter(|cube| cube.is_ground_at_rest()) else {
            out.push(Command::ReportRejection {
                reason: InvalidOperation::NotGroundCube { cube: ground },
            });
            return false;
        };

        if center.classic_type == CubeType::Green {
            let melts = self.blow_area(cubes, center.cell, out);
            tracing::info!(cell = %center.cell, melts, "green ground cube blown");
            return true;
        }

        match cubes.above(center.cell) {
            Some(above) => {
                self.melt_single(above.id, center.id, out);
                true
            }
            None => {
                tracing::debug!(cell = %center.cell, "nothing above blown ground cube");
                out.push(Command::ReportRejection {
                    reason: InvalidOperation::NoCubeAbove { cell: center.cell },
                });
                false
            }
        }
    }

    /// Turns a green center Gray, then melts every cube resting above its 3×3
    /// neighbourhood. Returns the number of melts requested.
    pub fn blow_area(
        &mut self,
        cubes: &CubeView,
        center: GridPos,
        out: &mut Vec<Command>,
    ) -> usize {
        self.blow_area_once(cubes, center, &mut BTreeSet::new(), out)
    }

    /// Melts `above` onto `ground`; the ground takes the melted cube's identity.
    pub fn melt_single(&mut self, above: CubeId, ground: CubeId, out: &mut Vec<Command>) {
        self.melts_requested = self.melts_requested.saturating_add(1);
        out.push(Command::MeltCube {
            cube: above,
            onto: ground,
        });
    }

    /// Blows the neighbourhood of every green ground cube, regardless of selection.
    ///
    /// A cube shared by several neighbourhoods melts once. Returns the number
    /// of melts requested.
    pub fn trigger_green_reaction(&mut self, cubes: &CubeView, out: &mut Vec<Command>) -> usize {
        let centers: Vec<GridPos> = cubes
            .ground()
            .filter(|cube| cube.classic_type == CubeType::Green)
            .map(|cube| cube.cell)
            .collect();

        let mut claimed = BTreeSet::new();
        let melts: usize = centers
            .iter()
            .map(|center| self.blow_area_once(cubes, *center, &mut claimed, out))
            .sum();
        tracing::info!(centers = centers.len(), melts, "green reaction triggered");
        melts
    }

    fn blow_area_once(
        &mut self,
        cubes: &CubeView,
        center: GridPos,
        claimed: &mut BTreeSet<CubeId>,
        out: &mut Vec<Command>,
    ) -> usize {
        if let Some(ground) = cubes.ground_at(center) {
            if ground.classic_type == CubeType::Green {
                out.push(Command::ChangeCubeType {
                    cube: ground.id,
                    kind: CubeType::Gray,
                });
            }
        }

        let mut melts = 0;
        for cell in center.neighborhood() {
            let (Some(ground), Some(above)) = (cubes.ground_at(cell), cubes.above(cell)) else {
                continue;
            };
            if claimed.insert(above.id) {
                self.melt_single(above.id, ground.id, out);
                melts += 1;
            }
        }
        melts
    }
}
