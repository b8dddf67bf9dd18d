#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Row-staged rolling of the playing layer.
//!
//! Rows are dispatched farthest first so the front of the formation starts
//! moving slightly before the rows behind it, producing a cascading wave.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use cube_roll_core::{Command, CubeId, CubeView, Direction, Event, InvalidOperation};

/// Share of the roll duration waited between two row dispatches, in tenths.
const ROW_GAP_TENTHS: u32 = 3;
/// Share of the roll duration waited after the last row, in tenths.
const SETTLE_TENTHS: u32 = 8;

#[derive(Debug)]
struct Dispatch {
    rows: VecDeque<Vec<CubeId>>,
    gap: Duration,
    settle: Duration,
    until_next: Duration,
}

#[derive(Debug)]
enum Stage {
    Idle,
    Dispatching(Dispatch),
    Settling { remaining: Duration },
}

/// Pure system that turns roll requests into staged row commands.
#[derive(Debug)]
pub struct RollOrchestrator {
    stage: Stage,
}

impl RollOrchestrator {
    /// Creates an idle orchestrator.
    #[must_use]
    pub fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    /// Reports whether a roll sequence is being dispatched or settling.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.stage, Stage::Idle)
    }

    /// Number of rows still waiting for dispatch.
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        match &self.stage {
            Stage::Dispatching(dispatch) => dispatch.rows.len(),
            Stage::Idle | Stage::Settling { .. } => 0,
        }
    }

    /// Consumes events and the cube view to emit roll commands.
    ///
    /// Time is consumed in event order, so ticks observed before a request do
    /// not count toward its staging.
    pub fn handle(&mut self, events: &[Event], cubes: &CubeView, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::RollRequested { trigger } => {
                    tracing::debug!(?trigger, "roll requested");
                    let _ = self.roll_all(cubes, out);
                }
                Event::TimeAdvanced { dt } => self.advance(*dt, out),
                _ => {}
            }
        }
    }

    /// Starts rolling every playing cube one row forward.
    ///
    /// Returns `false` and reports [`InvalidOperation::RollInProgress`] when a
    /// sequence is active or a cube from the previous one is still rolling.
    pub fn roll_all(&mut self, cubes: &CubeView, out: &mut Vec<Command>) -> bool {
        if self.is_active() || cubes.any_rolling() {
            tracing::debug!("refusing roll while the previous one is in flight");
            out.push(Command::ReportRejection {
                reason: InvalidOperation::RollInProgress,
            });
            return false;
        }

        let mut by_row: BTreeMap<i32, Vec<(i32, CubeId)>> = BTreeMap::new();
        let mut duration = Duration::ZERO;
        for cube in cubes.playing().filter(|cube| !cube.melting) {
            by_row
                .entry(cube.cell.z())
                .or_default()
                .push((cube.cell.x(), cube.id));
            duration = duration.max(cube.roll_duration);
        }
        let mut rows: VecDeque<Vec<CubeId>> = by_row
            .into_values()
            .rev()
            .map(|mut row| {
                row.sort_unstable();
                row.into_iter().map(|(_, id)| id).collect()
            })
            .collect();

        out.push(Command::BeginRollSequence);
        let Some(first) = rows.pop_front() else {
            tracing::debug!("no playing cubes to roll");
            out.push(Command::FinishRollSequence);
            return true;
        };

        let gap = duration * ROW_GAP_TENTHS / 10;
        let settle = duration * SETTLE_TENTHS / 10;
        tracing::info!(rows = rows.len() + 1, ?duration, "roll sequence started");
        dispatch_row(first, out);
        self.stage = if rows.is_empty() {
            Stage::Settling { remaining: settle }
        } else {
            Stage::Dispatching(Dispatch {
                rows,
                gap,
                settle,
                until_next: gap,
            })
        };
        true
    }

    fn advance(&mut self, dt: Duration, out: &mut Vec<Command>) {
        let mut budget = dt;
        loop {
            match &mut self.stage {
                Stage::Idle => return,
                Stage::Dispatching(dispatch) => {
                    if budget < dispatch.until_next {
                        dispatch.until_next -= budget;
                        return;
                    }
                    budget -= dispatch.until_next;
                    if let Some(row) = dispatch.rows.pop_front() {
                        dispatch_row(row, out);
                    }
                    if dispatch.rows.is_empty() {
                        let remaining = dispatch.settle;
                        self.stage = Stage::Settling { remaining };
                    } else {
                        dispatch.until_next = dispatch.gap;
                    }
                }
                Stage::Settling { remaining } => {
                    if budget < *remaining {
                        *remaining -= budget;
                        return;
                    }
                    self.stage = Stage::Idle;
                    tracing::info!("roll sequence settled");
                    out.push(Command::FinishRollSequence);
                    return;
                }
            }
        }
    }
}

impl Default for RollOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch_row(cubes: Vec<CubeId>, out: &mut Vec<Command>) {
    out.push(Command::RollRow {
        cubes,
        direction: Direction::FORWARD,
    });
}
