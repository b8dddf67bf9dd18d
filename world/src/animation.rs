//! Duration-based animation tasks tracked on behalf of the visual layer.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use cube_roll_core::{Animation, CubeId, TaskId};
use glam::Vec3;

/// Source of animation completions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompletionMode {
    /// Tasks complete once the ticked clock covers their duration.
    #[default]
    Timed,
    /// Tasks complete only when the visual layer reports them.
    External,
}

#[derive(Clone, Debug)]
pub(crate) struct AnimationTask {
    pub(crate) cube: CubeId,
    pub(crate) animation: Animation,
    duration: Duration,
    elapsed: Duration,
    start: Vec3,
    pub(crate) end: Vec3,
}

impl AnimationTask {
    fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn position(&self) -> Vec3 {
        self.start.lerp(self.end, self.progress())
    }

    fn is_due(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Outcome of advancing one task by a tick.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TaskProgress {
    pub(crate) task: TaskId,
    pub(crate) cube: CubeId,
    pub(crate) animation: Animation,
    pub(crate) position: Vec3,
    pub(crate) due: bool,
}

#[derive(Debug)]
pub(crate) struct AnimationDriver {
    mode: CompletionMode,
    tasks: BTreeMap<TaskId, AnimationTask>,
    next_task: u32,
}

impl AnimationDriver {
    pub(crate) fn new(mode: CompletionMode) -> Self {
        Self {
            mode,
            tasks: BTreeMap::new(),
            next_task: 0,
        }
    }

    pub(crate) fn mode(&self) -> CompletionMode {
        self.mode
    }

    pub(crate) fn start(
        &mut self,
        cube: CubeId,
        animation: Animation,
        duration: Duration,
        start: Vec3,
        end: Vec3,
    ) -> TaskId {
        let task = TaskId::new(self.next_task);
        self.next_task = self.next_task.wrapping_add(1);
        let _ = self.tasks.insert(
            task,
            AnimationTask {
                cube,
                animation,
                duration,
                elapsed: Duration::ZERO,
                start,
                end,
            },
        );
        task
    }

    /// Advances every task, reporting interpolated positions in task order.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec<TaskProgress> {
        self.tasks
            .iter_mut()
            .map(|(task, state)| {
                state.elapsed = state.elapsed.saturating_add(dt).min(state.duration);
                TaskProgress {
                    task: *task,
                    cube: state.cube,
                    animation: state.animation,
                    position: state.position(),
                    due: state.is_due(),
                }
            })
            .collect()
    }

    pub(crate) fn take(&mut self, task: TaskId) -> Option<AnimationTask> {
        self.tasks.remove(&task)
    }

    /// Drops every task animating the cube, returning how many were dropped.
    pub(crate) fn cancel_for(&mut self, cube: CubeId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, state| state.cube != cube);
        before - self.tasks.len()
    }

    pub(crate) fn is_animating(&self, cube: CubeId) -> bool {
        self.tasks.values().any(|state| state.cube == cube)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Expected versus finished members of a rise batch.
#[derive(Clone, Debug)]
pub(crate) struct CompletionBatch {
    expected: BTreeSet<CubeId>,
    finished: BTreeSet<CubeId>,
}

impl CompletionBatch {
    pub(crate) fn new(expected: BTreeSet<CubeId>) -> Self {
        Self {
            expected,
            finished: BTreeSet::new(),
        }
    }

    /// Counts a completion once; duplicates and strangers are ignored.
    pub(crate) fn record(&mut self, cube: CubeId) -> bool {
        self.expected.contains(&cube) && self.finished.insert(cube)
    }

    /// Stops waiting for a cube that left the batch early.
    pub(crate) fn forget(&mut self, cube: CubeId) {
        let _ = self.expected.remove(&cube);
        let _ = self.finished.remove(&cube);
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.finished.len() == self.expected.len()
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.len()
    }
}
