//! Per-cube state machine: identity and selection types, grid position and
//! the idle/rolling lifecycle.

use std::time::Duration;

use cube_roll_core::{CubeId, CubeType, Direction, GridPos, InvalidOperation, Layer, RollSpeed};
use glam::Vec3;

/// Authoritative state of a single cube.
#[derive(Clone, Debug)]
pub struct CubeEntity {
    id: CubeId,
    layer: Layer,
    grid_pos: GridPos,
    target: Option<GridPos>,
    classic_type: CubeType,
    actual_type: CubeType,
    roll_speed: RollSpeed,
    position: Vec3,
    melting: bool,
}

impl CubeEntity {
    /// Creates an idle cube resting on the ground plane at `grid_pos`.
    ///
    /// `Selected` is not an identity, so it is replaced by `Gray`.
    #[must_use]
    pub fn new(
        id: CubeId,
        layer: Layer,
        grid_pos: GridPos,
        kind: CubeType,
        roll_speed: RollSpeed,
    ) -> Self {
        let kind = if kind.is_identity() {
            kind
        } else {
            CubeType::Gray
        };
        Self {
            id,
            layer,
            grid_pos,
            target: None,
            classic_type: kind,
            actual_type: kind,
            roll_speed,
            position: ground_position(grid_pos),
            melting: false,
        }
    }

    /// Identifier of the cube.
    #[must_use]
    pub const fn id(&self) -> CubeId {
        self.id
    }

    /// Layer the cube belongs to.
    #[must_use]
    pub const fn layer(&self) -> Layer {
        self.layer
    }

    /// Cell the cube occupies, or is leaving while it rolls.
    #[must_use]
    pub const fn grid_pos(&self) -> GridPos {
        self.grid_pos
    }

    /// Cell reserved by the cube; only present while rolling.
    #[must_use]
    pub const fn target_grid_pos(&self) -> Option<GridPos> {
        self.target
    }

    /// Reports whether a roll is in flight.
    #[must_use]
    pub const fn is_rolling(&self) -> bool {
        self.target.is_some()
    }

    /// Persistent identity type.
    #[must_use]
    pub const fn classic_type(&self) -> CubeType {
        self.classic_type
    }

    /// Type currently displayed.
    #[must_use]
    pub const fn actual_type(&self) -> CubeType {
        self.actual_type
    }

    /// Angular speed used when rolling.
    #[must_use]
    pub const fn roll_speed(&self) -> RollSpeed {
        self.roll_speed
    }

    /// Visual position mirrored from the animation tasks.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Elevation above the ground plane.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.position.y
    }

    /// Reports whether the cube is melting into its ground cube.
    #[must_use]
    pub const fn is_melting(&self) -> bool {
        self.melting
    }

    /// Time the cube needs for a full roll: a 90° sweep at its roll speed.
    #[must_use]
    pub const fn roll_duration(&self) -> Duration {
        self.roll_speed.roll_duration()
    }

    /// Displays `kind` without touching the identity.
    ///
    /// Returns `true` when the displayed type changed and observers must be told.
    pub fn set_type(&mut self, kind: CubeType) -> bool {
        if self.actual_type == kind {
            return false;
        }
        self.actual_type = kind;
        true
    }

    /// Permanently changes the identity of the cube and displays it.
    pub fn change_type(&mut self, kind: CubeType) -> Result<bool, InvalidOperation> {
        if !kind.is_identity() {
            return Err(InvalidOperation::SelectedIsNotAnIdentity { cube: self.id });
        }
        self.classic_type = kind;
        Ok(self.set_type(kind))
    }

    /// Highlights the cube as selected.
    pub fn select(&mut self) -> bool {
        if self.actual_type == CubeType::Selected {
            tracing::debug!(cube = %self.id, "cube already selected");
            return false;
        }
        self.set_type(CubeType::Selected)
    }

    /// Restores the identity type, whatever is currently displayed.
    pub fn unselect(&mut self) -> bool {
        self.set_type(self.classic_type)
    }

    /// Starts a roll toward the neighbouring cell in `direction`.
    ///
    /// The caller removes the cube from its grid index at the same moment.
    pub fn begin_roll(&mut self, direction: Direction) -> Result<GridPos, InvalidOperation> {
        if self.is_rolling() {
            return Err(InvalidOperation::AlreadyRolling { cube: self.id });
        }
        let target = self.grid_pos.step(direction);
        self.target = Some(target);
        Ok(target)
    }

    /// Lands the cube on its reserved cell.
    ///
    /// Returns the `(from, to)` cells, or `None` when no roll was in flight.
    pub fn complete_roll(&mut self) -> Option<(GridPos, GridPos)> {
        let target = self.target.take()?;
        let from = self.grid_pos;
        self.grid_pos = target;
        self.position = Vec3::new(target.x() as f32, self.position.y, target.z() as f32);
        Some((from, target))
    }

    pub(crate) fn begin_melt(&mut self) -> Result<(), InvalidOperation> {
        if self.melting {
            return Err(InvalidOperation::AlreadyMelting { cube: self.id });
        }
        if self.is_rolling() {
            return Err(InvalidOperation::AlreadyRolling { cube: self.id });
        }
        self.melting = true;
        Ok(())
    }

    pub(crate) fn set_height(&mut self, height: f32) {
        self.position.y = height;
    }
}

/// Visual position of the ground-plane cell.
#[must_use]
pub fn ground_position(cell: GridPos) -> Vec3 {
    Vec3::new(cell.x() as f32, 0.0, cell.z() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(kind: CubeType) -> CubeEntity {
        CubeEntity::new(
            CubeId::new(1),
            Layer::Ground,
            GridPos::new(2, 3),
            kind,
            RollSpeed::DEFAULT,
        )
    }

    #[test]
    fn set_type_notifies_only_on_change() {
        let mut entity = cube(CubeType::Gray);
        assert!(!entity.set_type(CubeType::Gray));
        assert!(entity.set_type(CubeType::Black));
        assert_eq!(entity.actual_type(), CubeType::Black);
        assert_eq!(entity.classic_type(), CubeType::Gray);
    }

    #[test]
    fn select_is_idempotent() {
        let mut entity = cube(CubeType::Green);
        assert!(entity.select());
        assert!(!entity.select());
        assert_eq!(entity.actual_type(), CubeType::Selected);
        assert_eq!(entity.classic_type(), CubeType::Green);
    }

    #[test]
    fn unselect_restores_identity_from_any_state() {
        let mut entity = cube(CubeType::Black);
        let _ = entity.set_type(CubeType::Green);
        assert!(entity.unselect());
        assert_eq!(entity.actual_type(), CubeType::Black);
        assert!(!entity.unselect());
    }

    #[test]
    fn change_type_then_unselect_keeps_new_identity() {
        let mut entity = cube(CubeType::Gray);
        assert!(entity.select());
        assert_eq!(entity.change_type(CubeType::Green), Ok(true));
        let _ = entity.unselect();
        assert_eq!(entity.actual_type(), CubeType::Green);
        assert_eq!(entity.classic_type(), CubeType::Green);
    }

    #[test]
    fn selected_never_becomes_identity() {
        let mut entity = cube(CubeType::Gray);
        assert_eq!(
            entity.change_type(CubeType::Selected),
            Err(InvalidOperation::SelectedIsNotAnIdentity {
                cube: CubeId::new(1)
            })
        );
        assert_eq!(entity.classic_type(), CubeType::Gray);

        let spawned = cube(CubeType::Selected);
        assert_eq!(spawned.classic_type(), CubeType::Gray);
    }

    #[test]
    fn roll_lifecycle_moves_cube_to_target() {
        let mut entity = cube(CubeType::Gray);
        assert!(entity.complete_roll().is_none());

        let target = entity.begin_roll(Direction::FORWARD).expect("idle cube rolls");
        assert_eq!(target, GridPos::new(2, 4));
        assert!(entity.is_rolling());
        assert_eq!(entity.grid_pos(), GridPos::new(2, 3));
        assert_eq!(
            entity.begin_roll(Direction::FORWARD),
            Err(InvalidOperation::AlreadyRolling {
                cube: CubeId::new(1)
            })
        );

        assert_eq!(
            entity.complete_roll(),
            Some((GridPos::new(2, 3), GridPos::new(2, 4)))
        );
        assert!(!entity.is_rolling());
        assert_eq!(entity.target_grid_pos(), None);
        assert_eq!(entity.position(), Vec3::new(2.0, 0.0, 4.0));
    }

    #[test]
    fn roll_duration_is_quarter_turn_over_speed() {
        let entity = CubeEntity::new(
            CubeId::new(1),
            Layer::Playing,
            GridPos::new(0, 0),
            CubeType::Gray,
            RollSpeed::from_degrees_per_second(360),
        );
        assert_eq!(entity.roll_duration(), Duration::from_millis(250));
    }

    #[test]
    fn melting_cube_refuses_second_melt() {
        let mut entity = cube(CubeType::Gray);
        assert_eq!(entity.begin_melt(), Ok(()));
        assert!(entity.is_melting());
        assert_eq!(
            entity.begin_melt(),
            Err(InvalidOperation::AlreadyMelting {
                cube: CubeId::new(1)
            })
        );
    }
}
