use std::collections::BTreeMap;

use cube_roll_core::{CubeId, GridPos};

use crate::cube::CubeEntity;

/// Spatial index of one cube layer: who occupies a cell and who reserved it.
#[derive(Clone, Debug, Default)]
pub struct GridIndex {
    occupants: BTreeMap<GridPos, CubeId>,
    reservations: BTreeMap<GridPos, CubeId>,
}

impl GridIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the cube at its grid position. The last writer wins.
    ///
    /// Returns the cube that previously occupied the cell, if it was another one.
    pub fn register(&mut self, cube: &CubeEntity) -> Option<CubeId> {
        let displaced = self
            .occupants
            .insert(cube.grid_pos(), cube.id())
            .filter(|previous| *previous != cube.id());
        if let Some(previous) = displaced {
            tracing::debug!(
                cell = %cube.grid_pos(),
                previous = %previous,
                cube = %cube.id(),
                "grid slot overwritten"
            );
        }
        displaced
    }

    /// Removes the cube from its grid position if the slot still points at it.
    pub fn unregister(&mut self, cube: &CubeEntity) -> bool {
        let cell = cube.grid_pos();
        if self.occupants.get(&cell) == Some(&cube.id()) {
            let _ = self.occupants.remove(&cell);
            true
        } else {
            false
        }
    }

    /// Reserves the target cell of a rolling cube.
    ///
    /// Fails when another cube already holds the reservation.
    pub fn reserve(&mut self, cube: &CubeEntity) -> bool {
        let Some(target) = cube.target_grid_pos() else {
            return false;
        };
        match self.reservations.get(&target) {
            Some(holder) if *holder != cube.id() => false,
            _ => {
                let _ = self.reservations.insert(target, cube.id());
                true
            }
        }
    }

    /// Releases the reservation held by a rolling cube on its target.
    pub fn release(&mut self, cube: &CubeEntity) -> bool {
        let Some(target) = cube.target_grid_pos() else {
            return false;
        };
        if self.reservations.get(&target) == Some(&cube.id()) {
            let _ = self.reservations.remove(&target);
            true
        } else {
            false
        }
    }

    /// Cube registered at the cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: GridPos) -> Option<CubeId> {
        self.occupants.get(&cell).copied()
    }

    /// Reports whether a rolling cube reserved the cell.
    #[must_use]
    pub fn is_reserved(&self, cell: GridPos) -> bool {
        self.reservations.contains_key(&cell)
    }

    /// Reports whether the cell is occupied or reserved.
    #[must_use]
    pub fn is_blocked(&self, cell: GridPos) -> bool {
        self.occupants.contains_key(&cell) || self.is_reserved(cell)
    }

    /// Iterates over the occupied cells in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPos, CubeId)> + '_ {
        self.occupants.iter().map(|(cell, cube)| (*cell, *cube))
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    /// Reports whether no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Number of cells held by rolling cubes.
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }
}

#[cfg(test)]
mod tests {
    use cube_roll_core::{CubeType, Direction, Layer, RollSpeed};

    use super::*;

    fn cube(id: u32, x: i32, z: i32) -> CubeEntity {
        CubeEntity::new(
            CubeId::new(id),
            Layer::Playing,
            GridPos::new(x, z),
            CubeType::Gray,
            RollSpeed::DEFAULT,
        )
    }

    #[test]
    fn register_overwrites_and_reports_previous_occupant() {
        let mut index = GridIndex::new();
        assert_eq!(index.register(&cube(1, 0, 0)), None);
        assert_eq!(index.register(&cube(1, 0, 0)), None);
        assert_eq!(index.register(&cube(2, 0, 0)), Some(CubeId::new(1)));
        assert_eq!(index.occupant(GridPos::new(0, 0)), Some(CubeId::new(2)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn unregister_ignores_stale_entries() {
        let mut index = GridIndex::new();
        let _ = index.register(&cube(1, 0, 0));
        let _ = index.register(&cube(2, 0, 0));

        assert!(!index.unregister(&cube(1, 0, 0)));
        assert_eq!(index.occupant(GridPos::new(0, 0)), Some(CubeId::new(2)));
        assert!(index.unregister(&cube(2, 0, 0)));
        assert!(index.is_empty());
    }

    #[test]
    fn reservations_block_cells_until_released() {
        let mut index = GridIndex::new();
        let mut rolling = cube(1, 0, 0);
        let mut rival = cube(2, 0, 2);
        assert!(!index.reserve(&rolling));

        let _ = rolling.begin_roll(Direction::North).expect("idle cube rolls");
        let _ = rival.begin_roll(Direction::South).expect("idle cube rolls");
        assert!(index.reserve(&rolling));
        assert!(index.reserve(&rolling));
        assert!(!index.reserve(&rival));

        let target = GridPos::new(0, 1);
        assert!(index.is_reserved(target));
        assert!(index.is_blocked(target));
        assert_eq!(index.occupant(target), None);

        assert!(!index.release(&rival));
        assert!(index.release(&rolling));
        assert!(!index.is_blocked(target));
        assert_eq!(index.reservation_count(), 0);
    }
}
