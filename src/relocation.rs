use crate::grid::{Grid, Race, EMPTY};
use log::trace;
use rand::Rng;

/// Empty cells of a grid, kept in step with the moves made through it.
///
/// A move takes a uniformly chosen vacancy and puts the vacated origin in its
/// slot, so no rescan of the grid is needed. Only valid while every change to
/// the grid goes through [`Vacancies::relocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vacancies {
    positions: Vec<(usize, usize)>,
}

impl Vacancies {
    pub fn new(grid: &Grid) -> Self {
        Vacancies {
            positions: grid.empty_positions(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Current empty cells, in no particular order.
    pub fn positions(&self) -> &[(usize, usize)] {
        &self.positions
    }

    /// Moves the agent of `race` at (row, col) to an empty cell picked uniformly
    /// from the whole grid, leaving the origin empty.
    ///
    /// Returns `false` and leaves the grid untouched when the board has no empty
    /// cell; a saturated board simply freezes.
    pub fn relocate<R: Rng + ?Sized>(
        &mut self,
        grid: &mut Grid,
        row: usize,
        col: usize,
        race: Race,
        rng: &mut R,
    ) -> bool {
        if self.positions.is_empty() {
            trace!("No empty cell for agent at ({}, {}); staying put.", row, col);
            return false;
        }

        let slot = rng.random_range(0..self.positions.len());
        let (to_row, to_col) = self.positions[slot];
        self.positions[slot] = (row, col);

        grid.set(to_row, to_col, race);
        grid.set(row, col, EMPTY);
        trace!("Moved race {} from ({}, {}) to ({}, {}).", race, row, col, to_row, to_col);
        true
    }
}

/// One-off move on a grid without a maintained vacancy list.
pub fn relocate<R: Rng + ?Sized>(grid: &mut Grid, row: usize, col: usize, race: Race, rng: &mut R) -> bool {
    Vacancies::new(grid).relocate(grid, row, col, race, rng)
}
