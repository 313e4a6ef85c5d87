use schelling_common::{Result, SchellingError, SimulationConfig};
use std::fmt;
use std::ops::Range;

/// Race identifier stored in a cell. `EMPTY` marks an unoccupied cell, races are `1..=R`.
pub type Race = u32;

pub const EMPTY: Race = 0;

// Board glyphs for races 1.. when printing; races past the table print as '?'
const RACE_GLYPHS: &[char] = &['O', '#', 'X', '+', '*', '%', '@', '&', '$', '='];

/// Clipped neighbourhood window around a cell, rows against the height and
/// columns against the width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Window {
    pub fn size(&self) -> usize {
        self.rows.len() * self.cols.len()
    }
}

/// A `height` x `width` board of race identifiers, stored row-major, plus the
/// configuration it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    config: SimulationConfig,
    cells: Vec<Race>,
}

impl Grid {
    /// Wraps row-major cells. The length must match the configured dimensions and
    /// every race must be one the configuration knows about.
    pub fn from_cells(config: SimulationConfig, cells: Vec<Race>) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(SchellingError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                config.width, config.height
            )));
        }
        if cells.len() != config.cell_count() {
            return Err(SchellingError::Config(format!(
                "expected {} cells for a {}x{} grid, got {}",
                config.cell_count(),
                config.width,
                config.height,
                cells.len()
            )));
        }
        let race_count = config.race_count() as Race;
        if let Some(bad) = cells.iter().find(|&&race| race > race_count) {
            return Err(SchellingError::Config(format!(
                "race {} found but only {} races are configured",
                bad, race_count
            )));
        }
        Ok(Grid { config, cells })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    #[inline(always)]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.config.width + col
    }

    /// Race at (row, col), `None` outside the board.
    pub fn get(&self, row: usize, col: usize) -> Option<Race> {
        if row < self.height() && col < self.width() {
            Some(self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, race: Race) {
        let idx = self.index(row, col);
        self.cells[idx] = race;
    }

    /// Row-major view of every cell.
    pub fn cells(&self) -> &[Race] {
        &self.cells
    }

    /// Copy of the board as nested rows.
    pub fn snapshot(&self) -> Vec<Vec<Race>> {
        self.cells.chunks(self.width()).map(|row| row.to_vec()).collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&race| race != EMPTY).count()
    }

    /// Coordinates of every empty cell, row-major.
    pub fn empty_positions(&self) -> Vec<(usize, usize)> {
        let width = self.width();
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &race)| race == EMPTY)
            .map(|(idx, _)| (idx / width, idx % width))
            .collect()
    }

    /// Cell count per race; index 0 counts the empty cells.
    pub fn census(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.config.race_count() + 1];
        for &race in &self.cells {
            counts[race as usize] += 1;
        }
        counts
    }

    /// Window of Chebyshev radius `depth` around (row, col).
    pub fn window(&self, row: usize, col: usize, depth: usize) -> Window {
        Window {
            rows: row.saturating_sub(depth)..(row.saturating_add(depth) + 1).min(self.height()),
            cols: col.saturating_sub(depth)..(col.saturating_add(depth) + 1).min(self.width()),
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "-".repeat(self.width() * 2 + 2);
        writeln!(f, "{}", border)?;
        for row in self.cells.chunks(self.width()) {
            let mut line = String::from("| ");
            for &race in row {
                let glyph = match race {
                    EMPTY => ' ',
                    r => RACE_GLYPHS.get(r as usize - 1).copied().unwrap_or('?'),
                };
                line.push(glyph);
                line.push(' ');
            }
            line.pop();
            line.push('|');
            writeln!(f, "{}", line)?;
        }
        write!(f, "{}", border)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn config(width: usize, height: usize, depth: usize, races: usize) -> SimulationConfig {
        SimulationConfig {
            width,
            height,
            neighbour_depth: depth,
            similarity_threshold: 0.5,
            empty_ratio: 0.0,
            race_ratios: vec![1.0 / races as f64; races],
        }
    }

    pub(crate) fn grid(width: usize, height: usize, depth: usize, races: usize, cells: &[Race]) -> Grid {
        Grid::from_cells(config(width, height, depth, races), cells.to_vec()).unwrap()
    }

    #[test]
    fn test_from_cells_checks_shape_and_races() {
        assert!(Grid::from_cells(config(3, 2, 1, 2), vec![0; 5]).is_err());
        assert!(Grid::from_cells(config(3, 2, 1, 2), vec![0, 1, 2, 3, 0, 0]).is_err());
        assert!(Grid::from_cells(config(3, 2, 1, 2), vec![0, 1, 2, 2, 0, 0]).is_ok());
    }

    #[test]
    fn test_queries() {
        let g = grid(3, 2, 1, 2, &[0, 1, 2, 2, 0, 1]);
        assert_eq!(g.get(0, 1), Some(1));
        assert_eq!(g.get(1, 0), Some(2));
        assert_eq!(g.get(2, 0), None);
        assert_eq!(g.get(0, 3), None);
        assert_eq!(g.occupied_count(), 4);
        assert_eq!(g.empty_positions(), vec![(0, 0), (1, 1)]);
        assert_eq!(g.census(), vec![2, 2, 2]);
        assert_eq!(g.snapshot(), vec![vec![0, 1, 2], vec![2, 0, 1]]);
    }

    #[test]
    fn test_window_clips_each_axis_against_its_own_bound() {
        // Wide, short board: clipping rows against the width would overrun the height
        let g = Grid::from_cells(config(6, 2, 2, 1), vec![1; 12]).unwrap();
        let w = g.window(1, 0, 2);
        assert_eq!(w.rows, 0..2);
        assert_eq!(w.cols, 0..3);
        assert_eq!(w.size(), 6);

        let w = g.window(0, 5, 2);
        assert_eq!(w.cols, 3..6);
        assert_eq!(w.size(), 6);

        let w = g.window(1, 3, 0);
        assert_eq!(w.size(), 1);
    }

    #[test]
    fn test_display_board() {
        let g = grid(2, 2, 1, 2, &[1, 0, 2, 1]);
        let expected = "------\n| O  |\n| # O|\n------";
        assert_eq!(g.to_string(), expected);
    }
}
