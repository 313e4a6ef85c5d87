//! Same-race ratio of an agent within its clipped neighbourhood window, and the
//! segregation metric built from it.

use crate::grid::{Grid, EMPTY};

/// Cell counts of one neighbourhood window. The agent itself is included in
/// `size` and `same`, never in `empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbourhood {
    pub size: usize,
    pub empty: usize,
    pub same: usize,
}

impl Neighbourhood {
    /// Occupied cells in the window besides the agent.
    pub fn occupied_neighbours(&self) -> usize {
        self.size - self.empty - 1
    }

    /// `(same - 1) / (size - empty - 1)`, or `None` when every other cell is empty.
    pub fn same_race_ratio(&self) -> Option<f64> {
        match self.occupied_neighbours() {
            0 => None,
            others => Some((self.same - 1) as f64 / others as f64),
        }
    }
}

/// Counts the window of Chebyshev radius `depth` around an occupied cell.
/// Returns `None` for an empty or out-of-bounds cell.
pub fn survey(grid: &Grid, row: usize, col: usize, depth: usize) -> Option<Neighbourhood> {
    let race = grid.get(row, col)?;
    if race == EMPTY {
        return None;
    }

    let window = grid.window(row, col, depth);
    let width = grid.width();
    let cells = grid.cells();
    let mut counts = Neighbourhood {
        size: window.size(),
        empty: 0,
        same: 0,
    };
    for r in window.rows.clone() {
        for &value in &cells[r * width + window.cols.start..r * width + window.cols.end] {
            if value == EMPTY {
                counts.empty += 1;
            } else if value == race {
                counts.same += 1;
            }
        }
    }
    Some(counts)
}

impl Grid {
    /// Fraction of the occupied neighbours of (row, col) that share its race,
    /// using the configured neighbourhood depth.
    ///
    /// `None` when the cell is empty or has no occupied neighbour; the ratio is
    /// undefined then and callers treat the agent as satisfied.
    pub fn same_race_ratio(&self, row: usize, col: usize) -> Option<f64> {
        survey(self, row, col, self.config().neighbour_depth)?.same_race_ratio()
    }
}

/// Mean same-race ratio over every occupied cell with a defined ratio.
///
/// A board with no such cell (no occupants at all, or only isolated ones)
/// scores 1.
pub fn segregation_metric(grid: &Grid) -> f64 {
    let width = grid.width();
    let (sum, count) = grid
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, &race)| race != EMPTY)
        .filter_map(|(idx, _)| grid.same_race_ratio(idx / width, idx % width))
        .fold((0.0, 0usize), |(sum, count), ratio| (sum + ratio, count + 1));

    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::grid;

    #[test]
    fn test_ratio_excludes_self_and_empty() {
        // 1 1 0
        // 2 1 0
        // 0 0 0
        let g = grid(3, 3, 1, 2, &[1, 1, 0, 2, 1, 0, 0, 0, 0]);
        let n = survey(&g, 1, 1, 1).unwrap();
        assert_eq!(n, Neighbourhood { size: 9, empty: 5, same: 3 });
        assert_eq!(g.same_race_ratio(1, 1), Some(2.0 / 3.0));

        // Corner window is clipped to 2x2
        let n = survey(&g, 0, 0, 1).unwrap();
        assert_eq!(n.size, 4);
        assert_eq!(g.same_race_ratio(0, 0), Some(2.0 / 3.0));
        assert_eq!(g.same_race_ratio(1, 0), Some(0.0));
    }

    #[test]
    fn test_isolated_agent_is_undefined() {
        let g = grid(3, 3, 1, 2, &[0, 0, 0, 0, 2, 0, 0, 0, 0]);
        assert_eq!(g.same_race_ratio(1, 1), None);
        assert!(survey(&g, 1, 1, 1).is_some());
    }

    #[test]
    fn test_depth_zero_is_always_undefined() {
        let g = grid(2, 2, 0, 2, &[1, 1, 2, 2]);
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(g.same_race_ratio(row, col), None);
            }
        }
    }

    #[test]
    fn test_empty_and_out_of_bounds_cells() {
        let g = grid(2, 2, 1, 1, &[1, 0, 1, 1]);
        assert!(survey(&g, 0, 1, 1).is_none());
        assert!(survey(&g, 2, 0, 1).is_none());
        assert_eq!(g.same_race_ratio(0, 1), None);
    }

    #[test]
    fn test_wide_grid_uses_row_bound() {
        // 1x5 board; rows must clip against height 1
        let g = grid(5, 1, 2, 2, &[1, 2, 1, 1, 2]);
        let n = survey(&g, 0, 2, 2).unwrap();
        assert_eq!(n.size, 5);
        assert_eq!(g.same_race_ratio(0, 2), Some(2.0 / 4.0));
    }

    #[test]
    fn test_metric_mean_and_degenerate_cases() {
        // Two agents of different races next to each other: both ratios are 0
        let g = grid(2, 1, 1, 2, &[1, 2]);
        assert_eq!(segregation_metric(&g), 0.0);

        // Uniform board: every ratio is 1
        let g = grid(3, 3, 1, 1, &[1; 9]);
        assert_eq!(segregation_metric(&g), 1.0);

        // Empty board
        let g = grid(3, 3, 1, 1, &[0; 9]);
        assert_eq!(segregation_metric(&g), 1.0);

        // Undefined ratios are left out of the mean
        // 1 1 0 0 2
        let g = grid(5, 1, 1, 2, &[1, 1, 0, 0, 2]);
        assert_eq!(segregation_metric(&g), 1.0);

        // 1 2 1 : ratios 0, 0, 0
        let g = grid(3, 1, 1, 2, &[1, 2, 1]);
        assert_eq!(segregation_metric(&g), 0.0);

        // 1 1 2 : ratios 1, 1/2, 0 -> mean 1/2
        let g = grid(3, 1, 1, 2, &[1, 1, 2]);
        assert!((segregation_metric(&g) - 0.5).abs() < 1e-12);
    }
}
