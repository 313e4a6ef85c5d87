use crate::grid::{Grid, Race, EMPTY};
use crate::neighbourhood::segregation_metric;
use crate::population::populate_with_tolerance;
use crate::relocation::Vacancies;
use log::trace;
use rand::rngs::StdRng;
use schelling_common::{Result, SimulationConfig, UpdateMode, RATIO_TOLERANCE};

/// Lifecycle of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Configured, no round executed yet.
    Idle,
    Running,
    /// The last sweep found no unhappy agent.
    Converged,
    /// The iteration cap was reached without convergence.
    CappedOut,
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// True iff the sweep found zero unhappy agents.
    pub converged: bool,
    pub unhappy: usize,
    pub relocations: usize,
}

/// Result of [`RoundEngine::run_to_convergence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Rounds executed by this call.
    pub rounds: usize,
    pub converged: bool,
    pub state: EngineState,
}

/// Runs sweeps of happiness evaluation and relocation over a grid it owns.
///
/// In [`UpdateMode::InPlace`] the scan is row-major and every move is applied
/// immediately, so a cell evaluated later in a sweep sees the moves made
/// earlier in that sweep (an agent that moved ahead of the cursor is
/// evaluated again). [`UpdateMode::Snapshot`] judges every agent against a
/// frozen copy of the grid first and applies the moves afterwards, still in
/// row-major order.
pub struct RoundEngine {
    grid: Grid,
    vacancies: Vacancies,
    update_mode: UpdateMode,
    rng: StdRng,
    state: EngineState,
    rounds_run: usize,
}

impl RoundEngine {
    /// Populates a fresh grid from `config` using `rng`, which the engine then
    /// keeps for relocation.
    pub fn new(config: &SimulationConfig, update_mode: UpdateMode, rng: StdRng) -> Result<Self> {
        Self::with_tolerance(config, RATIO_TOLERANCE, update_mode, rng)
    }

    /// Like [`RoundEngine::new`], accepting a ratio sum within `tolerance` of 1.
    pub fn with_tolerance(
        config: &SimulationConfig,
        tolerance: f64,
        update_mode: UpdateMode,
        mut rng: StdRng,
    ) -> Result<Self> {
        let grid = populate_with_tolerance(config, tolerance, &mut rng)?;
        Ok(Self::from_grid(grid, update_mode, rng))
    }

    /// Takes over an existing grid.
    pub fn from_grid(grid: Grid, update_mode: UpdateMode, rng: StdRng) -> Self {
        RoundEngine {
            vacancies: Vacancies::new(&grid),
            grid,
            update_mode,
            rng,
            state: EngineState::Idle,
            rounds_run: 0,
        }
    }

    /// Discards the current grid and builds a new one from `config`.
    pub fn configure(&mut self, config: &SimulationConfig) -> Result<()> {
        self.grid = populate_with_tolerance(config, RATIO_TOLERANCE, &mut self.rng)?;
        self.vacancies = Vacancies::new(&self.grid);
        self.state = EngineState::Idle;
        self.rounds_run = 0;
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// Rounds executed since the grid was built.
    pub fn rounds_run(&self) -> usize {
        self.rounds_run
    }

    /// Segregation metric of the current grid.
    pub fn segregation(&self) -> f64 {
        segregation_metric(&self.grid)
    }

    /// Performs one sweep over every cell. An occupied cell whose defined
    /// same-race ratio is below the similarity threshold is unhappy and is
    /// relocated; an undefined ratio counts as satisfied.
    pub fn run_round(&mut self) -> RoundOutcome {
        self.state = EngineState::Running;
        let outcome = match self.update_mode {
            UpdateMode::InPlace => self.sweep_in_place(),
            UpdateMode::Snapshot => self.sweep_snapshot(),
        };
        self.rounds_run += 1;
        if outcome.converged {
            self.state = EngineState::Converged;
        }
        trace!(
            "Round {}: {} unhappy, {} relocated",
            self.rounds_run,
            outcome.unhappy,
            outcome.relocations
        );
        outcome
    }

    fn sweep_in_place(&mut self) -> RoundOutcome {
        let threshold = self.grid.config().similarity_threshold;
        let (height, width) = (self.grid.height(), self.grid.width());
        let mut unhappy = 0;
        let mut relocations = 0;

        for row in 0..height {
            for col in 0..width {
                let race = self.grid.cells()[row * width + col];
                if race == EMPTY {
                    continue;
                }
                if let Some(ratio) = self.grid.same_race_ratio(row, col) {
                    if ratio < threshold {
                        unhappy += 1;
                        if self.vacancies.relocate(&mut self.grid, row, col, race, &mut self.rng) {
                            relocations += 1;
                        }
                    }
                }
            }
        }

        RoundOutcome {
            converged: unhappy == 0,
            unhappy,
            relocations,
        }
    }

    fn sweep_snapshot(&mut self) -> RoundOutcome {
        let threshold = self.grid.config().similarity_threshold;
        let width = self.grid.width();

        // Judge everyone against the grid as it was at the start of the sweep
        let movers: Vec<(usize, usize, Race)> = self
            .grid
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, &race)| race != EMPTY)
            .filter_map(|(idx, &race)| {
                let (row, col) = (idx / width, idx % width);
                let ratio = self.grid.same_race_ratio(row, col)?;
                (ratio < threshold).then_some((row, col, race))
            })
            .collect();

        // Only empty cells are written to, so every mover is still at its origin
        let mut relocations = 0;
        for &(row, col, race) in &movers {
            if self.vacancies.relocate(&mut self.grid, row, col, race, &mut self.rng) {
                relocations += 1;
            }
        }

        RoundOutcome {
            converged: movers.is_empty(),
            unhappy: movers.len(),
            relocations,
        }
    }

    /// Runs sweeps until one converges or `max_iterations` sweeps have been run
    /// by this call. The cap belongs to the caller, not to the engine.
    ///
    /// This is one round fewer than the historical `while not run_round() and
    /// n < maxiterations` loop, which also ran a round with a cap of 0.
    pub fn run_to_convergence(&mut self, max_iterations: usize) -> RunSummary {
        let mut rounds = 0;
        let mut converged = false;
        while rounds < max_iterations {
            rounds += 1;
            if self.run_round().converged {
                converged = true;
                break;
            }
        }
        if !converged && rounds > 0 {
            self.state = EngineState::CappedOut;
        }
        trace!(
            "Run finished after {} rounds (converged: {}, state: {:?})",
            rounds, converged, self.state
        );
        RunSummary {
            rounds,
            converged,
            state: self.state,
        }
    }
}
