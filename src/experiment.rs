//! Threshold sweep: for every similarity threshold from 1% to 100%, run a
//! number of independent simulations to convergence (or the iteration cap)
//! and record the segregation metric of each final grid.

use crate::ratios::random_ratios;
use crate::round::RoundEngine;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use schelling_common::{
    ExperimentConfig, ExperimentMatrix, Result, SchellingError, SimulationConfig, SweepReport,
    UpdateMode, RANDOM_RATIO_TOLERANCE, RATIO_TOLERANCE, THRESHOLD_STEPS,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Where the population distribution of each simulation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Every simulation uses the configured ratios.
    FixedRatio,
    /// Ratios are redrawn before every simulation.
    RandomRatio { number_races: Option<usize> },
}

/// Runs the threshold sweep. Each (threshold, simulation) unit owns an RNG
/// seeded with `seed + unit index`, so sequential and parallel sweeps give the
/// same matrix.
#[derive(Debug, Clone)]
pub struct ExperimentDriver {
    template: SimulationConfig,
    mode: SweepMode,
    simulations: usize,
    max_iterations: usize,
    update_mode: UpdateMode,
    parallel: bool,
    seed: u64,
}

impl ExperimentDriver {
    /// `template` supplies the geometry, and in fixed mode the ratios; its
    /// threshold is replaced at every sweep step.
    pub fn new(
        template: SimulationConfig,
        mode: SweepMode,
        simulations: usize,
        max_iterations: usize,
        seed: u64,
    ) -> Result<Self> {
        if simulations == 0 {
            return Err(SchellingError::Config("at least one simulation per threshold is required".into()));
        }
        match mode {
            SweepMode::FixedRatio => template.validate()?,
            SweepMode::RandomRatio { number_races } => {
                if number_races == Some(0) {
                    return Err(SchellingError::Config("numberraces must be greater than 0".into()));
                }
                template.with_ratios(0.0, vec![1.0]).validate()?;
            }
        }
        Ok(ExperimentDriver {
            template,
            mode,
            simulations,
            max_iterations,
            update_mode: UpdateMode::default(),
            parallel: false,
            seed,
        })
    }

    /// Builds a driver from a loaded configuration. A missing seed is drawn
    /// from OS entropy.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        let seed = config.engine.seed.unwrap_or_else(rand::random);
        let (template, mode) = if config.random {
            (
                config.simulation_with_ratios(0.0, 0.0, vec![1.0]),
                SweepMode::RandomRatio { number_races: config.numberraces },
            )
        } else {
            (config.base_simulation(0.0)?, SweepMode::FixedRatio)
        };
        Ok(Self::new(template, mode, config.nsimulations, config.maxniterations, seed)?
            .with_update_mode(config.engine.update_mode)
            .with_parallel(config.engine.parallel))
    }

    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn mode(&self) -> SweepMode {
        self.mode
    }

    pub fn simulations(&self) -> usize {
        self.simulations
    }

    /// Total number of simulations in a sweep.
    pub fn total_units(&self) -> usize {
        THRESHOLD_STEPS * self.simulations
    }

    /// Runs the full sweep.
    pub fn run(&self) -> Result<ExperimentMatrix> {
        self.run_with_progress(&|_| {})
    }

    /// Runs the full sweep, calling `progress` with the number of finished
    /// simulations after each one.
    pub fn run_with_progress(&self, progress: &(dyn Fn(usize) + Sync)) -> Result<ExperimentMatrix> {
        info!(
            "Sweeping {} thresholds x {} simulations ({:?}, {:?}, seed {}, {})",
            THRESHOLD_STEPS,
            self.simulations,
            self.mode,
            self.update_mode,
            self.seed,
            if self.parallel { "parallel" } else { "sequential" }
        );
        let finished = AtomicUsize::new(0);
        let run_unit = |unit: usize| -> Result<f64> {
            let metric = self.simulate(unit)?;
            progress(finished.fetch_add(1, Ordering::Relaxed) + 1);
            Ok(metric)
        };

        let values: Vec<f64> = if self.parallel {
            (0..self.total_units())
                .into_par_iter()
                .map(run_unit)
                .collect::<Result<Vec<f64>>>()?
        } else {
            let mut values = Vec::with_capacity(self.total_units());
            for threshold_percent in 1..=THRESHOLD_STEPS {
                for simulation in 0..self.simulations {
                    values.push(run_unit(self.unit_index(threshold_percent, simulation))?);
                }
                debug!("Threshold {}% done", threshold_percent);
            }
            values
        };

        ExperimentMatrix::from_values(self.simulations, values)
    }

    fn unit_index(&self, threshold_percent: usize, simulation: usize) -> usize {
        (threshold_percent - 1) * self.simulations + simulation
    }

    fn check_unit(&self, threshold_percent: usize, simulation: usize) -> Result<usize> {
        if !(1..=THRESHOLD_STEPS).contains(&threshold_percent) || simulation >= self.simulations {
            return Err(SchellingError::Config(format!(
                "no simulation {} at threshold {}%",
                simulation, threshold_percent
            )));
        }
        Ok(self.unit_index(threshold_percent, simulation))
    }

    /// Runs one simulation of the sweep and returns its segregation metric.
    pub fn simulate_at(&self, threshold_percent: usize, simulation: usize) -> Result<f64> {
        self.simulate(self.check_unit(threshold_percent, simulation)?)
    }

    /// Parameters the sweep uses for one simulation, random ratios included.
    pub fn simulation_config(&self, threshold_percent: usize, simulation: usize) -> Result<SimulationConfig> {
        let (config, _, _) = self.unit_setup(self.check_unit(threshold_percent, simulation)?);
        Ok(config)
    }

    /// Configuration, ratio tolerance and RNG of one unit. The RNG has already
    /// drawn the random ratios, if any, and goes on to populate and relocate.
    fn unit_setup(&self, unit: usize) -> (SimulationConfig, f64, StdRng) {
        let threshold_percent = unit / self.simulations + 1;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(unit as u64));
        let config = self.template.with_threshold(threshold_percent as f64 / 100.0);

        match self.mode {
            SweepMode::FixedRatio => (config, RATIO_TOLERANCE, rng),
            SweepMode::RandomRatio { number_races } => {
                let ratios = random_ratios(number_races, &mut rng);
                (
                    config.with_ratios(ratios.empty_ratio, ratios.race_ratios),
                    RANDOM_RATIO_TOLERANCE,
                    rng,
                )
            }
        }
    }

    fn simulate(&self, unit: usize) -> Result<f64> {
        let threshold_percent = unit / self.simulations + 1;
        let (config, tolerance, rng) = self.unit_setup(unit);

        let mut engine = RoundEngine::with_tolerance(&config, tolerance, self.update_mode, rng)?;
        let summary = engine.run_to_convergence(self.max_iterations);
        let metric = engine.segregation();
        trace!(
            "Unit {} (threshold {}%): {} rounds, converged {}, metric {:.4}",
            unit,
            threshold_percent,
            summary.rounds,
            summary.converged,
            metric
        );
        Ok(metric)
    }

    /// Packs a finished matrix with the sweep parameters.
    pub fn report(&self, matrix: ExperimentMatrix) -> SweepReport {
        let stats = matrix.stats();
        SweepReport {
            seed: self.seed,
            random: matches!(self.mode, SweepMode::RandomRatio { .. }),
            simulations: self.simulations,
            max_iterations: self.max_iterations,
            width: self.template.width,
            height: self.template.height,
            neighbour_depth: self.template.neighbour_depth,
            matrix,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(empty_ratio: f64, race_ratios: Vec<f64>) -> SimulationConfig {
        SimulationConfig {
            width: 4,
            height: 4,
            neighbour_depth: 1,
            similarity_threshold: 0.0,
            empty_ratio,
            race_ratios,
        }
    }

    #[test]
    fn test_rejects_bad_setup() {
        assert!(ExperimentDriver::new(template(0.5, vec![0.5]), SweepMode::FixedRatio, 0, 5, 1).is_err());
        assert!(matches!(
            ExperimentDriver::new(template(0.5, vec![0.49]), SweepMode::FixedRatio, 1, 5, 1),
            Err(SchellingError::Validation(_))
        ));
        // Random mode does not care about the template ratios
        assert!(ExperimentDriver::new(
            template(0.5, vec![0.49]),
            SweepMode::RandomRatio { number_races: None },
            1,
            5,
            1
        )
        .is_ok());
        assert!(ExperimentDriver::new(
            template(0.5, vec![0.5]),
            SweepMode::RandomRatio { number_races: Some(0) },
            1,
            5,
            1
        )
        .is_err());
    }

    #[test]
    fn test_simulate_at_is_replayable() {
        let driver =
            ExperimentDriver::new(template(0.3, vec![0.35, 0.35]), SweepMode::FixedRatio, 2, 20, 9).unwrap();
        let a = driver.simulate_at(40, 1).unwrap();
        let b = driver.simulate_at(40, 1).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
        assert!(driver.simulate_at(0, 0).is_err());
        assert!(driver.simulate_at(101, 0).is_err());
        assert!(driver.simulate_at(1, 2).is_err());
    }

    #[test]
    fn test_empty_board_scores_one_everywhere() {
        let driver = ExperimentDriver::new(template(1.0, vec![0.0]), SweepMode::FixedRatio, 2, 10, 3).unwrap();
        let matrix = driver.run().unwrap();
        for t in 1..=THRESHOLD_STEPS {
            assert_eq!(matrix.row(t), &[1.0, 1.0]);
        }
    }

    #[test]
    fn test_progress_counts_every_unit() {
        let driver = ExperimentDriver::new(template(0.5, vec![0.5]), SweepMode::FixedRatio, 1, 2, 3).unwrap();
        let last = AtomicUsize::new(0);
        driver
            .run_with_progress(&|done| {
                last.fetch_max(done, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(last.load(Ordering::Relaxed), driver.total_units());
    }

    #[test]
    fn test_report_carries_stats() {
        let driver = ExperimentDriver::new(template(0.5, vec![0.5]), SweepMode::FixedRatio, 1, 2, 3).unwrap();
        let matrix = driver.run().unwrap();
        let report = driver.report(matrix.clone());
        assert_eq!(report.stats, matrix.stats());
        assert_eq!(report.seed, 3);
        assert!(!report.random);
        assert_eq!((report.width, report.height), (4, 4));
    }
}
