use serde::{Deserialize, Serialize};

use crate::error::{Result, SchellingError};

/// Number of similarity thresholds swept: 1%, 2%, ..., 100%.
pub const THRESHOLD_STEPS: usize = 100;

/// Segregation metric of every (threshold, simulation) pair of a sweep.
/// Row `t - 1` holds the runs at threshold `t / 100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMatrix {
    simulations: usize,
    values: Vec<f64>, // row-major, THRESHOLD_STEPS x simulations
}

impl ExperimentMatrix {
    /// Zero-filled matrix for `simulations` runs per threshold.
    pub fn new(simulations: usize) -> Self {
        ExperimentMatrix {
            simulations,
            values: vec![0.0; THRESHOLD_STEPS * simulations],
        }
    }

    /// Builds a matrix from row-major values, `THRESHOLD_STEPS * simulations` of them.
    pub fn from_values(simulations: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != THRESHOLD_STEPS * simulations {
            return Err(SchellingError::Config(format!(
                "expected {} matrix values for {} simulations, got {}",
                THRESHOLD_STEPS * simulations,
                simulations,
                values.len()
            )));
        }
        Ok(ExperimentMatrix { simulations, values })
    }

    pub fn rows(&self) -> usize {
        THRESHOLD_STEPS
    }

    pub fn simulations(&self) -> usize {
        self.simulations
    }

    fn offset(&self, threshold_percent: usize, simulation: usize) -> Option<usize> {
        if (1..=THRESHOLD_STEPS).contains(&threshold_percent) && simulation < self.simulations {
            Some((threshold_percent - 1) * self.simulations + simulation)
        } else {
            None
        }
    }

    /// Metric of run `simulation` at threshold `threshold_percent / 100`.
    pub fn get(&self, threshold_percent: usize, simulation: usize) -> Option<f64> {
        self.offset(threshold_percent, simulation).map(|idx| self.values[idx])
    }

    pub fn get_mut(&mut self, threshold_percent: usize, simulation: usize) -> Option<&mut f64> {
        self.offset(threshold_percent, simulation)
            .map(move |idx| &mut self.values[idx])
    }

    /// All runs at one threshold. Empty for an out-of-range threshold.
    pub fn row(&self, threshold_percent: usize) -> &[f64] {
        if !(1..=THRESHOLD_STEPS).contains(&threshold_percent) {
            return &[];
        }
        let start = (threshold_percent - 1) * self.simulations;
        &self.values[start..start + self.simulations]
    }

    /// Reduces along the simulation axis.
    pub fn stats(&self) -> ThresholdStats {
        let mut stats = ThresholdStats {
            min: Vec::with_capacity(THRESHOLD_STEPS),
            mean: Vec::with_capacity(THRESHOLD_STEPS),
            max: Vec::with_capacity(THRESHOLD_STEPS),
        };
        for threshold_percent in 1..=THRESHOLD_STEPS {
            let row = self.row(threshold_percent);
            if row.is_empty() {
                stats.min.push(0.0);
                stats.mean.push(0.0);
                stats.max.push(0.0);
                continue;
            }
            stats.min.push(row.iter().copied().fold(f64::INFINITY, f64::min));
            stats.mean.push(row.iter().sum::<f64>() / self.simulations as f64);
            stats.max.push(row.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        }
        stats
    }
}

/// Per-threshold minimum, mean and maximum of the segregation metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdStats {
    pub min: Vec<f64>,
    pub mean: Vec<f64>,
    pub max: Vec<f64>,
}

impl ThresholdStats {
    /// `(threshold, min, mean, max)` rows, threshold as a fraction.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
        self.min
            .iter()
            .zip(&self.mean)
            .zip(&self.max)
            .enumerate()
            .map(|(idx, ((min, mean), max))| (threshold_fraction(idx), *min, *mean, *max))
    }
}

/// Similarity threshold of matrix row `idx`.
pub fn threshold_fraction(idx: usize) -> f64 {
    (idx + 1) as f64 / 100.0
}

/// Everything a sweep produces, as written to disk and read back by the visualizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub seed: u64,
    pub random: bool,
    pub simulations: usize,
    pub max_iterations: usize,
    pub width: usize,
    pub height: usize,
    pub neighbour_depth: usize,
    pub matrix: ExperimentMatrix,
    pub stats: ThresholdStats,
}
