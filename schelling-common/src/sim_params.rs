use serde::{Deserialize, Serialize};

use crate::error::{Result, SchellingError};

/// Allowed drift of `empty_ratio + sum(race_ratios)` away from 1 for user supplied ratios.
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// Looser bound used for generated ratios, whose two-decimal rounding can leave the sum slightly off 1.
pub const RANDOM_RATIO_TOLERANCE: f64 = 1e-2;

/// Parameters of a single simulation run. A grid is always rebuilt from one of these;
/// there is no incremental update of an existing grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    /// Chebyshev radius of the neighbourhood window.
    pub neighbour_depth: usize,
    /// Minimum fraction of same-race neighbours an agent needs to stay put.
    pub similarity_threshold: f64,
    pub empty_ratio: f64,
    /// Ratio of race `r` is stored at index `r - 1`.
    pub race_ratios: Vec<f64>,
}

impl SimulationConfig {
    pub fn race_count(&self) -> usize {
        self.race_ratios.len()
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// `empty_ratio + sum(race_ratios)`.
    pub fn ratio_sum(&self) -> f64 {
        self.empty_ratio + self.race_ratios.iter().sum::<f64>()
    }

    /// Same configuration with another similarity threshold.
    pub fn with_threshold(&self, similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            ..self.clone()
        }
    }

    /// Same configuration with another population distribution.
    pub fn with_ratios(&self, empty_ratio: f64, race_ratios: Vec<f64>) -> Self {
        Self {
            empty_ratio,
            race_ratios,
            ..self.clone()
        }
    }

    /// Validates against the strict [`RATIO_TOLERANCE`].
    pub fn validate(&self) -> Result<()> {
        self.validate_with_tolerance(RATIO_TOLERANCE)
    }

    pub fn validate_with_tolerance(&self, tolerance: f64) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SchellingError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width.checked_mul(self.height).is_none() {
            return Err(SchellingError::Config(format!(
                "grid of {}x{} cells is too large",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SchellingError::Config(format!(
                "similarity threshold must lie in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.race_ratios.is_empty() {
            return Err(SchellingError::Config("at least one race ratio is required".into()));
        }
        check_ratio("empty ratio", self.empty_ratio)?;
        for (idx, ratio) in self.race_ratios.iter().enumerate() {
            check_ratio(&format!("ratio of race {}", idx + 1), *ratio)?;
        }

        let sum = self.ratio_sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(SchellingError::Validation(format!(
                "empty ratio {} and race ratios {:?} sum to {}, expected 1 (tolerance {:e})",
                self.empty_ratio, self.race_ratios, sum, tolerance
            )));
        }
        Ok(())
    }
}

fn check_ratio(name: &str, value: f64) -> Result<()> {
    // NaN fails the range check as well
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SchellingError::Config(format!("{} must lie in [0, 1], got {}", name, value)))
    }
}
