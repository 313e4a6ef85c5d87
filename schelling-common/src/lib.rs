pub mod config;
pub mod error;
pub mod report;
pub mod sim_params;

// Re-export key types for easier use by dependent crates
pub use config::{EngineConfig, ExperimentConfig, OutputConfig, UpdateMode};
pub use error::{Result, SchellingError};
pub use report::{threshold_fraction, ExperimentMatrix, SweepReport, ThresholdStats, THRESHOLD_STEPS};
pub use sim_params::{SimulationConfig, RANDOM_RATIO_TOLERANCE, RATIO_TOLERANCE};
