//! Schelling segregation model: grid population, neighbourhood happiness,
//! relocation rounds and the similarity-threshold sweep.

pub mod experiment;
pub mod grid;
pub mod neighbourhood;
pub mod output;
pub mod population;
pub mod ratios;
pub mod relocation;
pub mod round;

pub use experiment::{ExperimentDriver, SweepMode};
pub use grid::{Grid, Race, Window, EMPTY};
pub use neighbourhood::{segregation_metric, survey, Neighbourhood};
pub use population::{populate, populate_with_tolerance};
pub use ratios::{random_ratios, RandomRatios};
pub use relocation::{relocate, Vacancies};
pub use round::{EngineState, RoundEngine, RoundOutcome, RunSummary};
