use crate::grid::{Grid, Race};
use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use schelling_common::{Result, SchellingError, SimulationConfig, RATIO_TOLERANCE};

/// Builds a grid whose cells are drawn independently from
/// `{0: empty_ratio, 1: race_ratios[0], ..., R: race_ratios[R-1]}`, laid out row-major.
pub fn populate<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> Result<Grid> {
    populate_with_tolerance(config, RATIO_TOLERANCE, rng)
}

/// Like [`populate`], accepting a ratio sum within `tolerance` of 1.
/// Generated distributions use a looser tolerance than user supplied ones.
pub fn populate_with_tolerance<R: Rng + ?Sized>(
    config: &SimulationConfig,
    tolerance: f64,
    rng: &mut R,
) -> Result<Grid> {
    config.validate_with_tolerance(tolerance)?;

    let weights: Vec<f64> = std::iter::once(config.empty_ratio)
        .chain(config.race_ratios.iter().copied())
        .collect();
    let distribution = WeightedIndex::<f64>::new(&weights).map_err(|e| {
        SchellingError::Config(format!("invalid population distribution {:?}: {}", weights, e))
    })?;

    let cells: Vec<Race> = (0..config.cell_count())
        .map(|_| distribution.sample(rng) as Race)
        .collect();

    let grid = Grid::from_cells(config.clone(), cells)?;
    debug!(
        "Populated {}x{} grid: {} occupied, census {:?}",
        grid.width(),
        grid.height(),
        grid.occupied_count(),
        grid.census()
    );
    Ok(grid)
}
