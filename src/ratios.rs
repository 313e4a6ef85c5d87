use log::warn;
use rand::Rng;

/// Smallest and largest race count picked when the configuration leaves it open.
pub const MIN_RANDOM_RACES: usize = 2;
pub const MAX_RANDOM_RACES: usize = 5;

/// A randomly drawn population distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomRatios {
    pub empty_ratio: f64,
    pub race_ratios: Vec<f64>,
}

impl RandomRatios {
    pub fn sum(&self) -> f64 {
        self.empty_ratio + self.race_ratios.iter().sum::<f64>()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Draws the empty ratio uniformly from [0, 1], then each race ratio uniformly
/// from what is left, all rounded to two decimals. The last race takes the
/// remainder so the ratios sum to 1 up to rounding.
///
/// `number_races` of `None` picks a count in
/// [`MIN_RANDOM_RACES`]..=[`MAX_RANDOM_RACES`].
pub fn random_ratios<R: Rng + ?Sized>(number_races: Option<usize>, rng: &mut R) -> RandomRatios {
    let races = number_races
        .unwrap_or_else(|| rng.random_range(MIN_RANDOM_RACES..=MAX_RANDOM_RACES))
        .max(1);

    let empty_ratio = round2(rng.random_range(0.0..=1.0));
    let mut cumulative = empty_ratio;
    let mut race_ratios = Vec::with_capacity(races);
    for _ in 1..races {
        let remaining = (1.0 - cumulative).max(0.0);
        let ratio = round2(rng.random_range(0.0..=remaining));
        cumulative += ratio;
        race_ratios.push(ratio);
    }

    let mut last = 1.0 - cumulative;
    if last < 0.0 {
        // Rounding pushed the earlier draws past 1
        warn!("Random ratios overshoot by {:.4}; last race gets 0.", -last);
        last = 0.0;
    }
    race_ratios.push(last);

    RandomRatios {
        empty_ratio,
        race_ratios,
    }
}
