/// Bollinger band calculations
///
/// Bands sit at mean ± `num_std` population standard deviations over a window.
/// Bandwidth here is the absolute `upper - lower`, not normalised by the mean.

use super::moving_average::{mean, population_std};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn bandwidth(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Bands over an entire window
///
/// Returns None for windows shorter than two points.
pub fn bands_for_window(window: &[f64], num_std: f64) -> Option<BollingerBands> {
    if window.len() < 2 {
        return None;
    }

    let middle = mean(window)?;
    let std = population_std(window)?;

    Some(BollingerBands {
        middle,
        upper: middle + num_std * std,
        lower: middle - num_std * std,
    })
}

/// Bands over the last `period` prices
pub fn calculate_bollinger(prices: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if prices.len() < period {
        return None;
    }

    bands_for_window(&prices[prices.len() - period..], num_std)
}

/// Bandwidth of every full `period`-length window starting at offsets `0..count`
///
/// Returns None if the series cannot supply `count` windows.
pub fn rolling_bandwidths(
    prices: &[f64],
    period: usize,
    count: usize,
    num_std: f64,
) -> Option<Vec<f64>> {
    if period == 0 || prices.len() < period + count.saturating_sub(1) {
        return None;
    }

    prices
        .windows(period)
        .take(count)
        .map(|window| bands_for_window(window, num_std).map(|b| b.bandwidth()))
        .collect()
}
