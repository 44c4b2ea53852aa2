// Technical indicators module
// Implements Bollinger bandwidth and volume contraction

pub mod bollinger;
pub mod moving_average;
pub mod volume;

pub use bollinger::{bands_for_window, calculate_bollinger, rolling_bandwidths, BollingerBands};
pub use moving_average::{mean, population_std};
pub use volume::{contraction_ratio, volume_sample, VolumeSample};
