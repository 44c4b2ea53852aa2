use crate::indicators::{calculate_bollinger, mean, rolling_bandwidths};
use crate::market::PriceWindowStore;

/// Closes required per held symbol
pub const SQUEEZE_WINDOW: usize = 40;
/// Bollinger period
pub const BAND_PERIOD: usize = 20;
const NUM_STD: f64 = 2.0;

/// Bandwidth comparison for the portfolio-average price series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqueezeMeasurement {
    pub current_bandwidth: f64,
    pub avg_bandwidth: f64,
    /// `current / avg`, or 1 when the history is flat
    pub bandwidth_ratio: f64,
    /// Mean of the last 20 points
    pub ma20: f64,
    /// Latest portfolio-average price
    pub latest_price: f64,
    pub is_squeeze: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqueezeReading {
    /// At least one symbol lacks a full window (or nothing is held)
    InsufficientData { missing: Vec<String> },
    Measured(SqueezeMeasurement),
}

impl SqueezeReading {
    pub fn is_squeeze(&self) -> bool {
        matches!(self, SqueezeReading::Measured(m) if m.is_squeeze)
    }

    pub fn measurement(&self) -> Option<&SqueezeMeasurement> {
        match self {
            SqueezeReading::Measured(m) => Some(m),
            SqueezeReading::InsufficientData { .. } => None,
        }
    }
}

/// Detects Bollinger-band contraction across the held basket
///
/// The basket is collapsed into one series (equal-weight mean close per day).
/// The bandwidth of its last 20 days is compared with the average bandwidth
/// of the 20 windows starting at offsets 0..19.
#[derive(Debug, Clone, Copy)]
pub struct SqueezeDetector {
    relative_squeeze_ratio: f64,
}

impl SqueezeDetector {
    pub fn new(relative_squeeze_ratio: f64) -> Self {
        Self {
            relative_squeeze_ratio,
        }
    }

    /// Evaluate the basket held in `symbols`
    pub fn evaluate(&self, store: &PriceWindowStore, symbols: &[String]) -> SqueezeReading {
        if symbols.is_empty() {
            return SqueezeReading::InsufficientData {
                missing: Vec::new(),
            };
        }

        let mut windows = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();

        for symbol in symbols {
            match store.closes(symbol, SQUEEZE_WINDOW) {
                Ok(closes) => windows.push(closes),
                Err(e) => {
                    tracing::debug!("Squeeze check without {}: {}", symbol, e);
                    missing.push(symbol.clone());
                }
            }
        }

        if !missing.is_empty() {
            return SqueezeReading::InsufficientData { missing };
        }

        match self.evaluate_series(&portfolio_average_series(&windows)) {
            Some(measurement) => SqueezeReading::Measured(measurement),
            None => SqueezeReading::InsufficientData { missing },
        }
    }

    /// Evaluate a 40-point average price series
    pub fn evaluate_series(&self, avg_prices: &[f64]) -> Option<SqueezeMeasurement> {
        if avg_prices.len() != SQUEEZE_WINDOW {
            return None;
        }

        let current = calculate_bollinger(avg_prices, BAND_PERIOD, NUM_STD)?;
        let current_bandwidth = current.bandwidth();

        let history = rolling_bandwidths(avg_prices, BAND_PERIOD, BAND_PERIOD, NUM_STD)?;
        let avg_bandwidth = mean(&history)?;

        let (bandwidth_ratio, is_squeeze) = if avg_bandwidth > 0.0 {
            (
                current_bandwidth / avg_bandwidth,
                current_bandwidth < avg_bandwidth * self.relative_squeeze_ratio,
            )
        } else {
            (1.0, false)
        };

        if is_squeeze {
            tracing::debug!(
                "Bollinger squeeze: current width {:.4}, historical {:.4}, ratio {:.2}%",
                current_bandwidth,
                avg_bandwidth,
                bandwidth_ratio * 100.0
            );
        }

        Some(SqueezeMeasurement {
            current_bandwidth,
            avg_bandwidth,
            bandwidth_ratio,
            ma20: current.middle,
            latest_price: avg_prices[SQUEEZE_WINDOW - 1],
            is_squeeze,
        })
    }
}

impl Default for SqueezeDetector {
    fn default() -> Self {
        Self::new(0.7)
    }
}

/// Per-day equal-weight mean across equally long close windows
pub fn portfolio_average_series(windows: &[Vec<f64>]) -> Vec<f64> {
    let len = windows.iter().map(|w| w.len()).min().unwrap_or(0);
    if windows.is_empty() {
        return Vec::new();
    }

    (0..len)
        .map(|day| windows.iter().map(|w| w[day]).sum::<f64>() / windows.len() as f64)
        .collect()
}
