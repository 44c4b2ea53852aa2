use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::indicators::{contraction_ratio, volume_sample, VolumeSample};
use crate::market::PriceWindowStore;
use crate::models::Position;
use crate::settings::StrategyConfig;
use crate::strategy::squeeze::{SqueezeDetector, SqueezeMeasurement, SqueezeReading};

/// Sessions averaged as "past" volume (today is the one after them)
const VOLUME_LOOKBACK: usize = 4;

/// What made the target-met exit fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetTrigger {
    VolumeContraction,
    Squeeze,
    VolumeAndSqueeze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// Mean return reached target and momentum faded
    TargetMet(TargetTrigger),
    /// Held a while, target missed, price pinned near a contracting mean
    Stagnation,
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCondition::TargetMet(TargetTrigger::VolumeContraction) => {
                write!(f, "target met + volume contraction")
            }
            ExitCondition::TargetMet(TargetTrigger::Squeeze) => {
                write!(f, "target met + bollinger squeeze")
            }
            ExitCondition::TargetMet(TargetTrigger::VolumeAndSqueeze) => {
                write!(f, "target met + volume contraction + bollinger squeeze")
            }
            ExitCondition::Stagnation => write!(f, "stagnation near 20-day mean"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Hold,
    Liquidate(ExitCondition),
}

/// Everything the evaluator looked at, for logging
#[derive(Debug, Clone, PartialEq)]
pub struct ExitReport {
    pub hold_days: i64,
    pub mean_return: f64,
    /// Only computed once the return target is met
    pub volume_ratio: Option<f64>,
    /// None when the holding period is too short to consider a squeeze
    pub squeeze: Option<SqueezeReading>,
    /// `(latest - ma20) / ma20` when a squeeze was measured
    pub price_position: Option<f64>,
    pub signal: ExitSignal,
}

impl ExitReport {
    pub fn bandwidth_ratio(&self) -> Option<f64> {
        self.squeeze
            .as_ref()
            .and_then(|s| s.measurement())
            .map(|m| m.bandwidth_ratio)
    }
}

/// Inputs for one post-close evaluation
pub struct ExitInputs<'a> {
    pub now: DateTime<Utc>,
    pub buy_date: Option<DateTime<Utc>>,
    pub initial_portfolio_value: f64,
    pub positions: &'a [Position],
    /// Settled last price per held symbol; missing symbols are excluded
    pub prices: &'a HashMap<String, f64>,
    pub windows: &'a PriceWindowStore,
}

/// Fuses return, volume and squeeze signals into a liquidate decision
#[derive(Debug, Clone)]
pub struct ExitSignalEvaluator {
    target_return: f64,
    volume_contraction_ratio: f64,
    min_hold_days_for_squeeze: i64,
    ma_proximity_band: f64,
    detector: SqueezeDetector,
}

impl ExitSignalEvaluator {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            target_return: config.target_return,
            volume_contraction_ratio: config.volume_contraction_ratio,
            min_hold_days_for_squeeze: config.min_hold_days_for_squeeze,
            ma_proximity_band: config.ma_proximity_band,
            detector: SqueezeDetector::new(config.relative_squeeze_ratio),
        }
    }

    /// Evaluate exit conditions
    ///
    /// Returns None when nothing can be evaluated: no positions, no recorded
    /// entry, or no usable price for any holding.
    pub fn evaluate(&self, inputs: &ExitInputs<'_>) -> Option<ExitReport> {
        if inputs.positions.is_empty() || inputs.initial_portfolio_value <= 0.0 {
            return None;
        }
        let buy_date = inputs.buy_date?;

        let hold_days = (inputs.now - buy_date).num_days();
        let mean_return = mean_unrealized_return(inputs.positions, inputs.prices)?;
        let symbols: Vec<String> = inputs.positions.iter().map(|p| p.symbol.clone()).collect();

        let squeeze = if hold_days >= self.min_hold_days_for_squeeze {
            Some(self.detector.evaluate(inputs.windows, &symbols))
        } else {
            None
        };
        let measured: Option<&SqueezeMeasurement> = squeeze.as_ref().and_then(|s| s.measurement());
        let is_squeeze = measured.map(|m| m.is_squeeze).unwrap_or(false);

        let price_position = measured
            .filter(|m| m.ma20 > 0.0)
            .map(|m| (m.latest_price - m.ma20) / m.ma20);

        let mut volume_ratio = None;
        let mut signal = ExitSignal::Hold;

        if mean_return >= self.target_return {
            volume_ratio = basket_volume_ratio(inputs.windows, &symbols);
            let contracted = volume_ratio
                .map(|ratio| ratio < self.volume_contraction_ratio)
                .unwrap_or(false);

            let trigger = match (contracted, is_squeeze) {
                (true, true) => Some(TargetTrigger::VolumeAndSqueeze),
                (true, false) => Some(TargetTrigger::VolumeContraction),
                (false, true) => Some(TargetTrigger::Squeeze),
                (false, false) => None,
            };

            if let Some(trigger) = trigger {
                signal = ExitSignal::Liquidate(ExitCondition::TargetMet(trigger));
            }
        } else if hold_days >= self.min_hold_days_for_squeeze && is_squeeze {
            if let Some(m) = measured {
                let low = m.ma20 * (1.0 - self.ma_proximity_band);
                let high = m.ma20 * (1.0 + self.ma_proximity_band);
                if m.latest_price > 0.0 && m.latest_price >= low && m.latest_price <= high {
                    signal = ExitSignal::Liquidate(ExitCondition::Stagnation);
                }
            }
        }

        Some(ExitReport {
            hold_days,
            mean_return,
            volume_ratio,
            squeeze,
            price_position,
            signal,
        })
    }
}

impl Default for ExitSignalEvaluator {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

/// Equal-weight mean of per-symbol unrealized return
///
/// Positions without a price or with a non-positive cost basis are skipped.
pub fn mean_unrealized_return(
    positions: &[Position],
    prices: &HashMap<String, f64>,
) -> Option<f64> {
    let returns: Vec<f64> = positions
        .iter()
        .filter(|p| p.avg_cost > 0.0)
        .filter_map(|p| {
            prices
                .get(&p.symbol)
                .map(|&price| (price - p.avg_cost) / p.avg_cost)
        })
        .collect();

    if returns.is_empty() {
        return None;
    }

    Some(returns.iter().sum::<f64>() / returns.len() as f64)
}

/// Today's basket volume over the prior four sessions' average
///
/// Symbols without five settled sessions are left out of both averages.
pub fn basket_volume_ratio(windows: &PriceWindowStore, symbols: &[String]) -> Option<f64> {
    let samples: Vec<VolumeSample> = symbols
        .iter()
        .filter_map(|symbol| {
            windows
                .volumes(symbol, VOLUME_LOOKBACK + 1)
                .ok()
                .and_then(|volumes| volume_sample(&volumes, VOLUME_LOOKBACK))
        })
        .collect();

    contraction_ratio(&samples)
}
