use serde::{Deserialize, Serialize};

/// Peak-to-current drawdown tracking for the whole portfolio
///
/// Persisted as a bare number (`peak_value`) inside the strategy state.
/// Feed it settled post-close valuations only: intraday values still carry
/// unfilled orders.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PortfolioTracker {
    peak_value: f64,
}

impl PortfolioTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peak(peak_value: f64) -> Self {
        Self {
            peak_value: peak_value.max(0.0),
        }
    }

    pub fn peak_value(&self) -> f64 {
        self.peak_value
    }

    /// Record a valuation and return the resulting drawdown
    pub fn observe(&mut self, current_value: f64) -> f64 {
        if current_value > self.peak_value {
            self.peak_value = current_value;
        }

        self.drawdown(current_value)
    }

    /// Fractional decline from peak, without updating it
    ///
    /// Zero while no peak has been recorded.
    pub fn drawdown(&self, current_value: f64) -> f64 {
        if self.peak_value > 0.0 {
            (self.peak_value - current_value) / self.peak_value
        } else {
            0.0
        }
    }

    /// Forget the peak (only after a confirmed full liquidation)
    pub fn reset(&mut self) {
        self.peak_value = 0.0;
    }
}

/// Portfolio-level stop-loss
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrawdownStop {
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLossTrip {
    pub drawdown: f64,
    pub threshold: f64,
}

impl DrawdownStop {
    pub fn new(max_drawdown: f64) -> Self {
        Self { max_drawdown }
    }

    /// Trips when drawdown reaches the threshold (inclusive)
    pub fn check(&self, drawdown: f64) -> Result<(), StopLossTrip> {
        if drawdown >= self.max_drawdown {
            return Err(StopLossTrip {
                drawdown,
                threshold: self.max_drawdown,
            });
        }

        Ok(())
    }
}

impl Default for DrawdownStop {
    fn default() -> Self {
        Self { max_drawdown: 0.10 }
    }
}
