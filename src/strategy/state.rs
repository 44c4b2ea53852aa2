use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::PortfolioTracker;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    /// Flat and entering, or holding and watching exits
    #[default]
    Normal,
    /// Liquidating until no position remains
    Clearing,
}

/// Persisted strategy record
///
/// Every field is required when loading; a partial record is a configuration
/// error rather than something to guess around. The entry fields (`buy_date`,
/// `initial_portfolio_value`) only change together through
/// [`StrategyState::record_entry`] and [`StrategyState::clear_entry`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StrategyState {
    pub status: StrategyStatus,
    pub peak_value: PortfolioTracker,
    #[serde(deserialize_with = "Option::deserialize")]
    buy_date: Option<DateTime<Utc>>,
    initial_portfolio_value: f64,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buy_date(&self) -> Option<DateTime<Utc>> {
        self.buy_date
    }

    pub fn initial_portfolio_value(&self) -> f64 {
        self.initial_portfolio_value
    }

    pub fn record_entry(&mut self, buy_date: DateTime<Utc>, portfolio_value: f64) {
        self.buy_date = Some(buy_date);
        self.initial_portfolio_value = portfolio_value.max(0.0);
    }

    pub fn clear_entry(&mut self) {
        self.buy_date = None;
        self.initial_portfolio_value = 0.0;
    }

    /// Back to a clean `Normal` after a confirmed full liquidation
    pub fn reset_after_liquidation(&mut self) {
        self.status = StrategyStatus::Normal;
        self.peak_value.reset();
        self.clear_entry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = StrategyState::new();
        assert_eq!(state.status, StrategyStatus::Normal);
        assert_eq!(state.peak_value.peak_value(), 0.0);
        assert!(state.buy_date().is_none());
        assert_eq!(state.initial_portfolio_value(), 0.0);
    }

    #[test]
    fn test_entry_fields_move_together() {
        let mut state = StrategyState::new();
        let now = Utc::now();

        state.record_entry(now, 100_000.0);
        assert_eq!(state.buy_date(), Some(now));
        assert_eq!(state.initial_portfolio_value(), 100_000.0);

        state.clear_entry();
        assert!(state.buy_date().is_none());
        assert_eq!(state.initial_portfolio_value(), 0.0);
    }

    #[test]
    fn test_reset_after_liquidation() {
        let mut state = StrategyState::new();
        state.status = StrategyStatus::Clearing;
        state.peak_value.observe(120_000.0);
        state.record_entry(Utc::now(), 100_000.0);

        state.reset_after_liquidation();

        assert_eq!(state, StrategyState::default());
    }

    #[test]
    fn test_json_round_trip_shape() {
        let mut state = StrategyState::new();
        state.peak_value.observe(1500.0);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "normal");
        assert_eq!(json["peak_value"], 1500.0);
        assert!(json["buy_date"].is_null());
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = r#"{"status": "clearing", "peak_value": 10.0, "initial_portfolio_value": 5.0}"#;
        let result: Result<StrategyState, _> = serde_json::from_str(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("buy_date"));
    }

    #[test]
    fn test_explicit_null_buy_date_accepted() {
        let json = r#"{"status": "normal", "peak_value": 0.0, "buy_date": null, "initial_portfolio_value": 0.0}"#;
        let state: StrategyState = serde_json::from_str(json).unwrap();
        assert!(state.buy_date().is_none());
    }
}
