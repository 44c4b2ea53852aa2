use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::risk::PortfolioTracker;
use crate::strategy::EngineEvent;

/// End-of-day valuation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Summary of a paper session run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub trading_days: usize,
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,
    pub total_return_pct: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    // Strategy activity
    pub rotations: usize,
    pub stop_losses: usize,
    pub exit_signals: usize,
    pub liquidations: usize,
    pub orders_placed: usize,

    pub equity_curve: Vec<EquityPoint>,
}

impl RunMetrics {
    /// Calculate metrics from the daily equity curve and engine events
    pub fn from_run(
        initial_portfolio_value: f64,
        equity_curve: Vec<EquityPoint>,
        events: &[EngineEvent],
        orders_placed: usize,
    ) -> Self {
        let final_portfolio_value = equity_curve
            .last()
            .map(|p| p.value)
            .unwrap_or(initial_portfolio_value);

        let total_return_pct = if initial_portfolio_value > 0.0 {
            ((final_portfolio_value - initial_portfolio_value) / initial_portfolio_value) * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(&equity_curve, initial_portfolio_value);

        let count = |pred: fn(&EngineEvent) -> bool| events.iter().filter(|e| pred(e)).count();

        Self {
            trading_days: equity_curve.len(),
            initial_portfolio_value,
            final_portfolio_value,
            total_return_pct,
            max_drawdown,
            max_drawdown_pct,
            rotations: count(|e| matches!(e, EngineEvent::Entered { .. })),
            stop_losses: count(|e| matches!(e, EngineEvent::StopLoss { .. })),
            exit_signals: count(|e| matches!(e, EngineEvent::ExitSignal(_))),
            liquidations: count(|e| matches!(e, EngineEvent::Liquidated)),
            orders_placed,
            equity_curve,
        }
    }

    /// Deepest peak-to-trough decline of the equity curve
    ///
    /// The curve is folded through the same tracker the engine uses, so the
    /// deepest point is the largest fractional drawdown. Returns the absolute
    /// decline at that point and the fraction as a percentage.
    fn calculate_drawdown(curve: &[EquityPoint], initial_value: f64) -> (f64, f64) {
        let mut tracker = PortfolioTracker::with_peak(initial_value);
        let mut max_dd = 0.0;
        let mut max_dd_frac = 0.0;

        for point in curve {
            let drawdown = tracker.observe(point.value);
            if drawdown > max_dd_frac {
                max_dd_frac = drawdown;
                max_dd = tracker.peak_value() - point.value;
            }
        }

        (max_dd, max_dd_frac * 100.0)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              PAPER SESSION REPORT                     ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 Portfolio");
        println!("  Trading days:      {}", self.trading_days);
        println!("  Initial value:     {:.2}", self.initial_portfolio_value);
        println!("  Final value:       {:.2}", self.final_portfolio_value);
        println!("  Total return:      {:+.2}%", self.total_return_pct);
        println!(
            "  Max drawdown:      {:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );

        println!("\n🔄 Activity");
        println!("  Rotations:         {}", self.rotations);
        println!("  Exit signals:      {}", self.exit_signals);
        println!("  Stop-losses:       {}", self.stop_losses);
        println!("  Liquidations:      {}", self.liquidations);
        println!("  Orders placed:     {}", self.orders_placed);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ExitCondition;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| EquityPoint {
                date: start + chrono::Duration::days(i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn test_return_and_drawdown() {
        let metrics = RunMetrics::from_run(
            100_000.0,
            curve(&[110_000.0, 99_000.0, 120_000.0, 114_000.0]),
            &[],
            0,
        );

        assert!((metrics.total_return_pct - 14.0).abs() < 1e-9);
        assert!((metrics.max_drawdown - 11_000.0).abs() < 1e-9);
        assert!((metrics.max_drawdown_pct - 10.0).abs() < 1e-9);
        assert_eq!(metrics.trading_days, 4);
    }

    #[test]
    fn test_drawdown_is_deepest_fraction() {
        // 100 -> 50 is -50%; 1000 -> 600 is a larger loss in value but only -40%
        let metrics = RunMetrics::from_run(100.0, curve(&[50.0, 1000.0, 600.0]), &[], 0);

        assert!((metrics.max_drawdown_pct - 50.0).abs() < 1e-9);
        assert!((metrics.max_drawdown - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_flat_curve() {
        let metrics = RunMetrics::from_run(0.0, curve(&[0.0, 0.0]), &[], 0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_event_counts() {
        let events = vec![
            EngineEvent::Entered {
                orders: 10,
                portfolio_value: 100_000.0,
            },
            EngineEvent::ExitSignal(ExitCondition::Stagnation),
            EngineEvent::Liquidated,
            EngineEvent::Entered {
                orders: 9,
                portfolio_value: 101_000.0,
            },
            EngineEvent::StopLoss { drawdown: 0.11 },
        ];

        let metrics = RunMetrics::from_run(100_000.0, Vec::new(), &events, 25);
        assert_eq!(metrics.rotations, 2);
        assert_eq!(metrics.exit_signals, 1);
        assert_eq!(metrics.stop_losses, 1);
        assert_eq!(metrics.liquidations, 1);
        assert_eq!(metrics.final_portfolio_value, 100_000.0);
        assert_eq!(metrics.total_return_pct, 0.0);
    }
}
