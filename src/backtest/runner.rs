use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::backtest::metrics::{EquityPoint, RunMetrics};
use crate::backtest::paper::PaperBroker;
use crate::backtest::synthetic::SyntheticMarket;
use crate::execution::ExecutionGateway;
use crate::persistence::StateStore;
use crate::strategy::{CycleContext, Strategy, StrategyEngine};
use crate::Result;

/// Bar callback time, 09:35 at UTC+8
const BAR_MINUTES_UTC: i64 = 95;
/// Close callback time, 15:30 at UTC+8
const CLOSE_MINUTES_UTC: i64 = 450;

/// Drives the engine over a synthetic market one session at a time
///
/// Per session: settle T+1, mark the open, `on_bar`, mark the close, `on_close`.
pub struct SessionRunner {
    market: SyntheticMarket,
    broker: PaperBroker,
}

impl SessionRunner {
    pub fn new(market: SyntheticMarket, broker: PaperBroker) -> Self {
        Self { market, broker }
    }

    /// Run up to `days` sessions (fewer if the calendar runs out)
    ///
    /// # Errors
    /// Only fatal engine errors (state persistence) stop the run.
    pub fn run<S: StateStore>(
        &mut self,
        engine: &mut StrategyEngine<S>,
        days: usize,
    ) -> Result<RunMetrics> {
        let initial_value = self.broker.portfolio().total_value;
        let mut equity_curve = Vec::with_capacity(days);
        let mut events = Vec::new();

        tracing::info!(
            "Starting paper run: {} sessions, initial value {:.2}",
            days.min(self.market.remaining_days()),
            initial_value
        );

        for _ in 0..days {
            if !self.market.open_next_session() {
                tracing::info!("Calendar exhausted");
                break;
            }

            let (today, previous) = match (self.market.current_date(), self.market.previous_date()) {
                (Some(today), Some(previous)) => (today, previous),
                _ => break,
            };

            self.broker.settle();
            self.broker.mark_all(self.market.quotes());

            let bar_ctx = CycleContext::new(at(today, BAR_MINUTES_UTC), previous);
            engine.on_bar(&bar_ctx, &self.market, &mut self.broker)?;

            self.market.close_session();
            self.broker.mark_all(self.market.quotes());

            let close_ctx = CycleContext::new(at(today, CLOSE_MINUTES_UTC), previous);
            engine.on_close(&close_ctx, &self.market, &self.broker)?;

            let value = self.broker.portfolio().total_value;
            equity_curve.push(EquityPoint { date: today, value });
            events.extend(engine.take_events());

            tracing::debug!("{}: value {:.2}, status {:?}", today, value, engine.status());
        }

        let metrics = RunMetrics::from_run(
            initial_value,
            equity_curve,
            &events,
            self.broker.orders().len(),
        );

        tracing::info!(
            "Paper run finished: {} sessions, return {:.2}%, {} rotations",
            metrics.trading_days,
            metrics.total_return_pct,
            metrics.rotations
        );

        Ok(metrics)
    }
}

fn at(date: NaiveDate, minutes_utc: i64) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)) + Duration::minutes(minutes_utc)
}
