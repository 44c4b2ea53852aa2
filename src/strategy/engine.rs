use std::collections::HashMap;

use crate::discovery::UniversePicker;
use crate::execution::{ExecutionGateway, Executor};
use crate::market::{MarketDataProvider, PriceWindowStore};
use crate::models::{PortfolioSnapshot, VenueRule};
use crate::persistence::StateStore;
use crate::risk::DrawdownStop;
use crate::settings::StrategyConfig;
use crate::strategy::exit_signals::{
    ExitCondition, ExitInputs, ExitReport, ExitSignal, ExitSignalEvaluator,
};
use crate::strategy::squeeze::SQUEEZE_WINDOW;
use crate::strategy::state::{StrategyState, StrategyStatus};
use crate::strategy::{CycleContext, Strategy};
use crate::Result;

/// Notable transitions, drained by the host for reporting
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Entry orders went out for a fresh rotation
    Entered { orders: usize, portfolio_value: f64 },
    StopLoss { drawdown: f64 },
    ExitSignal(ExitCondition),
    /// Clearing confirmed flat and state was reset
    Liquidated,
}

#[derive(Debug, Clone)]
struct CandidateCache {
    symbols: Vec<String>,
    age_days: u32,
}

/// Small-cap rotation state machine
///
/// Owns the persisted [`StrategyState`] and is its only writer. Entries and
/// liquidation sweeps happen in `on_bar`; peak tracking, the stop-loss and
/// exit evaluation only ever run in `on_close` on settled valuations.
pub struct StrategyEngine<S: StateStore> {
    config: StrategyConfig,
    state: StrategyState,
    store: S,
    venue_rule: VenueRule,
    windows: PriceWindowStore,
    picker: UniversePicker,
    evaluator: ExitSignalEvaluator,
    executor: Executor,
    stop: DrawdownStop,
    candidates: Option<CandidateCache>,
    last_report: Option<ExitReport>,
    events: Vec<EngineEvent>,
}

impl<S: StateStore> StrategyEngine<S> {
    /// Build the engine and restore its state
    ///
    /// # Arguments
    /// * `config` - Validated again here; an invalid config never reaches a cycle
    /// * `store` - State backend; an absent record starts from defaults
    ///
    /// # Errors
    /// `EngineError::Config` for invalid settings or a malformed saved record.
    pub fn new(config: StrategyConfig, store: S) -> Result<Self> {
        config.validate()?;

        let state = match store.load()? {
            Some(state) => state,
            None => StrategyState::new(),
        };

        tracing::info!(
            "Strategy engine ready: status {:?}, peak {:.2}, holding target {}",
            state.status,
            state.peak_value.peak_value(),
            config.stocknum
        );

        Ok(Self {
            venue_rule: config.venue_rule(),
            windows: PriceWindowStore::new(SQUEEZE_WINDOW),
            picker: UniversePicker::from_config(&config),
            evaluator: ExitSignalEvaluator::from_config(&config),
            executor: Executor::from_config(&config),
            stop: DrawdownStop::new(config.max_drawdown_threshold),
            candidates: None,
            last_report: None,
            events: Vec::new(),
            config,
            state,
            store,
        })
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn status(&self) -> StrategyStatus {
        self.state.status
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn windows(&self) -> &PriceWindowStore {
        &self.windows
    }

    /// Most recent exit evaluation, if any ran
    pub fn last_report(&self) -> Option<&ExitReport> {
        self.last_report.as_ref()
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.state)
    }

    fn enter_clearing(&mut self) {
        self.state.status = StrategyStatus::Clearing;
        tracing::info!("Status: Normal -> Clearing");
    }

    /// Candidates for today, reusing a fresh enough cached list
    fn candidates(&mut self, ctx: &CycleContext, market: &dyn MarketDataProvider) -> Vec<String> {
        if let Some(cache) = &self.candidates {
            if cache.age_days < self.config.refresh_rate {
                tracing::debug!(
                    "Reusing {} cached candidates (age {} days)",
                    cache.symbols.len(),
                    cache.age_days
                );
                return cache.symbols.clone();
            }
        }

        let symbols = self
            .picker
            .pick(market, ctx.previous_date, &self.venue_rule);
        self.candidates = Some(CandidateCache {
            symbols: symbols.clone(),
            age_days: 0,
        });

        symbols
    }

    fn age_candidates(&mut self) {
        let refresh_rate = self.config.refresh_rate;
        if let Some(cache) = &mut self.candidates {
            cache.age_days += 1;
            if cache.age_days >= refresh_rate {
                self.candidates = None;
            }
        }
    }

    fn try_enter(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        gateway: &mut dyn ExecutionGateway,
        portfolio: &PortfolioSnapshot,
    ) {
        // Orders from an earlier bar today may still be working
        if let Some(buy_date) = self.state.buy_date() {
            if buy_date.date_naive() == ctx.trading_date() {
                tracing::debug!("Entry already placed today, waiting for fills");
                return;
            }
        }

        let candidates = self.candidates(ctx, market);
        if candidates.is_empty() {
            tracing::info!("No candidates for {}, staying flat", ctx.trading_date());
            return;
        }

        let report = self
            .executor
            .allocate(gateway, market, &candidates, portfolio.available_cash);

        if report.submitted.is_empty() {
            tracing::warn!(
                "Entry produced no orders ({} failures)",
                report.failures.len()
            );
            return;
        }

        self.state.record_entry(ctx.now, portfolio.total_value);
        self.candidates = None;

        tracing::info!(
            "Entered rotation: {} orders, portfolio value {:.2}",
            report.submitted.len(),
            portfolio.total_value
        );
        self.events.push(EngineEvent::Entered {
            orders: report.submitted.len(),
            portfolio_value: portfolio.total_value,
        });
    }

    fn liquidation_sweep(
        &mut self,
        market: &dyn MarketDataProvider,
        gateway: &mut dyn ExecutionGateway,
    ) {
        let report = self.executor.liquidate(gateway, market);

        if report.is_clean() {
            tracing::info!("Liquidation sweep: {} orders", report.submitted.len());
        } else {
            tracing::warn!(
                "Liquidation sweep: {} orders, {} symbols left for retry",
                report.submitted.len(),
                report.failures.len()
            );
        }
    }

    /// Post-close checks while holding: peak, stop-loss, then exit signals
    fn evaluate_holdings(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        portfolio: &PortfolioSnapshot,
    ) {
        let drawdown = self.state.peak_value.observe(portfolio.total_value);

        tracing::info!(
            "Close valuation {:.2}, peak {:.2}, drawdown {:.2}%",
            portfolio.total_value,
            self.state.peak_value.peak_value(),
            drawdown * 100.0
        );

        if let Err(trip) = self.stop.check(drawdown) {
            tracing::warn!(
                "Stop-loss: drawdown {:.2}% >= {:.2}%",
                trip.drawdown * 100.0,
                trip.threshold * 100.0
            );
            self.enter_clearing();
            self.events.push(EngineEvent::StopLoss {
                drawdown: trip.drawdown,
            });
            return;
        }

        let symbols = portfolio.symbols();
        for (symbol, e) in self.windows.refresh_all(market, &symbols) {
            tracing::debug!("Excluding {} from history windows: {}", symbol, e);
        }

        let prices: HashMap<String, f64> = symbols
            .iter()
            .filter_map(|symbol| match market.quote(symbol) {
                Ok(quote) if quote.last_price > 0.0 => Some((symbol.clone(), quote.last_price)),
                Ok(_) => {
                    tracing::debug!("Excluding {} from returns: no usable price", symbol);
                    None
                }
                Err(e) => {
                    tracing::debug!("Excluding {} from returns: {}", symbol, e);
                    None
                }
            })
            .collect();

        let inputs = ExitInputs {
            now: ctx.now,
            buy_date: self.state.buy_date(),
            initial_portfolio_value: self.state.initial_portfolio_value(),
            positions: &portfolio.positions,
            prices: &prices,
            windows: &self.windows,
        };

        let report = match self.evaluator.evaluate(&inputs) {
            Some(report) => report,
            None => {
                tracing::debug!("Exit evaluation skipped: no entry record or no prices");
                self.last_report = None;
                return;
            }
        };

        log_report(&report);

        if let ExitSignal::Liquidate(condition) = report.signal {
            tracing::info!("Exit signal: {}", condition);
            self.enter_clearing();
            self.events.push(EngineEvent::ExitSignal(condition));
        }

        self.last_report = Some(report);
    }
}

fn log_report(report: &ExitReport) {
    let volume = report
        .volume_ratio
        .map(|r| format!("{:.3}", r))
        .unwrap_or_else(|| "-".to_string());
    let bandwidth = report
        .bandwidth_ratio()
        .map(|r| format!("{:.3}", r))
        .unwrap_or_else(|| "-".to_string());
    let position = report
        .price_position
        .map(|p| format!("{:+.2}%", p * 100.0))
        .unwrap_or_else(|| "-".to_string());

    tracing::info!(
        "Exit check: held {} days, mean return {:.2}%, volume ratio {}, bandwidth ratio {}, vs ma20 {}",
        report.hold_days,
        report.mean_return * 100.0,
        volume,
        bandwidth,
        position
    );
}

impl<S: StateStore> Strategy for StrategyEngine<S> {
    fn name(&self) -> &str {
        "smallcap_rotation"
    }

    fn on_bar(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        gateway: &mut dyn ExecutionGateway,
    ) -> Result<()> {
        let portfolio = gateway.portfolio();

        match self.state.status {
            StrategyStatus::Clearing => self.liquidation_sweep(market, gateway),
            StrategyStatus::Normal if !portfolio.has_positions() => {
                self.try_enter(ctx, market, gateway, &portfolio)
            }
            StrategyStatus::Normal => {}
        }

        self.persist()
    }

    fn on_close(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        gateway: &dyn ExecutionGateway,
    ) -> Result<()> {
        self.age_candidates();

        let portfolio = gateway.portfolio();

        match self.state.status {
            StrategyStatus::Clearing if !portfolio.has_positions() => {
                self.state.reset_after_liquidation();
                self.windows.clear();
                self.last_report = None;
                tracing::info!("Liquidation confirmed, status: Clearing -> Normal");
                self.events.push(EngineEvent::Liquidated);
            }
            StrategyStatus::Clearing => {
                tracing::info!(
                    "Still clearing: {} positions open",
                    portfolio.positions.len()
                );
            }
            StrategyStatus::Normal if !portfolio.has_positions() => {
                // Nothing filled; the next session enters afresh
                if self.state.buy_date().is_some() {
                    tracing::warn!("Entry orders did not fill, clearing entry record");
                    self.state.clear_entry();
                }
            }
            StrategyStatus::Normal => self.evaluate_holdings(ctx, market, &portfolio),
        }

        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{PaperBroker, ScriptedMarket};
    use crate::models::{Bar, FundamentalRow, Quote};
    use crate::persistence::MemoryStore;
    use crate::risk::PortfolioTracker;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn ctx(day: u32, hour: u32) -> CycleContext {
        let now = Utc.with_ymd_and_hms(2024, 3, day, hour, 35, 0).unwrap();
        CycleContext::new(now, now.date_naive() - Duration::days(1))
    }

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            paused: false,
            risk_flagged: false,
            last_price: price,
            open_price: price,
        }
    }

    /// 40 names with caps 1..=40; the band [2, 4) picks the 3rd and 4th smallest
    fn market_with_universe() -> ScriptedMarket {
        let mut market = ScriptedMarket::new();
        let rows = (1..=40)
            .map(|i| FundamentalRow {
                symbol: format!("600{:03}", i),
                market_cap: Some(i as f64 * 1e8),
            })
            .collect();
        market.set_fundamentals(rows);
        for i in 1..=40 {
            market.set_quote(quote(&format!("600{:03}", i), 10.0));
        }
        market
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            stocknum: 2,
            ..Default::default()
        }
    }

    fn engine_with(state: StrategyState) -> StrategyEngine<MemoryStore> {
        StrategyEngine::new(config(), MemoryStore::with_state(state)).unwrap()
    }

    #[test]
    fn test_entry_allocates_and_records() {
        let market = market_with_universe();
        let mut broker = PaperBroker::new(100_000.0, 100);
        broker.mark_all(market.quotes());
        let mut engine = StrategyEngine::new(config(), MemoryStore::new()).unwrap();

        engine.on_bar(&ctx(5, 1), &market, &mut broker).unwrap();

        let symbols = broker.portfolio().symbols();
        assert_eq!(symbols, vec!["600003".to_string(), "600004".to_string()]);
        assert_eq!(engine.state().buy_date(), Some(ctx(5, 1).now));
        assert_eq!(engine.state().initial_portfolio_value(), 100_000.0);
        assert_eq!(engine.store().saves(), 1);
        assert!(matches!(
            engine.take_events().as_slice(),
            [EngineEvent::Entered { orders: 2, .. }]
        ));
    }

    #[test]
    fn test_no_second_entry_same_day() {
        let market = market_with_universe();
        let mut broker = PaperBroker::new(100_000.0, 100);
        broker.mark_all(market.quotes());

        let mut state = StrategyState::new();
        state.record_entry(ctx(5, 1).now, 100_000.0);
        let mut engine = engine_with(state);

        engine.on_bar(&ctx(5, 2), &market, &mut broker).unwrap();
        assert!(broker.orders().is_empty());
    }

    #[test]
    fn test_stop_loss_moves_to_clearing() {
        let market = market_with_universe();
        let mut broker = PaperBroker::new(0.0, 100);
        broker.seed_position("600003", 8500, 10.0, 8500);
        broker.mark_all(market.quotes());

        let mut state = StrategyState::new();
        state.peak_value = PortfolioTracker::with_peak(100_000.0);
        state.record_entry(ctx(1, 1).now, 100_000.0);
        let mut engine = engine_with(state);

        // 8500 * 10.0 = 85_000 against a 100_000 peak
        engine.on_close(&ctx(5, 7), &market, &broker).unwrap();

        assert_eq!(engine.status(), StrategyStatus::Clearing);
        assert_eq!(engine.state().peak_value.peak_value(), 100_000.0);
        assert_eq!(engine.take_events(), vec![EngineEvent::StopLoss { drawdown: 0.15 }]);
    }

    #[test]
    fn test_open_bar_ignores_drawdown() {
        let market = market_with_universe();
        let mut broker = PaperBroker::new(0.0, 100);
        broker.seed_position("600003", 500, 10.0, 500);
        broker.mark_all(market.quotes());

        let mut state = StrategyState::new();
        state.peak_value = PortfolioTracker::with_peak(10_000.0);
        state.record_entry(ctx(1, 1).now, 10_000.0);
        let mut engine = engine_with(state);

        // 500 * 10.0 = 5_000, half the peak, but drawdown is only checked after close
        engine.on_bar(&ctx(5, 1), &market, &mut broker).unwrap();

        assert_eq!(engine.status(), StrategyStatus::Normal);
        assert_eq!(engine.state().peak_value.peak_value(), 10_000.0);
        assert!(broker.orders().is_empty());
        assert!(engine.take_events().is_empty());
        assert!(engine.last_report().is_none());
    }

    #[test]
    fn test_holding_updates_peak_without_exit() {
        let mut market = market_with_universe();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..40)
            .map(|i| Bar {
                date: start + Duration::days(i),
                close: 10.0 + (i % 3) as f64 * 0.1,
                volume: 1000.0,
            })
            .collect();
        market.set_history("600003", bars);

        let mut broker = PaperBroker::new(1_000.0, 100);
        broker.seed_position("600003", 1000, 10.0, 1000);
        broker.mark_all(market.quotes());

        let mut state = StrategyState::new();
        state.record_entry(ctx(4, 1).now, 11_000.0);
        let mut engine = engine_with(state);

        engine.on_close(&ctx(5, 7), &market, &broker).unwrap();

        assert_eq!(engine.status(), StrategyStatus::Normal);
        assert_eq!(engine.state().peak_value.peak_value(), 11_000.0);
        let report = engine.last_report().unwrap();
        assert_eq!(report.hold_days, 1);
        assert_eq!(report.signal, ExitSignal::Hold);
        assert_eq!(engine.windows().len("600003"), 40);
    }

    #[test]
    fn test_clearing_resets_only_when_flat() {
        let market = market_with_universe();
        let mut broker = PaperBroker::new(0.0, 100);
        broker.seed_position("600003", 1000, 10.0, 1000);
        broker.mark_all(market.quotes());

        let mut state = StrategyState::new();
        state.status = StrategyStatus::Clearing;
        state.peak_value = PortfolioTracker::with_peak(12_000.0);
        state.record_entry(ctx(1, 1).now, 10_000.0);
        let mut engine = engine_with(state);

        // close before any sweep: still holding
        engine.on_close(&ctx(4, 7), &market, &broker).unwrap();
        assert_eq!(engine.status(), StrategyStatus::Clearing);

        engine.on_bar(&ctx(5, 1), &market, &mut broker).unwrap();
        engine.on_close(&ctx(5, 7), &market, &broker).unwrap();

        assert_eq!(engine.status(), StrategyStatus::Normal);
        assert_eq!(*engine.state(), StrategyState::default());
        assert_eq!(engine.take_events(), vec![EngineEvent::Liquidated]);
    }

    #[test]
    fn test_unfilled_entry_is_forgotten_at_close() {
        let market = market_with_universe();
        let broker = PaperBroker::new(100_000.0, 100);

        let mut state = StrategyState::new();
        state.record_entry(ctx(5, 1).now, 100_000.0);
        let mut engine = engine_with(state);

        engine.on_close(&ctx(5, 7), &market, &broker).unwrap();
        assert!(engine.state().buy_date().is_none());
        assert_eq!(engine.state().initial_portfolio_value(), 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StrategyConfig {
            stocknum: 0,
            ..Default::default()
        };
        assert!(StrategyEngine::new(config, MemoryStore::new()).is_err());
    }
}
