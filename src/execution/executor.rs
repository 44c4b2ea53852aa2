use crate::error::EngineError;
use crate::execution::{ExecutionGateway, OrderRouter};
use crate::market::{fetch_listing, MarketDataProvider};
use crate::models::{Listing, OrderAck, VenueRule};
use crate::settings::StrategyConfig;

/// Outcome of a best-effort batch of orders
#[derive(Debug, Default)]
pub struct SweepReport {
    pub submitted: Vec<OrderAck>,
    /// Per-symbol failures; none of them stopped the batch
    pub failures: Vec<(String, EngineError)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, symbol: &str, result: crate::Result<OrderAck>) {
        match result {
            Ok(ack) => self.submitted.push(ack),
            Err(e) => {
                tracing::warn!("Order for {} failed: {}", symbol, e);
                self.failures.push((symbol.to_string(), e));
            }
        }
    }
}

/// Batch entry allocation and liquidation sweeps
#[derive(Debug, Clone)]
pub struct Executor {
    router: OrderRouter,
    venue_rule: VenueRule,
    stocknum: usize,
}

impl Executor {
    pub fn new(router: OrderRouter, venue_rule: VenueRule, stocknum: usize) -> Self {
        Self {
            router,
            venue_rule,
            stocknum,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            OrderRouter::new(config.restricted_venue_buffer, config.lot_size),
            config.venue_rule(),
            config.stocknum,
        )
    }

    /// Split `available_cash` equally across tradable candidates
    ///
    /// Candidates were chosen on prior-day data, so halts and risk flags are
    /// checked again here. At most `stocknum` names receive orders.
    pub fn allocate(
        &self,
        gateway: &mut dyn ExecutionGateway,
        market: &dyn MarketDataProvider,
        candidates: &[String],
        available_cash: f64,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        let mut tradable: Vec<Listing> = Vec::new();
        for symbol in candidates {
            if tradable.len() >= self.stocknum {
                break;
            }

            match fetch_listing(market, symbol, &self.venue_rule) {
                Ok(listing) if listing.is_tradable() => tradable.push(listing),
                Ok(_) => tracing::debug!("Skipping {}: halted or risk flagged", symbol),
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", symbol, e);
                    report.failures.push((symbol.clone(), e));
                }
            }
        }

        if tradable.is_empty() {
            tracing::warn!("No tradable candidates, skipping entry");
            return report;
        }

        let cash_per_stock = available_cash / tradable.len() as f64;

        tracing::info!(
            "Allocating {:.2} across {} names ({:.2} each)",
            available_cash,
            tradable.len(),
            cash_per_stock
        );

        for listing in &tradable {
            let result = self.router.buy(gateway, listing, cash_per_stock);
            report.record(&listing.symbol, result);
        }

        report
    }

    /// Try to close every open position
    ///
    /// Level-triggered: whatever fails here is simply retried next cycle.
    pub fn liquidate(
        &self,
        gateway: &mut dyn ExecutionGateway,
        market: &dyn MarketDataProvider,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let symbols = gateway.portfolio().symbols();

        tracing::info!("Liquidation sweep over {} positions", symbols.len());

        for symbol in symbols {
            let position = match gateway.position(&symbol) {
                Some(position) => position,
                None => continue,
            };

            let result = match fetch_listing(market, &symbol, &self.venue_rule) {
                Ok(listing) => self.router.sell_all(gateway, &listing, &position),
                Err(e) => Err(e),
            };
            report.record(&symbol, result);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{PaperBroker, ScriptedMarket};
    use crate::error::RejectReason;
    use crate::execution::ExecutionGateway;
    use crate::models::Quote;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            paused: false,
            risk_flagged: false,
            last_price: price,
            open_price: price,
        }
    }

    fn setup(symbols: &[&str]) -> (ScriptedMarket, PaperBroker) {
        let mut market = ScriptedMarket::new();
        for symbol in symbols {
            market.set_quote(quote(symbol, 10.0));
        }
        let mut broker = PaperBroker::new(60_000.0, 100);
        broker.mark_all(market.quotes());
        (market, broker)
    }

    #[test]
    fn test_allocate_splits_cash_equally() {
        let (market, mut broker) = setup(&["600001", "600002", "600003"]);
        let executor = Executor::from_config(&StrategyConfig::default());

        let candidates: Vec<String> = ["600001", "600002", "600003"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = executor.allocate(&mut broker, &market, &candidates, 60_000.0);

        assert!(report.is_clean());
        assert_eq!(report.submitted.len(), 3);
        for ack in &report.submitted {
            assert_eq!(ack.quantity, 2000);
        }
    }

    #[test]
    fn test_allocate_rechecks_tradability() {
        let (mut market, mut broker) = setup(&["600001", "600002"]);
        market.halt("600002");
        let executor = Executor::from_config(&StrategyConfig::default());

        let candidates = vec!["600001".to_string(), "600002".to_string(), "600009".to_string()];
        let report = executor.allocate(&mut broker, &market, &candidates, 60_000.0);

        // all cash goes to the one tradable name; the unknown one is a data failure
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.submitted[0].quantity, 6000);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_allocate_respects_stocknum() {
        let (market, mut broker) = setup(&["600001", "600002", "600003"]);
        let config = StrategyConfig {
            stocknum: 2,
            ..Default::default()
        };
        let executor = Executor::from_config(&config);

        let candidates: Vec<String> = ["600001", "600002", "600003"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = executor.allocate(&mut broker, &market, &candidates, 60_000.0);

        assert_eq!(report.submitted.len(), 2);
        assert_eq!(report.submitted[0].quantity, 3000);
    }

    #[test]
    fn test_liquidate_isolates_failures() {
        let (mut market, mut broker) = setup(&["600001", "600002", "600003"]);
        broker.seed_position("600001", 500, 9.0, 500);
        broker.seed_position("600002", 500, 9.0, 500);
        // bought today: nothing closeable yet
        broker.seed_position("600003", 500, 9.0, 0);
        market.halt("600002");
        broker.mark_all(market.quotes());

        let executor = Executor::from_config(&StrategyConfig::default());
        let report = executor.liquidate(&mut broker, &market);

        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(broker.position("600001").is_none());

        let reasons: Vec<&RejectReason> = report
            .failures
            .iter()
            .filter_map(|(_, e)| match e {
                EngineError::OrderRejected { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![&RejectReason::Halted, &RejectReason::NothingToClose]
        );
    }
}
