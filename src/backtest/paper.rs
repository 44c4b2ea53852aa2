use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::error::{EngineError, RejectReason};
use crate::execution::ExecutionGateway;
use crate::models::{OrderAck, OrderKind, PortfolioSnapshot, Position, Quote, Side};
use crate::Result;

#[derive(Debug, Clone)]
struct Holding {
    quantity: u64,
    avg_cost: f64,
    closeable: u64,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    last: f64,
    paused: bool,
}

/// Paper broker with T+1 settlement
///
/// Orders fill immediately at the current mark. Shares bought today are not
/// closeable until [`PaperBroker::settle`] runs at the next session open.
/// Limit orders that are not marketable are acknowledged and expire unfilled.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    cash: f64,
    lot_size: u64,
    holdings: BTreeMap<String, Holding>,
    marks: HashMap<String, Mark>,
    orders: Vec<OrderAck>,
    expired: usize,
}

impl PaperBroker {
    /// Create a broker
    ///
    /// # Arguments
    /// * `cash` - Starting cash
    /// * `lot_size` - Board lot; value-based buys round down to whole lots
    pub fn new(cash: f64, lot_size: u64) -> Self {
        Self {
            cash,
            lot_size: lot_size.max(1),
            holdings: BTreeMap::new(),
            marks: HashMap::new(),
            orders: Vec::new(),
            expired: 0,
        }
    }

    /// Put a holding on the books directly (test setups, resumed sessions)
    pub fn seed_position(&mut self, symbol: &str, quantity: u64, avg_cost: f64, closeable: u64) {
        self.holdings.insert(
            symbol.to_string(),
            Holding {
                quantity,
                avg_cost,
                closeable: closeable.min(quantity),
            },
        );
    }

    /// Update the price and halt flag used for fills and valuation
    pub fn mark(&mut self, quote: &Quote) {
        self.marks.insert(
            quote.symbol.clone(),
            Mark {
                last: quote.last_price,
                paused: quote.paused,
            },
        );
    }

    pub fn mark_all<I>(&mut self, quotes: I)
    where
        I: IntoIterator<Item = Quote>,
    {
        for quote in quotes {
            self.mark(&quote);
        }
    }

    /// Start of a new session: yesterday's buys become closeable
    pub fn settle(&mut self) {
        for holding in self.holdings.values_mut() {
            holding.closeable = holding.quantity;
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Every acknowledged order, in placement order
    pub fn orders(&self) -> &[OrderAck] {
        &self.orders
    }

    /// Limit orders that never became marketable
    pub fn expired(&self) -> usize {
        self.expired
    }

    fn tradable_price(&self, symbol: &str) -> Result<f64> {
        let mark = self
            .marks
            .get(symbol)
            .ok_or_else(|| EngineError::rejected(symbol, RejectReason::InvalidPrice))?;

        if mark.paused {
            return Err(EngineError::rejected(symbol, RejectReason::Halted));
        }

        if mark.last <= 0.0 {
            return Err(EngineError::rejected(symbol, RejectReason::InvalidPrice));
        }

        Ok(mark.last)
    }

    fn acknowledge(&mut self, symbol: &str, side: Side, quantity: u64, kind: OrderKind) -> OrderAck {
        let ack = OrderAck {
            order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            kind,
        };
        self.orders.push(ack.clone());
        ack
    }

    fn fill_buy(&mut self, symbol: &str, quantity: u64, price: f64) -> Result<()> {
        let cost = quantity as f64 * price;
        if cost > self.cash + 1e-6 {
            return Err(EngineError::rejected(symbol, RejectReason::InsufficientCash));
        }

        self.cash -= cost;

        let holding = self.holdings.entry(symbol.to_string()).or_insert(Holding {
            quantity: 0,
            avg_cost: 0.0,
            closeable: 0,
        });
        let total = holding.quantity + quantity;
        holding.avg_cost =
            (holding.avg_cost * holding.quantity as f64 + price * quantity as f64) / total as f64;
        holding.quantity = total;

        tracing::debug!("Paper fill: buy {} x{} @ {:.2}", symbol, quantity, price);
        Ok(())
    }

    fn check_sellable(&self, symbol: &str, quantity: u64) -> Result<()> {
        let closeable = self.holdings.get(symbol).map(|h| h.closeable).unwrap_or(0);

        if closeable == 0 {
            return Err(EngineError::rejected(symbol, RejectReason::NothingToClose));
        }

        if quantity > closeable {
            return Err(EngineError::rejected(
                symbol,
                RejectReason::Gateway(format!(
                    "sell {} exceeds closeable {}",
                    quantity, closeable
                )),
            ));
        }

        Ok(())
    }

    fn fill_sell(&mut self, symbol: &str, quantity: u64, price: f64) {
        if let Some(holding) = self.holdings.get_mut(symbol) {
            holding.quantity -= quantity;
            holding.closeable -= quantity;
            if holding.quantity == 0 {
                self.holdings.remove(symbol);
            }
        }

        self.cash += quantity as f64 * price;
        tracing::debug!("Paper fill: sell {} x{} @ {:.2}", symbol, quantity, price);
    }
}

impl ExecutionGateway for PaperBroker {
    fn market_order_by_value(&mut self, symbol: &str, value: f64) -> Result<OrderAck> {
        let price = self.tradable_price(symbol)?;

        let lots = (value / price / self.lot_size as f64).floor();
        let quantity = if lots.is_finite() && lots > 0.0 {
            lots as u64 * self.lot_size
        } else {
            0
        };

        if quantity == 0 {
            return Err(EngineError::rejected(symbol, RejectReason::BelowLotSize));
        }

        self.fill_buy(symbol, quantity, price)?;
        Ok(self.acknowledge(symbol, Side::Buy, quantity, OrderKind::Market))
    }

    fn market_order_by_quantity(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: u64,
    ) -> Result<OrderAck> {
        let price = self.tradable_price(symbol)?;

        match side {
            Side::Buy => self.fill_buy(symbol, quantity, price)?,
            Side::Sell => {
                self.check_sellable(symbol, quantity)?;
                self.fill_sell(symbol, quantity, price);
            }
        }

        Ok(self.acknowledge(symbol, side, quantity, OrderKind::Market))
    }

    fn limit_order(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: u64,
        limit_price: f64,
    ) -> Result<OrderAck> {
        let price = self.tradable_price(symbol)?;

        let marketable = match side {
            Side::Buy => price <= limit_price,
            Side::Sell => price >= limit_price,
        };

        if side == Side::Sell {
            self.check_sellable(symbol, quantity)?;
        }

        if marketable {
            match side {
                Side::Buy => self.fill_buy(symbol, quantity, price)?,
                Side::Sell => self.fill_sell(symbol, quantity, price),
            }
        } else {
            self.expired += 1;
            tracing::debug!(
                "Paper limit {:?} {} @ {:.2} not marketable at {:.2}, expiring",
                side,
                symbol,
                limit_price,
                price
            );
        }

        Ok(self.acknowledge(symbol, side, quantity, OrderKind::Limit { price: limit_price }))
    }

    fn position(&self, symbol: &str) -> Option<Position> {
        self.holdings.get(symbol).map(|h| Position {
            symbol: symbol.to_string(),
            quantity: h.quantity,
            avg_cost: h.avg_cost,
            closeable_quantity: h.closeable,
        })
    }

    fn portfolio(&self) -> PortfolioSnapshot {
        let mut total_value = self.cash;
        let mut positions = Vec::with_capacity(self.holdings.len());

        for (symbol, h) in &self.holdings {
            let price = self
                .marks
                .get(symbol)
                .map(|m| m.last)
                .filter(|p| *p > 0.0)
                .unwrap_or(h.avg_cost);
            total_value += h.quantity as f64 * price;

            positions.push(Position {
                symbol: symbol.clone(),
                quantity: h.quantity,
                avg_cost: h.avg_cost,
                closeable_quantity: h.closeable,
            });
        }

        PortfolioSnapshot {
            total_value,
            available_cash: self.cash,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64, paused: bool) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            paused,
            risk_flagged: false,
            last_price: price,
            open_price: price,
        }
    }

    #[test]
    fn test_value_buy_rounds_to_lots() {
        let mut broker = PaperBroker::new(10_000.0, 100);
        broker.mark(&quote("600001", 30.0, false));

        let ack = broker.market_order_by_value("600001", 10_000.0).unwrap();
        assert_eq!(ack.quantity, 300);
        assert!((broker.cash() - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_t_plus_one() {
        let mut broker = PaperBroker::new(10_000.0, 100);
        broker.mark(&quote("600001", 10.0, false));
        broker.market_order_by_value("600001", 5_000.0).unwrap();

        let position = broker.position("600001").unwrap();
        assert_eq!(position.quantity, 500);
        assert_eq!(position.closeable_quantity, 0);

        let err = broker
            .market_order_by_quantity("600001", Side::Sell, 500)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::OrderRejected {
                reason: RejectReason::NothingToClose,
                ..
            }
        ));

        broker.settle();
        broker.market_order_by_quantity("600001", Side::Sell, 500).unwrap();
        assert!(broker.position("600001").is_none());
        assert!((broker.cash() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_halted_symbol_rejected() {
        let mut broker = PaperBroker::new(10_000.0, 100);
        broker.seed_position("000002", 100, 10.0, 100);
        broker.mark(&quote("000002", 10.0, true));

        let err = broker
            .market_order_by_quantity("000002", Side::Sell, 100)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::OrderRejected {
                reason: RejectReason::Halted,
                ..
            }
        ));
    }

    #[test]
    fn test_unmarketable_limit_expires() {
        let mut broker = PaperBroker::new(0.0, 100);
        broker.seed_position("688001", 200, 50.0, 200);
        broker.mark(&quote("688001", 40.0, false));

        // sell limit 47.5 above a 40.0 market
        broker
            .limit_order("688001", Side::Sell, 200, 47.5)
            .unwrap();

        assert_eq!(broker.expired(), 1);
        assert_eq!(broker.position("688001").unwrap().quantity, 200);
        assert_eq!(broker.orders().len(), 1);
    }

    #[test]
    fn test_portfolio_valuation() {
        let mut broker = PaperBroker::new(1_000.0, 100);
        broker.seed_position("600001", 100, 10.0, 100);
        broker.seed_position("600002", 100, 20.0, 100);
        broker.mark(&quote("600001", 12.0, false));

        let snapshot = broker.portfolio();
        // unmarked holdings fall back to cost
        assert!((snapshot.total_value - (1_000.0 + 1_200.0 + 2_000.0)).abs() < 1e-9);
        assert_eq!(snapshot.positions.len(), 2);
    }
}
