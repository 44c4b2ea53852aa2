use crate::models::{OrderAck, PortfolioSnapshot, Position, Side};
use crate::Result;

/// Order placement and portfolio view provided by the host broker
///
/// Orders are placed, not filled: fills settle asynchronously and show up in
/// later snapshots. Rejections come back as `EngineError::OrderRejected`.
pub trait ExecutionGateway {
    /// Buy roughly `value` worth of `symbol` at market
    fn market_order_by_value(&mut self, symbol: &str, value: f64) -> Result<OrderAck>;

    fn market_order_by_quantity(&mut self, symbol: &str, side: Side, quantity: u64)
        -> Result<OrderAck>;

    fn limit_order(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: u64,
        limit_price: f64,
    ) -> Result<OrderAck>;

    fn position(&self, symbol: &str) -> Option<Position>;

    fn portfolio(&self) -> PortfolioSnapshot;
}
