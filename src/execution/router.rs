use crate::error::{EngineError, RejectReason};
use crate::execution::ExecutionGateway;
use crate::models::{Listing, OrderAck, Position, Side, Venue};
use crate::Result;

/// Routes single orders according to venue
///
/// Restricted venues get a protective limit around the session open instead
/// of an unconstrained market order.
#[derive(Debug, Clone, Copy)]
pub struct OrderRouter {
    buffer: f64,
    lot_size: u64,
}

impl OrderRouter {
    pub fn new(buffer: f64, lot_size: u64) -> Self {
        Self {
            buffer,
            lot_size: lot_size.max(1),
        }
    }

    /// Limit price bounding adverse execution
    ///
    /// Sells accept down to `reference × (1 − buffer)`, buys pay up to
    /// `reference × (1 + buffer)`.
    pub fn protective_limit(&self, reference: f64, side: Side) -> f64 {
        match side {
            Side::Buy => reference * (1.0 + self.buffer),
            Side::Sell => reference * (1.0 - self.buffer),
        }
    }

    /// Whole lots purchasable with `cash` at `price`
    pub fn lot_quantity(&self, cash: f64, price: f64) -> u64 {
        if price <= 0.0 || cash <= 0.0 {
            return 0;
        }

        let lots = (cash / price / self.lot_size as f64).floor() as u64;
        lots * self.lot_size
    }

    /// Place an entry order worth about `cash`
    pub fn buy(
        &self,
        gateway: &mut dyn ExecutionGateway,
        listing: &Listing,
        cash: f64,
    ) -> Result<OrderAck> {
        if listing.paused {
            return Err(EngineError::rejected(&listing.symbol, RejectReason::Halted));
        }

        match listing.venue {
            Venue::Restricted => {
                if listing.open_price <= 0.0 {
                    return Err(EngineError::rejected(
                        &listing.symbol,
                        RejectReason::InvalidPrice,
                    ));
                }

                let quantity = self.lot_quantity(cash, listing.open_price);
                if quantity == 0 {
                    return Err(EngineError::rejected(
                        &listing.symbol,
                        RejectReason::BelowLotSize,
                    ));
                }

                let limit = self.protective_limit(listing.open_price, Side::Buy);
                let ack = gateway.limit_order(&listing.symbol, Side::Buy, quantity, limit)?;

                tracing::info!(
                    "Restricted-venue buy {} x{} limit {:.2}",
                    listing.symbol,
                    quantity,
                    limit
                );

                Ok(ack)
            }
            Venue::Standard => {
                let ack = gateway.market_order_by_value(&listing.symbol, cash)?;
                tracing::info!("Buy {} for {:.2}", listing.symbol, cash);
                Ok(ack)
            }
        }
    }

    /// Sell everything currently closeable in `position`
    ///
    /// Restricted venues with no usable open price fall back to a market sell.
    pub fn sell_all(
        &self,
        gateway: &mut dyn ExecutionGateway,
        listing: &Listing,
        position: &Position,
    ) -> Result<OrderAck> {
        if listing.paused {
            return Err(EngineError::rejected(&listing.symbol, RejectReason::Halted));
        }

        let quantity = position.closeable_quantity;
        if quantity == 0 {
            return Err(EngineError::rejected(
                &listing.symbol,
                RejectReason::NothingToClose,
            ));
        }

        if listing.venue.is_restricted() && listing.open_price > 0.0 {
            let limit = self.protective_limit(listing.open_price, Side::Sell);
            let ack = gateway.limit_order(&listing.symbol, Side::Sell, quantity, limit)?;

            tracing::info!(
                "Restricted-venue sell {} x{} limit {:.2}",
                listing.symbol,
                quantity,
                limit
            );

            return Ok(ack);
        }

        let ack = gateway.market_order_by_quantity(&listing.symbol, Side::Sell, quantity)?;
        tracing::info!("Sell {} x{}", listing.symbol, quantity);
        Ok(ack)
    }
}

impl Default for OrderRouter {
    fn default() -> Self {
        Self::new(0.05, 100)
    }
}
