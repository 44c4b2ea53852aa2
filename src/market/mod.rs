// Market data boundary
pub mod window_store;

pub use window_store::PriceWindowStore;

use chrono::NaiveDate;

use crate::models::{Bar, FundamentalRow, Interval, Listing, Quote, VenueRule};
use crate::Result;

/// Source of valuation tables, quotes and settled history
///
/// Implemented by the host. Per-symbol calls return `EngineError::DataUnavailable`
/// rather than panicking; the engine treats such symbols as excluded.
pub trait MarketDataProvider {
    /// Market capitalisation for every listed symbol as of `date`
    fn fundamentals(&self, date: NaiveDate) -> Result<Vec<FundamentalRow>>;

    /// Current-session quote
    fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Up to `count` most recent settled bars, oldest first
    ///
    /// Returning fewer than `count` rows signals insufficient history.
    fn history(&self, symbol: &str, count: usize, interval: Interval) -> Result<Vec<Bar>>;
}

/// Fetch a quote and classify its venue in one step
pub fn fetch_listing(
    market: &dyn MarketDataProvider,
    symbol: &str,
    rule: &VenueRule,
) -> Result<Listing> {
    market
        .quote(symbol)
        .map(|quote| Listing::from_quote(quote, rule))
}
