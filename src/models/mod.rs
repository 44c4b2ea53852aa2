use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trading venue a listing belongs to
///
/// Resolved once when a quote enters the engine (see [`VenueRule`]) and carried
/// from then on, so order routing never re-parses symbol strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Venue {
    Standard,
    /// Board with execution constraints: protective limit orders only
    Restricted,
}

impl Venue {
    pub fn is_restricted(&self) -> bool {
        matches!(self, Venue::Restricted)
    }
}

/// Prefix-based classification of symbols into venues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueRule {
    restricted_prefixes: Vec<String>,
}

impl VenueRule {
    pub fn new(restricted_prefixes: Vec<String>) -> Self {
        Self { restricted_prefixes }
    }

    pub fn classify(&self, symbol: &str) -> Venue {
        if self
            .restricted_prefixes
            .iter()
            .any(|prefix| symbol.starts_with(prefix.as_str()))
        {
            Venue::Restricted
        } else {
            Venue::Standard
        }
    }
}

impl Default for VenueRule {
    fn default() -> Self {
        // STAR market
        Self::new(vec!["688".to_string()])
    }
}

/// One row of the cross-sectional valuation table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundamentalRow {
    pub symbol: String,
    pub market_cap: Option<f64>,
}

/// Current-session quote as reported by the data collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub paused: bool,
    /// Special-treatment / risk-warning flag
    pub risk_flagged: bool,
    pub last_price: f64,
    pub open_price: f64,
}

/// A quote after venue classification
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub symbol: String,
    pub venue: Venue,
    pub paused: bool,
    pub risk_flagged: bool,
    pub last_price: f64,
    pub open_price: f64,
}

impl Listing {
    pub fn from_quote(quote: Quote, rule: &VenueRule) -> Self {
        let venue = rule.classify(&quote.symbol);
        Self {
            symbol: quote.symbol,
            venue,
            paused: quote.paused,
            risk_flagged: quote.risk_flagged,
            last_price: quote.last_price,
            open_price: quote.open_price,
        }
    }

    /// Not halted and not risk-flagged
    pub fn is_tradable(&self) -> bool {
        !self.paused && !self.risk_flagged
    }
}

/// Daily bar (settled close and session volume)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

/// Bar interval; the engine only works on settled daily bars
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Interval {
    Daily,
}

/// Holding as reported by the portfolio collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub avg_cost: f64,
    /// Settled shares that may be sold now
    pub closeable_quantity: u64,
}

/// Read-only portfolio view, refreshed once per cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_value: f64,
    pub available_cash: f64,
    pub positions: Vec<Position>,
}

impl PortfolioSnapshot {
    pub fn has_positions(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.symbol.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OrderKind {
    Market,
    Limit { price: f64 },
}

/// Gateway acknowledgement of an accepted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderAck {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub kind: OrderKind,
}
