use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::EngineError;
use crate::market::MarketDataProvider;
use crate::models::{Bar, FundamentalRow, Interval, Quote};
use crate::Result;

/// Hand-fed market data for deterministic scenarios
///
/// Everything is set explicitly; unknown symbols and symbols marked with
/// [`ScriptedMarket::fail_symbol`] report `DataUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedMarket {
    fundamentals: Vec<FundamentalRow>,
    quotes: BTreeMap<String, Quote>,
    history: HashMap<String, Vec<Bar>>,
    failing: HashSet<String>,
}

impl ScriptedMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fundamentals(&mut self, rows: Vec<FundamentalRow>) {
        self.fundamentals = rows;
    }

    pub fn set_quote(&mut self, quote: Quote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Settled daily bars, oldest first
    pub fn set_history(&mut self, symbol: &str, bars: Vec<Bar>) {
        self.history.insert(symbol.to_string(), bars);
    }

    pub fn fail_symbol(&mut self, symbol: &str) {
        self.failing.insert(symbol.to_string());
    }

    pub fn halt(&mut self, symbol: &str) {
        if let Some(quote) = self.quotes.get_mut(symbol) {
            quote.paused = true;
        }
    }

    pub fn resume(&mut self, symbol: &str) {
        if let Some(quote) = self.quotes.get_mut(symbol) {
            quote.paused = false;
        }
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes.values().cloned().collect()
    }

    fn check(&self, symbol: &str) -> Result<()> {
        if self.failing.contains(symbol) {
            return Err(EngineError::data_unavailable(symbol, "scripted failure"));
        }
        Ok(())
    }
}

impl MarketDataProvider for ScriptedMarket {
    fn fundamentals(&self, _date: NaiveDate) -> Result<Vec<FundamentalRow>> {
        Ok(self.fundamentals.clone())
    }

    fn quote(&self, symbol: &str) -> Result<Quote> {
        self.check(symbol)?;
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| EngineError::data_unavailable(symbol, "no quote"))
    }

    fn history(&self, symbol: &str, count: usize, _interval: Interval) -> Result<Vec<Bar>> {
        self.check(symbol)?;

        let bars = self.history.get(symbol).map(Vec::as_slice).unwrap_or(&[]);
        let skip = bars.len().saturating_sub(count);
        Ok(bars[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_history_returns_most_recent() {
        let mut market = ScriptedMarket::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..10)
            .map(|i| Bar {
                date: start + Duration::days(i),
                close: i as f64,
                volume: 1.0,
            })
            .collect();
        market.set_history("600000", bars);

        let tail = market.history("600000", 3, Interval::Daily).unwrap();
        assert_eq!(tail.iter().map(|b| b.close).collect::<Vec<_>>(), vec![7.0, 8.0, 9.0]);

        // short history is not an error
        assert!(market.history("600001", 40, Interval::Daily).unwrap().is_empty());
    }

    #[test]
    fn test_failing_symbol() {
        let mut market = ScriptedMarket::new();
        market.fail_symbol("000001");

        assert!(market.quote("000001").is_err());
        assert!(market.history("000001", 5, Interval::Daily).is_err());
    }
}
