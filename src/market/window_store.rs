use std::collections::{HashMap, VecDeque};

use crate::error::EngineError;
use crate::market::MarketDataProvider;
use crate::models::{Bar, Interval};
use crate::Result;

/// In-memory rolling windows of settled daily bars
///
/// Maintains at most `capacity` bars per symbol. Windows are refreshed from the
/// data collaborator after each close; shorter windows are kept as-is and
/// reported as insufficient, never padded.
#[derive(Debug, Clone)]
pub struct PriceWindowStore {
    data: HashMap<String, VecDeque<Bar>>,
    capacity: usize,
}

impl PriceWindowStore {
    /// Create a new store
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of bars to keep per symbol
    pub fn new(capacity: usize) -> Self {
        Self {
            data: HashMap::new(),
            capacity,
        }
    }

    /// Append a bar for a symbol, evicting the oldest past capacity
    pub fn push_bar(&mut self, symbol: &str, bar: Bar) {
        let window = self.data.entry(symbol.to_string()).or_default();

        window.push_back(bar);

        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Replace a symbol's window with the most recent `capacity` bars
    pub fn replace(&mut self, symbol: &str, bars: Vec<Bar>) {
        let skip = bars.len().saturating_sub(self.capacity);
        let window: VecDeque<Bar> = bars.into_iter().skip(skip).collect();
        self.data.insert(symbol.to_string(), window);
    }

    /// Pull the latest settled history for one symbol
    ///
    /// Returns the number of bars now held.
    pub fn refresh(&mut self, market: &dyn MarketDataProvider, symbol: &str) -> Result<usize> {
        let bars = market.history(symbol, self.capacity, Interval::Daily)?;
        self.replace(symbol, bars);
        Ok(self.len(symbol))
    }

    /// Refresh every symbol, isolating failures
    ///
    /// Symbols whose fetch failed lose their stale window and are returned with
    /// the error so the caller can log them.
    pub fn refresh_all(
        &mut self,
        market: &dyn MarketDataProvider,
        symbols: &[String],
    ) -> Vec<(String, EngineError)> {
        self.data.retain(|symbol, _| symbols.contains(symbol));

        let mut failures = Vec::new();
        for symbol in symbols {
            match self.refresh(market, symbol) {
                Ok(count) if count < self.capacity => {
                    tracing::debug!(
                        "Short history for {}: {} of {} bars",
                        symbol,
                        count,
                        self.capacity
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    self.data.remove(symbol);
                    failures.push((symbol.clone(), e));
                }
            }
        }

        failures
    }

    /// The last `n` closes, oldest first
    ///
    /// # Errors
    /// `DataUnavailable` when fewer than `n` bars are held.
    pub fn closes(&self, symbol: &str, n: usize) -> Result<Vec<f64>> {
        Ok(self.tail(symbol, n)?.map(|bar| bar.close).collect())
    }

    /// The last `n` volumes, oldest first
    pub fn volumes(&self, symbol: &str, n: usize) -> Result<Vec<f64>> {
        Ok(self.tail(symbol, n)?.map(|bar| bar.volume).collect())
    }

    fn tail(&self, symbol: &str, n: usize) -> Result<impl Iterator<Item = &Bar>> {
        let window = self
            .data
            .get(symbol)
            .ok_or_else(|| EngineError::data_unavailable(symbol, "no history loaded"))?;

        if window.len() < n {
            return Err(EngineError::data_unavailable(
                symbol,
                format!("insufficient history: {} of {} bars", window.len(), n),
            ));
        }

        Ok(window.iter().skip(window.len() - n))
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.data.get(symbol).map(|w| w.len()).unwrap_or(0)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bar(day: i64, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day),
            close,
            volume: close * 1000.0,
        }
    }

    #[test]
    fn test_push_respects_capacity() {
        let mut store = PriceWindowStore::new(5);

        for i in 0..10 {
            store.push_bar("600000", bar(i, 100.0 + i as f64));
        }

        assert_eq!(store.len("600000"), 5);
        let closes = store.closes("600000", 5).unwrap();
        assert_eq!(closes, vec![105.0, 106.0, 107.0, 108.0, 109.0]);
    }

    #[test]
    fn test_replace_keeps_most_recent() {
        let mut store = PriceWindowStore::new(3);
        store.replace("000001", (0..6).map(|i| bar(i, i as f64)).collect());

        assert_eq!(store.closes("000001", 3).unwrap(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_short_window_is_insufficient() {
        let mut store = PriceWindowStore::new(40);
        store.replace("000001", (0..39).map(|i| bar(i, 10.0)).collect());

        let result = store.closes("000001", 40);
        assert!(matches!(result, Err(EngineError::DataUnavailable { .. })));
        // a shorter request is still served
        assert_eq!(store.closes("000001", 5).unwrap().len(), 5);
    }

    #[test]
    fn test_unknown_symbol() {
        let store = PriceWindowStore::new(40);
        assert!(store.volumes("999999", 5).is_err());
        assert_eq!(store.len("999999"), 0);
    }

    #[test]
    fn test_volumes_tail() {
        let mut store = PriceWindowStore::new(10);
        for i in 0..8 {
            store.push_bar("000002", bar(i, 1.0 + i as f64));
        }

        let volumes = store.volumes("000002", 2).unwrap();
        assert_eq!(volumes, vec![7000.0, 8000.0]);
    }
}
