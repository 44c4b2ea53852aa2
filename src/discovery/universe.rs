use chrono::NaiveDate;

use crate::market::{fetch_listing, MarketDataProvider};
use crate::models::{FundamentalRow, VenueRule};
use crate::settings::StrategyConfig;

/// Market-cap percentile band selector
///
/// Ranks the whole market by capitalisation (ascending) and keeps the slice
/// between two percentiles, e.g. the 5%–10% band: small, but above the very
/// smallest names.
#[derive(Debug, Clone)]
pub struct UniversePicker {
    lower_percentile: f64,
    upper_percentile: f64,
    stocknum: usize,
}

impl UniversePicker {
    pub fn new(lower_percentile: f64, upper_percentile: f64, stocknum: usize) -> Self {
        Self {
            lower_percentile,
            upper_percentile,
            stocknum,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.lower_percentile,
            config.upper_percentile,
            config.stocknum,
        )
    }

    /// Half-open index range `[low, high)` of the band in a table of `n` rows
    ///
    /// Never empty for `n >= 1`: a degenerate band is widened to one row.
    pub fn band_indices(&self, n: usize) -> (usize, usize) {
        let idx_low = (n as f64 * self.lower_percentile).floor() as usize;
        let mut idx_high = (n as f64 * self.upper_percentile).floor() as usize;

        if idx_high <= idx_low {
            idx_high = (idx_low + 1).min(n);
        }

        (idx_low.min(n), idx_high)
    }

    /// Symbols inside the band, ascending by market cap
    ///
    /// Rows without a usable capitalisation are dropped first. Ties keep
    /// their input order.
    pub fn rank_band(&self, rows: Vec<FundamentalRow>) -> Vec<String> {
        let mut ranked: Vec<(String, f64)> = rows
            .into_iter()
            .filter_map(|row| match row.market_cap {
                Some(cap) if cap.is_finite() => Some((row.symbol, cap)),
                _ => None,
            })
            .collect();

        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let (idx_low, idx_high) = self.band_indices(ranked.len());

        tracing::debug!(
            "Market cap band [{}, {}) of {} ranked symbols",
            idx_low,
            idx_high,
            ranked.len()
        );

        ranked
            .drain(idx_low..idx_high)
            .map(|(symbol, _)| symbol)
            .collect()
    }

    /// Full selection: band, tradability filter, truncation
    ///
    /// Uses the valuation table of `query_date` (the prior settled session).
    /// Any data problem yields fewer (possibly zero) candidates, never an error.
    pub fn pick(
        &self,
        market: &dyn MarketDataProvider,
        query_date: NaiveDate,
        rule: &VenueRule,
    ) -> Vec<String> {
        let rows = match market.fundamentals(query_date) {
            Ok(rows) if !rows.is_empty() => rows,
            Ok(_) => {
                tracing::warn!("Empty valuation table for {}", query_date);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to load valuation table for {}: {}", query_date, e);
                return Vec::new();
            }
        };

        let band = self.rank_band(rows);
        let band_size = band.len();

        let candidates: Vec<String> = band
            .into_iter()
            .filter(|symbol| match fetch_listing(market, symbol, rule) {
                Ok(listing) if listing.is_tradable() => true,
                Ok(listing) => {
                    tracing::debug!(
                        "Filtered {} (paused: {}, risk flagged: {})",
                        symbol,
                        listing.paused,
                        listing.risk_flagged
                    );
                    false
                }
                Err(e) => {
                    tracing::debug!("Filtered {}: {}", symbol, e);
                    false
                }
            })
            .take(self.stocknum)
            .collect();

        tracing::info!(
            "Universe for {}: {} in band, {} candidates",
            query_date,
            band_size,
            candidates.len()
        );

        candidates
    }
}

impl Default for UniversePicker {
    fn default() -> Self {
        Self::new(0.05, 0.10, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(caps: &[f64]) -> Vec<FundamentalRow> {
        caps.iter()
            .enumerate()
            .map(|(i, &cap)| FundamentalRow {
                symbol: format!("{:06}", i),
                market_cap: Some(cap),
            })
            .collect()
    }

    #[test]
    fn test_band_for_200_rows() {
        let picker = UniversePicker::default();
        assert_eq!(picker.band_indices(200), (10, 20));
    }

    #[test]
    fn test_band_widened_for_small_tables() {
        let picker = UniversePicker::default();
        assert_eq!(picker.band_indices(1), (0, 1));
        assert_eq!(picker.band_indices(5), (0, 1));
        assert_eq!(picker.band_indices(15), (0, 1));
        assert_eq!(picker.band_indices(0), (0, 0));
    }

    #[test]
    fn test_rank_band_sorts_ascending() {
        let picker = UniversePicker::default();
        // 20 rows in descending cap order: 20.0, 19.0, ..., 1.0
        let caps: Vec<f64> = (1..=20).rev().map(|c| c as f64).collect();
        let band = picker.rank_band(rows(&caps));

        // idx_low = 1, idx_high = 2: second smallest (cap 2.0 at input index 18)
        assert_eq!(band, vec!["000018".to_string()]);
    }

    #[test]
    fn test_rank_band_drops_missing_caps() {
        let picker = UniversePicker::default();
        let mut table = rows(&[5.0, 3.0]);
        table.push(FundamentalRow {
            symbol: "NOCAP".to_string(),
            market_cap: None,
        });
        table.push(FundamentalRow {
            symbol: "NAN".to_string(),
            market_cap: Some(f64::NAN),
        });

        let band = picker.rank_band(table);
        assert_eq!(band, vec!["000001".to_string()]);
    }

    #[test]
    fn test_rank_band_stable_on_ties() {
        let picker = UniversePicker::new(0.0, 1.0, 10);
        let band = picker.rank_band(rows(&[1.0, 1.0, 1.0]));
        assert_eq!(band, vec!["000000", "000001", "000002"]);
    }

    #[test]
    fn test_empty_table() {
        let picker = UniversePicker::default();
        assert!(picker.rank_band(Vec::new()).is_empty());
    }
}
