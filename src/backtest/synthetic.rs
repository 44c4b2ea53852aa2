use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::market::MarketDataProvider;
use crate::models::{Bar, FundamentalRow, Interval, Quote};
use crate::Result;

/// Settled sessions generated before the first simulated day
pub const WARMUP_DAYS: usize = 60;

/// Board prefixes cycled through when naming symbols
const BOARDS: [&str; 6] = ["600", "000", "300", "688", "601", "002"];

/// Sessions between volatility regime changes
const REGIME_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Quotes show the open; today's bar is not settled
    Open,
    /// Today's bar is settled and visible in history
    Closed,
}

#[derive(Debug, Clone)]
struct DailyBar {
    open: f64,
    close: f64,
    volume: f64,
    paused: bool,
}

#[derive(Debug, Clone)]
struct SyntheticSymbol {
    symbol: String,
    shares: f64,
    risk_flagged: bool,
    /// Valuation table leaves this name's cap blank
    missing_cap: bool,
    bars: Vec<DailyBar>,
}

/// Seeded multi-symbol daily market
///
/// Each symbol follows a random walk with its own drift and volatility
/// regimes that switch every few weeks, which yields both trending runs and
/// quiet squeezes. Roughly one session in a hundred is halted.
#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    dates: Vec<NaiveDate>,
    symbols: Vec<SyntheticSymbol>,
    index: HashMap<String, usize>,
    day: usize,
    phase: SessionPhase,
}

impl SyntheticMarket {
    /// Generate a market
    ///
    /// # Arguments
    /// * `seed` - RNG seed; equal seeds give identical markets
    /// * `num_symbols` - Listed names
    /// * `num_days` - Simulated sessions after the warmup
    pub fn generate(seed: u64, num_symbols: usize, num_days: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let total_days = WARMUP_DAYS + num_days;
        let dates = trading_dates(NaiveDate::from_ymd_opt(2023, 1, 2), total_days);

        let symbols: Vec<SyntheticSymbol> = (0..num_symbols)
            .map(|i| {
                let symbol = format!("{}{:03}", BOARDS[i % BOARDS.len()], i / BOARDS.len());
                generate_symbol(&mut rng, symbol, total_days, i)
            })
            .collect();

        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.symbol.clone(), i))
            .collect();

        tracing::info!(
            "Generated synthetic market: {} symbols, {} sessions (seed {})",
            num_symbols,
            dates.len(),
            seed
        );

        Self {
            dates,
            symbols,
            index,
            day: WARMUP_DAYS.saturating_sub(1),
            phase: SessionPhase::Closed,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.dates.get(self.day).copied()
    }

    /// Last settled session before the current one
    pub fn previous_date(&self) -> Option<NaiveDate> {
        self.day.checked_sub(1).and_then(|d| self.dates.get(d).copied())
    }

    /// Sessions left to simulate
    pub fn remaining_days(&self) -> usize {
        self.dates.len().saturating_sub(self.day + 1)
    }

    /// Advance to the next session's open
    ///
    /// Returns false once the generated calendar is exhausted.
    pub fn open_next_session(&mut self) -> bool {
        if self.day + 1 >= self.dates.len() {
            return false;
        }

        self.day += 1;
        self.phase = SessionPhase::Open;
        true
    }

    pub fn close_session(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.symbol.clone()).collect()
    }

    /// Current quotes for every symbol
    pub fn quotes(&self) -> Vec<Quote> {
        self.symbols.iter().map(|s| self.quote_for(s)).collect()
    }

    fn quote_for(&self, s: &SyntheticSymbol) -> Quote {
        let bar = &s.bars[self.day];
        let last_price = match self.phase {
            SessionPhase::Open => bar.open,
            SessionPhase::Closed => bar.close,
        };

        Quote {
            symbol: s.symbol.clone(),
            paused: bar.paused,
            risk_flagged: s.risk_flagged,
            last_price,
            open_price: bar.open,
        }
    }

    fn lookup(&self, symbol: &str) -> Result<&SyntheticSymbol> {
        self.index
            .get(symbol)
            .map(|&i| &self.symbols[i])
            .ok_or_else(|| EngineError::data_unavailable(symbol, "unknown symbol"))
    }

    /// Index one past the last settled session
    fn settled_end(&self) -> usize {
        match self.phase {
            SessionPhase::Open => self.day,
            SessionPhase::Closed => self.day + 1,
        }
    }
}

fn trading_dates(start: Option<NaiveDate>, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut date = match start {
        Some(date) => date,
        None => return dates,
    };

    while dates.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
        }
        date += Duration::days(1);
    }

    dates
}

fn generate_symbol(rng: &mut StdRng, symbol: String, days: usize, ordinal: usize) -> SyntheticSymbol {
    // log-uniform float between 50M and 5B shares
    let shares: f64 = rng.gen_range(50e6_f64.ln()..5e9_f64.ln()).exp();
    let base_volume: f64 = shares * rng.gen_range(0.002..0.02);
    let drift: f64 = rng.gen_range(-0.002..0.003);
    let base_vol: f64 = rng.gen_range(0.01..0.035);

    let mut price: f64 = rng.gen_range(3.0..60.0);
    let mut regime: f64 = 1.0;
    let mut bars = Vec::with_capacity(days);

    for day in 0..days {
        if day % REGIME_LENGTH == 0 {
            regime = rng.gen_range(0.25..1.6);
        }

        if day > 0 && rng.gen_bool(0.01) {
            bars.push(DailyBar {
                open: price,
                close: price,
                volume: 0.0,
                paused: true,
            });
            continue;
        }

        let gap: f64 = rng.gen_range(-0.01..0.01);
        let open = (price * (1.0 + gap)).max(1.0);
        let change: f64 = drift + base_vol * regime * rng.gen_range(-1.0..1.0);
        price = (price * (1.0 + change)).max(1.0);

        let volume = base_volume * regime * (1.0 + change.abs() * 20.0) * rng.gen_range(0.7..1.3);

        bars.push(DailyBar {
            open,
            close: price,
            volume,
            paused: false,
        });
    }

    SyntheticSymbol {
        symbol,
        shares,
        risk_flagged: rng.gen_bool(0.03),
        missing_cap: ordinal % 97 == 96,
        bars,
    }
}

impl MarketDataProvider for SyntheticMarket {
    fn fundamentals(&self, date: NaiveDate) -> Result<Vec<FundamentalRow>> {
        let day = self
            .dates
            .binary_search(&date)
            .map_err(|_| EngineError::data_unavailable("*", format!("no session on {}", date)))?;

        if day >= self.settled_end() {
            return Err(EngineError::data_unavailable(
                "*",
                format!("{} is not settled yet", date),
            ));
        }

        Ok(self
            .symbols
            .iter()
            .map(|s| FundamentalRow {
                symbol: s.symbol.clone(),
                market_cap: if s.missing_cap {
                    None
                } else {
                    Some(s.shares * s.bars[day].close)
                },
            })
            .collect())
    }

    fn quote(&self, symbol: &str) -> Result<Quote> {
        self.lookup(symbol).map(|s| self.quote_for(s))
    }

    fn history(&self, symbol: &str, count: usize, _interval: Interval) -> Result<Vec<Bar>> {
        let s = self.lookup(symbol)?;
        let end = self.settled_end();
        let start = end.saturating_sub(count);

        Ok((start..end)
            .map(|day| Bar {
                date: self.dates[day],
                close: s.bars[day].close,
                volume: s.bars[day].volume,
            })
            .collect())
    }
}
