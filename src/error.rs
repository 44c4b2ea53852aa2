use std::fmt;

use thiserror::Error;

/// Why an order was refused by the gateway (or never sent)
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Trading in the symbol is suspended for the session
    Halted,
    /// Closeable quantity is zero (e.g. shares bought today under T+1)
    NothingToClose,
    InsufficientCash,
    /// Order size rounds down to zero lots
    BelowLotSize,
    /// Reference price missing or non-positive
    InvalidPrice,
    /// Free-form rejection passed through from the broker
    Gateway(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Halted => write!(f, "symbol halted"),
            RejectReason::NothingToClose => write!(f, "no closeable quantity"),
            RejectReason::InsufficientCash => write!(f, "insufficient cash"),
            RejectReason::BelowLotSize => write!(f, "quantity below one lot"),
            RejectReason::InvalidPrice => write!(f, "reference price unavailable"),
            RejectReason::Gateway(msg) => write!(f, "gateway: {}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or short market data. Never fatal: callers exclude the symbol.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Order refused. Logged per symbol; the sweep continues.
    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: RejectReason },

    /// Fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    #[error("state persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn data_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn rejected(symbol: &str, reason: RejectReason) -> Self {
        EngineError::OrderRejected {
            symbol: symbol.to_string(),
            reason,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Config(_) | EngineError::Persistence(_))
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}
