// Risk management module
pub mod drawdown;

pub use drawdown::{DrawdownStop, PortfolioTracker, StopLossTrip};
