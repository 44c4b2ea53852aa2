// Core modules
pub mod backtest;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod market;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use error::{EngineError, RejectReason};
pub use execution::ExecutionGateway;
pub use market::MarketDataProvider;
pub use models::*;
pub use settings::StrategyConfig;
pub use strategy::{CycleContext, Strategy, StrategyEngine, StrategyState, StrategyStatus};

// Error handling
pub type Result<T> = std::result::Result<T, EngineError>;
