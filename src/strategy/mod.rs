// Rotation strategy: entry, exit evaluation and the Normal/Clearing cycle
pub mod engine;
pub mod exit_signals;
pub mod squeeze;
pub mod state;

pub use engine::{EngineEvent, StrategyEngine};
pub use exit_signals::{
    ExitCondition, ExitInputs, ExitReport, ExitSignal, ExitSignalEvaluator, TargetTrigger,
};
pub use squeeze::{SqueezeDetector, SqueezeMeasurement, SqueezeReading};
pub use state::{StrategyState, StrategyStatus};

use chrono::{DateTime, NaiveDate, Utc};

use crate::execution::ExecutionGateway;
use crate::market::MarketDataProvider;
use crate::Result;

/// Clock handed to the strategy by the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleContext {
    pub now: DateTime<Utc>,
    /// Last settled trading date, used to query valuation tables
    pub previous_date: NaiveDate,
}

impl CycleContext {
    pub fn new(now: DateTime<Utc>, previous_date: NaiveDate) -> Self {
        Self { now, previous_date }
    }

    pub fn trading_date(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Scheduler-facing lifecycle of a daily strategy
pub trait Strategy {
    /// Get strategy name
    fn name(&self) -> &str;

    /// Called on every trading bar: entries and liquidation attempts
    fn on_bar(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        gateway: &mut dyn ExecutionGateway,
    ) -> Result<()>;

    /// Called once after the session settles: all valuation-dependent decisions
    fn on_close(
        &mut self,
        ctx: &CycleContext,
        market: &dyn MarketDataProvider,
        gateway: &dyn ExecutionGateway,
    ) -> Result<()>;
}
