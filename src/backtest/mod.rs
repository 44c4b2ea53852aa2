// Paper host: deterministic market and broker for driving the engine
pub mod metrics;
pub mod paper;
pub mod runner;
pub mod scripted;
pub mod synthetic;

pub use metrics::{EquityPoint, RunMetrics};
pub use paper::PaperBroker;
pub use runner::SessionRunner;
pub use scripted::ScriptedMarket;
pub use synthetic::{SessionPhase, SyntheticMarket, WARMUP_DAYS};
