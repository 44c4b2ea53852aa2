// Order execution module
pub mod executor;
pub mod gateway;
pub mod router;

pub use executor::{Executor, SweepReport};
pub use gateway::ExecutionGateway;
pub use router::OrderRouter;
