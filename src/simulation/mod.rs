//! Simulation modules

pub mod gateway;
pub mod latency;
pub mod market;
pub mod observer;
pub mod orchestrator;
pub mod pool_state;

pub use gateway::{ChainGateway, InMemoryGateway};
pub use latency::{LatencyModel, LatencyProfile, LatencyStage};
pub use market::{MarketOutcome, RandomMarket, ScriptedMarket};
pub use observer::{SimulationObserver, StopHandle};
pub use orchestrator::{
    CompetitionOrchestrator, RoundSnapshot, RunTotals, SimulationRun, StopReason,
};
pub use pool_state::{PoolSnapshot, SimulatedPool};
