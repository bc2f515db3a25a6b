//! MEV Competition Simulator
//!
//! Several MEV extractors with different latency profiles and bidding
//! strategies compete to sandwich trades from simulated victim traders on
//! constant-product pools. Each round is one block; the fastest extractor
//! that lands its attack wins the victim trade.

pub mod analytics;
pub mod bots;
pub mod config;
pub mod error;
pub mod simulation;
pub mod utils;

pub use config::SimulationConfig;
pub use error::{SimError, SimResult};
pub use simulation::orchestrator::{CompetitionOrchestrator, SimulationRun};
