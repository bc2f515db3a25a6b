//! Extractor and victim agents

pub mod extractor;
pub mod strategy;
pub mod victim;

pub use extractor::{AttackOutcome, ExtractorAgent, ExtractorPerformance, Opportunity};
pub use strategy::{StrategyEngine, StrategyKind};
pub use victim::{Persona, TradeIntent, VictimAgent, VictimStatistics};
