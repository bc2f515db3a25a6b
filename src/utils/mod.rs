//! Utility modules

pub mod amm_math;
pub mod hash;
pub mod stats;

pub use amm_math::{PoolState, SwapQuote};
pub use hash::{attack_tx_hash, TxLeg};
pub use stats::SampleStats;
