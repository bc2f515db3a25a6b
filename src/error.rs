//! Error types for the competition simulation
//!
//! Skips (low profit, low confidence, insufficient balance) are not errors and
//! never show up here; see `bots::extractor::SkipReason`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Realized slippage of a swap is above the caller's tolerance
    #[error("slippage {slippage:.4} exceeds tolerance {tolerance:.4}")]
    SlippageExceeded { slippage: f64, tolerance: f64 },

    /// Output at settlement fell below the trader's minimum
    #[error("output {amount_out:.6} below minimum {min_out:.6}")]
    BelowMinimumOutput { amount_out: f64, min_out: f64 },

    /// Pool has zero reserves on at least one side
    #[error("pool {pool} has no liquidity")]
    NoLiquidity { pool: String },

    /// Swap output would drain more than the pool holds
    #[error("pool {pool}: requested {requested:.6} but only {available:.6} available")]
    InsufficientReserve {
        pool: String,
        requested: f64,
        available: f64,
    },

    #[error("unknown pool: {0}")]
    UnknownPool(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by an external collaborator (chain gateway, observer)
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Attach a pool identifier to errors raised by the pool-agnostic swap math
    pub fn for_pool(self, pool_id: &str) -> Self {
        match self {
            SimError::NoLiquidity { .. } => SimError::NoLiquidity {
                pool: pool_id.to_string(),
            },
            SimError::InsufficientReserve {
                requested,
                available,
                ..
            } => SimError::InsufficientReserve {
                pool: pool_id.to_string(),
                requested,
                available,
            },
            other => other,
        }
    }
}
