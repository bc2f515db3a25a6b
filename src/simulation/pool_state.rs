//! Simulated Pool State Management
//!
//! A named trading pair around `PoolState`. Every executed swap goes through
//! here so pool errors carry the pool id and the history records what moved
//! the price.

use crate::error::SimResult;
use crate::utils::amm_math::{PoolState, SwapQuote};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Most recent pool events kept in `history`
pub const HISTORY_CAPACITY: usize = 1_000;

/// Simulated pool with history tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedPool {
    pub id: String,
    pub token_a: String,
    pub token_b: String,
    /// Current pool state
    pub state: PoolState,
    /// Most recent events, oldest first, capped at `HISTORY_CAPACITY`
    pub history: VecDeque<PoolSnapshot>,
    /// Initial state for resets
    initial_state: PoolState,
}

/// Pool state after one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool_id: String,
    pub reserve_a: f64,
    pub reserve_b: f64,
    pub price_ratio: f64,
    pub round: u64,
    pub event: String,
}

impl SimulatedPool {
    pub fn new(id: &str, token_a: &str, token_b: &str, state: PoolState) -> Self {
        let mut pool = Self {
            id: id.to_string(),
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            state: state.clone(),
            history: VecDeque::new(),
            initial_state: state,
        };
        pool.record(0, "initialization");
        pool
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.token_a == token || self.token_b == token
    }

    /// Swap direction for selling `token_in`; `None` if the pool doesn't hold it
    pub fn direction_for(&self, token_in: &str) -> Option<bool> {
        if token_in == self.token_a {
            Some(true)
        } else if token_in == self.token_b {
            Some(false)
        } else {
            None
        }
    }

    /// (token_in, token_out) for a direction
    pub fn tokens_for(&self, a_to_b: bool) -> (&str, &str) {
        if a_to_b {
            (&self.token_a, &self.token_b)
        } else {
            (&self.token_b, &self.token_a)
        }
    }

    pub fn quote(&self, amount_in: f64, a_to_b: bool) -> SimResult<SwapQuote> {
        self.state.quote(amount_in, a_to_b).map_err(|e| e.for_pool(&self.id))
    }

    /// Execute a swap and record it; the pool is unchanged on error.
    /// Pass a `min_out` of 0 for no output floor.
    pub fn swap(
        &mut self,
        amount_in: f64,
        a_to_b: bool,
        tolerance: f64,
        min_out: f64,
        round: u64,
        event: &str,
    ) -> SimResult<SwapQuote> {
        let quote = self
            .state
            .apply_swap(amount_in, a_to_b, tolerance, min_out)
            .map_err(|e| e.for_pool(&self.id))?;
        self.record(round, event);
        Ok(quote)
    }

    /// Overwrite reserves with externally observed values
    pub fn sync_reserves(&mut self, reserve_a: f64, reserve_b: f64, round: u64) {
        self.state.reserve_a = reserve_a;
        self.state.reserve_b = reserve_b;
        if reserve_a > 0.0 {
            self.state.price_ratio = reserve_b / reserve_a;
        }
        self.initial_state = self.state.clone();
        self.record(round, "gateway_sync");
    }

    /// Current state as a snapshot, without recording it
    pub fn snapshot(&self, round: u64, event: &str) -> PoolSnapshot {
        PoolSnapshot {
            pool_id: self.id.clone(),
            reserve_a: self.state.reserve_a,
            reserve_b: self.state.reserve_b,
            price_ratio: self.state.price_ratio,
            round,
            event: event.to_string(),
        }
    }

    fn record(&mut self, round: u64, event: &str) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        let snapshot = self.snapshot(round, event);
        self.history.push_back(snapshot);
    }

    /// Reset to initial state
    pub fn reset(&mut self) {
        self.state = self.initial_state.clone();
        self.history.clear();
        self.record(0, "reset");
    }

    pub fn price_a_in_b(&self) -> f64 {
        self.state.price_a_in_b()
    }
}
