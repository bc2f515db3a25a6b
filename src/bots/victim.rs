//! Victim Trader Bot
//!
//! Ordinary traders with a behavioural persona. A victim decides when to
//! trade (exponential waits that shorten under stress), what to trade (the
//! side it holds more of), and how much, then settles the intent against a
//! pool with its slippage tolerance.

use crate::config::VictimConfig;
use crate::error::{SimError, SimResult};
use crate::simulation::pool_state::SimulatedPool;
use crate::utils::amm_math::PoolState;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Safety buffer on minimum output when settling
const MIN_OUTPUT_BUFFER: f64 = 0.01;
/// Share of a balance a victim is willing to trade
const MAX_BALANCE_SHARE: f64 = 0.8;
const MIN_WAIT_SECS: f64 = 1.0;
const REJECTION_STRESS: f64 = 0.1;
const ATTACK_STRESS: f64 = 0.05;

/// Behavioural persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Retail,
    Whale,
    Dca,
    Arbitrage,
    Panic,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::Retail,
        Persona::Whale,
        Persona::Dca,
        Persona::Arbitrage,
        Persona::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Retail => "retail",
            Persona::Whale => "whale",
            Persona::Dca => "dca",
            Persona::Arbitrage => "arbitrage",
            Persona::Panic => "panic",
        }
    }

    /// Default trading pattern of the persona
    pub fn pattern(&self) -> TradingPattern {
        let both = vec!["TOKEN1".to_string(), "TOKEN2".to_string()];
        match self {
            Persona::Retail => TradingPattern {
                name: "Retail Trader".to_string(),
                interval_secs: 300.0,
                amount_min: 5.0,
                amount_max: 50.0,
                slippage_tolerance: 0.02,
                gas_sensitivity: 0.8,
                patience: 0.3,
                preferred_tokens: both,
            },
            Persona::Whale => TradingPattern {
                name: "Whale Trader".to_string(),
                interval_secs: 1800.0,
                amount_min: 200.0,
                amount_max: 1000.0,
                slippage_tolerance: 0.012,
                gas_sensitivity: 0.1,
                patience: 0.8,
                preferred_tokens: both,
            },
            Persona::Dca => TradingPattern {
                name: "DCA Bot".to_string(),
                interval_secs: 60.0,
                amount_min: 20.0,
                amount_max: 30.0,
                slippage_tolerance: 0.015,
                gas_sensitivity: 0.5,
                patience: 0.9,
                preferred_tokens: vec!["TOKEN1".to_string()],
            },
            Persona::Arbitrage => TradingPattern {
                name: "Arbitrage Bot".to_string(),
                interval_secs: 15.0,
                amount_min: 50.0,
                amount_max: 200.0,
                slippage_tolerance: 0.008,
                gas_sensitivity: 0.6,
                patience: 0.2,
                preferred_tokens: both,
            },
            Persona::Panic => TradingPattern {
                name: "Panic Seller".to_string(),
                interval_secs: 600.0,
                amount_min: 100.0,
                amount_max: 500.0,
                slippage_tolerance: 0.05,
                gas_sensitivity: 0.2,
                patience: 0.1,
                preferred_tokens: both,
            },
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retail" => Ok(Persona::Retail),
            "whale" => Ok(Persona::Whale),
            "dca" | "dca_bot" => Ok(Persona::Dca),
            "arbitrage" | "arbitrage_bot" => Ok(Persona::Arbitrage),
            "panic" | "panic_seller" => Ok(Persona::Panic),
            other => Err(format!("unknown persona: {}", other)),
        }
    }
}

/// Persona descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPattern {
    pub name: String,
    /// Mean seconds between trades
    pub interval_secs: f64,
    pub amount_min: f64,
    pub amount_max: f64,
    /// Base slippage tolerance (0.02 = 2%)
    pub slippage_tolerance: f64,
    /// 0..1
    pub gas_sensitivity: f64,
    /// 0..1, higher waits longer for good prices
    pub patience: f64,
    pub preferred_tokens: Vec<String>,
}

/// Settlement state of a trade intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Executed { amount_out: f64, slippage: f64 },
    /// Slippage above the trade's tolerance
    Rejected { slippage: f64 },
    /// Pool could not serve the trade
    Failed { error: String },
}

/// A victim's planned swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub id: String,
    pub victim_id: String,
    pub pool_id: String,
    pub token_in: String,
    pub token_out: String,
    pub a_to_b: bool,
    pub amount_in: f64,
    pub max_slippage: f64,
    /// Output floor fixed when the intent was created
    pub min_amount_out: f64,
    /// Simulated seconds
    pub created_at: f64,
    pub status: TradeStatus,
}

impl TradeIntent {
    pub fn is_pending(&self) -> bool {
        self.status == TradeStatus::Pending
    }

    pub fn is_executed(&self) -> bool {
        matches!(self.status, TradeStatus::Executed { .. })
    }
}

/// A settled trade in a victim's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub intent: TradeIntent,
    pub mev_attacked: bool,
    pub mev_loss: f64,
}

/// Lifetime statistics of one victim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VictimStatistics {
    pub victim_id: String,
    pub persona: Persona,
    pub total_trades: usize,
    pub executed_trades: usize,
    pub rejected_trades: usize,
    pub failed_trades: usize,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub mev_attacks: usize,
    pub mev_attack_rate: f64,
    pub total_mev_loss: f64,
    pub avg_slippage: f64,
    pub stress_level: f64,
    pub balances: BTreeMap<String, f64>,
}

/// One simulated victim trader
#[derive(Debug, Clone)]
pub struct VictimAgent {
    id: String,
    persona: Persona,
    pattern: TradingPattern,
    balances: BTreeMap<String, f64>,
    rng: StdRng,
    stress: f64,
    last_trade_at: f64,
    next_wait: f64,
    trades_generated: u64,
    history: Vec<TradeRecord>,
    total_mev_loss: f64,
}

impl VictimAgent {
    pub fn new(config: &VictimConfig, rng: StdRng) -> Self {
        let pattern = config
            .custom_pattern
            .clone()
            .unwrap_or_else(|| config.persona.pattern());
        info!("Initialized victim trader {} ({})", config.id, config.persona);

        let mut victim = Self {
            id: config.id.clone(),
            persona: config.persona,
            pattern,
            balances: config.initial_balances.clone(),
            rng,
            stress: 0.0,
            last_trade_at: 0.0,
            next_wait: 0.0,
            trades_generated: 0,
            history: Vec::new(),
            total_mev_loss: 0.0,
        };
        victim.next_wait = victim.draw_wait();
        victim
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn pattern(&self) -> &TradingPattern {
        &self.pattern
    }

    pub fn stress(&self) -> f64 {
        self.stress
    }

    pub fn balance(&self, token: &str) -> f64 {
        self.balances.get(token).copied().unwrap_or(0.0)
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    /// Simulated time at which the victim next wants to trade
    pub fn next_trade_at(&self) -> f64 {
        self.last_trade_at + self.next_wait
    }

    /// Exponential wait around the mean interval, shortened by stress
    fn draw_wait(&mut self) -> f64 {
        let mean = self.pattern.interval_secs.max(MIN_WAIT_SECS);
        let raw = match Exp::new(1.0 / mean) {
            Ok(exp) => exp.sample(&mut self.rng),
            Err(_) => mean,
        };
        (raw * (1.0 - self.stress * 0.5)).max(MIN_WAIT_SECS)
    }

    /// Current slippage tolerance: base plus stress and impatience terms
    pub fn slippage_tolerance(&self) -> f64 {
        self.pattern.slippage_tolerance + self.stress * 0.02 + (1.0 - self.pattern.patience) * 0.01
    }

    /// Pick a pool holding a preferred token and sell the side we hold more of
    fn select_trade(&mut self, pools: &[SimulatedPool]) -> Option<(usize, bool)> {
        let candidates: Vec<usize> = pools
            .iter()
            .enumerate()
            .filter(|(_, p)| self.pattern.preferred_tokens.iter().any(|t| p.has_token(t)))
            .map(|(i, _)| i)
            .collect();
        let &index = candidates.choose(&mut self.rng)?;
        let pool = &pools[index];

        let balance_a = self.balance(&pool.token_a);
        let balance_b = self.balance(&pool.token_b);
        if balance_a > balance_b && balance_a > 0.0 {
            Some((index, true))
        } else if balance_b > 0.0 {
            Some((index, false))
        } else {
            None
        }
    }

    fn trade_amount(&mut self, token_in: &str) -> f64 {
        let available = self.balance(token_in);
        let effective_max = self.pattern.amount_max.min(available * MAX_BALANCE_SHARE);
        let effective_min = self.pattern.amount_min.min(effective_max);
        if effective_min <= 0.0 {
            return 0.0;
        }

        match self.persona {
            Persona::Dca => (effective_min + effective_max) / 2.0,
            Persona::Whale => self.rng.gen_range(effective_max * 0.7..=effective_max),
            Persona::Panic => (available * self.rng.gen_range(0.3..=0.7)).min(effective_max),
            Persona::Retail | Persona::Arbitrage => {
                self.rng.gen_range(effective_min..=effective_max)
            }
        }
    }

    /// Produce a trade intent if the wait since the last trade has elapsed
    pub fn generate_trade(&mut self, pools: &[SimulatedPool], now: f64) -> Option<TradeIntent> {
        if now < self.next_trade_at() {
            return None;
        }

        let Some((index, a_to_b)) = self.select_trade(pools) else {
            debug!("[{}] No tradeable pool", self.id);
            return None;
        };
        let pool = &pools[index];
        let (token_in, token_out) = pool.tokens_for(a_to_b);

        let amount_in = self.trade_amount(token_in);
        if amount_in <= 0.0 {
            debug!("[{}] Trade amount too low: {}", self.id, amount_in);
            return None;
        }
        let expected = match pool.quote(amount_in, a_to_b) {
            Ok(quote) => quote,
            Err(e) => {
                debug!("[{}] Cannot quote trade: {}", self.id, e);
                return None;
            }
        };

        self.trades_generated += 1;
        self.last_trade_at = now;
        self.next_wait = self.draw_wait();

        let intent = TradeIntent {
            id: format!("{}-trade-{}", self.id, self.trades_generated),
            victim_id: self.id.clone(),
            pool_id: pool.id.clone(),
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            a_to_b,
            amount_in,
            max_slippage: self.slippage_tolerance(),
            min_amount_out: PoolState::min_output(&expected, MIN_OUTPUT_BUFFER),
            created_at: now,
            status: TradeStatus::Pending,
        };
        debug!(
            "[{}] Generated trade: {:.4} {} -> {}",
            self.id, amount_in, intent.token_in, intent.token_out
        );
        Some(intent)
    }

    /// Settle an intent against its pool. Excess slippage or output below the
    /// intent's floor rejects the trade and leaves balances alone; other pool
    /// errors mark it failed and are returned.
    pub fn execute_trade(
        &mut self,
        intent: &mut TradeIntent,
        pool: &mut SimulatedPool,
        round: u64,
    ) -> SimResult<()> {
        if !intent.is_pending() {
            return Ok(());
        }

        let settled = match pool.swap(
            intent.amount_in,
            intent.a_to_b,
            intent.max_slippage,
            intent.min_amount_out,
            round,
            "victim_trade",
        ) {
            Ok(settled) => settled,
            Err(SimError::SlippageExceeded { slippage, .. }) => {
                warn!("[{}] Trade {} rejected: slippage too high", self.id, intent.id);
                intent.status = TradeStatus::Rejected { slippage };
                self.reject(intent);
                return Ok(());
            }
            Err(SimError::BelowMinimumOutput { amount_out, min_out }) => {
                warn!(
                    "[{}] Trade {} rejected: output {:.6} below floor {:.6}",
                    self.id, intent.id, amount_out, min_out
                );
                let slippage = pool
                    .quote(intent.amount_in, intent.a_to_b)
                    .map_or(0.0, |q| q.slippage);
                intent.status = TradeStatus::Rejected { slippage };
                self.reject(intent);
                return Ok(());
            }
            Err(e) => return Err(self.fail(intent, e)),
        };

        *self.balances.entry(intent.token_in.clone()).or_insert(0.0) -= intent.amount_in;
        *self.balances.entry(intent.token_out.clone()).or_insert(0.0) += settled.amount_out;
        intent.status = TradeStatus::Executed {
            amount_out: settled.amount_out,
            slippage: settled.slippage,
        };
        self.history.push(TradeRecord {
            intent: intent.clone(),
            mev_attacked: false,
            mev_loss: 0.0,
        });

        info!(
            "[{}] Executed trade {}: {:.6} {}",
            self.id, intent.id, settled.amount_out, intent.token_out
        );
        Ok(())
    }

    fn reject(&mut self, intent: &TradeIntent) {
        self.stress = (self.stress + REJECTION_STRESS).min(1.0);
        self.history.push(TradeRecord {
            intent: intent.clone(),
            mev_attacked: false,
            mev_loss: 0.0,
        });
    }

    fn fail(&mut self, intent: &mut TradeIntent, error: SimError) -> SimError {
        warn!("[{}] Failed to execute trade {}: {}", self.id, intent.id, error);
        intent.status = TradeStatus::Failed {
            error: error.to_string(),
        };
        self.reject(intent);
        error
    }

    /// Mark an executed trade as attacked. Returns false if no executed
    /// trade has that id.
    pub fn record_mev_attack(&mut self, trade_id: &str, loss: f64) -> bool {
        let Some(record) = self
            .history
            .iter_mut()
            .find(|r| r.intent.id == trade_id && r.intent.is_executed())
        else {
            return false;
        };

        record.mev_attacked = true;
        record.mev_loss += loss;
        self.total_mev_loss += loss;
        self.stress = (self.stress + ATTACK_STRESS).min(1.0);
        warn!("[{}] Trade {} was MEV attacked: {:.6} loss", self.id, trade_id, loss);
        true
    }

    pub fn statistics(&self) -> VictimStatistics {
        let executed: Vec<&TradeRecord> =
            self.history.iter().filter(|r| r.intent.is_executed()).collect();
        let rejected = self
            .history
            .iter()
            .filter(|r| matches!(r.intent.status, TradeStatus::Rejected { .. }))
            .count();
        let failed = self
            .history
            .iter()
            .filter(|r| matches!(r.intent.status, TradeStatus::Failed { .. }))
            .count();
        let mev_attacks = self.history.iter().filter(|r| r.mev_attacked).count();
        let total_volume: f64 = executed.iter().map(|r| r.intent.amount_in).sum();
        let total_slippage: f64 = executed
            .iter()
            .map(|r| match r.intent.status {
                TradeStatus::Executed { slippage, .. } => slippage,
                _ => 0.0,
            })
            .sum();
        let per_executed = |v: f64| {
            if executed.is_empty() {
                0.0
            } else {
                v / executed.len() as f64
            }
        };

        VictimStatistics {
            victim_id: self.id.clone(),
            persona: self.persona,
            total_trades: self.history.len(),
            executed_trades: executed.len(),
            rejected_trades: rejected,
            failed_trades: failed,
            total_volume,
            avg_trade_size: per_executed(total_volume),
            mev_attacks,
            mev_attack_rate: per_executed(mev_attacks as f64),
            total_mev_loss: self.total_mev_loss,
            avg_slippage: per_executed(total_slippage),
            stress_level: self.stress,
            balances: self.balances.clone(),
        }
    }
}
