//! Market Outcome Source
//!
//! Stand-in for real execution: whether a landed sandwich succeeds and how far
//! realized profit, gas and victim loss drift from their estimates. Agents own
//! one of these so runs can be seeded, and tests can script exact outcomes.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::VecDeque;

/// Source of execution outcomes for one extractor
pub trait MarketOutcome: Send {
    /// Confidence score assigned to a freshly detected opportunity
    fn confidence(&mut self) -> f64;

    /// Whether a landed attack succeeds, given the agent's success probability
    fn execution_succeeds(&mut self, success_probability: f64) -> bool;

    /// Realized / estimated gross profit
    fn profit_multiplier(&mut self) -> f64;

    /// Realized / estimated gas cost
    fn gas_multiplier(&mut self) -> f64;

    /// Victim loss / realized gross profit (always above 1)
    fn victim_loss_multiplier(&mut self) -> f64;
}

/// Seeded random outcomes with the research defaults
#[derive(Debug, Clone)]
pub struct RandomMarket {
    rng: StdRng,
}

impl RandomMarket {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl MarketOutcome for RandomMarket {
    fn confidence(&mut self) -> f64 {
        self.rng.gen_range(0.6..=0.95)
    }

    fn execution_succeeds(&mut self, success_probability: f64) -> bool {
        self.rng.gen_bool(success_probability.clamp(0.0, 1.0))
    }

    fn profit_multiplier(&mut self) -> f64 {
        self.rng.gen_range(0.8..=1.2)
    }

    fn gas_multiplier(&mut self) -> f64 {
        self.rng.gen_range(0.9..=1.3)
    }

    fn victim_loss_multiplier(&mut self) -> f64 {
        self.rng.gen_range(1.1..=1.5)
    }
}

/// Deterministic outcomes: queued success flags, then a fallback
#[derive(Debug, Clone)]
pub struct ScriptedMarket {
    successes: VecDeque<bool>,
    pub default_success: bool,
    pub confidence: f64,
    pub profit_multiplier: f64,
    pub gas_multiplier: f64,
    pub victim_loss_multiplier: f64,
}

impl Default for ScriptedMarket {
    fn default() -> Self {
        Self {
            successes: VecDeque::new(),
            default_success: true,
            confidence: 0.9,
            profit_multiplier: 1.0,
            gas_multiplier: 1.0,
            victim_loss_multiplier: 1.2,
        }
    }
}

impl ScriptedMarket {
    /// Every attempt succeeds (or fails) with exact estimates
    pub fn always(success: bool) -> Self {
        Self {
            default_success: success,
            ..Default::default()
        }
    }

    /// Play these outcomes in order, then fall back to `default_success`
    pub fn with_successes(mut self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.successes.extend(outcomes);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

impl MarketOutcome for ScriptedMarket {
    fn confidence(&mut self) -> f64 {
        self.confidence
    }

    fn execution_succeeds(&mut self, _success_probability: f64) -> bool {
        self.successes.pop_front().unwrap_or(self.default_success)
    }

    fn profit_multiplier(&mut self) -> f64 {
        self.profit_multiplier
    }

    fn gas_multiplier(&mut self) -> f64 {
        self.gas_multiplier
    }

    fn victim_loss_multiplier(&mut self) -> f64 {
        self.victim_loss_multiplier
    }
}
