//! Extractor Strategy Engines
//!
//! Decision logic behind an extractor: how much to bid, whether to commit to
//! an opportunity, how large a frontrun to place, and how to adapt after a
//! batch of outcomes. The variant set is fixed by the research design, so it
//! is a closed enum rather than a trait object.

use crate::bots::extractor::{AttackOutcome, Opportunity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcomes handed to `adapt` at a time
pub const ADAPT_WINDOW: usize = 5;

const AGGRESSIVE_BID_CAP: f64 = 95.0;
const CONSERVATIVE_BID_FLOOR: f64 = 1.0;
const ADAPTIVE_BID_MIN: f64 = 30.0;
const ADAPTIVE_BID_MAX: f64 = 90.0;
const ADAPTIVE_HISTORY_CAP: usize = 30;

/// Serializable strategy name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Aggressive,
    Conservative,
    /// Conservative policy with a low default bid
    Slow,
    Adaptive,
}

impl StrategyKind {
    pub fn default_bid_percentage(&self) -> f64 {
        match self {
            StrategyKind::Aggressive => 85.0,
            StrategyKind::Conservative => 60.0,
            StrategyKind::Slow => 40.0,
            StrategyKind::Adaptive => 70.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Aggressive => "aggressive",
            StrategyKind::Conservative => "conservative",
            StrategyKind::Slow => "slow",
            StrategyKind::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Ok(StrategyKind::Aggressive),
            "conservative" => Ok(StrategyKind::Conservative),
            "slow" => Ok(StrategyKind::Slow),
            "adaptive" => Ok(StrategyKind::Adaptive),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// High bids scaled up by competition, low execution bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggressiveStrategy {
    pub bid_percentage: f64,
}

impl AggressiveStrategy {
    pub fn new(bid_percentage: f64) -> Self {
        Self {
            bid_percentage: bid_percentage.min(AGGRESSIVE_BID_CAP),
        }
    }

    fn bid_amount(&self, opportunity: &Opportunity, competition_level: f64) -> f64 {
        let base_bid = opportunity.estimated_profit * (self.bid_percentage / 100.0);
        base_bid * (1.0 + competition_level * 0.5)
    }

    fn should_execute(&self, opportunity: &Opportunity) -> bool {
        opportunity.estimated_profit > opportunity.gas_cost * 2.0
    }

    fn frontrun_size(&self, opportunity: &Opportunity) -> f64 {
        opportunity.victim_amount_in * 0.6
    }

    fn adapt(&mut self, recent: &[AttackOutcome]) {
        if recent.is_empty() {
            return;
        }
        let success_rate = recent.iter().filter(|o| o.success).count() as f64 / recent.len() as f64;
        if success_rate > 0.7 {
            self.bid_percentage = (self.bid_percentage * 1.1).min(AGGRESSIVE_BID_CAP);
        }
    }
}

/// Flat bids, only high-confidence and clearly profitable attacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConservativeStrategy {
    pub bid_percentage: f64,
}

impl ConservativeStrategy {
    pub fn new(bid_percentage: f64) -> Self {
        Self {
            bid_percentage: bid_percentage.max(CONSERVATIVE_BID_FLOOR),
        }
    }

    fn bid_amount(&self, opportunity: &Opportunity) -> f64 {
        opportunity.estimated_profit * (self.bid_percentage / 100.0)
    }

    fn should_execute(&self, opportunity: &Opportunity) -> bool {
        opportunity.estimated_profit > opportunity.gas_cost * 3.0 && opportunity.confidence > 0.8
    }

    fn frontrun_size(&self, opportunity: &Opportunity) -> f64 {
        opportunity.victim_amount_in * 0.3
    }

    fn adapt(&mut self, recent: &[AttackOutcome]) {
        if recent.is_empty() {
            return;
        }
        let avg_profit = recent.iter().map(|o| o.net_profit).sum::<f64>() / recent.len() as f64;
        if avg_profit < 0.0 {
            self.bid_percentage = (self.bid_percentage * 0.9).max(CONSERVATIVE_BID_FLOOR);
        }
    }
}

/// Learns bid size, execution bar and frontrun size from its own results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveStrategy {
    pub bid_percentage: f64,
    pub learning_rate: f64,
    /// Profit / gas ratio an opportunity must beat
    pub min_profit_ratio: f64,
    competition_history: Vec<f64>,
    performance_history: Vec<f64>,
}

impl AdaptiveStrategy {
    pub fn new(bid_percentage: f64) -> Self {
        Self {
            bid_percentage: bid_percentage.clamp(ADAPTIVE_BID_MIN, ADAPTIVE_BID_MAX),
            learning_rate: 0.1,
            min_profit_ratio: 2.5,
            competition_history: Vec::new(),
            performance_history: Vec::new(),
        }
    }

    pub fn performance_history(&self) -> &[f64] {
        &self.performance_history
    }

    pub fn competition_history(&self) -> &[f64] {
        &self.competition_history
    }

    fn observe_competition(&mut self, competition_level: f64) {
        push_capped(&mut self.competition_history, competition_level);
    }

    fn bid_amount(&self, opportunity: &Opportunity, competition_level: f64) -> f64 {
        let multiplier = match last_n_mean(&self.competition_history, 5) {
            Some(avg) => 1.0 + avg * 0.7,
            None => 1.0 + competition_level * 0.4,
        };
        opportunity.estimated_profit * (self.bid_percentage / 100.0) * multiplier
    }

    fn should_execute(&self, opportunity: &Opportunity) -> bool {
        opportunity.estimated_profit > opportunity.gas_cost * self.min_profit_ratio
    }

    fn frontrun_size(&self, opportunity: &Opportunity) -> f64 {
        let ratio = match last_n_mean(&self.performance_history, 3) {
            Some(avg) if avg > 0.0 => (0.4 * 1.1_f64).min(0.6),
            Some(_) => (0.4 * 0.9_f64).max(0.2),
            None => 0.4,
        };
        opportunity.victim_amount_in * ratio
    }

    fn adapt(&mut self, recent: &[AttackOutcome]) {
        for outcome in recent {
            push_capped(&mut self.performance_history, outcome.net_profit);

            if outcome.success && outcome.net_profit > 0.0 {
                self.bid_percentage =
                    (self.bid_percentage * (1.0 + self.learning_rate)).min(ADAPTIVE_BID_MAX);
            } else {
                self.bid_percentage =
                    (self.bid_percentage * (1.0 - self.learning_rate)).max(ADAPTIVE_BID_MIN);
            }
        }

        let window = self.performance_history.len().min(10);
        if window > 0 {
            let recent_performance = last_n_mean(&self.performance_history, window).unwrap_or(0.0);
            if recent_performance > 0.0 {
                self.min_profit_ratio = (self.min_profit_ratio * 0.9).max(1.5);
            } else {
                self.min_profit_ratio = (self.min_profit_ratio * 1.1).min(4.0);
            }
        }
    }
}

fn push_capped(history: &mut Vec<f64>, value: f64) {
    history.push(value);
    if history.len() > ADAPTIVE_HISTORY_CAP {
        let excess = history.len() - ADAPTIVE_HISTORY_CAP;
        history.drain(..excess);
    }
}

/// Mean of the last `n` samples, `None` until `n` exist
fn last_n_mean(history: &[f64], n: usize) -> Option<f64> {
    if n == 0 || history.len() < n {
        return None;
    }
    let tail = &history[history.len() - n..];
    Some(tail.iter().sum::<f64>() / n as f64)
}

/// Strategy engine of one extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyEngine {
    Aggressive(AggressiveStrategy),
    Conservative(ConservativeStrategy),
    Slow(ConservativeStrategy),
    Adaptive(AdaptiveStrategy),
}

impl StrategyEngine {
    /// Build a strategy, falling back to the kind's default bid percentage
    pub fn new(kind: StrategyKind, bid_percentage: Option<f64>) -> Self {
        let bid = bid_percentage.unwrap_or_else(|| kind.default_bid_percentage());
        match kind {
            StrategyKind::Aggressive => StrategyEngine::Aggressive(AggressiveStrategy::new(bid)),
            StrategyKind::Conservative => {
                StrategyEngine::Conservative(ConservativeStrategy::new(bid))
            }
            StrategyKind::Slow => StrategyEngine::Slow(ConservativeStrategy::new(bid)),
            StrategyKind::Adaptive => StrategyEngine::Adaptive(AdaptiveStrategy::new(bid)),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyEngine::Aggressive(_) => StrategyKind::Aggressive,
            StrategyEngine::Conservative(_) => StrategyKind::Conservative,
            StrategyEngine::Slow(_) => StrategyKind::Slow,
            StrategyEngine::Adaptive(_) => StrategyKind::Adaptive,
        }
    }

    pub fn bid_percentage(&self) -> f64 {
        match self {
            StrategyEngine::Aggressive(s) => s.bid_percentage,
            StrategyEngine::Conservative(s) | StrategyEngine::Slow(s) => s.bid_percentage,
            StrategyEngine::Adaptive(s) => s.bid_percentage,
        }
    }

    /// Record the competition level seen before a bid. Only the adaptive
    /// strategy keeps this history.
    pub fn observe_competition(&mut self, competition_level: f64) {
        if let StrategyEngine::Adaptive(s) = self {
            s.observe_competition(competition_level);
        }
    }

    /// Bid for an opportunity; `competition_level` is active competitors / 10
    pub fn bid_amount(&self, opportunity: &Opportunity, competition_level: f64) -> f64 {
        match self {
            StrategyEngine::Aggressive(s) => s.bid_amount(opportunity, competition_level),
            StrategyEngine::Conservative(s) | StrategyEngine::Slow(s) => s.bid_amount(opportunity),
            StrategyEngine::Adaptive(s) => s.bid_amount(opportunity, competition_level),
        }
    }

    /// Go / no-go gate before committing resources
    pub fn should_execute(&self, opportunity: &Opportunity) -> bool {
        match self {
            StrategyEngine::Aggressive(s) => s.should_execute(opportunity),
            StrategyEngine::Conservative(s) | StrategyEngine::Slow(s) => {
                s.should_execute(opportunity)
            }
            StrategyEngine::Adaptive(s) => s.should_execute(opportunity),
        }
    }

    /// Size of the preemptive trade, in victim input tokens
    pub fn frontrun_size(&self, opportunity: &Opportunity) -> f64 {
        match self {
            StrategyEngine::Aggressive(s) => s.frontrun_size(opportunity),
            StrategyEngine::Conservative(s) | StrategyEngine::Slow(s) => {
                s.frontrun_size(opportunity)
            }
            StrategyEngine::Adaptive(s) => s.frontrun_size(opportunity),
        }
    }

    /// Adjust internal parameters from the most recent outcomes
    pub fn adapt(&mut self, recent: &[AttackOutcome]) {
        match self {
            StrategyEngine::Aggressive(s) => s.adapt(recent),
            StrategyEngine::Conservative(s) | StrategyEngine::Slow(s) => s.adapt(recent),
            StrategyEngine::Adaptive(s) => s.adapt(recent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::extractor::tests::{sample_opportunity, sample_outcome};

    #[test]
    fn test_aggressive_scenario() {
        let strategy = StrategyEngine::new(StrategyKind::Aggressive, None);
        let opp = sample_opportunity(0.01, 0.002, 0.9);

        assert!(strategy.should_execute(&opp));
        assert!((strategy.bid_amount(&opp, 0.0) - 0.0085).abs() < 1e-12);
        assert!((strategy.frontrun_size(&opp) - opp.victim_amount_in * 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_aggressive_competition_scaling() {
        let strategy = StrategyEngine::new(StrategyKind::Aggressive, None);
        let opp = sample_opportunity(0.01, 0.002, 0.9);

        // Three competitors -> level 0.3 -> x1.15
        assert!((strategy.bid_amount(&opp, 0.3) - 0.0085 * 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_aggressive_bid_never_exceeds_cap() {
        let mut strategy = StrategyEngine::new(StrategyKind::Aggressive, None);
        let wins: Vec<_> = (0..5).map(|_| sample_outcome(true, 0.01)).collect();
        let losses: Vec<_> = (0..5).map(|_| sample_outcome(false, -0.002)).collect();

        for round in 0..50 {
            let batch = if round % 3 == 0 { &losses } else { &wins };
            strategy.adapt(batch);
            let bid = strategy.bid_percentage();
            assert!(bid <= 95.0);
            assert!(bid >= 85.0);
        }
        assert_eq!(strategy.bid_percentage(), 95.0);

        let capped = StrategyEngine::new(StrategyKind::Aggressive, Some(99.0));
        assert_eq!(capped.bid_percentage(), 95.0);
    }

    #[test]
    fn test_conservative_confidence_gate() {
        let strategy = StrategyEngine::new(StrategyKind::Conservative, None);
        let gas = 0.002;

        let low_confidence = sample_opportunity(4.0 * gas, gas, 0.6);
        assert!(!strategy.should_execute(&low_confidence));

        let high_confidence = sample_opportunity(4.0 * gas, gas, 0.85);
        assert!(strategy.should_execute(&high_confidence));

        // No competition scaling
        assert_eq!(
            strategy.bid_amount(&high_confidence, 0.0),
            strategy.bid_amount(&high_confidence, 0.9)
        );
    }

    #[test]
    fn test_conservative_backs_off_when_losing() {
        let mut strategy = StrategyEngine::new(StrategyKind::Conservative, None);
        let losses: Vec<_> = (0..5).map(|_| sample_outcome(false, -0.002)).collect();

        strategy.adapt(&losses);
        assert!((strategy.bid_percentage() - 54.0).abs() < 1e-9);

        for _ in 0..200 {
            strategy.adapt(&losses);
        }
        assert!(strategy.bid_percentage() >= 1.0);
    }

    #[test]
    fn test_slow_is_conservative_with_low_bid() {
        let strategy = StrategyEngine::new(StrategyKind::Slow, None);
        let opp = sample_opportunity(0.01, 0.002, 0.9);

        assert_eq!(strategy.kind(), StrategyKind::Slow);
        assert!((strategy.bid_amount(&opp, 0.5) - 0.004).abs() < 1e-12);
        assert!((strategy.frontrun_size(&opp) - opp.victim_amount_in * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_adaptive_bid_uses_competition_history() {
        let mut strategy = StrategyEngine::new(StrategyKind::Adaptive, None);
        let opp = sample_opportunity(0.01, 0.002, 0.9);

        // Fewer than five samples: 1 + level * 0.4
        strategy.observe_competition(0.3);
        assert!((strategy.bid_amount(&opp, 0.3) - 0.01 * 0.7 * 1.12).abs() < 1e-12);

        for _ in 0..4 {
            strategy.observe_competition(0.5);
        }
        // Last five: 0.3, 0.5, 0.5, 0.5, 0.5 -> avg 0.46
        let expected = 0.01 * 0.7 * (1.0 + 0.46 * 0.7);
        assert!((strategy.bid_amount(&opp, 0.5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_adaptive_learns_from_results() {
        let mut strategy = StrategyEngine::new(StrategyKind::Adaptive, None);
        let gas = 0.002;
        let marginal = sample_opportunity(2.0 * gas, gas, 0.9);
        assert!(!strategy.should_execute(&marginal));

        let wins: Vec<_> = (0..5).map(|_| sample_outcome(true, 0.01)).collect();
        for _ in 0..10 {
            strategy.adapt(&wins);
        }

        assert_eq!(strategy.bid_percentage(), 90.0);
        assert!(strategy.should_execute(&marginal));
        let expected = marginal.victim_amount_in * 0.44;
        assert!((strategy.frontrun_size(&marginal) - expected).abs() < 1e-12);

        if let StrategyEngine::Adaptive(inner) = &strategy {
            assert_eq!(inner.performance_history().len(), 30);
            assert!((inner.min_profit_ratio - 1.5).abs() < 1e-12);
        } else {
            panic!("expected adaptive strategy");
        }
    }

    #[test]
    fn test_adaptive_turns_cautious_when_losing() {
        let mut strategy = StrategyEngine::new(StrategyKind::Adaptive, None);
        let losses: Vec<_> = (0..5).map(|_| sample_outcome(false, -0.002)).collect();
        for _ in 0..20 {
            strategy.adapt(&losses);
        }

        let opp = sample_opportunity(0.01, 0.0026, 0.9);
        assert_eq!(strategy.bid_percentage(), 30.0);
        // 0.01 < 0.0026 * 4.0
        assert!(!strategy.should_execute(&opp));
        assert!((strategy.frontrun_size(&opp) - opp.victim_amount_in * 0.36).abs() < 1e-12);
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("Adaptive".parse::<StrategyKind>().unwrap(), StrategyKind::Adaptive);
        assert!("martingale".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::Slow.to_string(), "slow");
    }
}
