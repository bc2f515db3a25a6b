//! Extractor Agent
//!
//! Runs the sandwich pipeline for one agent:
//! `Idle -> Detecting -> Evaluating -> (Skipped | Executing) -> Settled`.
//!
//! Detection and evaluation cost simulated latency. Landing an attack is
//! split from preparing it so the orchestrator can rank competing agents
//! by how long their pipelines took before anyone touches the pool.

use crate::bots::strategy::{StrategyEngine, StrategyKind, ADAPT_WINDOW};
use crate::bots::victim::TradeIntent;
use crate::config::{ExtractorConfig, GasConfig};
use crate::error::SimResult;
use crate::simulation::latency::{LatencyModel, LatencyProfile, LatencyStage, LatencyStatistics};
use crate::simulation::market::MarketOutcome;
use crate::simulation::pool_state::SimulatedPool;
use crate::utils::hash::{attack_tx_hash, TxLeg};
use crate::utils::stats::mean;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Swap tolerance used when landing a frontrun
const FRONTRUN_TOLERANCE: f64 = 1.0;

/// A detected candidate attack on one victim trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub agent_id: String,
    /// Trade intent this opportunity targets
    pub victim_trade_id: String,
    pub victim_id: String,
    pub pool_id: String,
    pub a_to_b: bool,
    pub token_in: String,
    pub token_out: String,
    pub victim_amount_in: f64,
    pub estimated_profit: f64,
    /// Gas for the whole sandwich (frontrun + victim + backrun)
    pub gas_cost: f64,
    pub confidence: f64,
    /// Simulated seconds
    pub detected_at: f64,
    pub expires_at: f64,
    /// Block detection plus market updates up to this intent
    pub detection_latency_ms: f64,
}

/// Why an attempt did not succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Bundle landed but the sandwich did not pay out
    ExecutionFailed,
    /// A faster agent won the same victim trade
    Outraced { winner: String },
    /// The pool refused the frontrun swap
    PoolRejected { error: String },
}

/// Result of one extractor's attempt on one opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub opportunity_id: String,
    pub victim_trade_id: String,
    pub victim_id: String,
    pub agent_id: String,
    pub pool_id: String,
    pub round: u64,
    pub success: bool,
    pub failure: Option<FailureReason>,
    pub bid: f64,
    pub frontrun_size: f64,
    pub gross_profit: f64,
    pub gas_costs: f64,
    pub net_profit: f64,
    pub victim_loss: f64,
    pub slippage_caused: f64,
    pub pool_price_impact: f64,
    pub total_latency_ms: f64,
    pub frontrun_tx_hash: Option<String>,
    pub backrun_tx_hash: Option<String>,
    /// Simulated seconds
    pub executed_at: f64,
}

/// Why an opportunity was passed on. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unprofitable,
    InsufficientBalance,
    Expired,
}

/// A prepared attack, ready to land
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPlan {
    pub opportunity: Opportunity,
    pub bid: f64,
    pub frontrun_size: f64,
    /// Detection + calculation + bundle creation + submission
    pub latency_ms: f64,
    /// Simulated time the bundle reaches the chain
    pub lands_at: f64,
}

/// Evaluation verdict for one opportunity
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Attack(AttackPlan),
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Detecting,
    Evaluating,
    Skipped,
    Executing,
    Settled,
}

/// Lifetime performance of one extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorPerformance {
    pub agent_id: String,
    pub strategy: StrategyKind,
    pub bid_percentage: f64,
    pub latency_profile: LatencyProfile,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub total_attacks: usize,
    pub successful_attacks: usize,
    pub success_rate: f64,
    pub total_profit: f64,
    pub avg_profit_per_attack: f64,
    pub total_victim_loss: f64,
    pub roi: f64,
    pub opportunities_seen: usize,
    pub conversion_rate: f64,
    pub avg_attack_latency_ms: f64,
    pub latency: LatencyStatistics,
}

/// One value-extraction agent
pub struct ExtractorAgent {
    id: String,
    strategy: StrategyEngine,
    latency: LatencyModel,
    market: Box<dyn MarketOutcome>,
    gas_cost: f64,
    min_victim_amount: f64,
    success_probability: f64,
    opportunity_ttl_secs: f64,
    initial_balance: f64,
    balance: f64,
    state: PipelineState,
    history: Vec<AttackOutcome>,
    opportunities_seen: usize,
    next_opportunity: u64,
}

impl ExtractorAgent {
    pub fn new(
        config: &ExtractorConfig,
        gas: &GasConfig,
        latency: LatencyModel,
        market: Box<dyn MarketOutcome>,
    ) -> Self {
        let strategy = StrategyEngine::new(config.strategy, config.bid_percentage);
        info!(
            "Extractor {} initialized: {} strategy, bid {:.1}%, balance {:.4}",
            config.id,
            config.strategy,
            strategy.bid_percentage(),
            config.initial_balance
        );

        Self {
            id: config.id.clone(),
            strategy,
            latency,
            market,
            gas_cost: gas.sandwich_cost(),
            min_victim_amount: config.min_victim_amount,
            success_probability: config.success_probability,
            opportunity_ttl_secs: config.opportunity_ttl_secs,
            initial_balance: config.initial_balance,
            balance: config.initial_balance,
            state: PipelineState::Idle,
            history: Vec::new(),
            opportunities_seen: 0,
            next_opportunity: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn strategy(&self) -> &StrategyEngine {
        &self.strategy
    }

    pub fn latency(&self) -> &LatencyModel {
        &self.latency
    }

    pub fn history(&self) -> &[AttackOutcome] {
        &self.history
    }

    pub fn gas_cost(&self) -> f64 {
        self.gas_cost
    }

    /// Replace the per-sandwich gas estimate (e.g. after querying a gateway)
    pub fn set_gas_cost(&mut self, gas_cost: f64) {
        self.gas_cost = gas_cost;
    }

    /// Profit estimate for a sandwich around `amount_in`, with diminishing
    /// returns on size
    pub fn estimate_profit(amount_in: f64) -> f64 {
        let size_factor = (amount_in / 100.0).max(0.0).sqrt();
        (amount_in * 0.003 * size_factor).max(0.001)
    }

    /// Scan a block's pending trade intents for sandwich targets
    pub async fn detect(
        &mut self,
        intents: &[TradeIntent],
        now: f64,
    ) -> SimResult<Vec<Opportunity>> {
        self.state = PipelineState::Detecting;
        let mut elapsed_ms = self.latency.wait(LatencyStage::BlockDetection).await?;
        let mut opportunities = Vec::new();

        for intent in intents.iter().filter(|i| i.is_pending()) {
            elapsed_ms += self.latency.wait(LatencyStage::MarketUpdate).await?;

            if intent.amount_in <= self.min_victim_amount {
                continue;
            }

            self.next_opportunity += 1;
            let detected_at = now + elapsed_ms / 1000.0;
            opportunities.push(Opportunity {
                id: format!("{}-opp-{}", self.id, self.next_opportunity),
                agent_id: self.id.clone(),
                victim_trade_id: intent.id.clone(),
                victim_id: intent.victim_id.clone(),
                pool_id: intent.pool_id.clone(),
                a_to_b: intent.a_to_b,
                token_in: intent.token_in.clone(),
                token_out: intent.token_out.clone(),
                victim_amount_in: intent.amount_in,
                estimated_profit: Self::estimate_profit(intent.amount_in),
                gas_cost: self.gas_cost,
                confidence: self.market.confidence(),
                detected_at,
                expires_at: detected_at + self.opportunity_ttl_secs,
                detection_latency_ms: elapsed_ms,
            });
        }

        self.opportunities_seen += opportunities.len();
        debug!("[{}] Detected {} opportunities", self.id, opportunities.len());
        self.state = PipelineState::Idle;
        Ok(opportunities)
    }

    /// Evaluate an opportunity and, if it is worth it, build and submit the
    /// bundle. Nothing is mutated on a skip except latency history.
    pub async fn prepare(
        &mut self,
        opportunity: &Opportunity,
        competition_level: f64,
    ) -> SimResult<Evaluation> {
        self.state = PipelineState::Evaluating;
        let calc_ms = self.latency.wait(LatencyStage::Calculation).await?;

        if opportunity.detected_at + calc_ms / 1000.0 > opportunity.expires_at {
            return Ok(self.skip(opportunity, SkipReason::Expired));
        }

        if !self.strategy.should_execute(opportunity) {
            return Ok(self.skip(opportunity, SkipReason::Unprofitable));
        }

        self.strategy.observe_competition(competition_level);
        let bid = self.strategy.bid_amount(opportunity, competition_level);
        if bid > self.balance {
            warn!(
                "[{}] Insufficient balance for bid: {:.6} > {:.6}",
                self.id, bid, self.balance
            );
            return Ok(self.skip(opportunity, SkipReason::InsufficientBalance));
        }

        self.state = PipelineState::Executing;
        let bundle_ms = self.latency.wait(LatencyStage::BundleCreation).await?;
        let frontrun_size = self.strategy.frontrun_size(opportunity);
        let submit_ms = self.latency.wait(LatencyStage::NetworkSubmission).await?;

        let after_detection_ms = calc_ms + bundle_ms + submit_ms;
        Ok(Evaluation::Attack(AttackPlan {
            opportunity: opportunity.clone(),
            bid,
            frontrun_size,
            latency_ms: opportunity.detection_latency_ms + after_detection_ms,
            lands_at: opportunity.detected_at + after_detection_ms / 1000.0,
        }))
    }

    fn skip(&mut self, opportunity: &Opportunity, reason: SkipReason) -> Evaluation {
        debug!("[{}] Skipping {}: {:?}", self.id, opportunity.id, reason);
        self.state = PipelineState::Skipped;
        Evaluation::Skip(reason)
    }

    /// Land a prepared attack. Successful frontruns move the pool; any pool
    /// error turns the attempt into a failed outcome.
    pub fn execute(
        &mut self,
        plan: &AttackPlan,
        pool: &mut SimulatedPool,
        round: u64,
    ) -> AttackOutcome {
        let opp = &plan.opportunity;
        let mut outcome = self.failed_outcome(plan, round, FailureReason::ExecutionFailed);

        if !self.market.execution_succeeds(self.success_probability) {
            info!("[{}] Failed sandwich attack: -{:.6} gas", self.id, outcome.gas_costs);
            return self.settle(outcome);
        }

        if pool.id != opp.pool_id {
            outcome.failure = Some(FailureReason::PoolRejected {
                error: format!("opportunity targets {}, got {}", opp.pool_id, pool.id),
            });
            return self.settle(outcome);
        }

        let frontrun = pool.swap(
            plan.frontrun_size,
            opp.a_to_b,
            FRONTRUN_TOLERANCE,
            0.0,
            round,
            "frontrun",
        );
        if let Err(e) = frontrun {
            warn!("[{}] Frontrun rejected by {}: {}", self.id, pool.id, e);
            outcome.failure = Some(FailureReason::PoolRejected { error: e.to_string() });
            return self.settle(outcome);
        }

        let gross_profit = opp.estimated_profit * self.market.profit_multiplier();
        let gas_costs = opp.gas_cost * self.market.gas_multiplier();
        let victim_loss = gross_profit * self.market.victim_loss_multiplier();
        let slippage_caused = if opp.victim_amount_in > 0.0 {
            plan.frontrun_size / opp.victim_amount_in * 0.02
        } else {
            0.0
        };

        outcome.success = true;
        outcome.failure = None;
        outcome.gross_profit = gross_profit;
        outcome.gas_costs = gas_costs;
        outcome.net_profit = gross_profit - gas_costs;
        outcome.victim_loss = victim_loss;
        outcome.slippage_caused = slippage_caused;
        outcome.pool_price_impact = slippage_caused * 0.5;
        outcome.frontrun_tx_hash = Some(attack_tx_hash(&self.id, &opp.id, TxLeg::Frontrun, round));
        outcome.backrun_tx_hash = Some(attack_tx_hash(&self.id, &opp.id, TxLeg::Backrun, round));

        info!(
            "[{}] Successful sandwich on {}: {:.6} profit",
            self.id, opp.victim_trade_id, outcome.net_profit
        );
        self.settle(outcome)
    }

    /// Record an attempt that lost the race; the reverted bundle still pays gas
    pub fn concede(&mut self, plan: &AttackPlan, winner: &str, round: u64) -> AttackOutcome {
        debug!(
            "[{}] Outraced by {} on {}",
            self.id, winner, plan.opportunity.victim_trade_id
        );
        let outcome = self.failed_outcome(
            plan,
            round,
            FailureReason::Outraced {
                winner: winner.to_string(),
            },
        );
        self.settle(outcome)
    }

    fn failed_outcome(
        &self,
        plan: &AttackPlan,
        round: u64,
        reason: FailureReason,
    ) -> AttackOutcome {
        let opp = &plan.opportunity;
        AttackOutcome {
            opportunity_id: opp.id.clone(),
            victim_trade_id: opp.victim_trade_id.clone(),
            victim_id: opp.victim_id.clone(),
            agent_id: self.id.clone(),
            pool_id: opp.pool_id.clone(),
            round,
            success: false,
            failure: Some(reason),
            bid: plan.bid,
            frontrun_size: plan.frontrun_size,
            gross_profit: 0.0,
            gas_costs: opp.gas_cost,
            net_profit: -opp.gas_cost,
            victim_loss: 0.0,
            slippage_caused: 0.0,
            pool_price_impact: 0.0,
            total_latency_ms: plan.latency_ms,
            frontrun_tx_hash: None,
            backrun_tx_hash: None,
            executed_at: plan.lands_at,
        }
    }

    fn settle(&mut self, outcome: AttackOutcome) -> AttackOutcome {
        if outcome.success {
            self.balance += outcome.net_profit;
        } else {
            self.balance -= outcome.gas_costs;
        }

        self.history.push(outcome.clone());
        if self.history.len() % ADAPT_WINDOW == 0 {
            let recent = &self.history[self.history.len() - ADAPT_WINDOW..];
            self.strategy.adapt(recent);
            debug!(
                "[{}] Adapted strategy, bid now {:.1}%",
                self.id,
                self.strategy.bid_percentage()
            );
        }

        self.state = PipelineState::Settled;
        outcome
    }

    pub fn performance(&self) -> ExtractorPerformance {
        let total_attacks = self.history.len();
        let successful_attacks = self.history.iter().filter(|o| o.success).count();
        let total_profit: f64 = self.history.iter().map(|o| o.net_profit).sum();
        let latencies: Vec<f64> = self.history.iter().map(|o| o.total_latency_ms).collect();
        let per_attack = |v: f64| if total_attacks > 0 { v / total_attacks as f64 } else { 0.0 };

        ExtractorPerformance {
            agent_id: self.id.clone(),
            strategy: self.strategy.kind(),
            bid_percentage: self.strategy.bid_percentage(),
            latency_profile: self.latency.profile().clone(),
            initial_balance: self.initial_balance,
            current_balance: self.balance,
            total_attacks,
            successful_attacks,
            success_rate: per_attack(successful_attacks as f64),
            total_profit,
            avg_profit_per_attack: per_attack(total_profit),
            total_victim_loss: self.history.iter().map(|o| o.victim_loss).sum(),
            roi: if self.initial_balance > 0.0 {
                (self.balance - self.initial_balance) / self.initial_balance
            } else {
                0.0
            },
            opportunities_seen: self.opportunities_seen,
            conversion_rate: total_attacks as f64 / self.opportunities_seen.max(1) as f64,
            avg_attack_latency_ms: mean(&latencies),
            latency: self.latency.statistics(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bots::victim::TradeStatus;
    use crate::simulation::market::ScriptedMarket;
    use crate::utils::amm_math::PoolState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn sample_opportunity(profit: f64, gas: f64, confidence: f64) -> Opportunity {
        Opportunity {
            id: "bot-opp-1".to_string(),
            agent_id: "bot".to_string(),
            victim_trade_id: "retail_1-trade-1".to_string(),
            victim_id: "retail_1".to_string(),
            pool_id: "TOKEN1_TOKEN2".to_string(),
            a_to_b: true,
            token_in: "TOKEN1".to_string(),
            token_out: "TOKEN2".to_string(),
            victim_amount_in: 20.0,
            estimated_profit: profit,
            gas_cost: gas,
            confidence,
            detected_at: 0.0,
            expires_at: 30.0,
            detection_latency_ms: 0.0,
        }
    }

    pub(crate) fn sample_outcome(success: bool, net_profit: f64) -> AttackOutcome {
        AttackOutcome {
            opportunity_id: "bot-opp-1".to_string(),
            victim_trade_id: "retail_1-trade-1".to_string(),
            victim_id: "retail_1".to_string(),
            agent_id: "bot".to_string(),
            pool_id: "TOKEN1_TOKEN2".to_string(),
            round: 1,
            success,
            failure: if success { None } else { Some(FailureReason::ExecutionFailed) },
            bid: 0.0,
            frontrun_size: 0.0,
            gross_profit: net_profit.max(0.0),
            gas_costs: 0.002,
            net_profit,
            victim_loss: 0.0,
            slippage_caused: 0.0,
            pool_price_impact: 0.0,
            total_latency_ms: 0.0,
            frontrun_tx_hash: None,
            backrun_tx_hash: None,
            executed_at: 0.0,
        }
    }

    fn intent(id: &str, amount: f64) -> TradeIntent {
        TradeIntent {
            id: id.to_string(),
            victim_id: "retail_1".to_string(),
            pool_id: "TOKEN1_TOKEN2".to_string(),
            token_in: "TOKEN1".to_string(),
            token_out: "TOKEN2".to_string(),
            a_to_b: true,
            amount_in: amount,
            max_slippage: 0.02,
            min_amount_out: 0.0,
            created_at: 0.0,
            status: TradeStatus::Pending,
        }
    }

    fn pool() -> SimulatedPool {
        let state = PoolState::new(1000.0, 2000.0, 3000);
        SimulatedPool::new("TOKEN1_TOKEN2", "TOKEN1", "TOKEN2", state)
    }

    fn agent(strategy: StrategyKind, market: ScriptedMarket) -> ExtractorAgent {
        let config = ExtractorConfig {
            id: "bot".to_string(),
            strategy,
            latency: LatencyProfile::high_performance(),
            ..Default::default()
        };
        let latency = LatencyModel::new("bot", config.latency.clone(), StdRng::seed_from_u64(1))
            .with_time_scale(0.0)
            .unwrap();
        ExtractorAgent::new(&config, &GasConfig::default(), latency, Box::new(market))
    }

    fn plan_for(agent_id: &str) -> AttackPlan {
        let mut opportunity = sample_opportunity(0.0268, 0.0045, 0.9);
        opportunity.agent_id = agent_id.to_string();
        AttackPlan {
            opportunity,
            bid: 0.01,
            frontrun_size: 12.0,
            latency_ms: 400.0,
            lands_at: 0.4,
        }
    }

    #[test]
    fn test_profit_estimate() {
        assert!((ExtractorAgent::estimate_profit(100.0) - 0.3).abs() < 1e-12);
        assert_eq!(ExtractorAgent::estimate_profit(0.01), 0.001);
    }

    #[tokio::test]
    async fn test_detect_filters_small_and_settled_trades() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let mut done = intent("v-trade-3", 50.0);
        done.status = TradeStatus::Rejected { slippage: 0.05 };
        let intents = vec![intent("v-trade-1", 5.0), intent("v-trade-2", 20.0), done];

        let opportunities = bot.detect(&intents, 100.0).await.unwrap();

        assert_eq!(opportunities.len(), 1);
        let opp = &opportunities[0];
        assert_eq!(opp.victim_trade_id, "v-trade-2");
        assert!((opp.gas_cost - 0.0045).abs() < 1e-12);
        assert!(opp.detection_latency_ms > 0.0);
        assert!(opp.detected_at > 100.0);
        assert!((opp.expires_at - opp.detected_at - 30.0).abs() < 1e-9);
        // Block detection once, market update per pending intent
        assert_eq!(bot.latency().samples(LatencyStage::BlockDetection).len(), 1);
        assert_eq!(bot.latency().samples(LatencyStage::MarketUpdate).len(), 2);
        assert_eq!(bot.performance().opportunities_seen, 1);
    }

    #[tokio::test]
    async fn test_prepare_builds_plan() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let opportunities = bot.detect(&[intent("v-trade-1", 20.0)], 0.0).await.unwrap();

        let Evaluation::Attack(plan) = bot.prepare(&opportunities[0], 0.2).await.unwrap() else {
            panic!("expected an attack plan");
        };

        assert_eq!(bot.state(), PipelineState::Executing);
        assert!((plan.frontrun_size - 12.0).abs() < 1e-12);
        assert!(plan.latency_ms > opportunities[0].detection_latency_ms);
        assert!(plan.lands_at > opportunities[0].detected_at);
        // Nothing settles until the plan lands
        assert!(bot.history().is_empty());
        assert_eq!(bot.balance(), 1.0);
    }

    #[tokio::test]
    async fn test_prepare_skips() {
        let mut bot = agent(StrategyKind::Conservative, ScriptedMarket::always(true));
        let low_confidence = sample_opportunity(0.018, 0.0045, 0.6);
        assert_eq!(
            bot.prepare(&low_confidence, 0.0).await.unwrap(),
            Evaluation::Skip(SkipReason::Unprofitable)
        );
        assert_eq!(bot.state(), PipelineState::Skipped);

        let mut expired = sample_opportunity(0.05, 0.0045, 0.9);
        expired.expires_at = expired.detected_at;
        assert_eq!(
            bot.prepare(&expired, 0.0).await.unwrap(),
            Evaluation::Skip(SkipReason::Expired)
        );

        let mut broke = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let huge = sample_opportunity(5.0, 0.0045, 0.9);
        assert_eq!(
            broke.prepare(&huge, 0.0).await.unwrap(),
            Evaluation::Skip(SkipReason::InsufficientBalance)
        );
        assert!(bot.history().is_empty());
        assert_eq!(broke.balance(), 1.0);
    }

    #[test]
    fn test_execute_success_moves_pool_and_balance() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let mut pool = pool();
        let plan = plan_for("bot");

        let outcome = bot.execute(&plan, &mut pool, 3);

        assert!(outcome.success);
        assert!((outcome.gross_profit - 0.0268).abs() < 1e-12);
        assert!((outcome.net_profit - (0.0268 - 0.0045)).abs() < 1e-12);
        assert!(outcome.victim_loss > outcome.gross_profit);
        assert!((outcome.slippage_caused - 12.0 / 20.0 * 0.02).abs() < 1e-12);
        assert!(outcome.frontrun_tx_hash.is_some());
        assert_eq!(outcome.victim_trade_id, "retail_1-trade-1");
        assert_eq!(pool.state.reserve_a, 1012.0);
        assert!((bot.balance() - (1.0 + outcome.net_profit)).abs() < 1e-12);
        assert_eq!(bot.state(), PipelineState::Settled);
    }

    #[test]
    fn test_execute_failure_costs_gas_only() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(false));
        let mut pool = pool();

        let outcome = bot.execute(&plan_for("bot"), &mut pool, 3);

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureReason::ExecutionFailed));
        assert!((outcome.net_profit + 0.0045).abs() < 1e-12);
        assert!((bot.balance() - 0.9955).abs() < 1e-12);
        assert_eq!(pool.state.reserve_a, 1000.0);
    }

    #[test]
    fn test_pool_error_becomes_failed_outcome() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let mut dry =
            SimulatedPool::new("TOKEN1_TOKEN2", "TOKEN1", "TOKEN2", PoolState::new(0.0, 0.0, 3000));

        let outcome = bot.execute(&plan_for("bot"), &mut dry, 1);

        assert!(!outcome.success);
        assert!(matches!(outcome.failure, Some(FailureReason::PoolRejected { .. })));
        assert!(bot.balance() < 1.0);
    }

    #[test]
    fn test_concede_and_adapt_cadence() {
        let mut bot = agent(StrategyKind::Aggressive, ScriptedMarket::always(true));
        let mut pool = pool();
        let plan = plan_for("bot");

        let lost = bot.concede(&plan, "rival", 1);
        assert_eq!(
            lost.failure,
            Some(FailureReason::Outraced {
                winner: "rival".to_string()
            })
        );

        for round in 2..=4 {
            bot.execute(&plan, &mut pool, round);
        }
        assert_eq!(bot.strategy().bid_percentage(), 85.0);

        // Fifth outcome: 4/5 successes > 0.7
        bot.execute(&plan, &mut pool, 5);
        assert!((bot.strategy().bid_percentage() - 93.5).abs() < 1e-9);

        let perf = bot.performance();
        assert_eq!(perf.total_attacks, 5);
        assert_eq!(perf.successful_attacks, 4);
        assert!((perf.success_rate - 0.8).abs() < 1e-12);
        assert!(perf.roi > 0.0);
    }
}
