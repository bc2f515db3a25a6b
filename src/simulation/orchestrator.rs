//! Competition Orchestrator
//!
//! Drives the round loop. Each round is one block:
//!
//! 1. victims decide whether to trade and emit intents
//! 2. every extractor scans the intents for opportunities
//! 3. per victim trade, the extractors that spotted it contend: plans are
//!    ranked by accumulated pipeline latency (ties by registration order)
//!    and land in that order until one succeeds, the rest concede
//! 4. victim trades settle against the pools
//! 5. successful attacks are matched to settled trades by trade id
//! 6. pools are snapshotted and observers notified
//!
//! All attacks settle before any victim trade of the same round. Real
//! sandwiches interleave frontrun, victim and backrun in one block; this
//! loop keeps the simpler ordering.

use crate::bots::extractor::{
    AttackOutcome, AttackPlan, Evaluation, ExtractorAgent, ExtractorPerformance, Opportunity,
    SkipReason,
};
use crate::bots::victim::{TradeIntent, TradeStatus, VictimAgent, VictimStatistics};
use crate::config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::simulation::gateway::ChainGateway;
use crate::simulation::latency::LatencyModel;
use crate::simulation::market::{MarketOutcome, RandomMarket};
use crate::simulation::observer::{ObserverSet, SimulationObserver, StopHandle};
use crate::simulation::pool_state::{PoolSnapshot, SimulatedPool};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const LATENCY_STREAM: u64 = 1;
const MARKET_STREAM: u64 = 2;
const VICTIM_STREAM: u64 = 3;

/// Registered extractors are divided by this to get the competition level
const COMPETITION_NORMALIZER: f64 = 10.0;

/// One ranked contender for a victim trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contender {
    pub agent_id: String,
    pub latency_ms: f64,
    /// 1 = fastest
    pub rank: usize,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedContender {
    pub agent_id: String,
    pub reason: SkipReason,
}

/// How competition for one victim trade was resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionRecord {
    pub victim_trade_id: String,
    pub pool_id: String,
    pub contenders: Vec<Contender>,
    pub skipped: Vec<SkippedContender>,
    pub winner: Option<String>,
}

/// Loss attributed to a settled victim trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictimLoss {
    pub victim_id: String,
    pub trade_id: String,
    pub agent_id: String,
    pub loss: f64,
}

/// Immutable record of one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: u64,
    /// Simulated seconds since the start of the run
    pub sim_time: f64,
    pub timestamp: DateTime<Utc>,
    pub intents: Vec<TradeIntent>,
    pub opportunities: Vec<Opportunity>,
    pub outcomes: Vec<AttackOutcome>,
    pub contention: Vec<ContentionRecord>,
    pub victim_losses: Vec<VictimLoss>,
    pub pools: Vec<PoolSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetRounds,
    Deadline,
    Stopped,
}

/// Aggregates over every round of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total_mev_profit: f64,
    pub total_victim_loss: f64,
    /// Victim loss not captured as extractor profit
    pub total_value_destroyed: f64,
    pub total_attacks: usize,
    pub successful_attacks: usize,
    pub success_rate: f64,
    pub total_intents: usize,
    pub executed_trades: usize,
    pub rejected_trades: usize,
}

impl RunTotals {
    pub fn from_rounds(rounds: &[RoundSnapshot]) -> Self {
        let mut totals = RunTotals::default();

        for round in rounds {
            for outcome in &round.outcomes {
                totals.total_attacks += 1;
                totals.total_mev_profit += outcome.net_profit;
                totals.total_victim_loss += outcome.victim_loss;
                if outcome.success {
                    totals.successful_attacks += 1;
                }
            }
            for intent in &round.intents {
                totals.total_intents += 1;
                match intent.status {
                    TradeStatus::Executed { .. } => totals.executed_trades += 1,
                    TradeStatus::Rejected { .. } => totals.rejected_trades += 1,
                    _ => {}
                }
            }
        }

        totals.total_value_destroyed = totals.total_victim_loss - totals.total_mev_profit;
        if totals.total_attacks > 0 {
            totals.success_rate = totals.successful_attacks as f64 / totals.total_attacks as f64;
        }
        totals
    }
}

/// Complete results of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub name: String,
    pub config: SimulationConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub rounds: Vec<RoundSnapshot>,
    pub extractor_stats: Vec<ExtractorPerformance>,
    pub victim_stats: Vec<VictimStatistics>,
    pub final_pools: Vec<PoolSnapshot>,
    pub totals: RunTotals,
}

impl SimulationRun {
    /// Every attack outcome, in round order
    pub fn outcomes(&self) -> impl Iterator<Item = &AttackOutcome> {
        self.rounds.iter().flat_map(|r| r.outcomes.iter())
    }
}

/// Main simulation orchestrator
pub struct CompetitionOrchestrator {
    config: SimulationConfig,
    pools: Vec<SimulatedPool>,
    extractors: Vec<ExtractorAgent>,
    victims: Vec<VictimAgent>,
    observers: ObserverSet,
    gateway: Option<Arc<dyn ChainGateway>>,
    stop: StopHandle,
    snapshots: Vec<RoundSnapshot>,
    round: u64,
    sim_time: f64,
}

impl CompetitionOrchestrator {
    /// Build every component from the config with seeded random markets
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        Self::with_market_factory(config, |_, rng| Box::new(RandomMarket::new(rng)))
    }

    /// Build with a custom market outcome source per extractor (index, rng)
    pub fn with_market_factory<F>(config: SimulationConfig, mut market_for: F) -> SimResult<Self>
    where
        F: FnMut(usize, StdRng) -> Box<dyn MarketOutcome>,
    {
        config.validate()?;

        let pools = config
            .pools
            .iter()
            .map(|p| SimulatedPool::new(&p.id, &p.token_a, &p.token_b, p.initial_state()))
            .collect();

        let extractors = config
            .extractors
            .iter()
            .enumerate()
            .map(|(i, ec)| -> SimResult<ExtractorAgent> {
                let rng = config.component_rng(LATENCY_STREAM, i);
                let latency = LatencyModel::new(&ec.id, ec.latency.clone(), rng)
                    .with_time_scale(config.latency_time_scale)?;
                let market = market_for(i, config.component_rng(MARKET_STREAM, i));
                Ok(ExtractorAgent::new(ec, &config.gas, latency, market))
            })
            .collect::<SimResult<Vec<_>>>()?;

        let victims = config
            .victims
            .iter()
            .enumerate()
            .map(|(i, vc)| VictimAgent::new(vc, config.component_rng(VICTIM_STREAM, i)))
            .collect();

        Ok(Self {
            config,
            pools,
            extractors,
            victims,
            observers: ObserverSet::default(),
            gateway: None,
            stop: StopHandle::new(),
            snapshots: Vec::new(),
            round: 0,
            sim_time: 0.0,
        })
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn ChainGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Handle that stops the loop after the round in progress
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &[RoundSnapshot] {
        &self.snapshots
    }

    pub fn pools(&self) -> &[SimulatedPool] {
        &self.pools
    }

    pub fn extractors(&self) -> &[ExtractorAgent] {
        &self.extractors
    }

    pub fn victims(&self) -> &[VictimAgent] {
        &self.victims
    }

    fn pool_index(&self, pool_id: &str) -> Option<usize> {
        self.pools.iter().position(|p| p.id == pool_id)
    }

    fn victim_index(&self, victim_id: &str) -> Option<usize> {
        self.victims.iter().position(|v| v.id() == victim_id)
    }

    /// Seed pool reserves and the gas price from the chain gateway, if any.
    /// Any gateway failure here aborts initialization.
    pub async fn setup_from_gateway(&mut self) -> SimResult<()> {
        let Some(gateway) = self.gateway.clone() else {
            debug!("No chain gateway, using configured pool state");
            return Ok(());
        };

        for pool in &mut self.pools {
            let (reserve_a, reserve_b) = gateway
                .get_reserves(&pool.id)
                .await
                .map_err(|e| collaborator_error("get_reserves", e))?;
            pool.sync_reserves(reserve_a, reserve_b, self.round);
            info!("Pool {} synced: {:.4} / {:.4}", pool.id, reserve_a, reserve_b);
        }

        let gas_price = gateway
            .estimate_gas_price()
            .await
            .map_err(|e| collaborator_error("estimate_gas_price", e))?;
        self.config.gas.gas_price_gwei = gas_price;
        let gas_cost = self.config.gas.sandwich_cost();
        for extractor in &mut self.extractors {
            extractor.set_gas_cost(gas_cost);
        }
        info!("Gas price {:.2} gwei, sandwich cost {:.6}", gas_price, gas_cost);

        Ok(())
    }

    /// Run rounds until the target count, the wall-clock deadline, or a stop
    /// request. The deadline is only checked between rounds. Errors from a
    /// round end the run.
    pub async fn run(&mut self) -> SimResult<SimulationRun> {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = Duration::try_from_secs_f64(self.config.duration_secs()).map_err(|e| {
            SimError::InvalidConfig(format!(
                "duration of {} minutes: {}",
                self.config.duration_minutes, e
            ))
        })?;

        info!("Starting MEV competition simulation: {}", self.config.name);
        info!(
            "Extractors: {}, victims: {}, pools: {}",
            self.extractors.len(),
            self.victims.len(),
            self.pools.len()
        );
        info!(
            "Target rounds: {}, duration: {:.1} min",
            self.config.target_rounds, self.config.duration_minutes
        );

        let stop_reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.round >= self.config.target_rounds {
                break StopReason::TargetRounds;
            }
            if start.elapsed() >= deadline {
                break StopReason::Deadline;
            }

            let snapshot = self.run_round().await?;
            self.observers.notify_round(&snapshot);

            if snapshot.round % 10 == 0 || snapshot.round == 1 {
                info!("Progress: round {}/{}", snapshot.round, self.config.target_rounds);
            }
            self.snapshots.push(snapshot);
        };

        let totals = RunTotals::from_rounds(&self.snapshots);
        info!("Simulation complete after {} rounds ({:?})", self.snapshots.len(), stop_reason);
        info!("Total MEV profit: {:.6}", totals.total_mev_profit);
        info!("Total victim loss: {:.6}", totals.total_victim_loss);
        info!(
            "Attacks: {} ({} successful, {:.1}%)",
            totals.total_attacks,
            totals.successful_attacks,
            totals.success_rate * 100.0
        );

        Ok(SimulationRun {
            name: self.config.name.clone(),
            config: self.config.clone(),
            started_at,
            ended_at: Utc::now(),
            stop_reason,
            rounds: self.snapshots.clone(),
            extractor_stats: self.extractors.iter().map(|e| e.performance()).collect(),
            victim_stats: self.victims.iter().map(|v| v.statistics()).collect(),
            final_pools: self.pools.iter().map(|p| p.snapshot(self.round, "final")).collect(),
            totals,
        })
    }

    /// Execute one round
    pub async fn run_round(&mut self) -> SimResult<RoundSnapshot> {
        self.round += 1;
        self.sim_time += self.config.block_time_secs;
        let round = self.round;
        let now = self.sim_time;

        // === Victim intents ===
        let mut intents = Vec::new();
        for victim in &mut self.victims {
            if let Some(intent) = victim.generate_trade(&self.pools, now) {
                intents.push(intent);
            }
        }

        // === Detection ===
        let mut detected: Vec<(usize, Opportunity)> = Vec::new();
        for (index, extractor) in self.extractors.iter_mut().enumerate() {
            for opportunity in extractor.detect(&intents, now).await? {
                detected.push((index, opportunity));
            }
        }

        // === Contention and attack settlement ===
        let competition_level = self.extractors.len() as f64 / COMPETITION_NORMALIZER;
        let mut outcomes = Vec::new();
        let mut contention = Vec::new();
        for intent in &intents {
            let contenders: Vec<&(usize, Opportunity)> = detected
                .iter()
                .filter(|(_, o)| o.victim_trade_id == intent.id)
                .collect();
            if contenders.is_empty() {
                continue;
            }
            let record = self
                .resolve_contention(intent, &contenders, competition_level, round, &mut outcomes)
                .await?;
            contention.push(record);
        }

        // === Victim settlement ===
        for intent in &mut intents {
            let indices = (self.victim_index(&intent.victim_id), self.pool_index(&intent.pool_id));
            let (Some(v), Some(p)) = indices else {
                error!("Trade {} references an unknown victim or pool", intent.id);
                continue;
            };
            if let Err(e) = self.victims[v].execute_trade(intent, &mut self.pools[p], round) {
                warn!("Round {}: trade {} failed: {}", round, intent.id, e);
            }
        }

        // === Attribute losses to settled trades ===
        let mut victim_losses = Vec::new();
        for outcome in outcomes.iter().filter(|o| o.success) {
            let Some(v) = self.victim_index(&outcome.victim_id) else {
                continue;
            };
            if self.victims[v].record_mev_attack(&outcome.victim_trade_id, outcome.victim_loss) {
                victim_losses.push(VictimLoss {
                    victim_id: outcome.victim_id.clone(),
                    trade_id: outcome.victim_trade_id.clone(),
                    agent_id: outcome.agent_id.clone(),
                    loss: outcome.victim_loss,
                });
            }
        }

        debug!(
            "Round {}: {} intents, {} opportunities, {} attacks ({} successful)",
            round,
            intents.len(),
            detected.len(),
            outcomes.len(),
            outcomes.iter().filter(|o| o.success).count()
        );

        Ok(RoundSnapshot {
            round,
            sim_time: now,
            timestamp: Utc::now(),
            intents,
            opportunities: detected.into_iter().map(|(_, o)| o).collect(),
            outcomes,
            contention,
            victim_losses,
            pools: self.pools.iter().map(|p| p.snapshot(round, "round_end")).collect(),
        })
    }

    /// Rank the contenders for one victim trade and land their plans in
    /// order until one succeeds
    async fn resolve_contention(
        &mut self,
        intent: &TradeIntent,
        contenders: &[&(usize, Opportunity)],
        competition_level: f64,
        round: u64,
        outcomes: &mut Vec<AttackOutcome>,
    ) -> SimResult<ContentionRecord> {
        let mut plans: Vec<(usize, AttackPlan)> = Vec::new();
        let mut skipped = Vec::new();

        for (index, opportunity) in contenders.iter().map(|c| (c.0, &c.1)) {
            match self.extractors[index].prepare(opportunity, competition_level).await? {
                Evaluation::Attack(plan) => plans.push((index, plan)),
                Evaluation::Skip(reason) => skipped.push(SkippedContender {
                    agent_id: self.extractors[index].id().to_string(),
                    reason,
                }),
            }
        }

        plans.sort_by(|(ia, a), (ib, b)| a.latency_ms.total_cmp(&b.latency_ms).then(ia.cmp(ib)));

        let mut winner: Option<String> = None;
        let mut ranked = Vec::with_capacity(plans.len());
        for (rank, (index, plan)) in plans.iter().enumerate() {
            let outcome = match &winner {
                Some(w) => self.extractors[*index].concede(plan, w, round),
                None => {
                    let Some(p) = self.pool_index(&plan.opportunity.pool_id) else {
                        error!(
                            "Plan {} targets unknown pool {}",
                            plan.opportunity.id, plan.opportunity.pool_id
                        );
                        continue;
                    };
                    self.extractors[*index].execute(plan, &mut self.pools[p], round)
                }
            };

            if outcome.success {
                winner = Some(outcome.agent_id.clone());
            }
            ranked.push(Contender {
                agent_id: outcome.agent_id.clone(),
                latency_ms: plan.latency_ms,
                rank: rank + 1,
                success: outcome.success,
            });
            self.observers.notify_attack(&outcome);
            outcomes.push(outcome);
        }

        Ok(ContentionRecord {
            victim_trade_id: intent.id.clone(),
            pool_id: intent.pool_id.clone(),
            contenders: ranked,
            skipped,
            winner,
        })
    }
}

fn collaborator_error(operation: &str, e: SimError) -> SimError {
    error!("Chain gateway {} failed: {}", operation, e);
    SimError::Collaborator(format!("{}: {}", operation, e))
}
