//! Metrics over a finished competition run

use crate::bots::extractor::AttackOutcome;
use crate::bots::strategy::StrategyKind;
use crate::simulation::SimulationRun;
use crate::utils::stats::{mean, pearson};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregates a `SimulationRun` into analysis tables
pub struct ResultsAggregator;

impl ResultsAggregator {
    pub fn analyze(run: &SimulationRun) -> AnalysisReport {
        let outcomes: Vec<&AttackOutcome> = run.outcomes().collect();

        AnalysisReport {
            cumulative_profit: Self::cumulative_profit(run),
            cumulative_victim_loss: Self::cumulative_victim_loss(run),
            agent_rankings: Self::agent_rankings(run),
            persona_impact: Self::persona_impact(run),
            extraction_efficiency: Self::extraction_efficiency(run),
            latency_correlation: Self::latency_correlation(&outcomes),
            latency_quartiles: Self::latency_quartiles(&outcomes),
            contention_stats: Self::contention_stats(run),
        }
    }

    /// Running total of extractor net profit, one point per round
    pub fn cumulative_profit(run: &SimulationRun) -> Vec<CumulativeDataPoint> {
        let mut cumulative = 0.0;
        run.rounds
            .iter()
            .map(|r| {
                cumulative += r.outcomes.iter().map(|o| o.net_profit).sum::<f64>();
                CumulativeDataPoint {
                    round: r.round,
                    value: cumulative,
                }
            })
            .collect()
    }

    /// Running total of victim loss, one point per round
    pub fn cumulative_victim_loss(run: &SimulationRun) -> Vec<CumulativeDataPoint> {
        let mut cumulative = 0.0;
        run.rounds
            .iter()
            .map(|r| {
                cumulative += r.outcomes.iter().map(|o| o.victim_loss).sum::<f64>();
                CumulativeDataPoint {
                    round: r.round,
                    value: cumulative,
                }
            })
            .collect()
    }

    /// Extractors ordered by total profit, best first
    pub fn agent_rankings(run: &SimulationRun) -> Vec<AgentRanking> {
        let total_profit: f64 = run.extractor_stats.iter().map(|e| e.total_profit.max(0.0)).sum();

        let mut rankings: Vec<AgentRanking> = run
            .extractor_stats
            .iter()
            .map(|e| AgentRanking {
                rank: 0,
                agent_id: e.agent_id.clone(),
                strategy: e.strategy,
                expected_latency_ms: e.latency_profile.total_average_latency(),
                total_profit: e.total_profit,
                profit_share: if total_profit > 0.0 {
                    e.total_profit.max(0.0) / total_profit
                } else {
                    0.0
                },
                success_rate: e.success_rate,
                roi: e.roi,
                avg_attack_latency_ms: e.avg_attack_latency_ms,
            })
            .collect();

        rankings.sort_by(|a, b| b.total_profit.total_cmp(&a.total_profit));
        for (i, ranking) in rankings.iter_mut().enumerate() {
            ranking.rank = i + 1;
        }
        rankings
    }

    /// Victim outcomes grouped by persona
    pub fn persona_impact(run: &SimulationRun) -> BTreeMap<String, PersonaImpact> {
        let mut impact: BTreeMap<String, PersonaImpact> = BTreeMap::new();

        for stats in &run.victim_stats {
            let entry = impact.entry(stats.persona.as_str().to_string()).or_default();
            entry.victims += 1;
            entry.executed_trades += stats.executed_trades;
            entry.rejected_trades += stats.rejected_trades;
            entry.mev_attacks += stats.mev_attacks;
            entry.total_mev_loss += stats.total_mev_loss;
            entry.total_volume += stats.total_volume;
        }

        for entry in impact.values_mut() {
            if entry.executed_trades > 0 {
                entry.attack_rate = entry.mev_attacks as f64 / entry.executed_trades as f64;
            }
            if entry.total_volume > 0.0 {
                entry.loss_per_volume = entry.total_mev_loss / entry.total_volume;
            }
        }
        impact
    }

    /// Share of victim loss captured as extractor profit
    pub fn extraction_efficiency(run: &SimulationRun) -> f64 {
        if run.totals.total_victim_loss > 0.0 {
            run.totals.total_mev_profit / run.totals.total_victim_loss
        } else {
            0.0
        }
    }

    pub fn latency_correlation(outcomes: &[&AttackOutcome]) -> LatencyCorrelation {
        let latencies: Vec<f64> = outcomes.iter().map(|o| o.total_latency_ms).collect();
        let profits: Vec<f64> = outcomes.iter().map(|o| o.net_profit).collect();
        let successes: Vec<f64> = outcomes
            .iter()
            .map(|o| if o.success { 1.0 } else { 0.0 })
            .collect();

        LatencyCorrelation {
            samples: outcomes.len(),
            latency_vs_profit: pearson(&latencies, &profits),
            latency_vs_success: pearson(&latencies, &successes),
        }
    }

    /// Race record per extractor, in registration order. A contest is any
    /// victim trade the agent submitted a plan for.
    pub fn contention_stats(run: &SimulationRun) -> Vec<ContentionStats> {
        let records: Vec<_> = run.rounds.iter().flat_map(|r| r.contention.iter()).collect();

        run.extractor_stats
            .iter()
            .map(|e| {
                let entered: Vec<_> = records
                    .iter()
                    .flat_map(|r| r.contenders.iter())
                    .filter(|c| c.agent_id == e.agent_id)
                    .collect();
                let wins = records
                    .iter()
                    .filter(|r| r.winner.as_deref() == Some(e.agent_id.as_str()))
                    .count();
                let skipped = records
                    .iter()
                    .flat_map(|r| r.skipped.iter())
                    .filter(|s| s.agent_id == e.agent_id)
                    .count();
                let ranks: Vec<f64> = entered.iter().map(|c| c.rank as f64).collect();
                let latencies: Vec<f64> = entered.iter().map(|c| c.latency_ms).collect();

                ContentionStats {
                    agent_id: e.agent_id.clone(),
                    contests: entered.len(),
                    wins,
                    skipped,
                    win_rate: if entered.is_empty() {
                        0.0
                    } else {
                        wins as f64 / entered.len() as f64
                    },
                    avg_rank: mean(&ranks),
                    avg_latency_ms: mean(&latencies),
                }
            })
            .collect()
    }

    /// Outcomes split into four equal-count buckets by pipeline latency,
    /// fastest first. Empty when there are fewer than four outcomes.
    pub fn latency_quartiles(outcomes: &[&AttackOutcome]) -> Vec<LatencyQuartile> {
        if outcomes.len() < 4 {
            return Vec::new();
        }

        let mut sorted = outcomes.to_vec();
        sorted.sort_by(|a, b| a.total_latency_ms.total_cmp(&b.total_latency_ms));

        let n = sorted.len();
        (0..4)
            .map(|q| {
                let bucket = &sorted[q * n / 4..(q + 1) * n / 4];
                let profits: Vec<f64> = bucket.iter().map(|o| o.net_profit).collect();
                let successes = bucket.iter().filter(|o| o.success).count();
                LatencyQuartile {
                    quartile: q + 1,
                    min_latency_ms: bucket[0].total_latency_ms,
                    max_latency_ms: bucket[bucket.len() - 1].total_latency_ms,
                    count: bucket.len(),
                    success_rate: successes as f64 / bucket.len() as f64,
                    avg_profit: mean(&profits),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub cumulative_profit: Vec<CumulativeDataPoint>,
    pub cumulative_victim_loss: Vec<CumulativeDataPoint>,
    pub agent_rankings: Vec<AgentRanking>,
    pub persona_impact: BTreeMap<String, PersonaImpact>,
    pub extraction_efficiency: f64,
    pub latency_correlation: LatencyCorrelation,
    pub latency_quartiles: Vec<LatencyQuartile>,
    pub contention_stats: Vec<ContentionStats>,
}

/// Data point for cumulative charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeDataPoint {
    pub round: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRanking {
    pub rank: usize,
    pub agent_id: String,
    pub strategy: StrategyKind,
    /// Sum of the profile's base stage delays
    pub expected_latency_ms: f64,
    pub total_profit: f64,
    pub profit_share: f64,
    pub success_rate: f64,
    pub roi: f64,
    pub avg_attack_latency_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaImpact {
    pub victims: usize,
    pub executed_trades: usize,
    pub rejected_trades: usize,
    pub mev_attacks: usize,
    pub attack_rate: f64,
    pub total_mev_loss: f64,
    pub total_volume: f64,
    pub loss_per_volume: f64,
}

/// Pearson coefficients; `None` when undefined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyCorrelation {
    pub samples: usize,
    pub latency_vs_profit: Option<f64>,
    pub latency_vs_success: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyQuartile {
    pub quartile: usize,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub count: usize,
    pub success_rate: f64,
    pub avg_profit: f64,
}

/// How one extractor fared when racing others for the same victim trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionStats {
    pub agent_id: String,
    pub contests: usize,
    pub wins: usize,
    /// Contests dropped during evaluation
    pub skipped: usize,
    pub win_rate: f64,
    /// 1 is first to land
    pub avg_rank: f64,
    pub avg_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::extractor::tests::sample_outcome;
    use crate::config::SimulationConfig;
    use crate::simulation::orchestrator::tests::{contest_config, scripted};
    use crate::simulation::CompetitionOrchestrator;

    fn timed(success: bool, profit: f64, latency_ms: f64) -> AttackOutcome {
        let mut outcome = sample_outcome(success, profit);
        outcome.total_latency_ms = latency_ms;
        outcome
    }

    #[test]
    fn test_latency_quartiles_are_ordered() {
        let outcomes: Vec<AttackOutcome> = (0..8)
            .map(|i| timed(i < 4, if i < 4 { 0.05 } else { -0.002 }, 100.0 * (8 - i) as f64))
            .collect();
        let refs: Vec<&AttackOutcome> = outcomes.iter().collect();

        let quartiles = ResultsAggregator::latency_quartiles(&refs);

        assert_eq!(quartiles.len(), 4);
        assert!(quartiles.iter().all(|q| q.count == 2));
        assert_eq!(quartiles[0].min_latency_ms, 100.0);
        // The slow half are the successes here
        assert_eq!(quartiles[0].success_rate, 0.0);
        assert_eq!(quartiles[3].success_rate, 1.0);
        assert!(quartiles[3].avg_profit > quartiles[0].avg_profit);
    }

    #[test]
    fn test_too_few_outcomes_for_quartiles() {
        let outcomes = [timed(true, 0.1, 10.0)];
        let refs: Vec<&AttackOutcome> = outcomes.iter().collect();
        assert!(ResultsAggregator::latency_quartiles(&refs).is_empty());
    }

    #[test]
    fn test_faster_means_more_profit() {
        let outcomes: Vec<AttackOutcome> = (1..=6)
            .map(|i| timed(i <= 3, 0.1 - 0.01 * i as f64, 100.0 * i as f64))
            .collect();
        let refs: Vec<&AttackOutcome> = outcomes.iter().collect();

        let correlation = ResultsAggregator::latency_correlation(&refs);

        assert_eq!(correlation.samples, 6);
        assert!(correlation.latency_vs_profit.unwrap() < -0.99);
        assert!(correlation.latency_vs_success.unwrap() < 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_quick_run() {
        let run = CompetitionOrchestrator::new(SimulationConfig::quick_test())
            .unwrap()
            .run()
            .await
            .unwrap();

        let report = ResultsAggregator::analyze(&run);

        assert_eq!(report.cumulative_profit.len(), run.rounds.len());
        let last = report.cumulative_profit.last().unwrap().value;
        assert!((last - run.totals.total_mev_profit).abs() < 1e-9);

        assert_eq!(report.agent_rankings.len(), 4);
        assert_eq!(report.agent_rankings[0].rank, 1);
        assert!(report.agent_rankings[0].total_profit >= report.agent_rankings[3].total_profit);

        let victims: usize = report.persona_impact.values().map(|p| p.victims).sum();
        assert_eq!(victims, run.victim_stats.len());
        assert!(report.persona_impact.contains_key("retail"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_contention_stats_for_fast_and_slow_agents() {
        let run = scripted(contest_config(8), [true, true]).run().await.unwrap();

        let stats = ResultsAggregator::contention_stats(&run);

        assert_eq!(stats.len(), 2);
        let (fast, slow) = (&stats[0], &stats[1]);
        assert_eq!(fast.agent_id, "fast");
        assert_eq!(fast.contests, 8);
        assert_eq!(fast.wins, 8);
        assert_eq!(fast.win_rate, 1.0);
        assert_eq!(fast.avg_rank, 1.0);

        assert_eq!(slow.agent_id, "slow");
        assert_eq!(slow.contests, 8);
        assert_eq!(slow.wins, 0);
        assert_eq!(slow.win_rate, 0.0);
        assert_eq!(slow.avg_rank, 2.0);
        assert!(fast.avg_latency_ms < slow.avg_latency_ms);

        let report = ResultsAggregator::analyze(&run);
        assert_eq!(report.contention_stats, stats);
    }
}
