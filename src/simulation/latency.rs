//! Latency Model
//!
//! Per-agent pipeline delays with jitter. Each stage draws
//! `max(0, base + U(-1, 1) * base * jitter)` milliseconds, records it, and
//! (through `wait`) suspends the caller for that long, scaled by the
//! configured time scale.

use crate::error::{SimError, SimResult};
use crate::utils::stats::SampleStats;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Upper bound on a stage's base latency (one hour)
pub const MAX_BASE_LATENCY_MS: f64 = 3_600_000.0;
/// Upper bound on the real-sleep multiplier
pub const MAX_TIME_SCALE: f64 = 1_000.0;

/// Stages of the extraction pipeline that cost time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyStage {
    BlockDetection,
    MarketUpdate,
    Calculation,
    BundleCreation,
    NetworkSubmission,
}

impl LatencyStage {
    pub const ALL: [LatencyStage; 5] = [
        LatencyStage::BlockDetection,
        LatencyStage::MarketUpdate,
        LatencyStage::Calculation,
        LatencyStage::BundleCreation,
        LatencyStage::NetworkSubmission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyStage::BlockDetection => "block_detection",
            LatencyStage::MarketUpdate => "market_update",
            LatencyStage::Calculation => "calculation",
            LatencyStage::BundleCreation => "bundle_creation",
            LatencyStage::NetworkSubmission => "network_submission",
        }
    }
}

/// Stage delay magnitudes (ms) of one agent's infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyProfile {
    pub block_detection: f64,
    pub market_update: f64,
    pub calculation: f64,
    pub bundle_creation: f64,
    pub network_submission: f64,
    /// Jitter ratio in [0, 1]
    pub jitter: f64,
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self::medium_performance()
    }
}

impl LatencyProfile {
    pub fn high_performance() -> Self {
        Self {
            block_detection: 50.0,
            market_update: 100.0,
            calculation: 80.0,
            bundle_creation: 60.0,
            network_submission: 120.0,
            jitter: 0.1,
        }
    }

    pub fn medium_performance() -> Self {
        Self {
            block_detection: 150.0,
            market_update: 200.0,
            calculation: 180.0,
            bundle_creation: 120.0,
            network_submission: 250.0,
            jitter: 0.2,
        }
    }

    pub fn low_performance() -> Self {
        Self {
            block_detection: 300.0,
            market_update: 500.0,
            calculation: 400.0,
            bundle_creation: 250.0,
            network_submission: 600.0,
            jitter: 0.3,
        }
    }

    pub fn variable_performance() -> Self {
        Self {
            block_detection: 200.0,
            market_update: 300.0,
            calculation: 150.0,
            bundle_creation: 100.0,
            network_submission: 400.0,
            jitter: 0.5,
        }
    }

    /// Look up a preset by name ("high_performance", "medium", ...)
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "high" | "high_performance" => Some(Self::high_performance()),
            "medium" | "medium_performance" => Some(Self::medium_performance()),
            "low" | "low_performance" => Some(Self::low_performance()),
            "variable" | "variable_performance" => Some(Self::variable_performance()),
            _ => None,
        }
    }

    pub fn preset_names() -> [&'static str; 4] {
        [
            "high_performance",
            "medium_performance",
            "low_performance",
            "variable_performance",
        ]
    }

    /// Base delay for a stage
    pub fn base(&self, stage: LatencyStage) -> f64 {
        match stage {
            LatencyStage::BlockDetection => self.block_detection,
            LatencyStage::MarketUpdate => self.market_update,
            LatencyStage::Calculation => self.calculation,
            LatencyStage::BundleCreation => self.bundle_creation,
            LatencyStage::NetworkSubmission => self.network_submission,
        }
    }

    /// Sum of the five stage bases
    pub fn total_average_latency(&self) -> f64 {
        LatencyStage::ALL.iter().map(|s| self.base(*s)).sum()
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(SimError::InvalidConfig(format!(
                "latency jitter {} outside [0, 1]",
                self.jitter
            )));
        }
        let in_range = |ms: f64| (0.0..=MAX_BASE_LATENCY_MS).contains(&ms);
        if let Some(stage) = LatencyStage::ALL.iter().find(|s| !in_range(self.base(**s))) {
            return Err(SimError::InvalidConfig(format!(
                "base latency {} for {} outside [0, {}]",
                self.base(*stage),
                stage.as_str(),
                MAX_BASE_LATENCY_MS
            )));
        }
        Ok(())
    }
}

/// Latency statistics, per stage and across all stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyStatistics {
    pub stages: BTreeMap<LatencyStage, SampleStats>,
    pub total: SampleStats,
}

/// Mean-latency advantage of one model over another for a single stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyAdvantage {
    /// Positive when `self` is faster than `other`
    pub advantage_ms: f64,
    pub advantage_pct: f64,
}

/// Simulated latency of one agent
#[derive(Debug, Clone)]
pub struct LatencyModel {
    agent_id: String,
    profile: LatencyProfile,
    history: BTreeMap<LatencyStage, Vec<f64>>,
    rng: StdRng,
    /// Multiplier applied to real suspension (0 = never sleep)
    time_scale: f64,
}

impl LatencyModel {
    pub fn new(agent_id: &str, profile: LatencyProfile, rng: StdRng) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            profile,
            history: BTreeMap::new(),
            rng,
            time_scale: 1.0,
        }
    }

    /// Scale real suspension; must be finite and within [0, MAX_TIME_SCALE]
    pub fn with_time_scale(mut self, time_scale: f64) -> SimResult<Self> {
        if !(0.0..=MAX_TIME_SCALE).contains(&time_scale) {
            return Err(SimError::InvalidConfig(format!(
                "latency time scale {} outside [0, {}]",
                time_scale, MAX_TIME_SCALE
            )));
        }
        self.time_scale = time_scale;
        Ok(self)
    }

    pub fn profile(&self) -> &LatencyProfile {
        &self.profile
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Draw and record a stage delay without suspending
    pub fn simulate(&mut self, stage: LatencyStage) -> f64 {
        let base = self.profile.base(stage);
        let noise: f64 = self.rng.gen_range(-1.0..=1.0);
        let elapsed = (base + noise * base * self.profile.jitter).max(0.0);

        self.history.entry(stage).or_default().push(elapsed);
        debug!("[{}] {}: {:.1}ms", self.agent_id, stage.as_str(), elapsed);

        elapsed
    }

    /// Draw, record and suspend for a stage delay. Always runs to completion.
    pub async fn wait(&mut self, stage: LatencyStage) -> SimResult<f64> {
        let elapsed = self.simulate(stage);
        let real_ms = elapsed * self.time_scale;
        if real_ms > 0.0 {
            let pause = Duration::try_from_secs_f64(real_ms / 1000.0).map_err(|e| {
                SimError::InvalidConfig(format!("{} sleep of {}ms: {}", stage.as_str(), real_ms, e))
            })?;
            tokio::time::sleep(pause).await;
        }
        Ok(elapsed)
    }

    /// Recorded samples for a stage
    pub fn samples(&self, stage: LatencyStage) -> &[f64] {
        self.history.get(&stage).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn statistics(&self) -> LatencyStatistics {
        let mut stages = BTreeMap::new();
        let mut all = Vec::new();

        for stage in LatencyStage::ALL {
            let samples = self.samples(stage);
            stages.insert(stage, SampleStats::from_samples(samples));
            all.extend_from_slice(samples);
        }

        LatencyStatistics {
            stages,
            total: SampleStats::from_samples(&all),
        }
    }

    /// Clear history for a new run
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Per-stage mean advantage of `self` over `other`; stages without
    /// samples on both sides are omitted
    pub fn compare_with(&self, other: &LatencyModel) -> BTreeMap<LatencyStage, LatencyAdvantage> {
        let mine = self.statistics();
        let theirs = other.statistics();
        let mut comparison = BTreeMap::new();

        for stage in LatencyStage::ALL {
            let (Some(a), Some(b)) = (mine.stages.get(&stage), theirs.stages.get(&stage)) else {
                continue;
            };
            if a.count == 0 || b.count == 0 {
                continue;
            }

            let advantage_ms = b.mean - a.mean;
            let advantage_pct = if b.mean > 0.0 {
                advantage_ms / b.mean * 100.0
            } else {
                0.0
            };
            comparison.insert(stage, LatencyAdvantage { advantage_ms, advantage_pct });
        }

        comparison
    }
}
