//! Simulation configuration
//!
//! Plain values handed to each component's constructor. Nothing here is
//! global; a run owns its `SimulationConfig`.

use crate::bots::strategy::StrategyKind;
use crate::bots::victim::{Persona, TradingPattern};
use crate::error::{SimError, SimResult};
use crate::simulation::latency::{LatencyProfile, MAX_TIME_SCALE};
use crate::utils::amm_math::{PoolState, DEFAULT_IMPACT_COEFFICIENT};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Longest accepted wall-clock budget (one year)
pub const MAX_DURATION_MINUTES: f64 = 525_600.0;
/// Longest accepted simulated block interval (one day)
pub const MAX_BLOCK_TIME_SECS: f64 = 86_400.0;

/// Gas model for a sandwich bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Gas units per swap transaction
    pub gas_per_swap: f64,
    pub gas_price_gwei: f64,
    /// Frontrun + victim + backrun
    pub txs_per_sandwich: u32,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_per_swap: 150_000.0,
            gas_price_gwei: 10.0,
            txs_per_sandwich: 3,
        }
    }
}

impl GasConfig {
    /// Estimated gas cost of one sandwich, in native units
    pub fn sandwich_cost(&self) -> f64 {
        self.gas_per_swap * self.txs_per_sandwich as f64 * self.gas_price_gwei * 1e-9
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub id: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: f64,
    pub reserve_b: f64,
    /// 3000 = 0.3%
    pub fee_tier: u32,
    /// Price of A in B; `None` derives it from the reserves
    pub initial_price_ratio: Option<f64>,
    pub impact_coefficient: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            id: "TOKEN1_TOKEN2_3000".to_string(),
            token_a: "TOKEN1".to_string(),
            token_b: "TOKEN2".to_string(),
            reserve_a: 10_000.0,
            reserve_b: 20_000.0,
            fee_tier: 3000,
            initial_price_ratio: None,
            impact_coefficient: DEFAULT_IMPACT_COEFFICIENT,
        }
    }
}

impl PoolConfig {
    pub fn initial_state(&self) -> PoolState {
        let state = PoolState::new(self.reserve_a, self.reserve_b, self.fee_tier)
            .with_impact_coefficient(self.impact_coefficient);
        match self.initial_price_ratio {
            Some(ratio) => state.with_price_ratio(ratio),
            None => state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub id: String,
    pub strategy: StrategyKind,
    /// `None` uses the strategy's default
    pub bid_percentage: Option<f64>,
    pub latency: LatencyProfile,
    pub initial_balance: f64,
    /// Victim trades at or below this size are ignored
    pub min_victim_amount: f64,
    /// Chance a landed bundle actually pays out
    pub success_probability: f64,
    pub opportunity_ttl_secs: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            id: "extractor".to_string(),
            strategy: StrategyKind::Aggressive,
            bid_percentage: None,
            latency: LatencyProfile::default(),
            initial_balance: 1.0,
            min_victim_amount: 10.0,
            success_probability: 0.8,
            opportunity_ttl_secs: 30.0,
        }
    }
}

impl ExtractorConfig {
    pub fn new(id: &str, strategy: StrategyKind, latency: LatencyProfile) -> Self {
        Self {
            id: id.to_string(),
            strategy,
            latency,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictimConfig {
    pub id: String,
    pub persona: Persona,
    /// Replaces the persona's default pattern
    #[serde(default)]
    pub custom_pattern: Option<TradingPattern>,
    /// Token symbol -> amount
    pub initial_balances: BTreeMap<String, f64>,
}

impl VictimConfig {
    pub fn new(id: &str, persona: Persona, token1: f64, token2: f64) -> Self {
        Self {
            id: id.to_string(),
            persona,
            custom_pattern: None,
            initial_balances: BTreeMap::from([
                ("TOKEN1".to_string(), token1),
                ("TOKEN2".to_string(), token2),
            ]),
        }
    }

    pub fn pattern(&self) -> TradingPattern {
        self.custom_pattern.clone().unwrap_or_else(|| self.persona.pattern())
    }
}

/// Main simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub name: String,

    /// Master seed; every RNG derives from it. `None` draws from entropy.
    pub seed: Option<u64>,

    /// Wall-clock budget for the round loop
    pub duration_minutes: f64,

    /// Maximum number of rounds
    pub target_rounds: u64,

    /// Simulated seconds per round (one block)
    pub block_time_secs: f64,

    /// Real suspension per simulated millisecond (0 = don't sleep)
    pub latency_time_scale: f64,

    /// Output directory for logs and summaries
    pub output_dir: String,

    pub gas: GasConfig,
    pub pools: Vec<PoolConfig>,
    pub extractors: Vec<ExtractorConfig>,
    pub victims: Vec<VictimConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "mev_competition".to_string(),
            seed: None,
            duration_minutes: 60.0,
            target_rounds: 1000,
            block_time_secs: 12.0,
            latency_time_scale: 1.0,
            output_dir: "output".to_string(),
            gas: GasConfig::default(),
            pools: vec![PoolConfig::default()],
            extractors: vec![
                ExtractorConfig::new(
                    "aggressive_bot",
                    StrategyKind::Aggressive,
                    LatencyProfile::high_performance(),
                ),
                ExtractorConfig::new(
                    "conservative_bot",
                    StrategyKind::Conservative,
                    LatencyProfile::medium_performance(),
                ),
                ExtractorConfig::new(
                    "adaptive_bot",
                    StrategyKind::Adaptive,
                    LatencyProfile::medium_performance(),
                ),
                ExtractorConfig::new(
                    "slow_bot",
                    StrategyKind::Slow,
                    LatencyProfile::low_performance(),
                ),
            ],
            victims: vec![
                VictimConfig::new("retail_1", Persona::Retail, 1000.0, 1000.0),
                VictimConfig::new("retail_2", Persona::Retail, 1000.0, 1000.0),
                VictimConfig::new("whale_1", Persona::Whale, 5000.0, 5000.0),
                VictimConfig::new("dca_1", Persona::Dca, 1000.0, 1000.0),
                VictimConfig::new("arbitrage_1", Persona::Arbitrage, 2000.0, 2000.0),
                VictimConfig::new("panic_1", Persona::Panic, 1000.0, 1000.0),
            ],
        }
    }
}

impl SimulationConfig {
    /// Short seeded run that never sleeps
    pub fn quick_test() -> Self {
        Self {
            name: "quick_test".to_string(),
            seed: Some(42),
            duration_minutes: 5.0,
            target_rounds: 50,
            latency_time_scale: 0.0,
            ..Default::default()
        }
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let invalid = |msg: String| -> SimResult<()> { Err(SimError::InvalidConfig(msg)) };

        if !(self.duration_minutes > 0.0 && self.duration_minutes <= MAX_DURATION_MINUTES) {
            return invalid(format!(
                "duration_minutes must be in (0, {}], got {}",
                MAX_DURATION_MINUTES, self.duration_minutes
            ));
        }
        if self.target_rounds == 0 {
            return invalid("target_rounds must be at least 1".to_string());
        }
        if !(self.block_time_secs > 0.0 && self.block_time_secs <= MAX_BLOCK_TIME_SECS) {
            return invalid(format!(
                "block_time_secs must be in (0, {}], got {}",
                MAX_BLOCK_TIME_SECS, self.block_time_secs
            ));
        }
        if !(0.0..=MAX_TIME_SCALE).contains(&self.latency_time_scale) {
            return invalid(format!(
                "latency_time_scale must be in [0, {}], got {}",
                MAX_TIME_SCALE, self.latency_time_scale
            ));
        }
        if self.gas.gas_per_swap < 0.0 || self.gas.gas_price_gwei < 0.0 {
            return invalid("gas values must be non-negative".to_string());
        }

        if self.pools.is_empty() {
            return invalid("at least one pool is required".to_string());
        }
        if self.extractors.is_empty() {
            return invalid("at least one extractor is required".to_string());
        }
        if self.victims.is_empty() {
            return invalid("at least one victim is required".to_string());
        }

        let mut pool_ids = HashSet::new();
        for pool in &self.pools {
            if !pool_ids.insert(pool.id.as_str()) {
                return invalid(format!("duplicate pool id {}", pool.id));
            }
            if !(pool.reserve_a > 0.0 && pool.reserve_b > 0.0) {
                return invalid(format!("pool {} needs positive reserves", pool.id));
            }
            if pool.token_a == pool.token_b {
                return invalid(format!("pool {} trades {} against itself", pool.id, pool.token_a));
            }
            if matches!(pool.initial_price_ratio, Some(r) if !(r > 0.0)) {
                return invalid(format!("pool {} needs a positive price ratio", pool.id));
            }
            if pool.impact_coefficient < 0.0 {
                return invalid(format!("pool {} has a negative impact coefficient", pool.id));
            }
        }

        let mut agent_ids = HashSet::new();
        for extractor in &self.extractors {
            if !agent_ids.insert(extractor.id.as_str()) {
                return invalid(format!("duplicate agent id {}", extractor.id));
            }
            extractor.latency.validate()?;
            if !(0.0..=1.0).contains(&extractor.success_probability) {
                return invalid(format!(
                    "{}: success_probability {} outside [0, 1]",
                    extractor.id, extractor.success_probability
                ));
            }
            if matches!(extractor.bid_percentage, Some(b) if !(b > 0.0 && b <= 100.0)) {
                return invalid(format!("{}: bid_percentage must be in (0, 100]", extractor.id));
            }
            if extractor.initial_balance < 0.0 {
                return invalid(format!("{}: negative initial balance", extractor.id));
            }
            if !(extractor.opportunity_ttl_secs > 0.0) {
                return invalid(format!("{}: opportunity_ttl_secs must be positive", extractor.id));
            }
        }

        for victim in &self.victims {
            if !agent_ids.insert(victim.id.as_str()) {
                return invalid(format!("duplicate agent id {}", victim.id));
            }
            let pattern = victim.pattern();
            if pattern.amount_min > pattern.amount_max {
                return invalid(format!(
                    "{}: amount range {}..{} is inverted",
                    victim.id, pattern.amount_min, pattern.amount_max
                ));
            }
            if !(pattern.interval_secs > 0.0 && pattern.interval_secs.is_finite()) {
                return invalid(format!("{}: interval_secs must be positive", victim.id));
            }
            if pattern.slippage_tolerance < 0.0 {
                return invalid(format!("{}: negative slippage tolerance", victim.id));
            }
            if victim.initial_balances.values().any(|b| *b < 0.0) {
                return invalid(format!("{}: negative initial balance", victim.id));
            }
        }

        Ok(())
    }

    /// RNG for one component. Seeded runs mix the master seed with the
    /// component's stream and index so components never share a sequence.
    pub fn component_rng(&self, stream: u64, index: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mix = stream
                    .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    .wrapping_add((index as u64 + 1).wrapping_mul(0xBF58_476D_1CE4_E5B9));
                StdRng::seed_from_u64(seed ^ mix)
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Wall-clock budget in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration_minutes * 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::quick_test().validate().is_ok());
    }

    #[test]
    fn test_sandwich_gas_cost() {
        let gas = GasConfig::default();
        assert!((gas.sandwich_cost() - 0.0045).abs() < 1e-12);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SimulationConfig::quick_test();
        config.extractors[0].latency.jitter = 1.2;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));

        let mut config = SimulationConfig::quick_test();
        config.extractors[1].success_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::quick_test();
        config.victims.clear();
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::quick_test();
        config.pools[0].reserve_b = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::quick_test();
        let mut pattern = Persona::Retail.pattern();
        pattern.amount_min = 100.0;
        config.victims[0].custom_pattern = Some(pattern);
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::quick_test();
        config.victims[0].id = "aggressive_bot".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unbounded_durations() {
        for minutes in [f64::INFINITY, f64::NAN, 1e300, MAX_DURATION_MINUTES * 2.0] {
            let mut config = SimulationConfig::quick_test();
            config.duration_minutes = minutes;
            assert!(
                matches!(config.validate(), Err(SimError::InvalidConfig(_))),
                "duration_minutes {}",
                minutes
            );
        }

        for scale in [f64::INFINITY, f64::NAN, -0.5, 1e300] {
            let mut config = SimulationConfig::quick_test();
            config.latency_time_scale = scale;
            assert!(
                matches!(config.validate(), Err(SimError::InvalidConfig(_))),
                "latency_time_scale {}",
                scale
            );
        }

        let mut config = SimulationConfig::quick_test();
        config.block_time_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::quick_test();
        config.duration_minutes = MAX_DURATION_MINUTES;
        config.latency_time_scale = MAX_TIME_SCALE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_component_rngs_are_reproducible_and_distinct() {
        let config = SimulationConfig::quick_test();

        let a: u64 = config.component_rng(1, 0).gen();
        let b: u64 = config.component_rng(1, 0).gen();
        let c: u64 = config.component_rng(1, 1).gen();
        let d: u64 = config.component_rng(2, 0).gen();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{ "name": "custom", "seed": 7, "target_rounds": 20,
                 "extractors": [{ "id": "solo", "strategy": "adaptive" }] }"#,
        )
        .unwrap();

        assert_eq!(config.target_rounds, 20);
        assert_eq!(config.extractors.len(), 1);
        assert_eq!(config.extractors[0].strategy, StrategyKind::Adaptive);
        assert_eq!(config.extractors[0].success_probability, 0.8);
        assert_eq!(config.victims.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_price_ratio_override() {
        let pool = PoolConfig {
            initial_price_ratio: Some(3.0),
            ..Default::default()
        };
        assert_eq!(pool.initial_state().price_a_in_b(), 3.0);
        assert_eq!(PoolConfig::default().initial_state().price_a_in_b(), 2.0);
    }
}
