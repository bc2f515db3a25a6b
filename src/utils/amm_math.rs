//! AMM Math Utilities
//!
//! Approximate swap model used by the simulation. Output is the ideal
//! price-ratio conversion reduced by a linear price-impact term; this is not
//! exact constant-product or concentrated-liquidity math.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Fee tiers are expressed in hundredths of a basis point (3000 = 0.3%)
pub const FEE_TIER_DENOMINATOR: f64 = 1_000_000.0;

/// Default impact per unit of `amount_in / reserve_in`
pub const DEFAULT_IMPACT_COEFFICIENT: f64 = 0.01;

/// Two-sided pool reserves plus the stored price ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    /// Reserve of token A
    pub reserve_a: f64,
    /// Reserve of token B
    pub reserve_b: f64,
    /// Fee tier (3000 = 0.3%)
    pub fee_tier: u32,
    /// Price of A in terms of B. Tracked separately from the reserves and
    /// nudged by each swap's price impact.
    pub price_ratio: f64,
    /// Slippage per unit of `amount_in / reserve_in`
    pub impact_coefficient: f64,
}

/// Result of a swap calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_in: f64,
    /// Output with no price impact
    pub ideal_out: f64,
    /// Output after price impact
    pub amount_out: f64,
    /// (ideal - realized) / ideal
    pub slippage: f64,
    pub price_impact: f64,
    /// Fee charged in input tokens (recorded only, output is not reduced)
    pub fee_paid: f64,
    pub a_to_b: bool,
}

impl PoolState {
    /// Create a new pool state; price ratio starts at reserve_b / reserve_a
    pub fn new(reserve_a: f64, reserve_b: f64, fee_tier: u32) -> Self {
        let price_ratio = if reserve_a > 0.0 { reserve_b / reserve_a } else { 0.0 };
        Self {
            reserve_a,
            reserve_b,
            fee_tier,
            price_ratio,
            impact_coefficient: DEFAULT_IMPACT_COEFFICIENT,
        }
    }

    /// Override the initial price ratio
    pub fn with_price_ratio(mut self, price_ratio: f64) -> Self {
        self.price_ratio = price_ratio;
        self
    }

    pub fn with_impact_coefficient(mut self, coefficient: f64) -> Self {
        self.impact_coefficient = coefficient;
        self
    }

    /// Price of A in terms of B
    pub fn price_a_in_b(&self) -> f64 {
        self.price_ratio
    }

    pub fn has_liquidity(&self) -> bool {
        self.reserve_a > 0.0 && self.reserve_b > 0.0 && self.price_ratio > 0.0
    }

    /// Reserve on the input side of a swap
    pub fn reserve_in(&self, a_to_b: bool) -> f64 {
        if a_to_b {
            self.reserve_a
        } else {
            self.reserve_b
        }
    }

    /// Price impact a trade of `amount_in` would cause, clamped to [0, 1]
    pub fn price_impact(&self, amount_in: f64, a_to_b: bool) -> f64 {
        let reserve_in = self.reserve_in(a_to_b);
        if reserve_in <= 0.0 {
            return 1.0;
        }
        (amount_in / reserve_in * self.impact_coefficient).clamp(0.0, 1.0)
    }

    /// Quote a swap without touching state
    pub fn quote(&self, amount_in: f64, a_to_b: bool) -> SimResult<SwapQuote> {
        if !self.has_liquidity() {
            return Err(SimError::NoLiquidity { pool: String::new() });
        }

        let ideal_out = if a_to_b {
            amount_in * self.price_ratio
        } else {
            amount_in / self.price_ratio
        };
        let price_impact = self.price_impact(amount_in, a_to_b);
        let amount_out = ideal_out * (1.0 - price_impact);
        let slippage = if ideal_out > 0.0 {
            (ideal_out - amount_out) / ideal_out
        } else {
            0.0
        };

        Ok(SwapQuote {
            amount_in,
            ideal_out,
            amount_out,
            slippage,
            price_impact,
            fee_paid: amount_in * self.fee_tier as f64 / FEE_TIER_DENOMINATOR,
            a_to_b,
        })
    }

    /// Quote and check slippage against `tolerance`, without touching state
    pub fn simulate_swap(
        &self,
        amount_in: f64,
        a_to_b: bool,
        tolerance: f64,
    ) -> SimResult<SwapQuote> {
        let quote = self.quote(amount_in, a_to_b)?;
        if quote.slippage > tolerance {
            return Err(SimError::SlippageExceeded {
                slippage: quote.slippage,
                tolerance,
            });
        }
        Ok(quote)
    }

    /// Execute a swap: validate, move reserves, nudge the price ratio.
    /// `min_out` of 0 disables the output floor.
    pub fn apply_swap(
        &mut self,
        amount_in: f64,
        a_to_b: bool,
        tolerance: f64,
        min_out: f64,
    ) -> SimResult<SwapQuote> {
        let quote = self.simulate_swap(amount_in, a_to_b, tolerance)?;
        self.settle(&quote, min_out)?;
        Ok(quote)
    }

    /// Apply an already validated quote to the reserves. Nothing moves if the
    /// output is below `min_out` or would drain the reserve.
    pub fn settle(&mut self, quote: &SwapQuote, min_out: f64) -> SimResult<()> {
        if quote.amount_out < min_out {
            return Err(SimError::BelowMinimumOutput {
                amount_out: quote.amount_out,
                min_out,
            });
        }

        let reserve_out = if quote.a_to_b { self.reserve_b } else { self.reserve_a };
        if quote.amount_out > reserve_out {
            return Err(SimError::InsufficientReserve {
                pool: String::new(),
                requested: quote.amount_out,
                available: reserve_out,
            });
        }

        // The ratio moves by the trade's impact factor: up when A comes in,
        // down when B comes in. Approximate on purpose.
        if quote.a_to_b {
            self.reserve_a += quote.amount_in;
            self.reserve_b -= quote.amount_out;
            self.price_ratio *= 1.0 + quote.price_impact;
        } else {
            self.reserve_b += quote.amount_in;
            self.reserve_a -= quote.amount_out;
            self.price_ratio *= 1.0 - quote.price_impact;
        }

        Ok(())
    }

    /// Minimum acceptable output after a safety buffer (0.01 = 1%)
    pub fn min_output(quote: &SwapQuote, buffer: f64) -> f64 {
        quote.amount_out * (1.0 - buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_calculation() {
        let pool = PoolState::new(1000.0, 2000.0, 3000);

        let quote = pool.quote(50.0, true).unwrap();

        assert!((quote.ideal_out - 100.0).abs() < 1e-9);
        assert!(quote.amount_out < quote.ideal_out);
        assert!((quote.price_impact - 0.0005).abs() < 1e-12);
        assert!((quote.fee_paid - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_small_sell_stays_within_two_percent() {
        let mut pool = PoolState::new(1000.0, 2000.0, 3000);

        let quote = pool.apply_swap(50.0, true, 0.02, 0.0).unwrap();

        assert!(quote.slippage < 0.02);
        assert_eq!(pool.reserve_a, 1050.0);
        assert!(pool.reserve_b < 2000.0);
        assert!(pool.price_ratio > 2.0);
    }

    #[test]
    fn test_slippage_exceeded_leaves_pool_untouched() {
        let mut pool = PoolState::new(100.0, 100.0, 3000).with_impact_coefficient(1.0);
        let before = pool.clone();

        let err = pool.apply_swap(10.0, true, 0.02, 0.0).unwrap_err();

        assert!(matches!(err, SimError::SlippageExceeded { .. }));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_no_liquidity() {
        let pool = PoolState::new(0.0, 2000.0, 3000);
        assert!(matches!(pool.quote(1.0, true), Err(SimError::NoLiquidity { .. })));
    }

    #[test]
    fn test_reserves_never_go_negative() {
        let mut pool = PoolState::new(1000.0, 10.0, 3000).with_price_ratio(2.0);

        let err = pool.apply_swap(50.0, true, 1.0, 0.0).unwrap_err();

        assert!(matches!(err, SimError::InsufficientReserve { .. }));
        assert_eq!(pool.reserve_b, 10.0);
    }

    #[test]
    fn test_reverse_direction_lowers_ratio() {
        let mut pool = PoolState::new(1000.0, 2000.0, 3000);

        let quote = pool.apply_swap(100.0, false, 0.05, 0.0).unwrap();

        assert!((quote.ideal_out - 50.0).abs() < 1e-9);
        assert!(pool.price_ratio < 2.0);
        assert_eq!(pool.reserve_b, 2100.0);
    }

    #[test]
    fn test_output_floor_leaves_pool_untouched() {
        let mut pool = PoolState::new(1000.0, 2000.0, 3000).with_impact_coefficient(0.5);
        let quoted = pool.quote(50.0, true).unwrap();
        let floor = PoolState::min_output(&quoted, 0.01);

        // Price drifts against the trade before it settles
        pool.apply_swap(200.0, false, 1.0, 0.0).unwrap();
        let drifted = pool.clone();

        let err = pool.apply_swap(50.0, true, 0.05, floor).unwrap_err();

        assert!(matches!(err, SimError::BelowMinimumOutput { .. }));
        assert_eq!(pool, drifted);
    }
}
