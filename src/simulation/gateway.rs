//! Chain Gateway Boundary
//!
//! What the simulation needs from a real chain. Nothing in the round loop
//! requires a gateway; when one is supplied the orchestrator seeds pool
//! reserves and the gas price from it before the first round.

use crate::error::{SimError, SimResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Swap request sent through a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapParams {
    pub amount_in: f64,
    pub a_to_b: bool,
    pub min_amount_out: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub amount_out: f64,
    pub gas_used: f64,
    pub success: bool,
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Current (reserve_a, reserve_b) of a pool
    async fn get_reserves(&self, pool_id: &str) -> SimResult<(f64, f64)>;

    async fn send_swap(
        &self,
        pool_id: &str,
        params: &SwapParams,
        signer: &str,
    ) -> SimResult<SwapReceipt>;

    async fn get_nonce(&self, address: &str) -> SimResult<u64>;

    /// Gas price in gwei
    async fn estimate_gas_price(&self) -> SimResult<f64>;

    /// Wait for a receipt; the gateway enforces the timeout itself
    async fn wait_for_receipt(&self, tx_hash: &str, timeout: Duration) -> SimResult<SwapReceipt>;
}

fn poisoned<T>(_: T) -> SimError {
    SimError::Collaborator("gateway state lock poisoned".to_string())
}

/// Gateway backed by in-memory state, for mock mode and tests
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    reserves: Mutex<HashMap<String, (f64, f64)>>,
    nonces: Mutex<HashMap<String, u64>>,
    receipts: Mutex<HashMap<String, SwapReceipt>>,
    gas_price_gwei: f64,
    gas_per_swap: f64,
}

impl InMemoryGateway {
    pub fn new(gas_price_gwei: f64) -> Self {
        Self {
            gas_price_gwei,
            gas_per_swap: 150_000.0,
            ..Default::default()
        }
    }

    pub fn with_pool(self, pool_id: &str, reserve_a: f64, reserve_b: f64) -> Self {
        if let Ok(mut reserves) = self.reserves.lock() {
            reserves.insert(pool_id.to_string(), (reserve_a, reserve_b));
        }
        self
    }
}

#[async_trait]
impl ChainGateway for InMemoryGateway {
    async fn get_reserves(&self, pool_id: &str) -> SimResult<(f64, f64)> {
        let reserves = self.reserves.lock().map_err(poisoned)?;
        reserves
            .get(pool_id)
            .copied()
            .ok_or_else(|| SimError::UnknownPool(pool_id.to_string()))
    }

    /// Constant-product swap against the stored reserves
    async fn send_swap(
        &self,
        pool_id: &str,
        params: &SwapParams,
        signer: &str,
    ) -> SimResult<SwapReceipt> {
        let nonce = {
            let mut nonces = self.nonces.lock().map_err(poisoned)?;
            let nonce = nonces.entry(signer.to_string()).or_insert(0);
            *nonce += 1;
            *nonce
        };

        let mut reserves = self.reserves.lock().map_err(poisoned)?;
        let (reserve_a, reserve_b) = reserves
            .get_mut(pool_id)
            .ok_or_else(|| SimError::UnknownPool(pool_id.to_string()))?;
        let (reserve_in, reserve_out) = if params.a_to_b {
            (reserve_a, reserve_b)
        } else {
            (reserve_b, reserve_a)
        };
        if *reserve_in <= 0.0 || *reserve_out <= 0.0 {
            return Err(SimError::NoLiquidity {
                pool: pool_id.to_string(),
            });
        }

        let amount_out = *reserve_out * params.amount_in / (*reserve_in + params.amount_in);
        let success = amount_out >= params.min_amount_out;
        if success {
            *reserve_in += params.amount_in;
            *reserve_out -= amount_out;
        }

        let receipt = SwapReceipt {
            tx_hash: format!("0x{}{:016x}", signer, nonce),
            amount_out: if success { amount_out } else { 0.0 },
            gas_used: self.gas_per_swap,
            success,
        };
        self.receipts
            .lock()
            .map_err(poisoned)?
            .insert(receipt.tx_hash.clone(), receipt.clone());
        Ok(receipt)
    }

    async fn get_nonce(&self, address: &str) -> SimResult<u64> {
        let nonces = self.nonces.lock().map_err(poisoned)?;
        Ok(nonces.get(address).copied().unwrap_or(0))
    }

    async fn estimate_gas_price(&self) -> SimResult<f64> {
        Ok(self.gas_price_gwei)
    }

    async fn wait_for_receipt(&self, tx_hash: &str, _timeout: Duration) -> SimResult<SwapReceipt> {
        let receipts = self.receipts.lock().map_err(poisoned)?;
        receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| SimError::Collaborator(format!("no receipt for {}", tx_hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_gateway_round_trip() {
        let gateway = InMemoryGateway::new(25.0).with_pool("TOKEN1_TOKEN2", 1000.0, 2000.0);

        assert_eq!(gateway.get_reserves("TOKEN1_TOKEN2").await.unwrap(), (1000.0, 2000.0));
        assert_eq!(gateway.estimate_gas_price().await.unwrap(), 25.0);

        let params = SwapParams {
            amount_in: 10.0,
            a_to_b: true,
            min_amount_out: 19.0,
        };
        let receipt = gateway.send_swap("TOKEN1_TOKEN2", &params, "alice").await.unwrap();

        assert!(receipt.success);
        assert!(receipt.amount_out > 19.0 && receipt.amount_out < 20.0);
        assert_eq!(gateway.get_nonce("alice").await.unwrap(), 1);

        let (a, _) = gateway.get_reserves("TOKEN1_TOKEN2").await.unwrap();
        assert_eq!(a, 1010.0);

        let fetched = gateway
            .wait_for_receipt(&receipt.tx_hash, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(fetched, receipt);
    }

    #[tokio::test]
    async fn test_min_out_failure_leaves_reserves() {
        let gateway = InMemoryGateway::new(10.0).with_pool("p", 1000.0, 1000.0);
        let params = SwapParams {
            amount_in: 100.0,
            a_to_b: false,
            min_amount_out: 100.0,
        };

        let receipt = gateway.send_swap("p", &params, "bob").await.unwrap();

        assert!(!receipt.success);
        assert_eq!(gateway.get_reserves("p").await.unwrap(), (1000.0, 1000.0));
    }

    #[tokio::test]
    async fn test_unknown_pool() {
        let gateway = InMemoryGateway::new(10.0);
        assert_eq!(
            gateway.get_reserves("missing").await,
            Err(SimError::UnknownPool("missing".to_string()))
        );
    }
}
