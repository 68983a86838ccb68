use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::GatewayError;
use crate::models::pool::{AddLiquidityRequest, PoolRef, Position, RemoveLiquidityRequest, TxReceipt};

use super::bin_math::bin_for_price;
use super::{GatewayResult, PoolGateway};

/// Pools served by the mock gateway with their fixed mid prices.
fn mock_catalogue() -> Vec<(PoolRef, f64)> {
    vec![
        (
            PoolRef {
                address: "8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj".into(),
                name: "SOL/USDC".into(),
                base_symbol: "SOL".into(),
                quote_symbol: "USDC".into(),
                bin_step: 20,
            },
            150.0,
        ),
        (
            PoolRef {
                address: "7qbRF6YsyGuLUVs6Y1q64bdVrfe4ZcUUz1JRdoVNUJnm".into(),
                name: "JUP/USDC".into(),
                base_symbol: "JUP".into(),
                quote_symbol: "USDC".into(),
                bin_step: 10,
            },
            0.85,
        ),
        (
            PoolRef {
                address: "2QdhepnKRTLjjSqPL1PtKNwqrUkoLee5Gqs8bvZhRdMv".into(),
                name: "USDC/USDT".into(),
                base_symbol: "USDC".into(),
                quote_symbol: "USDT".into(),
                bin_step: 1,
            },
            1.0001,
        ),
    ]
}

/// Deterministic in-process gateway.
///
/// Signatures are SHA-256 digests of the request, and positions are drawn
/// from an RNG seeded with `seed` and the wallet, so identical inputs always
/// produce identical outputs.
pub struct MockGateway {
    seed: u64,
    pools: Vec<(PoolRef, f64)>,
}

impl MockGateway {
    pub fn new(seed: u64) -> Self {
        MockGateway {
            seed,
            pools: mock_catalogue(),
        }
    }

    fn pool(&self, address: &str) -> GatewayResult<&(PoolRef, f64)> {
        self.pools
            .iter()
            .find(|(p, _)| p.address == address)
            .ok_or_else(|| GatewayError::not_found(format!("Unknown pool {}", address)))
    }

    fn wallet_rng(&self, wallet: &str) -> StdRng {
        let digest = Sha256::digest(wallet.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        StdRng::seed_from_u64(self.seed ^ u64::from_le_bytes(head))
    }
}

fn mock_signature(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl PoolGateway for MockGateway {
    async fn list_pools(&self) -> GatewayResult<Vec<PoolRef>> {
        Ok(self.pools.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn current_mid_price(&self, pool: &str) -> GatewayResult<f64> {
        self.pool(pool).map(|(_, mid)| *mid)
    }

    async fn price_to_bin_index(&self, pool: &str, price: f64) -> GatewayResult<i64> {
        let (pool, _) = self.pool(pool)?;
        bin_for_price(price, pool.bin_step)
    }

    async fn get_positions(&self, wallet: &str) -> GatewayResult<Vec<Position>> {
        let mut rng = self.wallet_rng(wallet);
        let count = rng.gen_range(1..=3);
        let mut positions = Vec::with_capacity(count);

        for _ in 0..count {
            let (pool, mid) = &self.pools[rng.gen_range(0..self.pools.len())];
            let active = bin_for_price(*mid, pool.bin_step)?;
            let width: i64 = rng.gen_range(5..=30);
            let offset: i64 = rng.gen_range(-10..=10);
            let bin_lower = active + offset - width / 2;
            let id_bytes: [u8; 16] = rng.gen();

            positions.push(Position {
                position_id: uuid::Builder::from_random_bytes(id_bytes).into_uuid().to_string(),
                wallet: wallet.to_string(),
                pool: pool.address.clone(),
                bin_lower,
                bin_upper: bin_lower + width,
                amount_base: (rng.gen_range(0.1..50.0_f64) * 1e4).round() / 1e4,
                amount_quote: (rng.gen_range(10.0..5_000.0_f64) * 1e2).round() / 1e2,
            });
        }

        debug!("Mock positions for {}: {}", wallet, positions.len());
        Ok(positions)
    }

    async fn add_liquidity(&self, req: &AddLiquidityRequest) -> GatewayResult<TxReceipt> {
        self.pool(&req.pool)?;
        if req.amount_base <= 0.0 && req.amount_quote <= 0.0 {
            return Err(GatewayError::invalid_input("nothing to deposit"));
        }
        let signature = mock_signature(&[
            "add",
            &req.wallet,
            &req.pool,
            &req.amount_base.to_string(),
            &req.amount_quote.to_string(),
            &req.bin_lower.to_string(),
            &req.bin_upper.to_string(),
        ]);
        Ok(TxReceipt {
            signature,
            mock: true,
        })
    }

    async fn remove_liquidity(&self, req: &RemoveLiquidityRequest) -> GatewayResult<TxReceipt> {
        self.pool(&req.pool)?;
        if req.position_id.is_empty() {
            return Err(GatewayError::invalid_input("positionId is required"));
        }
        let signature = mock_signature(&[
            "remove",
            &req.wallet,
            &req.pool,
            &req.position_id,
            &req.bps.to_string(),
        ]);
        Ok(TxReceipt {
            signature,
            mock: true,
        })
    }
}
