//! Access to pool prices, bin mapping and liquidity actions.
//!
//! The planners only see the `PoolGateway` trait. Which implementation runs
//! is decided once at startup from `AppConfig::gateway_mode`.

pub mod bin_math;
pub mod live;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::errors::{AppError, GatewayError};
use crate::models::config::{AppConfig, GatewayMode};
use crate::models::pool::{AddLiquidityRequest, PoolRef, Position, RemoveLiquidityRequest, TxReceipt};

pub use live::LiveGateway;
pub use mock::MockGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Pool data and liquidity operations. Calls are fallible and may be slow;
/// callers must not retry, retry policy lives in the implementation.
#[async_trait]
pub trait PoolGateway: Send + Sync {
    async fn list_pools(&self) -> GatewayResult<Vec<PoolRef>>;

    async fn current_mid_price(&self, pool: &str) -> GatewayResult<f64>;

    async fn price_to_bin_index(&self, pool: &str, price: f64) -> GatewayResult<i64>;

    async fn get_positions(&self, wallet: &str) -> GatewayResult<Vec<Position>>;

    async fn add_liquidity(&self, req: &AddLiquidityRequest) -> GatewayResult<TxReceipt>;

    async fn remove_liquidity(&self, req: &RemoveLiquidityRequest) -> GatewayResult<TxReceipt>;
}

/// Build the gateway selected by configuration.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn PoolGateway>, AppError> {
    info!("Using {} pool gateway", config.gateway_mode);
    let gateway: Arc<dyn PoolGateway> = match config.gateway_mode {
        GatewayMode::Mock => Arc::new(MockGateway::new(config.mock_seed)),
        GatewayMode::Live => Arc::new(LiveGateway::new(
            &config.gateway_url,
            config.gateway_timeout(),
            config.gateway_retries,
        )?),
    };
    Ok(gateway)
}
