use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{AppError, GatewayError, GatewayErrorKind};
use crate::models::pool::{AddLiquidityRequest, PoolRef, Position, RemoveLiquidityRequest, TxReceipt};

use super::{GatewayResult, PoolGateway};

const BACKOFF_BASE_MS: u64 = 250;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinResponse {
    bin_id: i64,
}

#[derive(Debug, Deserialize)]
struct SignatureResponse {
    signature: String,
}

/// Gateway backed by an HTTP bridge in front of the pool SDK.
///
/// Transient failures (`RateLimited`, `RpcError`) are retried with
/// exponential backoff; every other failure is returned on first sight.
pub struct LiveGateway {
    client: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl LiveGateway {
    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("Cannot build HTTP client: {}", e)))?;
        Ok(LiveGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn call<T, F>(&self, what: &str, make_request: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match send_once(make_request()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind.is_transient() && attempt < self.retries => {
                    let delay = backoff(attempt);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt + 1,
                        self.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", what, e);
                    return Err(e);
                }
            }
        }
    }
}

async fn send_once<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> GatewayResult<T> {
    let resp = request
        .send()
        .await
        .map_err(|e| GatewayError::rpc(e.to_string()))?;

    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::sdk(format!("Invalid bridge response: {}", e)))
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

/// Map a non-success bridge status to a gateway error kind.
pub fn classify_status(status: u16, body: &str) -> GatewayError {
    let kind = match status {
        400 | 422 => GatewayErrorKind::InvalidInput,
        404 => GatewayErrorKind::NotFound,
        429 => GatewayErrorKind::RateLimited,
        502..=504 => GatewayErrorKind::RpcError,
        _ => GatewayErrorKind::SdkError,
    };
    let body = body.trim();
    let message = if body.is_empty() {
        format!("bridge returned HTTP {}", status)
    } else {
        format!("bridge returned HTTP {}: {}", status, body)
    };
    GatewayError::new(kind, message)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << attempt.min(6))
}

#[async_trait]
impl PoolGateway for LiveGateway {
    async fn list_pools(&self) -> GatewayResult<Vec<PoolRef>> {
        let url = self.url("pools");
        let pools: Vec<PoolRef> = self.call("list_pools", || self.client.get(&url)).await?;
        info!("Bridge listed {} pools", pools.len());
        Ok(pools)
    }

    async fn current_mid_price(&self, pool: &str) -> GatewayResult<f64> {
        let url = self.url(&format!("pools/{}/price", pool));
        let resp: PriceResponse = self.call("current_mid_price", || self.client.get(&url)).await?;
        if !resp.price.is_finite() || resp.price <= 0.0 {
            return Err(GatewayError::sdk(format!(
                "Bridge returned unusable price {} for {}",
                resp.price, pool
            )));
        }
        Ok(resp.price)
    }

    async fn price_to_bin_index(&self, pool: &str, price: f64) -> GatewayResult<i64> {
        let url = self.url(&format!("pools/{}/bin", pool));
        let resp: BinResponse = self
            .call("price_to_bin_index", || {
                self.client.get(&url).query(&[("price", price)])
            })
            .await?;
        Ok(resp.bin_id)
    }

    async fn get_positions(&self, wallet: &str) -> GatewayResult<Vec<Position>> {
        let url = self.url(&format!("positions/{}", wallet));
        self.call("get_positions", || self.client.get(&url)).await
    }

    async fn add_liquidity(&self, req: &AddLiquidityRequest) -> GatewayResult<TxReceipt> {
        let url = self.url("liquidity/add");
        let resp: SignatureResponse = self
            .call("add_liquidity", || self.client.post(&url).json(req))
            .await?;
        info!("Liquidity added to {}: {}", req.pool, resp.signature);
        Ok(TxReceipt {
            signature: resp.signature,
            mock: false,
        })
    }

    async fn remove_liquidity(&self, req: &RemoveLiquidityRequest) -> GatewayResult<TxReceipt> {
        let url = self.url("liquidity/remove");
        let resp: SignatureResponse = self
            .call("remove_liquidity", || self.client.post(&url).json(req))
            .await?;
        info!("Liquidity removed from {}: {}", req.pool, resp.signature);
        Ok(TxReceipt {
            signature: resp.signature,
            mock: false,
        })
    }
}
