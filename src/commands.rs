use std::sync::atomic::Ordering;

use tracing::info;

use crate::data::loader;
use crate::engine::{executor, optimizer, planner};
use crate::errors::AppError;
use crate::models::api::{
    validate_address, AdvancedOrderPlanRequest, BacktestRequest, LinkCodeResponse, RebalancePlanRequest,
    RebalancePlanResponse, RedeemLinkRequest, SweepRequest,
};
use crate::models::candle::Candle;
use crate::models::order::AdvancedOrderPlan;
use crate::models::pool::{AddLiquidityRequest, PoolRef, Position, RemoveLiquidityRequest, TxReceipt};
use crate::models::result::{BacktestParams, BacktestResults, SweepConfig, SweepResult};
use crate::AppState;

// ── Planning Commands ──

/// Target bin range for a band around the pool's current mid price.
pub async fn plan_rebalance(state: &AppState, req: RebalancePlanRequest) -> Result<RebalancePlanResponse, AppError> {
    req.validate()?;
    state.rate_limiter.check(&req.wallet).await?;

    let band = planner::plan_band_for_pool(state.gateway.as_ref(), &req.pool, req.band_bps).await?;
    info!(
        "Rebalance plan {} for {}: bins [{}, {}], in_band={}",
        req.pool, req.wallet, band.bin_lower, band.bin_upper, band.in_band
    );
    Ok(RebalancePlanResponse::from(&band))
}

/// Bins a synthetic limit or stop order should occupy.
pub async fn plan_advanced_order(
    state: &AppState,
    req: AdvancedOrderPlanRequest,
) -> Result<AdvancedOrderPlan, AppError> {
    req.validate()?;
    state.rate_limiter.check(&req.wallet).await?;

    let plan = planner::plan_advanced_order_for_pool(state.gateway.as_ref(), &req.pool, &req.spec).await?;
    info!("Advanced order plan {} for {}: {}", req.pool, req.wallet, plan.note);
    Ok(plan)
}

// ── Pool Commands ──

pub async fn list_pools(state: &AppState) -> Result<Vec<PoolRef>, AppError> {
    Ok(state.gateway.list_pools().await?)
}

pub async fn get_positions(state: &AppState, wallet: &str) -> Result<Vec<Position>, AppError> {
    validate_address("wallet", wallet)?;
    Ok(state.gateway.get_positions(wallet).await?)
}

pub async fn add_liquidity(state: &AppState, req: AddLiquidityRequest) -> Result<TxReceipt, AppError> {
    req.validate()?;
    state.rate_limiter.check(&req.wallet).await?;
    let receipt = state.gateway.add_liquidity(&req).await?;
    info!("Add liquidity {} for {}: {}", req.pool, req.wallet, receipt.signature);
    Ok(receipt)
}

pub async fn remove_liquidity(state: &AppState, req: RemoveLiquidityRequest) -> Result<TxReceipt, AppError> {
    req.validate()?;
    state.rate_limiter.check(&req.wallet).await?;
    let receipt = state.gateway.remove_liquidity(&req).await?;
    info!(
        "Remove {} bps of {} for {}: {}",
        req.bps, req.position_id, req.wallet, receipt.signature
    );
    Ok(receipt)
}

// ── Backtest Commands ──

/// Parse the uploaded CSV and run a band backtest over it.
pub async fn run_backtest(state: &AppState, req: BacktestRequest) -> Result<BacktestResults, AppError> {
    req.validate()?;
    let candles = loader::parse_candles_str(&req.csv)?;
    let params = BacktestParams::new(req.band_bps, req.cooldown_sec)
        .with_fee_per_exit(req.fee_per_exit.unwrap_or(state.config.fee_per_exit));
    backtest_candles(state, candles, params).await
}

/// Run a band backtest over already loaded candles.
pub async fn backtest_candles(
    state: &AppState,
    candles: Vec<Candle>,
    params: BacktestParams,
) -> Result<BacktestResults, AppError> {
    info!(
        "Running backtest: {} candles, band={}bps, cooldown={}s",
        candles.len(),
        params.band_bps,
        params.cooldown_sec
    );

    // Reset cancel flag
    state.cancel_flag.store(false, Ordering::Relaxed);
    let cancel_flag = state.cancel_flag.clone();

    let result = tokio::task::spawn_blocking(move || executor::run_backtest(&candles, &params, &cancel_flag))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    info!(
        "Backtest complete: {} exits, total fees {:.6}%",
        result.metrics.exits, result.metrics.total_fees_pct
    );
    Ok(result)
}

/// Parse the uploaded CSV and sweep band widths and cooldowns over it.
pub async fn run_sweep(state: &AppState, req: SweepRequest) -> Result<Vec<SweepResult>, AppError> {
    req.validate()?;
    let candles = loader::parse_candles_str(&req.csv)?;
    sweep_candles(state, candles, req.config).await
}

pub async fn sweep_candles(
    state: &AppState,
    candles: Vec<Candle>,
    mut config: SweepConfig,
) -> Result<Vec<SweepResult>, AppError> {
    config.fee_per_exit.get_or_insert(state.config.fee_per_exit);
    // Fail fast before spawning work.
    optimizer::generate_grid(&config)?;

    state.cancel_flag.store(false, Ordering::Relaxed);
    let cancel_flag = state.cancel_flag.clone();

    tokio::task::spawn_blocking(move || {
        optimizer::run_sweep(&candles, &config, &cancel_flag, |pct, current, total| {
            if pct % 10 == 0 {
                tracing::debug!("Sweep progress {}% ({}/{})", pct, current, total);
            }
        })
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
}

/// Cancel a running backtest or sweep.
pub async fn cancel_backtest(state: &AppState) -> Result<(), AppError> {
    info!("Cancelling backtest");
    state.cancel_flag.store(true, Ordering::Relaxed);
    Ok(())
}

// ── Linking Commands ──

pub async fn issue_link_code(state: &AppState, wallet: &str) -> Result<LinkCodeResponse, AppError> {
    validate_address("wallet", wallet)?;
    state.rate_limiter.check(wallet).await?;
    let code = state.links.issue(wallet).await;
    Ok(LinkCodeResponse {
        code,
        expires_in_secs: state.links.ttl().as_secs(),
    })
}

/// Redeem a link code for a chat. Returns the linked wallet.
pub async fn redeem_link_code(state: &AppState, req: RedeemLinkRequest) -> Result<String, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::InvalidInput("code must not be empty".into()));
    }
    state.links.redeem(&req.code, req.chat_id).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::GatewayErrorKind;
    use crate::gateway::MockGateway;
    use crate::models::config::AppConfig;
    use crate::models::order::{AdvancedOrderKind, AdvancedOrderSpec, SingleSided};
    use crate::models::result::{ObjectiveFunction, SweepRange};
    use crate::store::MemoryStore;

    const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
    const POOL: &str = "8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj";
    const CSV: &str = "timestamp,open,high,low,close\n0,1.0,1.05,0.95,1.0\n1,1.25,1.3,1.2,1.25\n";

    fn state_with(config: AppConfig) -> AppState {
        let gateway = Arc::new(MockGateway::new(config.mock_seed));
        AppState::new(config, gateway, Arc::new(MemoryStore::new()))
    }

    fn state() -> AppState {
        state_with(AppConfig::default())
    }

    fn rebalance(band_bps: u32) -> RebalancePlanRequest {
        RebalancePlanRequest {
            wallet: WALLET.into(),
            pool: POOL.into(),
            band_bps,
        }
    }

    #[tokio::test]
    async fn test_plan_rebalance() {
        let resp = plan_rebalance(&state(), rebalance(100)).await.unwrap();
        assert!(resp.in_band);
        assert_eq!(resp.current.mid_price, 150.0);
        assert!(resp.target.bin_lower <= resp.current.bin_index);
        assert!(resp.current.bin_index <= resp.target.bin_upper);
    }

    #[tokio::test]
    async fn test_plan_rebalance_validation() {
        let err = plan_rebalance(&state(), rebalance(0)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let mut req = rebalance(100);
        req.wallet = "not-a-wallet".into();
        assert!(matches!(plan_rebalance(&state(), req).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_plan_rebalance_unknown_pool_is_upstream_error() {
        let mut req = rebalance(100);
        req.pool = "11111111111111111111111111111111".into();
        match plan_rebalance(&state(), req).await.unwrap_err() {
            AppError::UpstreamUnavailable(e) => assert_eq!(e.kind, GatewayErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_per_wallet() {
        let config = AppConfig {
            rate_limit_max: 2,
            ..AppConfig::default()
        };
        let state = state_with(config);
        plan_rebalance(&state, rebalance(100)).await.unwrap();
        plan_rebalance(&state, rebalance(100)).await.unwrap();
        let err = plan_rebalance(&state, rebalance(100)).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_plan_advanced_order() {
        let req = AdvancedOrderPlanRequest {
            wallet: WALLET.into(),
            pool: POOL.into(),
            spec: AdvancedOrderSpec {
                kind: AdvancedOrderKind::LimitSell,
                target_price: 160.0,
                size_base: Some("1.5".into()),
                size_quote: None,
            },
        };
        let plan = plan_advanced_order(&state(), req).await.unwrap();
        assert_eq!(plan.bins.len(), 3);
        assert_eq!(plan.single_sided, SingleSided::Base);
    }

    #[tokio::test]
    async fn test_plan_advanced_order_requires_matching_size() {
        let req = AdvancedOrderPlanRequest {
            wallet: WALLET.into(),
            pool: POOL.into(),
            spec: AdvancedOrderSpec {
                kind: AdvancedOrderKind::LimitBuy,
                target_price: 140.0,
                size_base: Some("1".into()),
                size_quote: None,
            },
        };
        assert!(matches!(plan_advanced_order(&state(), req).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_pools_and_positions() {
        let state = state();
        let pools = list_pools(&state).await.unwrap();
        assert!(pools.iter().any(|p| p.address == POOL));

        let a = get_positions(&state, WALLET).await.unwrap();
        let b = get_positions(&state, WALLET).await.unwrap();
        assert_eq!(a, b);
        assert!(matches!(get_positions(&state, "x").await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_liquidity_receipts_are_mock() {
        let state = state();
        let add = AddLiquidityRequest {
            wallet: WALLET.into(),
            pool: POOL.into(),
            amount_base: 1.0,
            amount_quote: 150.0,
            bin_lower: 8_388_600,
            bin_upper: 8_388_620,
        };
        let receipt = add_liquidity(&state, add).await.unwrap();
        assert!(receipt.mock);
        assert_eq!(receipt.signature.len(), 64);

        let remove = RemoveLiquidityRequest {
            wallet: WALLET.into(),
            pool: POOL.into(),
            position_id: "pos-1".into(),
            bps: 10_001,
        };
        assert!(matches!(remove_liquidity(&state, remove).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_run_backtest_from_csv() {
        let req = BacktestRequest {
            csv: CSV.into(),
            band_bps: 100,
            cooldown_sec: 0,
            fee_per_exit: None,
        };
        let res = run_backtest(&state(), req).await.unwrap();
        assert_eq!(res.metrics.exits, 2);
        assert_eq!(res.metrics.final_equity, 1.0004);
        assert_eq!(res.equity_curve[1].t, 1000);
    }

    #[tokio::test]
    async fn test_run_backtest_uses_configured_fee() {
        let config = AppConfig {
            fee_per_exit: 0.01,
            ..AppConfig::default()
        };
        let req = BacktestRequest {
            csv: CSV.into(),
            band_bps: 100,
            cooldown_sec: 0,
            fee_per_exit: None,
        };
        let res = run_backtest(&state_with(config), req).await.unwrap();
        assert_eq!(res.params.fee_per_exit, 0.01);
        assert_eq!(res.metrics.final_equity, 1.0201);
    }

    #[tokio::test]
    async fn test_run_backtest_bad_csv() {
        let req = BacktestRequest {
            csv: "timestamp,open,high,low,close\n0,1,x,1,1\n".into(),
            band_bps: 100,
            cooldown_sec: 0,
            fee_per_exit: None,
        };
        let err = run_backtest(&state(), req).await.unwrap_err();
        assert!(matches!(err, AppError::CsvParseError { row: 2, .. }));
    }

    #[tokio::test]
    async fn test_backtest_resets_stale_cancel() {
        let state = state();
        cancel_backtest(&state).await.unwrap();
        let req = BacktestRequest {
            csv: CSV.into(),
            band_bps: 100,
            cooldown_sec: 0,
            fee_per_exit: None,
        };
        assert!(run_backtest(&state, req).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_sweep() {
        let req = SweepRequest {
            csv: CSV.into(),
            config: SweepConfig {
                band_bps: SweepRange { min: 100, max: 5000, step: 4900 },
                cooldown_sec: SweepRange::single(0),
                fee_per_exit: Some(0.0002),
                objective: ObjectiveFunction::TotalFees,
            },
        };
        let results = run_sweep(&state(), req).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].band_bps, 100);
    }

    #[tokio::test]
    async fn test_run_sweep_uses_configured_fee() {
        let config = AppConfig {
            fee_per_exit: 0.01,
            ..AppConfig::default()
        };
        let json = serde_json::json!({
            "csv": CSV,
            "config": {
                "bandBps": { "min": 100, "max": 100, "step": 1 },
                "cooldownSec": { "min": 0, "max": 0, "step": 1 },
                "objective": "totalFees"
            }
        });
        let req: SweepRequest = serde_json::from_value(json).unwrap();
        let results = run_sweep(&state_with(config), req).await.unwrap();
        assert_eq!(results[0].final_equity, 1.0201);
    }

    #[tokio::test]
    async fn test_run_sweep_rejects_negative_fee() {
        let req = SweepRequest {
            csv: CSV.into(),
            config: SweepConfig {
                band_bps: SweepRange::single(100),
                cooldown_sec: SweepRange::single(0),
                fee_per_exit: Some(-1.0),
                objective: ObjectiveFunction::TotalFees,
            },
        };
        assert!(matches!(run_sweep(&state(), req).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_link_code_round_trip() {
        let state = state();
        let issued = issue_link_code(&state, WALLET).await.unwrap();
        assert_eq!(issued.code.len(), 8);
        assert_eq!(issued.expires_in_secs, 600);

        let req = RedeemLinkRequest {
            code: issued.code.to_lowercase(),
            chat_id: 7,
        };
        assert_eq!(redeem_link_code(&state, req.clone()).await.unwrap(), WALLET);
        assert!(matches!(redeem_link_code(&state, req).await, Err(AppError::NotFound(_))));
        assert_eq!(state.links.wallet_for_chat(7).await.as_deref(), Some(WALLET));
    }
}
