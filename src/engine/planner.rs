use tracing::debug;

use crate::errors::{AppError, GatewayError};
use crate::gateway::PoolGateway;
use crate::models::api::{validate_band_bps, validate_positive};
use crate::models::band::{BandRange, PriceBand};
use crate::models::order::{AdvancedOrderKind, AdvancedOrderPlan, AdvancedOrderSpec, SingleSided};

/// Bins on each side of the target an advanced order spreads over.
const ORDER_BIN_SPREAD: i64 = 2;

/// Compute the target bin range for a band of `band_bps` around `mid_price`.
///
/// Any `price_to_bin` failure aborts the plan; there is no partial result.
pub fn plan_band<F>(mid_price: f64, band_bps: u32, mut price_to_bin: F) -> Result<PriceBand, AppError>
where
    F: FnMut(f64) -> Result<i64, GatewayError>,
{
    validate_positive("midPrice", mid_price)?;
    validate_band_bps(band_bps)?;

    let edges = BandRange::around(mid_price, band_bps);
    let edge_lower = price_to_bin(edges.lower)?;
    let edge_upper = price_to_bin(edges.upper)?;
    let current_bin = price_to_bin(mid_price)?;

    Ok(PriceBand::from_bins(mid_price, band_bps, edge_lower, edge_upper, current_bin))
}

/// `plan_band` against a live pool: fetch the mid price, then resolve the
/// three bin lookups concurrently.
pub async fn plan_band_for_pool(
    gateway: &dyn PoolGateway,
    pool: &str,
    band_bps: u32,
) -> Result<PriceBand, AppError> {
    validate_band_bps(band_bps)?;

    let mid_price = gateway.current_mid_price(pool).await?;
    if !mid_price.is_finite() || mid_price <= 0.0 {
        return Err(GatewayError::sdk(format!("unusable mid price {} for {}", mid_price, pool)).into());
    }

    let edges = BandRange::around(mid_price, band_bps);
    let (edge_lower, edge_upper, current_bin) = tokio::try_join!(
        gateway.price_to_bin_index(pool, edges.lower),
        gateway.price_to_bin_index(pool, edges.upper),
        gateway.price_to_bin_index(pool, mid_price),
    )?;

    let band = PriceBand::from_bins(mid_price, band_bps, edge_lower, edge_upper, current_bin);
    debug!(
        "Band plan {}: mid={} bins=[{}, {}] current={} in_band={}",
        pool, mid_price, band.bin_lower, band.bin_upper, band.current_bin, band.in_band
    );
    Ok(band)
}

/// Bins an advanced order occupies given the bin of its target price.
///
/// Sells sit at and above the target, buys and stops at and below. Negative
/// bins are dropped; the result is never empty.
pub fn order_bins(kind: AdvancedOrderKind, base_index: i64) -> AdvancedOrderPlan {
    let mut bins: Vec<i64> = match kind {
        AdvancedOrderKind::LimitSell => (0..=ORDER_BIN_SPREAD).map(|d| base_index + d).collect(),
        AdvancedOrderKind::LimitBuy | AdvancedOrderKind::StopLoss => {
            (0..=ORDER_BIN_SPREAD).map(|d| base_index - d).collect()
        }
    };
    bins.retain(|b| *b >= 0);
    bins.sort_unstable();
    bins.dedup();
    if bins.is_empty() {
        bins.push(base_index.max(0));
    }

    let single_sided = kind.single_sided();
    let side = match single_sided {
        SingleSided::Base => "base",
        SingleSided::Quote => "quote",
    };
    let note = format!(
        "{}: single-sided {} deposit across {} bin(s) {}..={} around target bin {}",
        kind,
        side,
        bins.len(),
        bins[0],
        bins[bins.len() - 1],
        base_index
    );

    AdvancedOrderPlan {
        bins,
        single_sided,
        note,
    }
}

pub fn plan_advanced_order_bins<F>(
    kind: AdvancedOrderKind,
    target_price: f64,
    mut price_to_bin: F,
) -> Result<AdvancedOrderPlan, AppError>
where
    F: FnMut(f64) -> Result<i64, GatewayError>,
{
    validate_positive("targetPrice", target_price)?;
    let base_index = price_to_bin(target_price)?;
    Ok(order_bins(kind, base_index))
}

pub async fn plan_advanced_order_for_pool(
    gateway: &dyn PoolGateway,
    pool: &str,
    spec: &AdvancedOrderSpec,
) -> Result<AdvancedOrderPlan, AppError> {
    spec.validate()?;
    let base_index = gateway.price_to_bin_index(pool, spec.target_price).await?;
    let plan = order_bins(spec.kind, base_index);
    debug!("Order plan {} {}: bins={:?}", pool, spec.kind, plan.bins);
    Ok(plan)
}
