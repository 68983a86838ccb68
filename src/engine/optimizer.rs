use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::errors::AppError;
use crate::models::band::MAX_BAND_BPS;
use crate::models::candle::Candle;
use crate::models::config::FEE_PER_EXIT;
use crate::models::result::{
    BacktestMetrics, BacktestParams, ObjectiveFunction, SweepConfig, SweepRange, SweepResult,
};

use super::executor;

/// Maximum allowed combinations for a sweep.
pub const MAX_COMBINATIONS: usize = 50_000;

/// Maximum results to return from a sweep.
pub const MAX_RESULTS: usize = 50;

/// Higher is better for every objective.
fn extract_objective(metrics: &BacktestMetrics, objective: ObjectiveFunction) -> f64 {
    match objective {
        ObjectiveFunction::TotalFees => metrics.total_fees_pct,
        ObjectiveFunction::TimeInBand => metrics.in_band_pct,
    }
}

fn build_result(params: &BacktestParams, metrics: &BacktestMetrics, objective: ObjectiveFunction) -> SweepResult {
    SweepResult {
        band_bps: params.band_bps,
        cooldown_sec: params.cooldown_sec,
        objective_value: extract_objective(metrics, objective),
        exits: metrics.exits,
        final_equity: metrics.final_equity,
        total_fees_pct: metrics.total_fees_pct,
        in_band_pct: metrics.in_band_pct,
    }
}

fn range_values(name: &str, range: &SweepRange) -> Result<Vec<u64>, AppError> {
    if range.step == 0 {
        return Err(AppError::InvalidInput(format!("{} step must be positive", name)));
    }
    if range.min > range.max {
        return Err(AppError::InvalidInput(format!(
            "{} min {} exceeds max {}",
            name, range.min, range.max
        )));
    }
    let count = ((range.max - range.min) / range.step)
        .checked_add(1)
        .filter(|&n| n <= MAX_COMBINATIONS as u64)
        .ok_or_else(|| AppError::TooManyCombinations {
            count: usize::try_from((range.max - range.min) / range.step)
                .map_or(usize::MAX, |n| n.saturating_add(1)),
            limit: MAX_COMBINATIONS,
        })?;
    Ok((0..count).map(|i| range.min + i * range.step).collect())
}

/// Every `(bandBps, cooldownSec)` pair of the sweep, band-major.
pub fn generate_grid(config: &SweepConfig) -> Result<Vec<(u32, u64)>, AppError> {
    if config.band_bps.min == 0 || config.band_bps.max > MAX_BAND_BPS as u64 {
        return Err(AppError::InvalidInput(format!(
            "bandBps range must lie within [1, {}]",
            MAX_BAND_BPS
        )));
    }
    let bands = range_values("bandBps", &config.band_bps)?;
    let cooldowns = range_values("cooldownSec", &config.cooldown_sec)?;

    let total = bands.len().saturating_mul(cooldowns.len());
    if total > MAX_COMBINATIONS {
        return Err(AppError::TooManyCombinations {
            count: total,
            limit: MAX_COMBINATIONS,
        });
    }

    let mut grid = Vec::with_capacity(total);
    for &band in &bands {
        for &cooldown in &cooldowns {
            // Bounded by MAX_BAND_BPS above.
            grid.push((band as u32, cooldown));
        }
    }
    Ok(grid)
}

/// Best objective first; ties go to the narrower band, then the shorter cooldown.
fn rank(a: &SweepResult, b: &SweepResult) -> CmpOrdering {
    b.objective_value
        .total_cmp(&a.objective_value)
        .then(a.band_bps.cmp(&b.band_bps))
        .then(a.cooldown_sec.cmp(&b.cooldown_sec))
}

/// Run the band backtest over every combination of the grid in parallel.
///
/// `progress_callback` receives `(percent, current, total)`.
pub fn run_sweep(
    candles: &[Candle],
    config: &SweepConfig,
    cancel_flag: &AtomicBool,
    progress_callback: impl Fn(u8, usize, usize) + Send + Sync,
) -> Result<Vec<SweepResult>, AppError> {
    let combinations = generate_grid(config)?;
    let total = combinations.len();
    let fee_per_exit = config.fee_per_exit.unwrap_or(FEE_PER_EXIT);
    info!("Sweep: {} combinations over {} candles", total, candles.len());

    let counter = AtomicUsize::new(0);
    let start = Instant::now();
    let report_interval = (total / 100).max(1);

    let mut results: Vec<SweepResult> = combinations
        .par_iter()
        .map(|&(band_bps, cooldown_sec)| {
            if cancel_flag.load(Ordering::Relaxed) {
                return Err(AppError::BacktestCancelled);
            }

            let params = BacktestParams::new(band_bps, cooldown_sec).with_fee_per_exit(fee_per_exit);
            let bt = executor::run_backtest(candles, &params, cancel_flag)?;

            let current = counter.fetch_add(1, Ordering::Relaxed) + 1;
            if current % report_interval == 0 || current == total {
                let pct = ((current as f64 / total as f64) * 100.0) as u8;
                progress_callback(pct, current, total);
            }

            Ok(build_result(&params, &bt.metrics, config.objective))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    results.sort_by(rank);
    results.truncate(MAX_RESULTS);

    info!(
        "Sweep complete: {} combinations in {:.1}s, best {:?}",
        total,
        start.elapsed().as_secs_f64(),
        results.first().map(|r| (r.band_bps, r.cooldown_sec, r.objective_value))
    );

    Ok(results)
}
