use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::errors::AppError;
use crate::models::api::validate_band_bps;
use crate::models::band::BandRange;
use crate::models::candle::Candle;
use crate::models::result::{BacktestParams, BacktestResults, EquityPoint, ExitEvent, ExitSide};

use super::metrics::{calculate_metrics, round6};

/// Candles between cancellation checks.
const CANCEL_CHECK_EVERY: usize = 1000;

/// Mutable accumulator owned by a single run.
struct BacktestState {
    equity: f64,
    exits: u32,
    /// Processed candles that touched neither edge of the active band.
    in_band: usize,
    /// `None` until the first exit, so the first breach is never on cooldown.
    last_exit_t: Option<i64>,
    band: BandRange,
}

/// Replay `candles` against a band that re-centres on the close after every
/// exit, crediting `fee_per_exit` of equity each time.
///
/// Candles with a non-finite high, low or close are skipped and leave no
/// point on the curve.
pub fn run_backtest(
    candles: &[Candle],
    params: &BacktestParams,
    cancel_flag: &AtomicBool,
) -> Result<BacktestResults, AppError> {
    validate_band_bps(params.band_bps)?;
    if !params.fee_per_exit.is_finite() || params.fee_per_exit < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "feePerExit must be a non-negative number, got {}",
            params.fee_per_exit
        )));
    }

    let first = candles
        .iter()
        .find(|c| c.is_usable())
        .ok_or(AppError::NoData)?;

    let cooldown_ms = i64::try_from(params.cooldown_sec)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);

    let mut state = BacktestState {
        equity: 1.0,
        exits: 0,
        in_band: 0,
        last_exit_t: None,
        band: BandRange::around(first.c, params.band_bps),
    };
    let mut equity_curve = Vec::with_capacity(candles.len());
    let mut exit_events = Vec::new();
    let mut skipped = 0usize;

    for (i, candle) in candles.iter().enumerate() {
        if i % CANCEL_CHECK_EVERY == 0 && cancel_flag.load(Ordering::Relaxed) {
            info!("Backtest cancelled at candle {}/{}", i, candles.len());
            return Err(AppError::BacktestCancelled);
        }

        if !candle.is_usable() {
            skipped += 1;
            continue;
        }

        let can_exit = state
            .last_exit_t
            .map_or(true, |last| candle.t >= last.saturating_add(cooldown_ms));
        let hit_upper = candle.h > state.band.upper;
        let hit_lower = candle.l < state.band.lower;
        if !hit_upper && !hit_lower {
            state.in_band += 1;
        }

        if can_exit && (hit_upper || hit_lower) {
            let breached = state.band;
            state.exits += 1;
            state.last_exit_t = Some(candle.t);
            state.equity += state.equity * params.fee_per_exit;
            state.band = BandRange::around(candle.c, params.band_bps);

            exit_events.push(ExitEvent {
                t: candle.t,
                close: candle.c,
                side: if hit_upper { ExitSide::Upper } else { ExitSide::Lower },
                band_lower: breached.lower,
                band_upper: breached.upper,
                equity: round6(state.equity),
            });
        }

        equity_curve.push(EquityPoint {
            t: candle.t,
            equity: round6(state.equity),
        });
    }

    let metrics = calculate_metrics(&equity_curve, &exit_events, state.equity, state.in_band, skipped);

    info!(
        "Backtest complete: {} candles, {} exits, final equity {}",
        equity_curve.len(),
        state.exits,
        metrics.final_equity
    );

    Ok(BacktestResults {
        params: *params,
        equity_curve,
        exit_events,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(t, c, h, l, c)
    }

    fn run(candles: &[Candle], band_bps: u32, cooldown_sec: u64) -> BacktestResults {
        run_backtest(candles, &BacktestParams::new(band_bps, cooldown_sec), &AtomicBool::new(false)).unwrap()
    }

    #[test]
    fn test_two_candle_example() {
        let candles = [candle(0, 1.05, 0.95, 1.0), candle(1000, 1.3, 1.2, 1.25)];
        let res = run(&candles, 100, 0);

        assert_eq!(res.metrics.exits, 2);
        assert_eq!(res.exit_events[0].side, ExitSide::Upper);
        assert!((res.exit_events[0].band_upper - 1.01).abs() < 1e-12);
        // Second exit is tested against the band re-centred on 1.0.
        assert!((res.exit_events[1].band_upper - 1.01).abs() < 1e-12);

        assert_eq!(res.equity_curve.len(), 2);
        assert_eq!(res.equity_curve[0], EquityPoint { t: 0, equity: 1.0002 });
        assert_eq!(res.equity_curve[1], EquityPoint { t: 1000, equity: 1.0004 });
        assert_eq!(res.metrics.final_equity, 1.0004);
        assert!((res.metrics.total_fees_pct - 0.040004).abs() < 1e-9);
    }

    #[test]
    fn test_flat_candles_no_exit() {
        let candles = [candle(0, 1.0, 1.0, 1.0), candle(60_000, 1.0, 1.0, 1.0)];
        let res = run(&candles, 50, 0);
        assert_eq!(res.metrics.exits, 0);
        assert_eq!(res.metrics.final_equity, 1.0);
        assert_eq!(res.metrics.total_fees_pct, 0.0);
        assert!(res.equity_curve.iter().all(|p| p.equity == 1.0));
    }

    #[test]
    fn test_cooldown_blocks_second_exit() {
        // Both candles breach the band active when they arrive.
        let candles = [candle(0, 1.0, 1.0, 1.0), candle(10_000, 1.2, 1.1, 1.15), candle(40_000, 1.5, 1.4, 1.45)];
        let res = run(&candles, 100, 60);
        assert_eq!(res.metrics.exits, 1);
        assert_eq!(res.exit_events[0].t, 10_000);

        let res = run(&candles, 100, 30);
        assert_eq!(res.metrics.exits, 2);
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let candles = [candle(0, 1.1, 0.9, 1.0), candle(5_000, 1.5, 1.4, 1.45)];
        let res = run(&candles, 100, 5);
        assert_eq!(res.metrics.exits, 2);
    }

    #[test]
    fn test_fee_compounds_per_exit() {
        // First candle seeds the band, then each jumps 10% through a 1% band.
        let candles: Vec<Candle> = std::iter::once(candle(0, 1.0, 1.0, 1.0))
            .chain((1..=20).map(|i| {
                let c = 1.1f64.powi(i);
                candle(i as i64 * 1000, c * 1.001, c * 0.999, c)
            }))
            .collect();
        let res = run(&candles, 100, 0);
        assert_eq!(res.metrics.exits, 20);
        let expected = (1.0 + crate::models::config::FEE_PER_EXIT).powi(20);
        assert!((res.metrics.final_equity - expected).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_csv_timestamps_do_not_overflow() {
        let csv = "timestamp,open,high,low,close\n-9e18,1,1,1,1\n9e18,2,2,2,2\n";
        let candles = crate::data::loader::parse_candles_str(csv).unwrap();
        let res = run(&candles, 100, u64::MAX);
        assert_eq!(res.metrics.exits, 1);
        assert_eq!(res.metrics.duration_ms, i64::MAX);
    }

    #[test]
    fn test_lower_breach_recorded() {
        let candles = [candle(0, 1.0, 1.0, 1.0), candle(1000, 0.9, 0.8, 0.85)];
        let res = run(&candles, 100, 0);
        assert_eq!(res.exit_events.len(), 1);
        assert_eq!(res.exit_events[0].side, ExitSide::Lower);
        assert!((res.exit_events[0].band_lower - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_candles_skipped() {
        let candles = [
            candle(0, 1.0, 1.0, 1.0),
            candle(1000, f64::NAN, 0.5, 0.5),
            candle(2000, 1.0, 1.0, f64::INFINITY),
            candle(3000, 1.0, 1.0, 1.0),
        ];
        let res = run(&candles, 100, 0);
        assert_eq!(res.metrics.exits, 0);
        assert_eq!(res.equity_curve.len(), 2);
        assert_eq!(res.metrics.candles_skipped, 2);
    }

    #[test]
    fn test_deterministic() {
        let candles: Vec<Candle> = (0..500)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.37).sin() * 3.0;
                candle(i * 60_000, c + 0.4, c - 0.4, c)
            })
            .collect();
        let a = run(&candles, 75, 300);
        let b = run(&candles, 75, 300);
        assert_eq!(
            serde_json::to_string(&a.equity_curve).unwrap(),
            serde_json::to_string(&b.equity_curve).unwrap()
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_fee() {
        let candles = [candle(0, 1.05, 0.95, 1.0)];
        let params = BacktestParams::new(100, 0).with_fee_per_exit(0.01);
        let res = run_backtest(&candles, &params, &AtomicBool::new(false)).unwrap();
        assert_eq!(res.metrics.final_equity, 1.01);
    }

    #[test]
    fn test_rejects_empty_and_bad_params() {
        let flag = AtomicBool::new(false);
        assert!(matches!(run_backtest(&[], &BacktestParams::new(100, 0), &flag), Err(AppError::NoData)));

        let candles = [candle(0, 1.0, 1.0, 1.0)];
        assert!(matches!(
            run_backtest(&candles, &BacktestParams::new(0, 0), &flag),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            run_backtest(&candles, &BacktestParams::new(100, 0).with_fee_per_exit(-1.0), &flag),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cancel_flag() {
        let candles = [candle(0, 1.0, 1.0, 1.0)];
        let flag = AtomicBool::new(true);
        assert!(matches!(
            run_backtest(&candles, &BacktestParams::new(100, 0), &flag),
            Err(AppError::BacktestCancelled)
        ));
    }
}
