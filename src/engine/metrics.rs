use statrs::statistics::Statistics;

use crate::models::result::{BacktestMetrics, EquityPoint, ExitEvent};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Round to 6 decimal places, the precision of every reported equity value.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Calculate backtest metrics from the equity curve and exit events.
///
/// `equity` is the unrounded terminal equity; `in_band` counts processed
/// candles that breached neither edge.
pub fn calculate_metrics(
    equity_curve: &[EquityPoint],
    exit_events: &[ExitEvent],
    equity: f64,
    in_band: usize,
    skipped: usize,
) -> BacktestMetrics {
    let processed = equity_curve.len();
    let exits = exit_events.len() as u32;

    let total_fees_pct = if equity > 0.0 { (equity - 1.0) * 100.0 } else { 0.0 };
    let in_band_pct = if processed > 0 {
        in_band as f64 / processed as f64 * 100.0
    } else {
        0.0
    };

    let (avg_exit_interval_secs, exit_interval_std_secs) = exit_interval_stats(exit_events);

    let duration_ms = match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) => last.t.saturating_sub(first.t).max(0),
        _ => 0,
    };
    let exits_per_day = if duration_ms > 0 {
        exits as f64 / (duration_ms as f64 / MS_PER_DAY)
    } else {
        0.0
    };

    BacktestMetrics {
        exits,
        final_equity: round6(equity),
        total_fees_pct,
        candles_processed: processed,
        candles_skipped: skipped,
        in_band_pct,
        avg_exit_interval_secs,
        exit_interval_std_secs,
        exits_per_day,
        duration_ms,
        duration_time: format_duration(duration_ms),
    }
}

/// Mean and sample standard deviation of the seconds between consecutive
/// exits. Zero when there are too few exits to measure.
fn exit_interval_stats(exit_events: &[ExitEvent]) -> (f64, f64) {
    let intervals: Vec<f64> = exit_events
        .windows(2)
        .map(|w| w[1].t.saturating_sub(w[0].t) as f64 / 1000.0)
        .collect();

    let mean = if intervals.is_empty() {
        0.0
    } else {
        intervals.iter().mean()
    };
    let std = if intervals.len() < 2 {
        0.0
    } else {
        intervals.iter().std_dev()
    };
    (mean, std)
}

/// Format a millisecond span as a human-readable string (e.g. "2d 5h").
pub fn format_duration(ms: i64) -> String {
    let total_minutes = ms.max(0) / 60_000;
    if total_minutes < 60 {
        format!("{}m", total_minutes)
    } else if total_minutes < 1440 {
        format!("{}h {}m", total_minutes / 60, total_minutes % 60)
    } else {
        format!("{}d {}h", total_minutes / 1440, (total_minutes % 1440) / 60)
    }
}
