use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat};
use tracing::info;

use crate::errors::AppError;
use crate::models::result::{BacktestMetrics, BacktestResults, EquityPoint, ExitEvent, ExitSide, SweepResult};

pub const EQUITY_FILE: &str = "equity.csv";
pub const EXITS_FILE: &str = "exits.csv";
pub const METRICS_FILE: &str = "metrics.csv";

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, AppError> {
    csv::Writer::from_path(path).map_err(|e| AppError::FileWrite(format!("Cannot create CSV {}: {}", path.display(), e)))
}

fn write_row<const N: usize>(wtr: &mut csv::Writer<std::fs::File>, row: [&str; N]) -> Result<(), AppError> {
    wtr.write_record(row).map_err(|e| AppError::FileWrite(e.to_string()))
}

fn finish(mut wtr: csv::Writer<std::fs::File>) -> Result<(), AppError> {
    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))
}

/// RFC 3339 UTC rendering of epoch millis; empty when out of range.
fn format_time(t: i64) -> String {
    DateTime::from_timestamp_millis(t)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Write the equity curve to a CSV file.
pub fn write_equity_csv(curve: &[EquityPoint], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;
    write_row(&mut wtr, ["t", "time", "equity"])?;
    for p in curve {
        write_row(&mut wtr, [&p.t.to_string(), &format_time(p.t), &format!("{:.6}", p.equity)])?;
    }
    finish(wtr)
}

/// Write exit events to a CSV file.
pub fn write_exits_csv(exits: &[ExitEvent], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;
    write_row(&mut wtr, ["t", "time", "side", "close", "band_lower", "band_upper", "equity"])?;
    for e in exits {
        let side = match e.side {
            ExitSide::Upper => "upper",
            ExitSide::Lower => "lower",
        };
        write_row(
            &mut wtr,
            [
                &e.t.to_string(),
                &format_time(e.t),
                side,
                &e.close.to_string(),
                &e.band_lower.to_string(),
                &e.band_upper.to_string(),
                &format!("{:.6}", e.equity),
            ],
        )?;
    }
    finish(wtr)
}

/// Write backtest metrics as a key-value CSV report.
pub fn write_metrics_csv(metrics: &BacktestMetrics, path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;
    write_row(&mut wtr, ["Metric", "Value"])?;

    let rows: Vec<(&str, String)> = vec![
        ("Exits", metrics.exits.to_string()),
        ("Final Equity", format!("{:.6}", metrics.final_equity)),
        ("Total Fees %", format!("{:.6}", metrics.total_fees_pct)),
        ("Candles Processed", metrics.candles_processed.to_string()),
        ("Candles Skipped", metrics.candles_skipped.to_string()),
        ("In Band %", format!("{:.2}", metrics.in_band_pct)),
        ("Avg Exit Interval (s)", format!("{:.1}", metrics.avg_exit_interval_secs)),
        ("Exit Interval Std (s)", format!("{:.1}", metrics.exit_interval_std_secs)),
        ("Exits per Day", format!("{:.2}", metrics.exits_per_day)),
        ("Duration (ms)", metrics.duration_ms.to_string()),
        ("Duration", metrics.duration_time.clone()),
    ];
    for (name, value) in &rows {
        write_row(&mut wtr, [*name, value.as_str()])?;
    }
    finish(wtr)
}

/// Write ranked sweep results to a CSV file.
pub fn write_sweep_csv(results: &[SweepResult], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;
    write_row(
        &mut wtr,
        ["rank", "band_bps", "cooldown_sec", "objective", "exits", "final_equity", "total_fees_pct", "in_band_pct"],
    )?;
    for (i, r) in results.iter().enumerate() {
        write_row(
            &mut wtr,
            [
                &(i + 1).to_string(),
                &r.band_bps.to_string(),
                &r.cooldown_sec.to_string(),
                &format!("{:.6}", r.objective_value),
                &r.exits.to_string(),
                &format!("{:.6}", r.final_equity),
                &format!("{:.6}", r.total_fees_pct),
                &format!("{:.2}", r.in_band_pct),
            ],
        )?;
    }
    finish(wtr)
}

/// Write `equity.csv`, `exits.csv` and `metrics.csv` into `dir`, creating it
/// if needed. Returns the written paths.
pub fn export_backtest(results: &BacktestResults, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir).map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", dir.display(), e)))?;

    let equity = dir.join(EQUITY_FILE);
    let exits = dir.join(EXITS_FILE);
    let metrics = dir.join(METRICS_FILE);
    write_equity_csv(&results.equity_curve, &equity)?;
    write_exits_csv(&results.exit_events, &exits)?;
    write_metrics_csv(&results.metrics, &metrics)?;

    info!("Exported backtest results to {}", dir.display());
    Ok(vec![equity, exits, metrics])
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::engine::executor::run_backtest;
    use crate::models::candle::Candle;
    use crate::models::result::BacktestParams;

    fn sample_results() -> BacktestResults {
        let candles = [
            Candle::new(1_700_000_000_000, 1.0, 1.05, 0.95, 1.0),
            Candle::new(1_700_000_060_000, 1.25, 1.3, 1.2, 1.25),
        ];
        run_backtest(&candles, &BacktestParams::new(100, 0), &AtomicBool::new(false)).unwrap()
    }

    #[test]
    fn test_export_backtest_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let paths = export_backtest(&sample_results(), &out).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.exists()));

        let equity = std::fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
        let lines: Vec<&str> = equity.lines().collect();
        assert_eq!(lines[0], "t,time,equity");
        assert_eq!(lines[1], "1700000000000,2023-11-14T22:13:20Z,1.000200");
        assert_eq!(lines[2], "1700000060000,2023-11-14T22:14:20Z,1.000400");
    }

    #[test]
    fn test_exits_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXITS_FILE);
        write_exits_csv(&sample_results().exit_events, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "upper");
        assert_eq!(&rows[1][6], "1.000400");
    }

    #[test]
    fn test_metrics_csv_contains_fees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_FILE);
        write_metrics_csv(&sample_results().metrics, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Metric,Value"));
        assert!(text.contains("Exits,2"));
        assert!(text.contains("Final Equity,1.000400"));
    }

    #[test]
    fn test_sweep_csv_ranks_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        let results = vec![SweepResult {
            band_bps: 100,
            cooldown_sec: 60,
            objective_value: 0.04,
            exits: 2,
            final_equity: 1.0004,
            total_fees_pct: 0.04,
            in_band_pct: 50.0,
        }];
        write_sweep_csv(&results, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("1,100,60,"));
    }

    #[test]
    fn test_unwritable_path_is_file_write_error() {
        let err = write_equity_csv(&[], Path::new("/nonexistent/dir/equity.csv")).unwrap_err();
        assert!(matches!(err, AppError::FileWrite(_)));
    }
}
