use serde::{Deserialize, Serialize};

use super::config::FEE_PER_EXIT;

/// Inputs of a single band backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestParams {
    pub band_bps: u32,
    pub cooldown_sec: u64,
    /// Fraction of equity credited on every exit.
    #[serde(default = "default_fee_per_exit")]
    pub fee_per_exit: f64,
}

fn default_fee_per_exit() -> f64 {
    FEE_PER_EXIT
}

impl BacktestParams {
    pub fn new(band_bps: u32, cooldown_sec: u64) -> Self {
        BacktestParams {
            band_bps,
            cooldown_sec,
            fee_per_exit: FEE_PER_EXIT,
        }
    }

    pub fn with_fee_per_exit(mut self, fee_per_exit: f64) -> Self {
        self.fee_per_exit = fee_per_exit;
        self
    }
}

/// A point on the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub t: i64,
    pub equity: f64,
}

/// Which edge of the band a candle broke through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitSide {
    Upper,
    Lower,
}

/// A forced exit and re-centre of the band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitEvent {
    pub t: i64,
    pub close: f64,
    pub side: ExitSide,
    /// Band that was breached.
    pub band_lower: f64,
    pub band_upper: f64,
    /// Equity after the fee credit, rounded like the curve.
    pub equity: f64,
}

/// Summary statistics of a band backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    pub exits: u32,
    pub final_equity: f64,
    pub total_fees_pct: f64,
    pub candles_processed: usize,
    pub candles_skipped: usize,
    /// Share of processed candles that stayed inside the active band.
    pub in_band_pct: f64,
    pub avg_exit_interval_secs: f64,
    pub exit_interval_std_secs: f64,
    pub exits_per_day: f64,
    pub duration_ms: i64,
    pub duration_time: String,
}

/// Complete results of a band backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResults {
    pub params: BacktestParams,
    pub equity_curve: Vec<EquityPoint>,
    pub exit_events: Vec<ExitEvent>,
    pub metrics: BacktestMetrics,
}

// ══════════════════════════════════════════════════════════════
// Sweep types
// ══════════════════════════════════════════════════════════════

/// What a sweep ranks combinations by. Higher is better for both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ObjectiveFunction {
    TotalFees,
    TimeInBand,
}

impl std::str::FromStr for ObjectiveFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "totalfees" | "fees" => Ok(ObjectiveFunction::TotalFees),
            "timeinband" | "inband" => Ok(ObjectiveFunction::TimeInBand),
            _ => Err(format!("Unknown objective: {}", s)),
        }
    }
}

/// Inclusive integer range walked by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

impl SweepRange {
    pub fn single(value: u64) -> Self {
        SweepRange {
            min: value,
            max: value,
            step: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    pub band_bps: SweepRange,
    pub cooldown_sec: SweepRange,
    /// Falls back to the configured fee when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_per_exit: Option<f64>,
    pub objective: ObjectiveFunction,
}

/// One evaluated combination of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub band_bps: u32,
    pub cooldown_sec: u64,
    pub objective_value: f64,
    pub exits: u32,
    pub final_equity: f64,
    pub total_fees_pct: f64,
    pub in_band_pct: f64,
}
