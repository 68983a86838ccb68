//! Request and response shapes of the command layer, with the validation
//! each request must pass before any gateway call is made.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

use super::band::{PriceBand, MAX_BAND_BPS};
use super::order::{AdvancedOrderKind, AdvancedOrderSpec};
use super::pool::{AddLiquidityRequest, RemoveLiquidityRequest};
use super::result::{SweepConfig, SweepRange};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

// ── Requests ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePlanRequest {
    pub wallet: String,
    pub pool: String,
    pub band_bps: u32,
}

impl RebalancePlanRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_address("wallet", &self.wallet)?;
        validate_address("pool", &self.pool)?;
        validate_band_bps(self.band_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOrderPlanRequest {
    pub wallet: String,
    pub pool: String,
    pub spec: AdvancedOrderSpec,
}

impl AdvancedOrderPlanRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_address("wallet", &self.wallet)?;
        validate_address("pool", &self.pool)?;
        self.spec.validate()
    }
}

impl AdvancedOrderSpec {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_positive("targetPrice", self.target_price)?;
        match self.kind {
            AdvancedOrderKind::LimitSell | AdvancedOrderKind::StopLoss => {
                parse_size("sizeBase", self.size_base.as_deref(), self.kind)?;
            }
            AdvancedOrderKind::LimitBuy => {
                parse_size("sizeQuote", self.size_quote.as_deref(), self.kind)?;
            }
        }
        Ok(())
    }
}

impl AddLiquidityRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_address("wallet", &self.wallet)?;
        validate_address("pool", &self.pool)?;
        validate_non_negative("amountBase", self.amount_base)?;
        validate_non_negative("amountQuote", self.amount_quote)?;
        if self.amount_base == 0.0 && self.amount_quote == 0.0 {
            return Err(AppError::InvalidInput(
                "amountBase and amountQuote cannot both be zero".into(),
            ));
        }
        if self.bin_lower < 0 || self.bin_lower > self.bin_upper {
            return Err(AppError::InvalidInput(format!(
                "bin range [{}, {}] is invalid",
                self.bin_lower, self.bin_upper
            )));
        }
        Ok(())
    }
}

impl RemoveLiquidityRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_address("wallet", &self.wallet)?;
        validate_address("pool", &self.pool)?;
        if self.position_id.trim().is_empty() {
            return Err(AppError::InvalidInput("positionId is required".into()));
        }
        if self.bps == 0 || self.bps > MAX_BAND_BPS {
            return Err(AppError::InvalidInput(format!(
                "bps must be in [1, {}], got {}",
                MAX_BAND_BPS, self.bps
            )));
        }
        Ok(())
    }
}

/// Backtest over CSV text uploaded by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub csv: String,
    pub band_bps: u32,
    #[serde(default)]
    pub cooldown_sec: u64,
    #[serde(default)]
    pub fee_per_exit: Option<f64>,
}

impl BacktestRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_band_bps(self.band_bps)?;
        if let Some(fee) = self.fee_per_exit {
            validate_non_negative("feePerExit", fee)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    pub csv: String,
    pub config: SweepConfig,
}

impl SweepRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        self.config.validate()
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_range("bandBps", &self.band_bps)?;
        validate_range("cooldownSec", &self.cooldown_sec)?;
        if self.band_bps.min == 0 || self.band_bps.max > MAX_BAND_BPS as u64 {
            return Err(AppError::InvalidInput(format!(
                "bandBps range must lie within [1, {}]",
                MAX_BAND_BPS
            )));
        }
        if let Some(fee) = self.fee_per_exit {
            validate_non_negative("feePerExit", fee)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemLinkRequest {
    pub code: String,
    pub chat_id: i64,
}

// ── Responses ──

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinTarget {
    pub bin_lower: i64,
    pub bin_upper: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPrice {
    pub mid_price: f64,
    pub bin_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePlanResponse {
    pub in_band: bool,
    pub target: BinTarget,
    pub current: CurrentPrice,
}

impl From<&PriceBand> for RebalancePlanResponse {
    fn from(band: &PriceBand) -> Self {
        RebalancePlanResponse {
            in_band: band.in_band,
            target: BinTarget {
                bin_lower: band.bin_lower,
                bin_upper: band.bin_upper,
            },
            current: CurrentPrice {
                mid_price: band.mid_price,
                bin_index: band.current_bin,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCodeResponse {
    pub code: String,
    pub expires_in_secs: u64,
}

// ── Field checks ──

/// Solana-style base58 account address.
pub fn validate_address(field: &str, value: &str) -> Result<(), AppError> {
    let len = value.len();
    if !(32..=44).contains(&len) {
        return Err(AppError::InvalidInput(format!(
            "{} must be a base58 address of 32-44 characters, got {} characters",
            field, len
        )));
    }
    if let Some(bad) = value.chars().find(|ch| !BASE58_ALPHABET.contains(*ch)) {
        return Err(AppError::InvalidInput(format!(
            "{} contains invalid base58 character '{}'",
            field, bad
        )));
    }
    Ok(())
}

pub fn validate_band_bps(band_bps: u32) -> Result<(), AppError> {
    if band_bps == 0 || band_bps > MAX_BAND_BPS {
        return Err(AppError::InvalidInput(format!(
            "bandBps must be in [1, {}], got {}",
            MAX_BAND_BPS, band_bps
        )));
    }
    Ok(())
}

pub fn validate_positive(field: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "{} must be a positive number, got {}",
            field, value
        )));
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}

fn validate_range(field: &str, range: &SweepRange) -> Result<(), AppError> {
    if range.step == 0 {
        return Err(AppError::InvalidInput(format!("{} step must be positive", field)));
    }
    if range.min > range.max {
        return Err(AppError::InvalidInput(format!(
            "{} min {} exceeds max {}",
            field, range.min, range.max
        )));
    }
    Ok(())
}

fn parse_size(field: &str, raw: Option<&str>, kind: AdvancedOrderKind) -> Result<f64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{} is required for {}", field, kind)))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("{} must be a decimal number, got '{}'", field, raw)))?;
    validate_positive(field, value)?;
    Ok(value)
}
