use serde::{Deserialize, Serialize};

/// A bin-based liquidity pool known to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRef {
    pub address: String,
    pub name: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    /// Price step between adjacent bins, in basis points.
    pub bin_step: u16,
}

/// A liquidity position held by a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub position_id: String,
    pub wallet: String,
    pub pool: String,
    pub bin_lower: i64,
    pub bin_upper: i64,
    pub amount_base: f64,
    pub amount_quote: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLiquidityRequest {
    pub wallet: String,
    pub pool: String,
    pub amount_base: f64,
    pub amount_quote: f64,
    pub bin_lower: i64,
    pub bin_upper: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLiquidityRequest {
    pub wallet: String,
    pub pool: String,
    pub position_id: String,
    /// Share of the position to withdraw, in basis points.
    pub bps: u32,
}

/// Result of a submitted liquidity transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub signature: String,
    pub mock: bool,
}
