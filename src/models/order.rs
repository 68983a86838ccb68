use serde::{Deserialize, Serialize};

/// Synthetic order types built from single-sided bin liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvancedOrderKind {
    LimitBuy,
    LimitSell,
    StopLoss,
}

impl AdvancedOrderKind {
    /// Token side deposited so that price movement fills the order.
    pub fn single_sided(&self) -> SingleSided {
        match self {
            AdvancedOrderKind::LimitSell | AdvancedOrderKind::StopLoss => SingleSided::Base,
            AdvancedOrderKind::LimitBuy => SingleSided::Quote,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdvancedOrderKind::LimitBuy => "limitBuy",
            AdvancedOrderKind::LimitSell => "limitSell",
            AdvancedOrderKind::StopLoss => "stopLoss",
        }
    }
}

impl std::fmt::Display for AdvancedOrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdvancedOrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "limitbuy" => Ok(AdvancedOrderKind::LimitBuy),
            "limitsell" => Ok(AdvancedOrderKind::LimitSell),
            "stoploss" => Ok(AdvancedOrderKind::StopLoss),
            _ => Err(format!("Unknown order kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleSided {
    Base,
    Quote,
}

/// A limit or stop order expressed as a target price and a size.
///
/// `limitSell` and `stopLoss` are sized in the base token, `limitBuy` in the
/// quote token. Sizes stay decimal strings until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOrderSpec {
    pub kind: AdvancedOrderKind,
    pub target_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_quote: Option<String>,
}

/// Bins to fund for an advanced order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOrderPlan {
    pub bins: Vec<i64>,
    pub single_sided: SingleSided,
    pub note: String,
}
