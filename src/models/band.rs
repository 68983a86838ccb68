use serde::{Deserialize, Serialize};

/// Denominator for basis-point ratios.
pub const BPS_DENOMINATOR: f64 = 10_000.0;

/// Largest band width accepted anywhere in the crate.
pub const MAX_BAND_BPS: u32 = 10_000;

/// Symmetric price range around a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub lower: f64,
    pub upper: f64,
}

impl BandRange {
    /// Band of `band_bps` basis points on each side of `price`.
    pub fn around(price: f64, band_bps: u32) -> Self {
        let ratio = band_bps as f64 / BPS_DENOMINATOR;
        BandRange {
            lower: price * (1.0 - ratio),
            upper: price * (1.0 + ratio),
        }
    }
}

/// Target bin range for a pool plus the in-band verdict for its mid price.
///
/// Built fresh on every planning call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBand {
    pub mid_price: f64,
    pub band_bps: u32,
    pub bin_lower: i64,
    pub bin_upper: i64,
    pub current_bin: i64,
    pub in_band: bool,
}

impl PriceBand {
    /// Orders the two edge bins and derives `in_band`.
    ///
    /// Edge bins may arrive inverted when the price→bin mapping is not
    /// monotonic increasing.
    pub fn from_bins(mid_price: f64, band_bps: u32, edge_a: i64, edge_b: i64, current_bin: i64) -> Self {
        let bin_lower = edge_a.min(edge_b);
        let bin_upper = edge_a.max(edge_b);
        PriceBand {
            mid_price,
            band_bps,
            bin_lower,
            bin_upper,
            current_bin,
            in_band: (bin_lower..=bin_upper).contains(&current_bin),
        }
    }
}
