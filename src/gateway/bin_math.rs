use crate::errors::GatewayError;
use crate::models::band::BPS_DENOMINATOR;

/// Bin id whose price is exactly 1.0.
pub const BIN_ID_OFFSET: i64 = 1 << 23;

/// Absorbs float error when a price sits exactly on a bin edge.
const EDGE_EPSILON: f64 = 1e-9;

fn step_base(bin_step: u16) -> f64 {
    1.0 + bin_step as f64 / BPS_DENOMINATOR
}

/// Lower-edge price of a bin: `(1 + step/10000)^(id - 2^23)`.
pub fn price_for_bin(bin_id: i64, bin_step: u16) -> f64 {
    step_base(bin_step).powf((bin_id - BIN_ID_OFFSET) as f64)
}

/// Bin containing `price`. A zero price maps to the lowest bin, 0.
pub fn bin_for_price(price: f64, bin_step: u16) -> Result<i64, GatewayError> {
    if bin_step == 0 {
        return Err(GatewayError::invalid_input("bin step must be > 0"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(GatewayError::invalid_input(format!(
            "price must be a finite non-negative number, got {}",
            price
        )));
    }
    if price == 0.0 {
        return Ok(0);
    }
    let exponent = (price.ln() / step_base(bin_step).ln() + EDGE_EPSILON).floor();
    Ok((exponent as i64 + BIN_ID_OFFSET).max(0))
}
