use serde::{Deserialize, Serialize};

/// A single OHLC candle. `t` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
}

impl Candle {
    pub fn new(t: i64, o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { t, o, h, l, c }
    }

    /// Fields the band simulator reads. `o` is not consulted.
    pub fn is_usable(&self) -> bool {
        self.h.is_finite() && self.l.is_finite() && self.c.is_finite()
    }
}
