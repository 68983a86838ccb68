pub mod api;
pub mod band;
pub mod candle;
pub mod config;
pub mod order;
pub mod pool;
pub mod result;
