pub mod executor;
pub mod metrics;
pub mod optimizer;
pub mod planner;
