pub mod commands;
pub mod data;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod store;
pub mod utils;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::errors::AppError;
use crate::gateway::PoolGateway;
use crate::models::config::AppConfig;
use crate::store::{KvStore, LinkCodes, MemoryStore, RateLimiter};

/// Shared application state, accessible from all commands.
pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<dyn PoolGateway>,
    pub store: Arc<dyn KvStore>,
    pub rate_limiter: RateLimiter,
    pub links: LinkCodes,
    /// Cancellation flag for long-running operations (backtest, sweep).
    pub cancel_flag: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig, gateway: Arc<dyn PoolGateway>, store: Arc<dyn KvStore>) -> Self {
        let rate_limiter = RateLimiter::new(store.clone(), config.rate_limit_max, config.rate_limit_window());
        let links = LinkCodes::new(store.clone(), config.link_code_ttl());
        AppState {
            config,
            gateway,
            store,
            rate_limiter,
            links,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Validate `config`, pick the gateway it names and back the state with
    /// an in-memory store.
    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let gateway = gateway::from_config(&config)?;
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        info!(
            "App state ready: gateway={}, rate limit {} per {}s",
            config.gateway_mode, config.rate_limit_max, config.rate_limit_window_secs
        );
        Ok(AppState::new(config, gateway, store))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the `info`
/// default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
