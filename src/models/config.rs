use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Default fee credited per band exit (2 bps).
pub const FEE_PER_EXIT: f64 = 0.0002;

/// Which `PoolGateway` implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Mock,
    Live,
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::Mock => "mock",
            GatewayMode::Live => "live",
        }
    }
}

impl std::fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(GatewayMode::Mock),
            "live" => Ok(GatewayMode::Live),
            _ => Err(format!("Unknown gateway mode: {}", s)),
        }
    }
}

/// Runtime configuration, read from `LP_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub gateway_mode: GatewayMode,
    /// Base URL of the HTTP bridge used in live mode.
    pub gateway_url: String,
    pub gateway_timeout_secs: u64,
    /// Extra attempts the live gateway makes on transient failures.
    pub gateway_retries: u32,
    pub mock_seed: u64,
    pub fee_per_exit: f64,
    pub rate_limit_max: u64,
    pub rate_limit_window_secs: u64,
    pub link_code_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            gateway_mode: GatewayMode::Mock,
            gateway_url: "http://127.0.0.1:8787".to_string(),
            gateway_timeout_secs: 10,
            gateway_retries: 2,
            mock_seed: 42,
            fee_per_exit: FEE_PER_EXIT,
            rate_limit_max: 30,
            rate_limit_window_secs: 60,
            link_code_ttl_secs: 600,
        }
    }
}

impl AppConfig {
    /// Read the process environment. Unset or blank variables keep their
    /// defaults; set but unparsable ones are an error.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppConfig::default();
        let cfg = AppConfig {
            gateway_mode: parse_var(&lookup, "LP_GATEWAY_MODE", d.gateway_mode)?,
            gateway_url: lookup("LP_GATEWAY_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.gateway_url),
            gateway_timeout_secs: parse_var(&lookup, "LP_GATEWAY_TIMEOUT_SECS", d.gateway_timeout_secs)?,
            gateway_retries: parse_var(&lookup, "LP_GATEWAY_RETRIES", d.gateway_retries)?,
            mock_seed: parse_var(&lookup, "LP_MOCK_SEED", d.mock_seed)?,
            fee_per_exit: parse_var(&lookup, "LP_FEE_PER_EXIT", d.fee_per_exit)?,
            rate_limit_max: parse_var(&lookup, "LP_RATE_LIMIT_MAX", d.rate_limit_max)?,
            rate_limit_window_secs: parse_var(&lookup, "LP_RATE_LIMIT_WINDOW_SECS", d.rate_limit_window_secs)?,
            link_code_ttl_secs: parse_var(&lookup, "LP_LINK_CODE_TTL_SECS", d.link_code_ttl_secs)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.fee_per_exit.is_finite() || self.fee_per_exit < 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "LP_FEE_PER_EXIT must be a non-negative number, got {}",
                self.fee_per_exit
            )));
        }
        if self.gateway_timeout_secs == 0 {
            return Err(AppError::InvalidConfig("LP_GATEWAY_TIMEOUT_SECS must be > 0".into()));
        }
        if self.rate_limit_max == 0 || self.rate_limit_window_secs == 0 {
            return Err(AppError::InvalidConfig(
                "LP_RATE_LIMIT_MAX and LP_RATE_LIMIT_WINDOW_SECS must be > 0".into(),
            ));
        }
        if self.link_code_ttl_secs == 0 {
            return Err(AppError::InvalidConfig("LP_LINK_CODE_TTL_SECS must be > 0".into()));
        }
        if self.gateway_mode == GatewayMode::Live
            && !(self.gateway_url.starts_with("http://") || self.gateway_url.starts_with("https://"))
        {
            return Err(AppError::InvalidConfig(format!(
                "LP_GATEWAY_URL must be an http(s) URL, got '{}'",
                self.gateway_url
            )));
        }
        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn link_code_ttl(&self) -> Duration {
        Duration::from_secs(self.link_code_ttl_secs)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::InvalidConfig(format!("{}='{}': {}", name, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.gateway_mode, GatewayMode::Mock);
        assert_eq!(cfg.fee_per_exit, FEE_PER_EXIT);
        assert_eq!(cfg.rate_limit_max, 30);
    }

    #[test]
    fn test_overrides_and_trims() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("LP_GATEWAY_MODE", " LIVE "),
            ("LP_GATEWAY_URL", "https://bridge.example/"),
            ("LP_FEE_PER_EXIT", "0.0005"),
            ("LP_GATEWAY_RETRIES", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.gateway_mode, GatewayMode::Live);
        assert_eq!(cfg.gateway_url, "https://bridge.example");
        assert_eq!(cfg.fee_per_exit, 0.0005);
        assert_eq!(cfg.gateway_retries, 2);
    }

    #[test]
    fn test_unparsable_value_is_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("LP_MOCK_SEED", "abc")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(msg) if msg.contains("LP_MOCK_SEED")));
    }

    #[test]
    fn test_negative_fee_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("LP_FEE_PER_EXIT", "-0.1")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }

    #[test]
    fn test_live_mode_requires_http_url() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("LP_GATEWAY_MODE", "live"),
            ("LP_GATEWAY_URL", "bridge:8787"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }
}
