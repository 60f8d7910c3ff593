//! Configuration management
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Every section has defaults, so an `RpcOptions` alone is enough to connect.

use crate::tx::GasStrategy;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "EVM_TXKIT_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc: RpcOptions,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Connection options for the JSON-RPC endpoint(s)
#[derive(Debug, Clone, Deserialize)]
pub struct RpcOptions {
    /// Endpoints; the starting one is picked at random, the rest are failover
    pub urls: Vec<String>,
    /// Extra HTTP headers, e.g. API keys
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
    /// Seed for the endpoint-selection RNG; random when absent
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    #[serde(default)]
    pub strategy: GasStrategy,
    /// Price multiplier (percent) used when replacing a stuck transaction
    #[serde(default = "default_price_bump_percent")]
    pub price_bump_percent: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_multi_poll_interval_ms")]
    pub multi_poll_interval_ms: u64,
    #[serde(default = "default_multi_timeout_secs")]
    pub multi_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff step: attempt n waits n * backoff_ms
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_price_bump_percent() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_confirmation_timeout_secs() -> u64 {
    30
}

fn default_multi_poll_interval_ms() -> u64 {
    2_000
}

fn default_multi_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

impl RpcOptions {
    /// Options for a single endpoint with default timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            headers: HashMap::new(),
            timeout_secs: default_rpc_timeout_secs(),
            rng_seed: None,
        }
    }

    /// Add an HTTP header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Fix the endpoint-selection RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            strategy: GasStrategy::default(),
            price_bump_percent: default_price_bump_percent(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_confirmation_timeout_secs(),
            multi_poll_interval_ms: default_multi_poll_interval_ms(),
            multi_timeout_secs: default_multi_timeout_secs(),
        }
    }
}

impl ConfirmationConfig {
    /// Receipt polling cadence, never below 1ms
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn multi_poll_interval(&self) -> Duration {
        Duration::from_millis(self.multi_poll_interval_ms.max(1))
    }

    pub fn multi_timeout(&self) -> Duration {
        Duration::from_secs(self.multi_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Settings {
    /// Settings with defaults everywhere except the RPC endpoint(s)
    pub fn with_rpc(rpc: RpcOptions) -> Self {
        Self {
            rpc,
            gas: GasConfig::default(),
            confirmation: ConfirmationConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Load settings from the file named by `EVM_TXKIT_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text
    pub fn from_toml(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let urls: Vec<&String> = self.rpc.urls.iter().filter(|u| !u.trim().is_empty()).collect();
        if urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be configured");
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }
        if self.confirmation.poll_interval_ms == 0 || self.confirmation.multi_poll_interval_ms == 0 {
            anyhow::bail!("Confirmation poll intervals must be greater than zero");
        }
        if self.gas.price_bump_percent <= 100 {
            anyhow::bail!("gas.price_bump_percent must exceed 100");
        }
        if self.confirmation.timeout_secs == 0 {
            tracing::warn!("confirmation.timeout_secs is 0 - every send will time out immediately");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("EVM_TXKIT_TEST_KEY", "test_value");
        let input = "url = \"https://rpc.example.com/${EVM_TXKIT_TEST_KEY}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://rpc.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let settings = Settings::from_toml(
            r#"
            [rpc]
            urls = ["https://eth.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.rpc.timeout_secs, 30);
        assert_eq!(settings.gas.strategy, GasStrategy::Standard);
        assert_eq!(settings.gas.price_bump_percent, 120);
        assert_eq!(settings.confirmation.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.confirmation.timeout(), Duration::from_secs(30));
        assert_eq!(settings.confirmation.multi_timeout(), Duration::from_secs(300));
        assert_eq!(settings.retry.max_retries, 3);
    }

    #[test]
    fn test_rejects_missing_urls() {
        env::remove_var("EVM_TXKIT_TEST_UNSET_URL");
        let result = Settings::from_toml(
            r#"
            [rpc]
            urls = ["${EVM_TXKIT_TEST_UNSET_URL}"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [rpc]
            urls = ["https://a.example.com", "https://b.example.com"]
            timeout_secs = 10
            rng_seed = 7

            [rpc.headers]
            X-API-Key = "secret"

            [gas]
            strategy = "fast"

            [confirmation]
            poll_interval_ms = 250
            timeout_secs = 5
            "#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.rpc.urls.len(), 2);
        assert_eq!(settings.rpc.rng_seed, Some(7));
        assert_eq!(settings.rpc.headers.get("X-API-Key").map(String::as_str), Some("secret"));
        assert_eq!(settings.gas.strategy, GasStrategy::Fast);
        assert_eq!(settings.confirmation.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.confirmation.multi_poll_interval_ms, 2_000);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let confirmation = ConfirmationConfig {
            poll_interval_ms: 0,
            multi_poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(confirmation.poll_interval(), Duration::from_millis(1));
        assert_eq!(confirmation.multi_poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_rpc_options_builder() {
        let opts = RpcOptions::new("https://eth.example.com")
            .with_header("Authorization", "Bearer t")
            .with_seed(42);
        assert_eq!(opts.urls, vec!["https://eth.example.com".to_string()]);
        assert_eq!(opts.rng_seed, Some(42));
        assert_eq!(opts.timeout(), Duration::from_secs(30));
    }
}
