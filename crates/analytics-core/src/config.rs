use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_API_BASE: &str = "https://discordanalytics.xyz/api";

const PRODUCTION_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEV_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Retry behaviour for transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts made for one request before giving up, the first included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base of the exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Verbose `debug!` logging for every tracked event and request.
    #[serde(default)]
    pub debug: bool,
    /// Flush every 30 seconds instead of every 5 minutes.
    #[serde(default)]
    pub dev_mode: bool,
    /// Overrides the interval picked by `dev_mode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval_ms: Option<u64>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Fetch today's value of a custom event from the API on first use.
    #[serde(default)]
    pub seed_custom_events: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl AnalyticsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: default_api_base(),
            debug: false,
            dev_mode: false,
            flush_interval_ms: None,
            request_timeout_ms: default_request_timeout_ms(),
            seed_custom_events: false,
            retry: RetryConfig::default(),
        }
    }

    /// Loads the configuration from a TOML file, then applies environment
    /// overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: AnalyticsConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Builds a configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::new(String::new());
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("DISCORD_ANALYTICS_API_KEY") {
            self.api_key = api_key;
        }
        if let Ok(api_base) = std::env::var("DISCORD_ANALYTICS_API_BASE") {
            self.api_base = api_base;
        }
        if let Ok(debug) = std::env::var("DISCORD_ANALYTICS_DEBUG") {
            self.debug = parse_bool_env(&debug);
        }
        if let Ok(dev) = std::env::var("DISCORD_ANALYTICS_DEV") {
            self.dev_mode = parse_bool_env(&dev);
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_seed_custom_events(mut self, seed: bool) -> Self {
        self.seed_custom_events = seed;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        match self.flush_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None if self.dev_mode => DEV_FLUSH_INTERVAL,
            None => PRODUCTION_FLUSH_INTERVAL,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AnalyticsError::InvalidConfig(
                "api_key must not be empty".to_string(),
            ));
        }
        url::Url::parse(&self.api_base).map_err(|e| {
            AnalyticsError::InvalidConfig(format!("api_base '{}' is not a URL: {e}", self.api_base))
        })?;
        if self.flush_interval().is_zero() {
            return Err(AnalyticsError::InvalidConfig(
                "flush interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn flush_interval_follows_dev_mode_unless_overridden() {
        let config = AnalyticsConfig::new("key");
        assert_eq!(config.flush_interval(), Duration::from_secs(300));

        let config = config.with_dev_mode(true);
        assert_eq!(config.flush_interval(), Duration::from_secs(30));

        let config = config.with_flush_interval(Duration::from_millis(250));
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
    }

    #[test]
    fn validate_rejects_empty_key_bad_url_and_zero_interval() {
        assert!(matches!(
            AnalyticsConfig::new("  ").validate(),
            Err(AnalyticsError::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalyticsConfig::new("key").with_api_base("not a url").validate(),
            Err(AnalyticsError::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalyticsConfig::new("key")
                .with_flush_interval(Duration::ZERO)
                .validate(),
            Err(AnalyticsError::InvalidConfig(_))
        ));
        assert!(AnalyticsConfig::new("key").validate().is_ok());
    }

    #[test]
    fn toml_file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("analytics.toml");
        std::fs::write(
            &path,
            "api_key = \"from-file\"\ndev_mode = true\n\n[retry]\nmax_retries = 2\n",
        )
        .expect("write config");

        let config = AnalyticsConfig::from_file(&path).expect("config loads");
        // Environment may override the key on CI machines that set it.
        if std::env::var("DISCORD_ANALYTICS_API_KEY").is_err() {
            assert_eq!(config.api_key, "from-file");
        }
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.backoff_base_ms, 500);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
