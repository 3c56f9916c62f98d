//! Configuration management for the watchdog
//!
//! This module handles loading and validating configuration from environment
//! variables, plain TOML files and encrypted TOML files (see [`secret`]).

pub mod secret;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::probe::{LivenessRule, ProbeMethod};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sweep scheduling configuration
    pub sweep: SweepConfig,

    /// Liveness probe configuration
    pub probe: ProbeConfig,

    /// Persistence configuration
    pub storage: StorageConfig,

    /// Telegram notification sink configuration
    pub telegram: TelegramConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Watches registered at start-up
    pub seeds: Vec<SeedWatch>,
}

/// Sweep scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,

    /// Maximum number of probes in flight during one sweep
    pub max_concurrent_probes: usize,

    /// Capacity of the notification queue between reconciler and dispatcher
    pub notification_queue_capacity: usize,

    /// Run a sweep immediately at start-up instead of waiting one interval
    pub run_on_startup: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_concurrent_probes: 16,
            notification_queue_capacity: 1024,
            run_on_startup: true,
        }
    }
}

/// Liveness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe timeout in seconds; a timeout counts as offline
    pub timeout_secs: u64,

    /// Scheme used to reach targets (identifiers are stored without one)
    pub default_scheme: String,

    /// HTTP method used for probing
    pub method: ProbeMethod,

    /// Which responses count as alive
    pub rule: LivenessRule,

    /// User agent string
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            default_scheme: String::from("https"),
            method: ProbeMethod::Get,
            rule: LivenessRule::Success,
            user_agent: format!("pulsewatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/pulsewatch.db"),
        }
    }
}

/// Telegram notification sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; notifications are only logged when absent
    pub bot_token: Option<String>,

    /// Bot API base URL
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts on failure
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: String::from("https://api.telegram.org"),
            timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// A watch registered when the service starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedWatch {
    /// Subscriber (chat) identifier
    pub subscriber: String,

    /// Target URL or identifier
    pub target: String,

    /// Optional display name
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u64>("PULSEWATCH_SWEEP_INTERVAL")? {
            config.sweep.interval_secs = v;
        }
        if let Some(v) = env_parse::<usize>("PULSEWATCH_MAX_CONCURRENT_PROBES")? {
            config.sweep.max_concurrent_probes = v;
        }
        if let Some(v) = env_parse::<u64>("PULSEWATCH_PROBE_TIMEOUT")? {
            config.probe.timeout_secs = v;
        }
        if let Ok(v) = std::env::var("PULSEWATCH_PROBE_SCHEME") {
            config.probe.default_scheme = v;
        }
        if let Ok(v) = std::env::var("PULSEWATCH_SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(v);
        }

        config.telegram.bot_token = std::env::var("PULSEWATCH_BOT_TOKEN")
            .or_else(|_| std::env::var("BOT_TOKEN"))
            .ok();

        if let Ok(v) = std::env::var("PULSEWATCH_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("PULSEWATCH_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Failed to parse TOML config")?;

        // Keep the token out of files when the environment provides one
        if config.telegram.bot_token.is_none() {
            config.telegram.bot_token = std::env::var("PULSEWATCH_BOT_TOKEN").ok();
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Load configuration from a file encrypted with [`secret::encrypt`]
    pub fn from_encrypted_file(path: &Path, password: &str) -> Result<Self> {
        let encoded = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read encrypted config: {}", path.display()))?;

        let plaintext = secret::decrypt(&encoded, password)
            .with_context(|| format!("Failed to decrypt config: {}", path.display()))?;

        Self::from_toml_str(&plaintext)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sweep.interval_secs == 0 {
            anyhow::bail!("sweep.interval_secs must be greater than 0");
        }

        if self.sweep.max_concurrent_probes == 0 {
            anyhow::bail!("sweep.max_concurrent_probes must be greater than 0");
        }

        if self.sweep.notification_queue_capacity == 0 {
            anyhow::bail!("sweep.notification_queue_capacity must be greater than 0");
        }

        if self.probe.timeout_secs == 0 {
            anyhow::bail!("probe.timeout_secs must be greater than 0");
        }

        if self.probe.default_scheme != "http" && self.probe.default_scheme != "https" {
            anyhow::bail!("probe.default_scheme must be http or https");
        }

        if let Err(reason) = self.probe.rule.validate() {
            anyhow::bail!("probe.rule: {reason}");
        }

        if self.telegram.timeout_secs == 0 {
            anyhow::bail!("telegram.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get sweep interval as Duration
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        Err(_) => Ok(None),
    }
}
