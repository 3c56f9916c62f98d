//! Subcommand implementations for the `pulsewatch` binary

pub mod run;
pub mod secret;
pub mod watch;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use pulsewatch::config::Config;
use pulsewatch::notifications::{Channel, LogChannel, TelegramChannel};
use pulsewatch::registry::Registry;

pub use run::run;
pub use secret::{decrypt_config, encrypt_config};
pub use watch::{deregister, list, register, sweep};

/// Where configuration comes from
pub struct ConfigSource<'a> {
    pub path: Option<&'a Path>,
    pub encrypted: bool,
    pub password_env: &'a str,
}

/// Load and validate configuration
pub fn load_config(source: &ConfigSource<'_>) -> Result<Config> {
    let config = match source.path {
        Some(path) if source.encrypted => {
            let password = read_password(source.password_env)?;
            Config::from_encrypted_file(path, &password)?
        }
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read the config password from the named environment variable
pub fn read_password(var: &str) -> Result<String> {
    let password = std::env::var(var)
        .with_context(|| format!("Password environment variable {var} is not set"))?;
    if password.is_empty() {
        anyhow::bail!("Password environment variable {var} is empty");
    }
    Ok(password)
}

/// Open the SQLite indexes and build the registry
pub fn open_registry(config: &Config) -> Result<Arc<Registry>> {
    let registry = Registry::from_config(config).with_context(|| {
        format!(
            "Failed to open registry at {}",
            config.storage.sqlite_path.display()
        )
    })?;

    Ok(Arc::new(registry))
}

/// Pick the notification channel: Telegram when a token is configured, the log otherwise
pub fn build_channel(config: &Config) -> Result<Arc<dyn Channel>> {
    if config.telegram.bot_token.is_some() {
        let channel = TelegramChannel::new(config.telegram.clone())
            .context("Failed to create Telegram channel")?;
        Ok(Arc::new(channel))
    } else {
        tracing::warn!("No bot token configured, notifications will only be logged");
        Ok(Arc::new(LogChannel::new()))
    }
}
