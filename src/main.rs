mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::ConfigSource;
use pulsewatch::config::Config;

#[derive(Parser)]
#[command(
    name = "pulsewatch",
    version,
    about = "Liveness watchdog that probes HTTP endpoints and notifies subscribers on state changes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true, env = "PULSEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// The configuration file is encrypted
    #[arg(long, global = true)]
    encrypted: bool,

    /// Environment variable holding the config password
    #[arg(long, global = true, default_value = "PULSEWATCH_PASSWORD")]
    password_env: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watchdog: apply seed watches and sweep on a timer
    Run,

    /// Run a single sweep and exit
    Sweep,

    /// Watch a target on behalf of a subscriber
    Register {
        /// Subscriber (chat) identifier
        subscriber: String,

        /// Target URL
        target: String,

        /// Display name used in notifications
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop watching a target
    Deregister {
        /// Subscriber (chat) identifier
        subscriber: String,

        /// Target URL
        target: String,
    },

    /// List a subscriber's watches
    List {
        /// Subscriber (chat) identifier
        subscriber: String,

        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Encrypt a plain config file
    EncryptConfig {
        /// Plain TOML config
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt an encrypted config file
    DecryptConfig {
        /// Encrypted config
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = ConfigSource {
        path: cli.config.as_deref(),
        encrypted: cli.encrypted,
        password_env: &cli.password_env,
    };

    let log_format = cli.log_format.as_deref();

    match cli.command {
        Commands::Run => {
            let config = prepare(&source, log_format, cli.verbose)?;
            tracing::info!("pulsewatch starting");
            commands::run(config).await?;
        }

        Commands::Sweep => {
            let config = prepare(&source, log_format, cli.verbose)?;
            commands::sweep(config).await?;
        }

        Commands::Register {
            subscriber,
            target,
            name,
        } => {
            let config = prepare(&source, log_format, cli.verbose)?;
            tracing::info!(subscriber = %subscriber, target_id = %target, "Starting register command");
            commands::register(config, subscriber, target, name).await?;
        }

        Commands::Deregister { subscriber, target } => {
            let config = prepare(&source, log_format, cli.verbose)?;
            tracing::info!(subscriber = %subscriber, target_id = %target, "Starting deregister command");
            commands::deregister(config, subscriber, target).await?;
        }

        Commands::List { subscriber, json } => {
            let config = prepare(&source, log_format, cli.verbose)?;
            commands::list(config, subscriber, json).await?;
        }

        Commands::EncryptConfig { input, output } => {
            setup_tracing(&Config::default(), log_format, cli.verbose)?;
            commands::encrypt_config(&input, output.as_deref(), &cli.password_env)?;
        }

        Commands::DecryptConfig { input, output } => {
            setup_tracing(&Config::default(), log_format, cli.verbose)?;
            commands::decrypt_config(&input, output.as_deref(), &cli.password_env)?;
        }
    }

    Ok(())
}

/// Load configuration, then initialize logging from it
fn prepare(source: &ConfigSource<'_>, log_format: Option<&str>, verbose: bool) -> Result<Config> {
    let config = commands::load_config(source)?;
    setup_tracing(&config, log_format, verbose)?;
    Ok(config)
}

fn setup_tracing(config: &Config, format: Option<&str>, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("pulsewatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "pulsewatch={},warn",
                config.logging.level
            ))
        })
    };

    match format.unwrap_or(config.logging.format.as_str()) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
