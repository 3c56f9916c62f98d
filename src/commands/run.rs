use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use pulsewatch::config::Config;
use pulsewatch::notifications::Dispatcher;
use pulsewatch::reconciler::Reconciler;
use pulsewatch::registry::apply_seeds;
use pulsewatch::scheduler::SweepScheduler;

use super::{build_channel, open_registry};

/// Run the watchdog until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let registry = open_registry(&config)?;

    if !config.seeds.is_empty() {
        apply_seeds(&registry, &config.seeds)
            .await
            .context("Failed to apply seed watches")?;
    }

    let channel = build_channel(&config)?;
    match channel.health_check().await {
        Ok(true) => tracing::info!(channel = channel.name(), "Notification channel ready"),
        Ok(false) => tracing::warn!(channel = channel.name(), "Notification channel health check failed"),
        Err(e) => tracing::warn!(channel = channel.name(), error = %e, "Notification channel health check failed"),
    }

    let (queue, notifications) = mpsc::channel(config.sweep.notification_queue_capacity);
    let dispatcher = Dispatcher::new(channel).spawn(notifications);

    let reconciler = Arc::new(Reconciler::new(
        registry,
        queue,
        config.sweep.max_concurrent_probes,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = SweepScheduler::from_config(Arc::clone(&reconciler), &config).start(shutdown_rx);

    println!("pulsewatch running (sweep every {}s), press Ctrl-C to stop", config.sweep.interval_secs);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for the current sweep to finish");

    // The scheduler may already have exited; nothing to signal then
    let _ = shutdown_tx.send(true);
    let sweeps = scheduler.await.context("Scheduler task failed")?;

    // Dropping the last sender lets the dispatcher drain and exit
    drop(reconciler);
    let delivered = dispatcher.await.context("Dispatcher task failed")?;

    println!(
        "Stopped after {} sweeps ({} failed), {} notifications delivered, {} failed",
        sweeps.completed, sweeps.failed, delivered.delivered, delivered.failed
    );

    Ok(())
}
