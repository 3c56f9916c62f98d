use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use pulsewatch::config::Config;
use pulsewatch::error::PulsewatchErrorTrait;
use pulsewatch::models::SubscriberId;
use pulsewatch::notifications::Dispatcher;
use pulsewatch::reconciler::Reconciler;
use pulsewatch::registry::RegistryError;

use super::{build_channel, open_registry};

/// Register a watch from the command line
pub async fn register(
    config: Config,
    subscriber: String,
    target: String,
    name: Option<String>,
) -> Result<()> {
    let registry = open_registry(&config)?;
    let subscriber = SubscriberId::new(&subscriber)?;

    match registry.register(&subscriber, &target, name.as_deref()).await {
        Ok(registration) => {
            println!(
                "Watching {} as \"{}\"{}",
                registration.target_id,
                registration.display_name,
                if registration.target_created { " (new target)" } else { "" }
            );
            Ok(())
        }
        Err(e @ RegistryError::StoreUnavailable(_)) => Err(e.into()),
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

/// Remove a watch from the command line
pub async fn deregister(config: Config, subscriber: String, target: String) -> Result<()> {
    let registry = open_registry(&config)?;
    let subscriber = SubscriberId::new(&subscriber)?;

    match registry.deregister(&subscriber, &target).await {
        Ok(deregistration) => {
            println!(
                "Stopped watching {}{}",
                deregistration.target_id,
                if deregistration.target_removed { " (target removed)" } else { "" }
            );
            Ok(())
        }
        Err(e @ RegistryError::StoreUnavailable(_)) => Err(e.into()),
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

/// Print a subscriber's watches
pub async fn list(config: Config, subscriber: String, json: bool) -> Result<()> {
    let registry = open_registry(&config)?;
    let subscriber = SubscriberId::new(&subscriber)?;
    let watches = registry.list_watches(&subscriber).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&watches)?);
        return Ok(());
    }

    if watches.is_empty() {
        println!("{subscriber} is not watching anything");
        return Ok(());
    }

    println!("{:<8} {:<30} TARGET", "STATE", "NAME");
    for watch in &watches {
        println!(
            "{:<8} {:<30} {}",
            watch.state(),
            watch.display_name,
            watch.target_id
        );
    }

    Ok(())
}

/// Run a single sweep and deliver its notifications
pub async fn sweep(config: Config) -> Result<()> {
    let registry = open_registry(&config)?;
    let channel = build_channel(&config)?;

    let (queue, notifications) = mpsc::channel(config.sweep.notification_queue_capacity);
    let dispatcher = Dispatcher::new(channel).spawn(notifications);

    let reconciler = Arc::new(Reconciler::new(
        registry,
        queue,
        config.sweep.max_concurrent_probes,
    ));
    let result = reconciler.sweep().await;

    drop(reconciler);
    let delivered = dispatcher.await.context("Dispatcher task failed")?;

    let report = result?;
    println!(
        "Probed {} targets: {} online, {} offline, {} transitions, {}/{} notifications delivered ({} ms)",
        report.probed,
        report.online,
        report.offline,
        report.transitions,
        delivered.delivered,
        report.notifications_enqueued,
        report.duration_ms
    );

    Ok(())
}
