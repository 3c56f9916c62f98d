//! Start-up registration of configured watches

use serde::Serialize;

use super::{Registry, RegistryError, RegistryResult};
use crate::config::SeedWatch;
use crate::models::SubscriberId;

/// Outcome counts for a batch of seed watches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub registered: usize,
    pub already_watching: usize,
    pub unreachable: usize,
    pub invalid: usize,
}

/// Register every seed watch through the normal façade path
///
/// Seeds that are already registered are counted and left alone, and
/// unreachable or malformed seeds are logged and skipped. A store
/// failure aborts the remaining seeds.
pub async fn apply_seeds(registry: &Registry, seeds: &[SeedWatch]) -> RegistryResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    for seed in seeds {
        let subscriber = match SubscriberId::new(&seed.subscriber) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(target_id = %seed.target, error = %e, "Skipping seed watch");
                summary.invalid += 1;
                continue;
            }
        };

        match registry
            .register(&subscriber, &seed.target, seed.display_name.as_deref())
            .await
        {
            Ok(_) => summary.registered += 1,
            Err(RegistryError::AlreadyWatching { .. }) => summary.already_watching += 1,
            Err(RegistryError::TargetUnreachable(target)) => {
                tracing::warn!(subscriber = %subscriber, target_id = %target, "Seed target unreachable, skipping");
                summary.unreachable += 1;
            }
            Err(RegistryError::InvalidTarget(e)) => {
                tracing::warn!(subscriber = %subscriber, error = %e, "Skipping seed watch");
                summary.invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        registered = summary.registered,
        already_watching = summary.already_watching,
        unreachable = summary.unreachable,
        invalid = summary.invalid,
        "Seed watches applied"
    );

    Ok(summary)
}
