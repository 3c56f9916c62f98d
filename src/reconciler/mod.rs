//! Probe-and-diff sweeps over every registered target
//!
//! One sweep snapshots the target identifiers, probes them concurrently
//! with bounded parallelism and feeds each observation back through
//! [`Registry::apply_observation`]. Only edges produce notifications:
//! a target observed in the state it is already stored in is left alone,
//! so repeated sweeps over a stable fleet are silent.
//!
//! Notifications are enqueued after the flip has been committed. If the
//! store fails mid-sweep the remaining observations are dropped, but
//! everything committed before the failure has already been enqueued.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::notifications::Notification;
use crate::registry::{Observation, Registry, RegistryError};
use crate::storage::StoreError;

/// Errors that end a sweep
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Another sweep is still running
    #[error("A sweep is already in progress")]
    SweepInProgress,

    /// The indexes could not be read or written; the sweep was aborted
    #[error("Sweep aborted, store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Any other registry failure
    #[error("Sweep aborted: {0}")]
    Registry(#[source] RegistryError),
}

impl From<RegistryError> for ReconcileError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::StoreUnavailable(e) => Self::StoreUnavailable(e),
            other => Self::Registry(other),
        }
    }
}

/// Summary of one completed sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Targets probed
    pub probed: usize,
    /// Probes that reported online
    pub online: usize,
    /// Probes that reported offline
    pub offline: usize,
    /// Targets deregistered between snapshot and apply
    pub skipped_missing: usize,
    /// Stored flags flipped
    pub transitions: usize,
    /// Notifications handed to the dispatcher
    pub notifications_enqueued: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Marks a sweep as running and clears the mark on drop
struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives sweeps and enqueues notifications for detected transitions
pub struct Reconciler {
    registry: Arc<Registry>,
    queue: mpsc::Sender<Notification>,
    max_concurrent_probes: usize,
    in_progress: AtomicBool,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        registry: Arc<Registry>,
        queue: mpsc::Sender<Notification>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            registry,
            queue,
            max_concurrent_probes: max_concurrent_probes.max(1),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Check whether a sweep is currently running
    pub fn is_sweeping(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one sweep over every registered target
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::SweepInProgress` without doing anything
    /// when another sweep is running, and `ReconcileError::StoreUnavailable`
    /// when the store fails; the rest of that sweep is abandoned.
    pub async fn sweep(&self) -> Result<SweepReport, ReconcileError> {
        let Some(_guard) = SweepGuard::acquire(&self.in_progress) else {
            tracing::warn!("Sweep skipped, previous sweep still running");
            return Err(ReconcileError::SweepInProgress);
        };

        let started = Instant::now();
        let targets = self.registry.target_ids().await?;
        tracing::debug!(targets = targets.len(), "Sweep started");

        let prober = self.registry.prober();
        let mut observations = stream::iter(targets)
            .map(|target| {
                let prober = Arc::clone(&prober);
                async move {
                    let observed = prober.probe(&target).await;
                    (target, observed)
                }
            })
            .buffer_unordered(self.max_concurrent_probes);

        let mut report = SweepReport::default();

        while let Some((target, observed)) = observations.next().await {
            report.probed += 1;
            if observed {
                report.online += 1;
            } else {
                report.offline += 1;
            }

            let observation = match self.registry.apply_observation(&target, observed).await {
                Ok(observation) => observation,
                Err(e) => {
                    tracing::error!(
                        target_id = %target,
                        error = %e,
                        transitions = report.transitions,
                        "Sweep aborted"
                    );
                    return Err(e.into());
                }
            };

            match observation {
                Observation::Missing => {
                    tracing::debug!(target_id = %target, "Target removed during sweep, skipping");
                    report.skipped_missing += 1;
                }
                Observation::Unchanged { .. } => {}
                Observation::Flipped {
                    transition,
                    recipients,
                } => {
                    report.transitions += 1;
                    for recipient in recipients {
                        let notification = Notification::new(
                            recipient.subscriber,
                            target.clone(),
                            recipient.display_name,
                            transition,
                        );
                        if self.queue.send(notification).await.is_ok() {
                            report.notifications_enqueued += 1;
                        } else {
                            tracing::error!(
                                target_id = %target,
                                "Notification queue closed, dropping notification"
                            );
                        }
                    }
                }
            }
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            probed = report.probed,
            online = report.online,
            offline = report.offline,
            transitions = report.transitions,
            notifications = report.notifications_enqueued,
            duration_ms = report.duration_ms,
            "Sweep completed"
        );

        Ok(report)
    }
}
