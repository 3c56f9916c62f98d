//! Recurring sweep trigger
//!
//! [`SweepScheduler`] owns a single tokio task that runs one sweep per
//! interval until a shutdown signal arrives. Sweeps run inline in the
//! task, so a slow sweep delays the next tick instead of overlapping it;
//! ticks missed meanwhile are skipped, not replayed.
//!
//! A sweep in flight when shutdown is requested runs to completion.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::reconciler::{ReconcileError, Reconciler};

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Sweeps that ran to completion
    pub completed: u64,
    /// Ticks dropped because a sweep was already running
    pub skipped: u64,
    /// Sweeps aborted by a store failure
    pub failed: u64,
}

/// Periodic driver for [`Reconciler::sweep`]
pub struct SweepScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    run_on_startup: bool,
}

impl SweepScheduler {
    /// Create a new scheduler
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration, run_on_startup: bool) -> Self {
        Self {
            reconciler,
            interval,
            run_on_startup,
        }
    }

    /// Create a scheduler from the sweep configuration
    pub fn from_config(reconciler: Arc<Reconciler>, config: &Config) -> Self {
        Self::new(
            reconciler,
            config.sweep_interval(),
            config.sweep.run_on_startup,
        )
    }

    /// Spawn the trigger loop
    ///
    /// The loop ends when `shutdown` turns `true` or its sender is dropped.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<SchedulerStats> {
        tokio::spawn(async move {
            let first_tick = if self.run_on_startup {
                Instant::now()
            } else {
                Instant::now() + self.interval
            };
            let mut ticker = tokio::time::interval_at(first_tick, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut stats = SchedulerStats::default();
            tracing::info!(interval_secs = self.interval.as_secs(), "Sweep scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.reconciler.sweep().await {
                            Ok(_) => stats.completed += 1,
                            Err(ReconcileError::SweepInProgress) => stats.skipped += 1,
                            Err(e) => {
                                // The next tick retries the whole sweep
                                tracing::error!(error = %e, "Sweep failed");
                                stats.failed += 1;
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!(
                completed = stats.completed,
                skipped = stats.skipped,
                failed = stats.failed,
                "Sweep scheduler stopped"
            );
            stats
        })
    }
}
