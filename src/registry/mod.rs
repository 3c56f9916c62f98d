//! Registry façade over the target and subscriber indexes
//!
//! [`Registry`] is the only writer of the two indexes. Every logical
//! mutation (register, deregister, one target's liveness flip) reads and
//! writes both collections inside a single critical section and commits
//! them as one [`WriteBatch`], so no reader ever observes a target record
//! out of step with its subscribers' records.
//!
//! # Locking
//!
//! ```text
//!   register ──► probe (no lock) ──► write gate ──► commit batch
//!   deregister ─────────────────────► write gate ──► commit batch
//!   reconciler ──► probe (no lock) ──► write gate ──► commit flag
//!   list_watches / snapshot ────────► read gate
//! ```
//!
//! Probes are network-bound and never run while the gate is held.

pub mod seed;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::models::{
    IdError, SubscriberId, SubscriberRecord, TargetId, TargetRecord, Transition, WatchStatus,
};
use crate::probe::{HttpProber, Probe};
use crate::storage::{SqliteWatchRepository, StoreError, WatchRepository, WriteBatch};

pub use seed::{apply_seeds, SeedSummary};

/// Errors returned by registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Target input could not be normalized
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] IdError),

    /// The subscriber already watches this target
    #[error("{subscriber} is already watching {target}")]
    AlreadyWatching {
        subscriber: SubscriberId,
        target: TargetId,
    },

    /// The subscriber does not watch this target
    #[error("{subscriber} is not watching {target}")]
    NotWatching {
        subscriber: SubscriberId,
        target: TargetId,
    },

    /// The registration probe reported the target offline
    #[error("Target {0} is unreachable")]
    TargetUnreachable(TargetId),

    /// The indexes could not be read or written
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Normalized target identifier
    pub target_id: TargetId,

    /// Display name stored for the watch
    pub display_name: String,

    /// Whether this registration created the target record
    pub target_created: bool,
}

/// Outcome of a successful deregistration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deregistration {
    /// Normalized target identifier
    pub target_id: TargetId,

    /// Whether the target record was deleted because nobody watches it anymore
    pub target_removed: bool,
}

/// A subscriber to notify about a flip, with the name it gave the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub subscriber: SubscriberId,
    pub display_name: String,
}

/// Result of applying one probe observation to the stored state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The target was removed after the sweep snapshot was taken
    Missing,

    /// Stored flag already matches the observation
    Unchanged { is_online: bool },

    /// Stored flag was flipped and committed
    Flipped {
        transition: Transition,
        recipients: Vec<Recipient>,
    },
}

// ============================================================================
// Registry
// ============================================================================

/// Bidirectional subscriber/target registry
pub struct Registry {
    repository: Arc<dyn WatchRepository>,
    prober: Arc<dyn Probe>,
    gate: RwLock<()>,
}

impl Registry {
    /// Create a new registry over a repository and a prober
    pub fn new(repository: Arc<dyn WatchRepository>, prober: Arc<dyn Probe>) -> Self {
        Self {
            repository,
            prober,
            gate: RwLock::new(()),
        }
    }

    /// Open the SQLite indexes and an HTTP prober described by the configuration
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let repository = SqliteWatchRepository::open(&config.storage.sqlite_path)?;
        let prober = HttpProber::new(&config.probe)?;

        Ok(Self::new(Arc::new(repository), Arc::new(prober)))
    }

    /// Get the prober used for registration checks and sweeps
    pub fn prober(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.prober)
    }

    /// Start watching a target on behalf of a subscriber
    ///
    /// The target is probed once before anything is written; an offline
    /// target is rejected with [`RegistryError::TargetUnreachable`]. A new
    /// target record starts online, an existing one keeps its flag.
    pub async fn register(
        &self,
        subscriber: &SubscriberId,
        raw_target: &str,
        display_name: Option<&str>,
    ) -> RegistryResult<Registration> {
        let target = TargetId::parse(raw_target)?;

        {
            let _read = self.gate.read().await;
            if self.is_watching(subscriber, &target)? {
                return Err(RegistryError::AlreadyWatching {
                    subscriber: subscriber.clone(),
                    target,
                });
            }
        }

        if !self.prober.probe(&target).await {
            tracing::info!(subscriber = %subscriber, target_id = %target, "Registration rejected, target unreachable");
            return Err(RegistryError::TargetUnreachable(target));
        }

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| target.to_string(), str::to_string);

        let _write = self.gate.write().await;

        // Another registration may have landed while the probe was running
        let mut subscriber_record = self
            .repository
            .get_subscriber(subscriber)?
            .unwrap_or_else(|| SubscriberRecord::new(subscriber.clone()));
        if subscriber_record.is_watching(&target) {
            return Err(RegistryError::AlreadyWatching {
                subscriber: subscriber.clone(),
                target,
            });
        }

        let (mut target_record, target_created) = match self.repository.get_target(&target)? {
            Some(record) => (record, false),
            None => (TargetRecord::new(target.clone()), true),
        };

        target_record.subscribers.insert(subscriber.clone());
        subscriber_record
            .watches
            .insert(target.clone(), display_name.clone());

        let mut batch = WriteBatch::new();
        batch
            .put_target(target_record)
            .put_subscriber(subscriber_record);
        self.repository.commit(batch)?;

        tracing::info!(
            subscriber = %subscriber,
            target_id = %target,
            target_created,
            "Watch registered"
        );

        Ok(Registration {
            target_id: target,
            display_name,
            target_created,
        })
    }

    /// Stop watching a target
    ///
    /// The target record is deleted once its last subscriber leaves.
    pub async fn deregister(
        &self,
        subscriber: &SubscriberId,
        raw_target: &str,
    ) -> RegistryResult<Deregistration> {
        let target = TargetId::parse(raw_target)?;

        let _write = self.gate.write().await;

        let mut subscriber_record = match self.repository.get_subscriber(subscriber)? {
            Some(record) if record.is_watching(&target) => record,
            _ => {
                return Err(RegistryError::NotWatching {
                    subscriber: subscriber.clone(),
                    target,
                })
            }
        };
        subscriber_record.watches.remove(&target);

        let mut batch = WriteBatch::new();
        let mut target_removed = false;

        match self.repository.get_target(&target)? {
            Some(mut record) => {
                record.subscribers.remove(subscriber);
                if record.subscribers.is_empty() {
                    batch.delete_target(target.clone());
                    target_removed = true;
                } else {
                    batch.put_target(record);
                }
            }
            None => {
                tracing::warn!(
                    subscriber = %subscriber,
                    target_id = %target,
                    "Watch referenced a missing target record, removing watch only"
                );
            }
        }

        batch.put_subscriber(subscriber_record);
        self.repository.commit(batch)?;

        tracing::info!(
            subscriber = %subscriber,
            target_id = %target,
            target_removed,
            "Watch deregistered"
        );

        Ok(Deregistration {
            target_id: target,
            target_removed,
        })
    }

    /// List a subscriber's watches with each target's last known state
    ///
    /// An unknown subscriber has no watches. The state reflects the last
    /// sweep; nothing is probed here.
    pub async fn list_watches(&self, subscriber: &SubscriberId) -> RegistryResult<Vec<WatchStatus>> {
        let _read = self.gate.read().await;

        let Some(record) = self.repository.get_subscriber(subscriber)? else {
            return Ok(Vec::new());
        };

        let mut watches = Vec::with_capacity(record.watches.len());
        for (target_id, display_name) in record.watches {
            match self.repository.get_target(&target_id)? {
                Some(target) => watches.push(WatchStatus {
                    target_id,
                    display_name,
                    is_online: target.is_online,
                }),
                None => {
                    tracing::warn!(
                        subscriber = %subscriber,
                        target_id = %target_id,
                        "Watch references a missing target record"
                    );
                }
            }
        }

        Ok(watches)
    }

    /// Snapshot the identifiers of every known target
    pub async fn target_ids(&self) -> RegistryResult<Vec<TargetId>> {
        let _read = self.gate.read().await;
        Ok(self.repository.target_ids()?)
    }

    /// Apply one probe observation to a target's stored flag
    ///
    /// On a flip the new flag is committed before this returns, together
    /// with the list of subscribers to notify. Any store failure leaves the
    /// stored flag untouched.
    pub async fn apply_observation(
        &self,
        target: &TargetId,
        observed: bool,
    ) -> RegistryResult<Observation> {
        let _write = self.gate.write().await;

        let Some(mut record) = self.repository.get_target(target)? else {
            return Ok(Observation::Missing);
        };

        let Some(transition) = Transition::between(record.is_online, observed) else {
            return Ok(Observation::Unchanged {
                is_online: observed,
            });
        };

        // Resolve recipients before committing; a failed read keeps the old flag
        let mut recipients = Vec::with_capacity(record.subscribers.len());
        for subscriber in &record.subscribers {
            let display_name = match self.repository.get_subscriber(subscriber)? {
                Some(watcher) => watcher.watches.get(target).cloned(),
                None => None,
            }
            .unwrap_or_else(|| target.to_string());

            recipients.push(Recipient {
                subscriber: subscriber.clone(),
                display_name,
            });
        }

        record.is_online = observed;
        record.last_transition_at = Some(Utc::now());

        let mut batch = WriteBatch::new();
        batch.put_target(record);
        self.repository.commit(batch)?;

        tracing::info!(
            target_id = %target,
            transition = %transition,
            recipients = recipients.len(),
            "Target state changed"
        );

        Ok(Observation::Flipped {
            transition,
            recipients,
        })
    }

    /// Take a consistent copy of both indexes
    pub async fn snapshot(&self) -> RegistryResult<RegistrySnapshot> {
        let _read = self.gate.read().await;

        let mut targets = BTreeMap::new();
        for id in self.repository.target_ids()? {
            if let Some(record) = self.repository.get_target(&id)? {
                targets.insert(id, record);
            }
        }

        let mut subscribers = BTreeMap::new();
        for id in self.repository.subscriber_ids()? {
            if let Some(record) = self.repository.get_subscriber(&id)? {
                subscribers.insert(id, record);
            }
        }

        Ok(RegistrySnapshot {
            targets,
            subscribers,
        })
    }

    fn is_watching(&self, subscriber: &SubscriberId, target: &TargetId) -> RegistryResult<bool> {
        Ok(self
            .repository
            .get_subscriber(subscriber)?
            .is_some_and(|record| record.is_watching(target)))
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time copy of both indexes
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub targets: BTreeMap<TargetId, TargetRecord>,
    pub subscribers: BTreeMap<SubscriberId, SubscriberRecord>,
}

impl RegistrySnapshot {
    /// Describe every place where the two indexes disagree
    ///
    /// An empty result means the cross-index invariant holds and no
    /// target record is orphaned.
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (id, target) in &self.targets {
            if target.subscribers.is_empty() {
                problems.push(format!("target {id} has no subscribers"));
            }
            for subscriber in &target.subscribers {
                let watching = self
                    .subscribers
                    .get(subscriber)
                    .is_some_and(|record| record.is_watching(id));
                if !watching {
                    problems.push(format!(
                        "target {id} lists {subscriber} but the subscriber does not watch it"
                    ));
                }
            }
        }

        for (id, subscriber) in &self.subscribers {
            for target in subscriber.watches.keys() {
                let listed = self
                    .targets
                    .get(target)
                    .is_some_and(|record| record.subscribers.contains(id));
                if !listed {
                    problems.push(format!(
                        "subscriber {id} watches {target} but the target does not list it"
                    ));
                }
            }
        }

        problems
    }

    /// Check the cross-index invariant
    pub fn is_consistent(&self) -> bool {
        self.violations().is_empty()
    }
}
