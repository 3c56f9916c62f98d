//! In-memory watch repository
//!
//! Used by tests and by ephemeral runs that do not need durability.
//! [`MemoryWatchRepository::set_unavailable`] turns every call into a
//! [`StoreError::Unavailable`], which lets callers exercise their
//! store-failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{StoreError, StoreResult, WatchRepository, WriteBatch};
use crate::models::{SubscriberId, SubscriberRecord, TargetId, TargetRecord};

#[derive(Default)]
struct Collections {
    targets: HashMap<TargetId, TargetRecord>,
    subscribers: HashMap<SubscriberId, SubscriberRecord>,
}

/// Thread-safe in-memory implementation of [`WatchRepository`]
#[derive(Default)]
pub struct MemoryWatchRepository {
    collections: RwLock<Collections>,
    unavailable: AtomicBool,
}

impl MemoryWatchRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage of the backing store
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl WatchRepository for MemoryWatchRepository {
    fn get_target(&self, id: &TargetId) -> StoreResult<Option<TargetRecord>> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections.targets.get(id).cloned())
    }

    fn get_subscriber(&self, id: &SubscriberId) -> StoreResult<Option<SubscriberRecord>> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections.subscribers.get(id).cloned())
    }

    fn target_ids(&self) -> StoreResult<Vec<TargetId>> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let mut ids: Vec<TargetId> = collections.targets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn subscriber_ids(&self) -> StoreResult<Vec<SubscriberId>> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let mut ids: Vec<SubscriberId> = collections.subscribers.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_available()?;
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        for record in batch.target_puts() {
            collections.targets.insert(record.id.clone(), record.clone());
        }
        for id in batch.target_deletes() {
            collections.targets.remove(id);
        }
        for record in batch.subscriber_puts() {
            collections
                .subscribers
                .insert(record.id.clone(), record.clone());
        }

        Ok(())
    }
}
