//! Common test utilities

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use pulsewatch::models::{SubscriberId, SubscriberRecord, TargetId, TargetRecord};
use pulsewatch::notifications::Notification;
use pulsewatch::probe::Probe;
use pulsewatch::registry::Registry;
use pulsewatch::storage::{
    MemoryWatchRepository, StoreError, StoreResult, WatchRepository, WriteBatch,
};

/// Prober whose answers are set by the test
///
/// Unscripted targets report `default`. Every call is counted per target.
pub struct ScriptedProber {
    results: Mutex<HashMap<TargetId, bool>>,
    calls: Mutex<HashMap<TargetId, usize>>,
    default: bool,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl ScriptedProber {
    pub fn new(default: bool) -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            default,
            delay: None,
        }
    }

    /// Sleep before answering, to keep a sweep in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, target: &str, up: bool) {
        self.results.lock().unwrap().insert(tid(target), up);
    }

    pub fn calls(&self, target: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&tid(target))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Probe for ScriptedProber {
    async fn probe(&self, target: &TargetId) -> bool {
        *self.calls.lock().unwrap().entry(target.clone()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .lock()
            .unwrap()
            .get(target)
            .copied()
            .unwrap_or(self.default)
    }
}

/// Registry over an in-memory repository
#[allow(dead_code)]
pub fn memory_registry(
    prober: Arc<ScriptedProber>,
) -> (Arc<Registry>, Arc<MemoryWatchRepository>) {
    let repo = Arc::new(MemoryWatchRepository::new());
    let registry = Arc::new(Registry::new(repo.clone(), prober));
    (registry, repo)
}

pub fn sub(raw: &str) -> SubscriberId {
    SubscriberId::new(raw).unwrap()
}

pub fn tid(raw: &str) -> TargetId {
    TargetId::parse(raw).unwrap()
}

/// Collect everything currently queued
#[allow(dead_code)]
pub fn drain(queue: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = queue.try_recv() {
        out.push(notification);
    }
    out
}

/// In-memory repository whose subscriber reads can be made to fail
///
/// `fail_subscriber_reads` fails every read immediately; `fail_reads_after_commit`
/// starts failing reads once the next batch has been committed.
#[derive(Default)]
pub struct FlakyRepository {
    inner: MemoryWatchRepository,
    failing: AtomicBool,
    fail_after_commit: AtomicBool,
}

#[allow(dead_code)]
impl FlakyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_subscriber_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_reads_after_commit(&self) {
        self.fail_after_commit.store(true, Ordering::SeqCst);
    }
}

impl WatchRepository for FlakyRepository {
    fn get_target(&self, id: &TargetId) -> StoreResult<Option<TargetRecord>> {
        self.inner.get_target(id)
    }

    fn get_subscriber(&self, id: &SubscriberId) -> StoreResult<Option<SubscriberRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("subscriber read failed".to_string()));
        }
        self.inner.get_subscriber(id)
    }

    fn target_ids(&self) -> StoreResult<Vec<TargetId>> {
        self.inner.target_ids()
    }

    fn subscriber_ids(&self) -> StoreResult<Vec<SubscriberId>> {
        self.inner.subscriber_ids()
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.commit(batch)?;
        if self.fail_after_commit.swap(false, Ordering::SeqCst) {
            self.failing.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}
