//! Persistence for the target and subscriber indexes
//!
//! This module provides a repository abstraction over the two key-value
//! collections the watchdog persists:
//!
//! - `targets[target_id] = TargetRecord`
//! - `subscribers[subscriber_id] = SubscriberRecord`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Registry (single writer)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    WatchRepository                          │
//! │        get_target / get_subscriber / commit(batch)          │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                            │
//!                 ▼                            ▼
//!       ┌─────────────────┐          ┌─────────────────┐
//!       │     SQLite      │          │     Memory      │
//!       │  Implementation │          │  Implementation │
//!       └─────────────────┘          └─────────────────┘
//! ```
//!
//! Writes are grouped into a [`WriteBatch`] that touches both collections
//! and is applied atomically, so a target record and its subscribers'
//! records never diverge on disk.

pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::models::{SubscriberId, SubscriberRecord, TargetId, TargetRecord};

pub use memory::MemoryWatchRepository;
pub use sqlite::SqliteWatchRepository;

/// Result type for repository operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised when the persistent indexes cannot be read or written
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record could not be encoded or decoded
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while opening the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A set of writes against both collections, applied as one unit
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    target_puts: Vec<TargetRecord>,
    target_deletes: Vec<TargetId>,
    subscriber_puts: Vec<SubscriberRecord>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a target record
    pub fn put_target(&mut self, record: TargetRecord) -> &mut Self {
        self.target_puts.push(record);
        self
    }

    /// Delete a target record
    pub fn delete_target(&mut self, id: TargetId) -> &mut Self {
        self.target_deletes.push(id);
        self
    }

    /// Insert or replace a subscriber record
    pub fn put_subscriber(&mut self, record: SubscriberRecord) -> &mut Self {
        self.subscriber_puts.push(record);
        self
    }

    /// Check if the batch carries no writes
    pub fn is_empty(&self) -> bool {
        self.target_puts.is_empty()
            && self.target_deletes.is_empty()
            && self.subscriber_puts.is_empty()
    }

    /// Target records to write
    pub fn target_puts(&self) -> &[TargetRecord] {
        &self.target_puts
    }

    /// Target records to delete
    pub fn target_deletes(&self) -> &[TargetId] {
        &self.target_deletes
    }

    /// Subscriber records to write
    pub fn subscriber_puts(&self) -> &[SubscriberRecord] {
        &self.subscriber_puts
    }
}

/// Repository for the two watch indexes
///
/// Implementations must apply a [`WriteBatch`] atomically: either every
/// write in the batch becomes visible or none does.
pub trait WatchRepository: Send + Sync {
    /// Get a target record by identifier
    fn get_target(&self, id: &TargetId) -> StoreResult<Option<TargetRecord>>;

    /// Get a subscriber record by identifier
    fn get_subscriber(&self, id: &SubscriberId) -> StoreResult<Option<SubscriberRecord>>;

    /// List all target identifiers
    fn target_ids(&self) -> StoreResult<Vec<TargetId>>;

    /// List all subscriber identifiers
    fn subscriber_ids(&self) -> StoreResult<Vec<SubscriberId>>;

    /// Apply a batch of writes atomically
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}
