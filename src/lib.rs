//! pulsewatch - Liveness watchdog for HTTP endpoints
//!
//! Subscribers register targets they care about; a periodic sweep probes
//! every target and notifies each subscriber when a target goes offline
//! or comes back.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`] - Identifiers, persisted records and transitions
//! - [`storage`] - Target and subscriber indexes (SQLite, in-memory)
//! - [`probe`] - Single liveness checks with a configurable rule
//! - [`registry`] - Register / deregister / list façade over both indexes
//! - [`reconciler`] - Probe-and-diff sweeps with edge detection
//! - [`notifications`] - Notification queue, dispatcher and channels
//! - [`scheduler`] - Recurring sweep trigger
//! - [`config`] - Configuration management and encrypted config files
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulsewatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repository = Arc::new(SqliteWatchRepository::open(&config.storage.sqlite_path)?);
//!     let prober = Arc::new(HttpProber::new(&config.probe)?);
//!     let registry = Registry::new(repository, prober);
//!
//!     let subscriber = SubscriberId::new("-1001234567890")?;
//!     registry.register(&subscriber, "https://example.com/health", Some("Example")).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod probe;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, PulsewatchErrorTrait, Result};
    pub use crate::models::{SubscriberId, TargetId, Transition, WatchStatus};
    pub use crate::notifications::{Channel, Dispatcher, Notification};
    pub use crate::probe::{HttpProber, Probe};
    pub use crate::reconciler::{Reconciler, SweepReport};
    pub use crate::registry::{Registry, RegistryError};
    pub use crate::scheduler::SweepScheduler;
    pub use crate::storage::{MemoryWatchRepository, SqliteWatchRepository, WatchRepository};
}

// Direct re-exports for convenience
pub use models::{SubscriberId, TargetId, Transition};
