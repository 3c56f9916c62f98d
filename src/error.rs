//! Unified error handling for the pulsewatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`PulsewatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use pulsewatch::error::PulsewatchErrorTrait;
//!
//! match registry.register(&subscriber, "example.com/hook", None).await {
//!     Ok(_) => println!("Watching"),
//!     Err(e) => eprintln!("{}", e.user_message()),
//! }
//! ```

use thiserror::Error;

pub use crate::config::secret::SecretError;
pub use crate::notifications::channels::ChannelError;
pub use crate::probe::ProbeError;
pub use crate::reconciler::ReconcileError;
pub use crate::registry::RegistryError;
pub use crate::storage::StoreError;

/// Common trait for all pulsewatch error types
pub trait PulsewatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get a short message suitable for showing to the person who issued the command
    fn user_message(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input from the caller
    Validation,
    /// Outbound HTTP problems
    Network,
    /// Persistent index errors
    Storage,
    /// Configuration and secrets
    Config,
    /// Sweep scheduling
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Domain errors
// ============================================================================

impl PulsewatchErrorTrait for RegistryError {
    fn is_recoverable(&self) -> bool {
        // An unreachable target may come up later; a broken store may recover
        matches!(self, Self::TargetUnreachable(_) | Self::StoreUnavailable(_))
    }

    fn user_message(&self) -> String {
        match self {
            Self::InvalidTarget(e) => format!("That does not look like a valid target: {e}"),
            Self::AlreadyWatching { target, .. } => format!("You are already watching {target}"),
            Self::NotWatching { target, .. } => format!("You are not watching {target}"),
            Self::TargetUnreachable(target) => {
                format!("{target} did not respond, so it was not added")
            }
            Self::StoreUnavailable(_) => "Storage is unavailable, try again later".to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTarget(_) | Self::AlreadyWatching { .. } | Self::NotWatching { .. } => {
                ErrorCategory::Validation
            }
            Self::TargetUnreachable(_) => ErrorCategory::Network,
            Self::StoreUnavailable(_) => ErrorCategory::Storage,
        }
    }
}

impl PulsewatchErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Database(_) | Self::Io(_))
    }

    fn user_message(&self) -> String {
        "Storage is unavailable, try again later".to_string()
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl PulsewatchErrorTrait for ReconcileError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn user_message(&self) -> String {
        match self {
            Self::SweepInProgress => "A sweep is already running".to_string(),
            Self::StoreUnavailable(_) => "Sweep aborted, storage is unavailable".to_string(),
            Self::Registry(e) => e.user_message(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::SweepInProgress => ErrorCategory::Scheduler,
            Self::StoreUnavailable(_) => ErrorCategory::Storage,
            Self::Registry(e) => e.category(),
        }
    }
}

impl PulsewatchErrorTrait for ChannelError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::HttpError(_) | Self::RateLimited(_) | Self::Other(_))
    }

    fn user_message(&self) -> String {
        format!("Notification could not be delivered: {self}")
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl PulsewatchErrorTrait for SecretError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn user_message(&self) -> String {
        match self {
            Self::Authentication => "Wrong password or corrupted config file".to_string(),
            other => other.to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

// ============================================================================
// Unified error
// ============================================================================

/// Unified error type for the pulsewatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Registry façade errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Sweep errors
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Notification channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Prober construction errors
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Encrypted configuration errors
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

impl PulsewatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Registry(e) => e.is_recoverable(),
            Self::Reconcile(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Channel(e) => e.is_recoverable(),
            Self::Secret(e) => e.is_recoverable(),
            Self::Probe(_) => false,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Registry(e) => e.user_message(),
            Self::Reconcile(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::Channel(e) => e.user_message(),
            Self::Secret(e) => e.user_message(),
            Self::Probe(e) => e.to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Registry(e) => e.category(),
            Self::Reconcile(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Channel(e) => e.category(),
            Self::Secret(e) => e.category(),
            Self::Probe(_) => ErrorCategory::Config,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
