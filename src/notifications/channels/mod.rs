//! Notification channels for delivering state-change messages
//!
//! A channel takes a recipient identifier and a message text. Delivery
//! problems are reported through [`DeliveryStatus`] rather than as errors,
//! so the dispatcher can log them and move on.

pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::SubscriberId;

pub use telegram::TelegramChannel;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote API rejected the request
    #[error("Rejected by API: {0}")]
    Rejected(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

/// Response from sending a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the notification
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a failed delivery status
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Trait for notification sinks
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Send a text message to one recipient
    async fn send(&self, recipient: &SubscriberId, text: &str) -> ChannelResult<DeliveryStatus>;

    /// Check if the channel is available
    async fn health_check(&self) -> ChannelResult<bool> {
        Ok(true)
    }
}

/// Channel that writes messages to the log instead of delivering them
///
/// Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    /// Create a new log channel
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, recipient: &SubscriberId, text: &str) -> ChannelResult<DeliveryStatus> {
        tracing::info!(recipient = %recipient, text, "Notification");
        Ok(DeliveryStatus::success("log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_success() {
        let status = DeliveryStatus::success("telegram");
        assert!(status.success);
        assert_eq!(status.channel, "telegram");
        assert!(status.message.is_none());
    }

    #[test]
    fn test_delivery_status_failure() {
        let status = DeliveryStatus::failure("telegram", "chat not found");
        assert!(!status.success);
        assert_eq!(status.message, Some("chat not found".to_string()));
    }

    #[test]
    fn test_delivery_status_display() {
        let success = DeliveryStatus::success("log");
        assert_eq!(success.to_string(), "[SUCCESS] log");

        let failure = DeliveryStatus::failure("telegram", "HTTP 400");
        assert!(failure.to_string().contains("FAILED"));
        assert!(failure.to_string().contains("HTTP 400"));
    }

    #[tokio::test]
    async fn test_log_channel_always_succeeds() {
        let channel = LogChannel::new();
        let recipient = SubscriberId::new("42").unwrap();

        let status = channel.send(&recipient, "hello").await.unwrap();
        assert!(status.success);
        assert!(channel.health_check().await.unwrap());
    }
}
