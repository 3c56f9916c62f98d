//! State-change notifications and their out-of-lock dispatch
//!
//! The reconciler commits a flip and then enqueues one [`Notification`]
//! per subscriber on a bounded channel. A [`Dispatcher`] task drains the
//! queue and hands each message to a [`Channel`]. Delivery is
//! fire-and-forget: failures are logged and never touch stored state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  mpsc::Sender   ┌──────────────┐   send()   ┌───────────┐
//! │  Reconciler  │ ──────────────► │  Dispatcher  │ ─────────► │  Channel  │
//! │ (commit, then│  Notification   │    task      │            │ Telegram/ │
//! │   enqueue)   │                 │              │            │    Log    │
//! └──────────────┘                 └──────────────┘            └───────────┘
//! ```

pub mod channels;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{SubscriberId, TargetId, Transition};

pub use channels::{Channel, DeliveryStatus, LogChannel, TelegramChannel};

/// One message owed to one subscriber about one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier
    pub id: Uuid,

    /// Recipient
    pub subscriber: SubscriberId,

    /// Target that changed state
    pub target_id: TargetId,

    /// Name the subscriber gave the target
    pub display_name: String,

    /// Detected edge
    pub transition: Transition,

    /// When the flip was committed
    pub detected_at: DateTime<Utc>,
}

impl Notification {
    /// Create a new notification
    pub fn new(
        subscriber: SubscriberId,
        target_id: TargetId,
        display_name: String,
        transition: Transition,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber,
            target_id,
            display_name,
            transition,
            detected_at: Utc::now(),
        }
    }

    /// Render the user-facing message text
    pub fn message(&self) -> String {
        match self.transition {
            Transition::CameOnline => format!("🥳 {} is back online!", self.display_name),
            Transition::WentOffline => format!("💔 {} is offline!", self.display_name),
        }
    }
}

/// Counters reported by a dispatcher when its queue closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains the notification queue into a channel
pub struct Dispatcher {
    channel: Arc<dyn Channel>,
}

impl Dispatcher {
    /// Create a new dispatcher for a channel
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Deliver one notification, returning whether the channel accepted it
    pub async fn deliver(&self, notification: &Notification) -> bool {
        let text = notification.message();

        match self.channel.send(&notification.subscriber, &text).await {
            Ok(status) if status.success => {
                tracing::info!(
                    subscriber = %notification.subscriber,
                    target_id = %notification.target_id,
                    transition = %notification.transition,
                    channel = self.channel.name(),
                    "Notification delivered"
                );
                true
            }
            Ok(status) => {
                tracing::warn!(
                    subscriber = %notification.subscriber,
                    target_id = %notification.target_id,
                    status = %status,
                    "Notification delivery failed"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    subscriber = %notification.subscriber,
                    target_id = %notification.target_id,
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        }
    }

    /// Run the dispatcher until every sender is dropped
    ///
    /// Remaining queued notifications are delivered before the task ends.
    pub fn spawn(self, mut queue: mpsc::Receiver<Notification>) -> JoinHandle<DispatchStats> {
        tokio::spawn(async move {
            let mut stats = DispatchStats::default();

            while let Some(notification) = queue.recv().await {
                if self.deliver(&notification).await {
                    stats.delivered += 1;
                } else {
                    stats.failed += 1;
                }
            }

            tracing::debug!(
                delivered = stats.delivered,
                failed = stats.failed,
                "Notification queue closed"
            );
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::channels::{ChannelError, ChannelResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records messages and fails for one chosen recipient
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, recipient: &SubscriberId, text: &str) -> ChannelResult<DeliveryStatus> {
            if self.fail_for.as_deref() == Some(recipient.as_str()) {
                return Err(ChannelError::Rejected("blocked".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(DeliveryStatus::success("recording"))
        }
    }

    fn notification(subscriber: &str, transition: Transition) -> Notification {
        Notification::new(
            SubscriberId::new(subscriber).unwrap(),
            TargetId::parse("example.com/bot").unwrap(),
            "Support bot".to_string(),
            transition,
        )
    }

    #[test]
    fn test_message_text() {
        assert_eq!(
            notification("x", Transition::CameOnline).message(),
            "🥳 Support bot is back online!"
        );
        assert_eq!(
            notification("x", Transition::WentOffline).message(),
            "💔 Support bot is offline!"
        );
    }

    #[tokio::test]
    async fn test_dispatcher_drains_queue() {
        let channel = Arc::new(RecordingChannel {
            sent: Mutex::new(Vec::new()),
            fail_for: Some("blocked".to_string()),
        });
        let (tx, rx) = mpsc::channel(8);
        let handle = Dispatcher::new(channel.clone()).spawn(rx);

        tx.send(notification("x", Transition::WentOffline)).await.unwrap();
        tx.send(notification("blocked", Transition::WentOffline))
            .await
            .unwrap();
        tx.send(notification("y", Transition::WentOffline)).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, DispatchStats { delivered: 2, failed: 1 });

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "x");
        assert_eq!(sent[1].1, "💔 Support bot is offline!");
    }
}
