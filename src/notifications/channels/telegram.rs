//! Telegram Bot API notification channel
//!
//! Messages are sent with `sendMessage`:
//!
//! ```json
//! { "chat_id": -1001234567890, "text": "💔 My bot is offline!" }
//! ```
//!
//! Numeric recipients are sent as JSON numbers, anything else (e.g.
//! `@channelname`) as a string.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::config::TelegramConfig;
use crate::models::SubscriberId;

/// Telegram notification channel
pub struct TelegramChannel {
    config: TelegramConfig,
    token: String,
    client: Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::InvalidConfig` when no bot token is configured.
    pub fn new(config: TelegramConfig) -> ChannelResult<Self> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::InvalidConfig("bot token is not set".to_string()))?
            .to_string();

        if !config.api_base.starts_with("http://") && !config.api_base.starts_with("https://") {
            return Err(ChannelError::InvalidConfig(
                "api_base must start with http:// or https://".to_string(),
            ));
        }

        if config.timeout_secs == 0 {
            return Err(ChannelError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            token,
            client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.token
        )
    }

    /// Build the `sendMessage` payload
    fn build_payload(recipient: &SubscriberId, text: &str) -> serde_json::Value {
        let chat_id = match recipient.as_str().parse::<i64>() {
            Ok(numeric) => serde_json::json!(numeric),
            Err(_) => serde_json::json!(recipient.as_str()),
        };

        serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        })
    }

    /// Send the request with retry logic
    async fn send_with_retry(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let url = self.endpoint("sendMessage");
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff from the configured base delay
                let delay = Duration::from_millis(
                    self.config
                        .retry_base_delay_ms
                        .saturating_mul(2_u64.saturating_pow(attempt - 1)),
                );
                tokio::time::sleep(delay).await;
                tracing::debug!(
                    "Retrying Telegram request (attempt {}/{})",
                    attempt + 1,
                    self.config.max_retries + 1
                );
            }

            match self.client.post(&url).json(payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ChannelError::RateLimited(body));
                        continue;
                    }

                    // Don't retry on client errors (4xx)
                    if status.is_client_error() {
                        return Err(ChannelError::Rejected(format!("HTTP {status}: {body}")));
                    }

                    last_error = Some(ChannelError::Other(format!("HTTP {status}: {body}")));
                }
                Err(e) => {
                    // Strip the URL, it carries the bot token
                    last_error = Some(ChannelError::HttpError(e.without_url()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ChannelError::Other("Unknown error".to_string())))
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, recipient: &SubscriberId, text: &str) -> ChannelResult<DeliveryStatus> {
        let payload = Self::build_payload(recipient, text);

        match self.send_with_retry(&payload).await {
            Ok(()) => {
                tracing::debug!(recipient = %recipient, "Telegram message delivered");
                Ok(DeliveryStatus::success("telegram"))
            }
            Err(e) => {
                tracing::error!(recipient = %recipient, error = %e, "Failed to deliver Telegram message");
                Ok(DeliveryStatus::failure("telegram", e.to_string()))
            }
        }
    }

    async fn health_check(&self) -> ChannelResult<bool> {
        match self.client.get(self.endpoint("getMe")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                let e = e.without_url();
                tracing::warn!(error = %e, "Telegram health check failed");
                Ok(false)
            }
        }
    }
}
