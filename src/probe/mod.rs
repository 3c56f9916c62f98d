//! Liveness probing for monitored targets
//!
//! A probe issues one outbound request with a bounded timeout and maps
//! the outcome to a boolean. Transport failures, timeouts and responses
//! rejected by the [`LivenessRule`] all count as "offline"; probing never
//! returns an error to the caller.
//!
//! # Liveness rules
//!
//! Which responses count as alive depends on the kind of endpoint being
//! watched, so the predicate is configuration:
//!
//! | Rule | Alive when |
//! |------|------------|
//! | `any_response` | the server answered at all |
//! | `success` | status is 2xx (default) |
//! | `status_in` | status is one of the listed codes |
//!
//! A chat-bot webhook that rejects unsigned requests, for instance, is
//! best watched with `POST` and `status_in = [403]`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::models::TargetId;

/// Errors that can occur while building a prober
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Probe configuration is invalid
    #[error("Invalid probe configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Liveness Policy
// ============================================================================

/// HTTP method used for probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    Get,
    Head,
    Post,
}

impl ProbeMethod {
    fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Head => Method::HEAD,
            Self::Post => Method::POST,
        }
    }
}

/// Predicate over a response status deciding whether a target is alive
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LivenessRule {
    /// Any HTTP response means the target is up
    AnyResponse,

    /// 2xx responses only
    #[default]
    Success,

    /// Only the listed status codes
    StatusIn { codes: Vec<u16> },
}

impl LivenessRule {
    /// Check whether a response status satisfies the rule
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Self::AnyResponse => true,
            Self::Success => (200..300).contains(&status),
            Self::StatusIn { codes } => codes.contains(&status),
        }
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::StatusIn { codes } if codes.is_empty() => {
                Err("status_in requires at least one status code".to_string())
            }
            Self::StatusIn { codes } => match codes.iter().find(|c| !(100..=599).contains(*c)) {
                Some(code) => Err(format!("{code} is not an HTTP status code")),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Prober
// ============================================================================

/// A single liveness check against one target
///
/// Implementations must not fail: anything other than a qualifying
/// response is reported as `false`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check whether the target is reachable
    async fn probe(&self, target: &TargetId) -> bool;
}

/// HTTP prober backed by reqwest
pub struct HttpProber {
    /// HTTP client with the probe timeout applied
    client: Client,

    /// Scheme prepended to target identifiers
    scheme: String,

    /// Request method
    method: ProbeMethod,

    /// Response predicate
    rule: LivenessRule,
}

impl HttpProber {
    /// Create a prober from configuration
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::InvalidConfig` for an unusable scheme, timeout or
    /// rule, and `ProbeError::Client` if the HTTP client cannot be created.
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        if config.default_scheme != "http" && config.default_scheme != "https" {
            return Err(ProbeError::InvalidConfig(format!(
                "default_scheme must be http or https, got '{}'",
                config.default_scheme
            )));
        }

        if config.timeout_secs == 0 {
            return Err(ProbeError::InvalidConfig(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        config.rule.validate().map_err(ProbeError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            scheme: config.default_scheme.clone(),
            method: config.method,
            rule: config.rule.clone(),
        })
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &TargetId) -> bool {
        let url = target.probe_url(&self.scheme);

        match self
            .client
            .request(self.method.as_method(), &url)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let alive = self.rule.accepts(status);
                tracing::debug!(target_id = %target, status, alive, "Probe completed");
                alive
            }
            Err(e) if e.is_timeout() => {
                tracing::debug!(target_id = %target, "Probe timed out");
                false
            }
            Err(e) => {
                tracing::debug!(target_id = %target, error = %e, "Probe transport error");
                false
            }
        }
    }
}
