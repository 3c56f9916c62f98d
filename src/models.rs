//! Core data structures for the watchdog
//!
//! This module defines the identifiers, the two persisted record types
//! and the value types exchanged between the registry, the reconciler
//! and the notification layer.
//!
//! # Records
//!
//! - [`TargetRecord`] - one monitored endpoint, its liveness flag and its watchers
//! - [`SubscriberRecord`] - one subscriber and the targets it watches
//!
//! Both records are only ever mutated through [`crate::registry::Registry`],
//! which keeps them consistent with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors produced while parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Target input was empty after normalization
    #[error("Target is empty")]
    EmptyTarget,

    /// Target input could not be turned into a probeable address
    #[error("Invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    /// Subscriber identifier was empty
    #[error("Subscriber identifier is empty")]
    EmptySubscriber,
}

// ============================================================================
// Identifiers
// ============================================================================

/// Normalized identity of a monitored endpoint
///
/// The scheme is stripped so that `http://host/path` and `https://host/path`
/// refer to the same target. The authority is lowercased and trailing
/// slashes are removed from the path; query and fragment are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Parse and normalize raw user input into a target identifier
    ///
    /// Normalizing an already normalized identifier returns it unchanged.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let trimmed = raw.trim();

        // A scheme can only precede the first path, query or fragment delimiter
        let without_scheme = match trimmed.split_once("://") {
            Some((scheme, rest)) if !scheme.contains(['/', '?', '#']) => {
                if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
                    return Err(IdError::InvalidTarget {
                        input: raw.to_string(),
                        reason: format!("unsupported scheme '{scheme}'"),
                    });
                }
                rest
            }
            _ => trimmed,
        };

        let authority_end = without_scheme
            .find(['/', '?', '#'])
            .unwrap_or(without_scheme.len());
        let (authority, rest) = without_scheme.split_at(authority_end);

        // Trailing slashes are trimmed from the path only; query and fragment stay verbatim
        let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
        let (path, suffix) = rest.split_at(path_end);
        let path = path.trim_end_matches('/');

        if authority.is_empty() {
            if path.is_empty() && suffix.is_empty() {
                return Err(IdError::EmptyTarget);
            }
            return Err(IdError::InvalidTarget {
                input: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let normalized = format!("{}{path}{suffix}", authority.to_ascii_lowercase());

        let parsed = Url::parse(&format!("https://{normalized}")).map_err(|e| {
            IdError::InvalidTarget {
                input: raw.to_string(),
                reason: e.to_string(),
            }
        })?;

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(IdError::InvalidTarget {
                input: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self(normalized))
    }

    /// Rebuild an identifier from a key that was written from a normalized id
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the URL used to probe this target
    pub fn probe_url(&self, scheme: &str) -> String {
        format!("{scheme}://{}", self.0)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Identity of a notification recipient (a chat or channel handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Create a subscriber identifier from raw input
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdError::EmptySubscriber);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Rebuild an identifier from a stored key
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Liveness
// ============================================================================

/// Liveness state of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LivenessState {
    Online,
    Offline,
}

impl LivenessState {
    /// Map a stored or observed flag to a state
    pub fn from_flag(is_online: bool) -> Self {
        if is_online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An edge between two consecutive observations of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// OFFLINE -> ONLINE
    CameOnline,
    /// ONLINE -> OFFLINE
    WentOffline,
}

impl Transition {
    /// Detect the edge between a stored flag and a fresh observation
    ///
    /// Returns `None` when nothing changed.
    pub fn between(was_online: bool, is_online: bool) -> Option<Self> {
        match (was_online, is_online) {
            (false, true) => Some(Self::CameOnline),
            (true, false) => Some(Self::WentOffline),
            _ => None,
        }
    }

    /// State before the edge
    pub fn from_state(&self) -> LivenessState {
        match self {
            Self::CameOnline => LivenessState::Offline,
            Self::WentOffline => LivenessState::Online,
        }
    }

    /// State after the edge
    pub fn to_state(&self) -> LivenessState {
        match self {
            Self::CameOnline => LivenessState::Online,
            Self::WentOffline => LivenessState::Offline,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.from_state(), self.to_state())
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// Last-known state of a monitored target and the subscribers watching it
///
/// A record with an empty subscriber set is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Target identifier
    pub id: TargetId,

    /// Liveness flag, written only by the reconciler after creation
    pub is_online: bool,

    /// Subscribers watching this target
    pub subscribers: BTreeSet<SubscriberId>,

    /// When the target was first registered
    pub created_at: DateTime<Utc>,

    /// When the liveness flag last flipped
    #[serde(default)]
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl TargetRecord {
    /// Create a new record; registration requires a successful probe,
    /// so every target starts online
    pub fn new(id: TargetId) -> Self {
        Self {
            id,
            is_online: true,
            subscribers: BTreeSet::new(),
            created_at: Utc::now(),
            last_transition_at: None,
        }
    }

    /// Current liveness state
    pub fn state(&self) -> LivenessState {
        LivenessState::from_flag(self.is_online)
    }
}

/// A subscriber and the targets it watches, keyed by target with the display name as value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    /// Subscriber identifier
    pub id: SubscriberId,

    /// Watched targets and their display names
    pub watches: BTreeMap<TargetId, String>,

    /// When the subscriber first registered a target
    pub created_at: DateTime<Utc>,
}

impl SubscriberRecord {
    /// Create a subscriber with no watches
    pub fn new(id: SubscriberId) -> Self {
        Self {
            id,
            watches: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Check whether this subscriber watches the given target
    pub fn is_watching(&self, target: &TargetId) -> bool {
        self.watches.contains_key(target)
    }
}

// ============================================================================
// Read Models
// ============================================================================

/// One row of a subscriber's watch list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStatus {
    pub target_id: TargetId,
    pub display_name: String,
    pub is_online: bool,
}

impl WatchStatus {
    /// Liveness state for display
    pub fn state(&self) -> LivenessState {
        LivenessState::from_flag(self.is_online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_stripped() {
        let http = TargetId::parse("http://example.com/bot").unwrap();
        let https = TargetId::parse("https://example.com/bot").unwrap();
        let bare = TargetId::parse("example.com/bot").unwrap();

        assert_eq!(http, https);
        assert_eq!(https, bare);
        assert_eq!(bare.as_str(), "example.com/bot");
    }

    #[test]
    fn test_normalization() {
        let id = TargetId::parse("  HTTPS://Example.COM/Bot/Hook/  ").unwrap();
        assert_eq!(id.as_str(), "example.com/Bot/Hook");

        let with_port = TargetId::parse("example.com:8443/webhook?token=x").unwrap();
        assert_eq!(with_port.as_str(), "example.com:8443/webhook?token=x");
    }

    #[test]
    fn test_url_in_query_is_not_a_scheme() {
        let id = TargetId::parse("https://hooks.example.com/cb?next=https://x.example.com").unwrap();
        assert_eq!(id.as_str(), "hooks.example.com/cb?next=https://x.example.com");

        let bare = TargetId::parse("example.com/cb?u=https://x").unwrap();
        assert_eq!(bare.as_str(), "example.com/cb?u=https://x");

        let in_path = TargetId::parse("example.com/redirect/https://x").unwrap();
        assert_eq!(in_path.as_str(), "example.com/redirect/https://x");
    }

    #[test]
    fn test_trailing_slashes_only_trimmed_from_path() {
        assert_eq!(
            TargetId::parse("example.com/search?q=/").unwrap().as_str(),
            "example.com/search?q=/"
        );
        assert_eq!(
            TargetId::parse("example.com/page/#top/").unwrap().as_str(),
            "example.com/page#top/"
        );
        assert_eq!(
            TargetId::parse("https://example.com/?a=1").unwrap().as_str(),
            "example.com?a=1"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "  HTTPS://Example.COM/Bot/Hook/  ",
            "https://hooks.example.com/cb?next=https://x.example.com",
            "example.com/cb?u=https://x",
            "http://example.com:8443/webhook?token=x#frag/",
            "example.com/search?q=/",
            "example.com/a//b//",
        ];

        for raw in inputs {
            let once = TargetId::parse(raw).unwrap();
            let twice = TargetId::parse(once.as_str()).unwrap();
            assert_eq!(once, twice, "input {raw}");
        }
    }

    #[test]
    fn test_invalid_targets() {
        assert_eq!(TargetId::parse(""), Err(IdError::EmptyTarget));
        assert_eq!(TargetId::parse("https://"), Err(IdError::EmptyTarget));
        assert_eq!(TargetId::parse("   /// "), Err(IdError::EmptyTarget));
        assert!(matches!(
            TargetId::parse("ftp://example.com"),
            Err(IdError::InvalidTarget { .. })
        ));
        assert!(matches!(
            TargetId::parse("exa mple.com"),
            Err(IdError::InvalidTarget { .. })
        ));
        assert!(matches!(
            TargetId::parse("/health?x=1"),
            Err(IdError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_probe_url() {
        let id = TargetId::parse("https://example.com/health").unwrap();
        assert_eq!(id.probe_url("https"), "https://example.com/health");
        assert_eq!(id.probe_url("http"), "http://example.com/health");
    }

    #[test]
    fn test_subscriber_id() {
        assert_eq!(SubscriberId::new(" -100123 ").unwrap().as_str(), "-100123");
        assert_eq!(SubscriberId::new("  "), Err(IdError::EmptySubscriber));
    }

    #[test]
    fn test_transition_detection() {
        assert_eq!(Transition::between(true, true), None);
        assert_eq!(Transition::between(false, false), None);
        assert_eq!(Transition::between(false, true), Some(Transition::CameOnline));
        assert_eq!(Transition::between(true, false), Some(Transition::WentOffline));
    }

    #[test]
    fn test_transition_display() {
        assert_eq!(Transition::CameOnline.to_string(), "OFFLINE→ONLINE");
        assert_eq!(Transition::WentOffline.to_string(), "ONLINE→OFFLINE");
    }

    #[test]
    fn test_new_target_starts_online() {
        let record = TargetRecord::new(TargetId::parse("example.com").unwrap());
        assert!(record.is_online);
        assert_eq!(record.state(), LivenessState::Online);
        assert!(record.subscribers.is_empty());
        assert!(record.last_transition_at.is_none());
    }

    #[test]
    fn test_record_serialization() {
        let target = TargetId::parse("example.com/hook").unwrap();
        let mut record = SubscriberRecord::new(SubscriberId::new("42").unwrap());
        record.watches.insert(target.clone(), "My Bot".to_string());

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"example.com/hook\":\"My Bot\""));

        let restored: SubscriberRecord = serde_json::from_str(&json).unwrap();
        assert!(restored.is_watching(&target));
    }
}
