//! Inbound messages delivered by the upstream broker.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::Pattern;

/// A message the upstream broker delivered because `channel` matched a
/// subscribed `pattern`.
///
/// Cloning is cheap: the pattern is an `Arc<str>` and the payload is
/// reference-counted [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMessage {
    /// The subscribed pattern that matched.
    pub pattern: Pattern,
    /// The concrete channel the message was published to.
    pub channel: String,
    /// Opaque message body.
    pub payload: Bytes,
    /// When the gateway received the message from upstream.
    pub received_at: DateTime<Utc>,
}

impl PatternMessage {
    /// Creates a message stamped with the current time.
    #[must_use]
    pub fn new(pattern: Pattern, channel: impl Into<String>, payload: Bytes) -> Self {
        Self {
            pattern,
            channel: channel.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}
