//! The upstream publish/subscribe backend the gateway multiplexes onto.
//!
//! [`UpstreamBroker`] is the seam: [`super::Subscription`] calls it exactly
//! once per 0→1 and 1→0 client transition. [`LocalBroker`] is an in-process
//! implementation with Redis `PSUBSCRIBE` glob semantics that feeds matched
//! messages into an [`EventBus`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use globset::{GlobBuilder, GlobMatcher};

use super::{EventBus, Pattern, PatternMessage};
use crate::error::GatewayError;

/// Pattern-based publish/subscribe primitives offered by the upstream broker.
///
/// Calls are fire-and-forget: implementations must return promptly (enqueue
/// or record) and must not block the caller.
pub trait UpstreamBroker: Send + Sync + fmt::Debug {
    /// Starts delivering messages for channels matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] or [`GatewayError::InvalidPattern`]
    /// when the broker rejects the call.
    fn pattern_subscribe(&self, pattern: &Pattern) -> Result<(), GatewayError>;

    /// Stops delivering messages for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the broker rejects the call.
    fn pattern_unsubscribe(&self, pattern: &Pattern) -> Result<(), GatewayError>;

    /// Checks that the broker would accept `pattern`, without subscribing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPattern`] if the pattern is malformed
    /// for this broker's dialect.
    fn validate(&self, _pattern: &Pattern) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// In-process broker with glob pattern matching.
///
/// `publish` matches a channel against every subscribed pattern and emits
/// one [`PatternMessage`] per match on the [`EventBus`].
pub struct LocalBroker {
    patterns: RwLock<HashMap<Pattern, GlobMatcher>>,
    bus: EventBus,
}

impl LocalBroker {
    /// Creates a broker delivering matched messages to `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Publishes `payload` on `channel`.
    ///
    /// Returns the number of subscribed patterns that matched.
    pub fn publish(&self, channel: &str, payload: Bytes) -> usize {
        let matched: Vec<Pattern> = {
            let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
            patterns
                .iter()
                .filter(|(_, matcher)| matcher.is_match(channel))
                .map(|(pattern, _)| pattern.clone())
                .collect()
        };

        for pattern in &matched {
            self.bus
                .publish(PatternMessage::new(pattern.clone(), channel, payload.clone()));
        }

        tracing::debug!(channel, matched = matched.len(), "published upstream");
        matched.len()
    }

    /// Returns the patterns currently subscribed, sorted.
    #[must_use]
    pub fn subscribed_patterns(&self) -> Vec<Pattern> {
        let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<Pattern> = patterns.keys().cloned().collect();
        list.sort();
        list
    }

    /// Returns the underlying [`EventBus`].
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl fmt::Debug for LocalBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBroker")
            .field("patterns", &self.subscribed_patterns())
            .field("bus", &self.bus)
            .finish()
    }
}

impl UpstreamBroker for LocalBroker {
    fn pattern_subscribe(&self, pattern: &Pattern) -> Result<(), GatewayError> {
        let matcher = compile(pattern)?;
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.clone(), matcher);
        Ok(())
    }

    fn pattern_unsubscribe(&self, pattern: &Pattern) -> Result<(), GatewayError> {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(pattern);
        Ok(())
    }

    fn validate(&self, pattern: &Pattern) -> Result<(), GatewayError> {
        compile(pattern).map(|_| ())
    }
}

/// Compiles a Redis-style glob (`*`, `?`, `[...]`, `\` escapes).
fn compile(pattern: &Pattern) -> Result<GlobMatcher, GatewayError> {
    GlobBuilder::new(pattern.as_str())
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| GatewayError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> Pattern {
        let Ok(p) = Pattern::new(raw) else {
            panic!("valid pattern");
        };
        p
    }

    #[test]
    fn publish_without_patterns_matches_nothing() {
        let broker = LocalBroker::new(EventBus::new(16));
        assert_eq!(broker.publish("client:1", Bytes::from_static(b"x")), 0);
    }

    #[tokio::test]
    async fn glob_patterns_match_channels() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let broker = LocalBroker::new(bus);

        assert!(broker.pattern_subscribe(&pattern("client:*")).is_ok());
        assert!(broker.pattern_subscribe(&pattern("other:?")).is_ok());

        assert_eq!(broker.publish("client:testing", Bytes::from_static(b"x")), 1);
        assert_eq!(broker.publish("other:12", Bytes::from_static(b"x")), 0);

        let Ok(msg) = rx.recv().await else {
            panic!("expected message");
        };
        assert_eq!(msg.pattern, pattern("client:*"));
        assert_eq!(msg.channel, "client:testing");
    }

    #[test]
    fn overlapping_patterns_each_receive() {
        let broker = LocalBroker::new(EventBus::new(16));
        let _rx = broker.bus().subscribe();
        let _ = broker.pattern_subscribe(&pattern("a:*"));
        let _ = broker.pattern_subscribe(&pattern("a:b"));
        assert_eq!(broker.publish("a:b", Bytes::new()), 2);
    }

    #[test]
    fn unsubscribe_stops_matching() {
        let broker = LocalBroker::new(EventBus::new(16));
        let p = pattern("client:*");
        let _ = broker.pattern_subscribe(&p);
        assert_eq!(broker.subscribed_patterns(), vec![p.clone()]);

        assert!(broker.pattern_unsubscribe(&p).is_ok());
        assert!(broker.subscribed_patterns().is_empty());
        assert_eq!(broker.publish("client:1", Bytes::new()), 0);
    }

    #[test]
    fn malformed_glob_is_rejected() {
        let broker = LocalBroker::new(EventBus::new(16));
        let bad = pattern("client:[");
        assert!(matches!(
            broker.validate(&bad),
            Err(GatewayError::InvalidPattern(_))
        ));
        assert!(broker.pattern_subscribe(&bad).is_err());
    }
}
