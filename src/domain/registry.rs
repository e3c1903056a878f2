//! Process-wide pattern → subscription map.
//!
//! [`SubscriptionRegistry`] is the single authority on which patterns have a
//! live [`Subscription`]. It creates one lazily on the first `join` and
//! drops it as soon as the last client leaves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::subscription::{Binding, SubscriptionStatus};
use super::{ClientId, ClientSession, Pattern, PatternMessage, Subscription, UpstreamBroker};

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    /// Subscribed pattern.
    pub pattern: Pattern,
    /// Upstream status.
    pub status: SubscriptionStatus,
    /// Number of bound clients.
    pub clients: usize,
}

impl From<&Subscription> for SubscriptionSummary {
    fn from(sub: &Subscription) -> Self {
        Self {
            pattern: sub.pattern().clone(),
            status: sub.status(),
            clients: sub.client_count(),
        }
    }
}

/// Owner of every [`Subscription`], keyed by pattern.
///
/// # Concurrency
///
/// - The map is guarded by one mutex; `get_or_create` and `remove` are
///   atomic with respect to each other.
/// - The map lock is never held while a subscription issues an upstream
///   call or fans out a message. It may be held while reading a
///   subscription's state, never the other way round.
/// - A subscription that lost its last client stays in the map only until
///   its upstream unsubscribe has returned or unwound. `join` blocks until
///   it is gone and then creates a fresh one, so upstream calls for a
///   pattern always alternate subscribe/unsubscribe.
/// - Retired entries are invisible to `len`, `is_empty` and `snapshot`.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<Pattern, Arc<Subscription>>>,
    upstream: Arc<dyn UpstreamBroker>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry issuing upstream calls to `upstream`.
    #[must_use]
    pub fn new(upstream: Arc<dyn UpstreamBroker>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            upstream,
        }
    }

    /// Returns the subscription for `pattern`, creating an unsubscribed,
    /// empty one if none exists.
    pub fn get_or_create(self: &Arc<Self>, pattern: &Pattern) -> Arc<Subscription> {
        let mut entries = self.lock();
        let entry = entries.entry(pattern.clone()).or_insert_with(|| {
            tracing::debug!(%pattern, "subscription created");
            Arc::new(Subscription::new(
                pattern.clone(),
                Arc::clone(&self.upstream),
                Arc::downgrade(self),
            ))
        });
        Arc::clone(entry)
    }

    /// Returns the subscription for `pattern`, if any.
    #[must_use]
    pub fn get(&self, pattern: &Pattern) -> Option<Arc<Subscription>> {
        self.lock().get(pattern).cloned()
    }

    /// Deletes the entry for `pattern`. Returns `false` if there was none.
    ///
    /// Bound clients are not unbound; the last [`Subscription::unbind_client`]
    /// removes the entry on its own.
    pub fn remove(&self, pattern: &Pattern) -> bool {
        let removed = self.lock().remove(pattern).is_some();
        if removed {
            tracing::debug!(%pattern, "subscription removed");
        }
        removed
    }

    /// Deletes the entry for `pattern` only if it is `subscription` itself.
    pub(crate) fn remove_instance(&self, pattern: &Pattern, subscription: &Subscription) -> bool {
        let mut entries = self.lock();
        let same = entries
            .get(pattern)
            .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), subscription));
        if same {
            entries.remove(pattern);
            tracing::debug!(%pattern, "subscription removed");
        }
        same
    }

    /// Routes an upstream message to the subscription for its pattern.
    ///
    /// Messages for unknown patterns are dropped: they can arrive after the
    /// last client left. Returns the number of clients reached.
    pub fn dispatch(&self, message: &PatternMessage) -> usize {
        let Some(subscription) = self.get(&message.pattern) else {
            tracing::debug!(pattern = %message.pattern, "no subscription; message dropped");
            return 0;
        };
        subscription.on_message(message)
    }

    /// Binds `client` to `pattern`.
    ///
    /// Returns `true` if the client was newly bound, `false` if it already
    /// was.
    pub fn join(self: &Arc<Self>, pattern: &Pattern, client: Arc<dyn ClientSession>) -> bool {
        loop {
            let subscription = self.get_or_create(pattern);
            match subscription.bind_client(Arc::clone(&client)) {
                Binding::Added => return true,
                Binding::AlreadyBound => return false,
                Binding::Retired => subscription.wait_removed(),
            }
        }
    }

    /// Unbinds `client` from `pattern`.
    ///
    /// Returns `true` if the client was bound, `false` otherwise.
    pub fn leave(&self, pattern: &Pattern, client: ClientId) -> bool {
        self.get(pattern)
            .is_some_and(|subscription| subscription.unbind_client(client))
    }

    /// Returns summaries of every live subscription, sorted by pattern.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionSummary> {
        let subscriptions: Vec<Arc<Subscription>> = self.lock().values().cloned().collect();
        let mut summaries: Vec<SubscriptionSummary> = subscriptions
            .iter()
            .filter(|sub| !sub.is_retired())
            .map(|sub| SubscriptionSummary::from(sub.as_ref()))
            .collect();
        summaries.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        summaries
    }

    /// Returns the number of live (non-retired) subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().values().filter(|sub| !sub.is_retired()).count()
    }

    /// Returns `true` if the registry holds no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().values().all(|sub| sub.is_retired())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Pattern, Arc<Subscription>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
