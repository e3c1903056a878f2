//! One pattern's upstream subscription and its bound clients.
//!
//! A [`Subscription`] reference-counts the clients interested in a pattern.
//! The first bound client triggers the upstream subscribe, the last unbound
//! client triggers the upstream unsubscribe and removes the subscription
//! from its [`SubscriptionRegistry`].
//!
//! # Locking
//!
//! Client membership, status and the retired flag share one mutex. Every
//! "check size, mutate, decide transition" step happens inside it; the
//! upstream call and client sends happen after it is released.
//!
//! A retired subscription is always removed from the registry, even when
//! the upstream unsubscribe panics. Threads waiting to rebind the pattern
//! block on a condition variable until that removal has happened.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;

use super::{
    ClientId, ClientSession, Pattern, PatternMessage, SubscriptionRegistry, UpstreamBroker,
};

/// Upstream status of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No upstream subscription is held. Initial state.
    Unsubscribed,
    /// The upstream broker has been asked to deliver this pattern.
    Subscribed,
}

/// Outcome of [`Subscription::bind_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The client was added.
    Added,
    /// The client was already bound; nothing changed.
    AlreadyBound,
    /// The subscription lost its last client and is being removed. The
    /// caller must fetch a fresh one from the registry.
    Retired,
}

#[derive(Debug)]
struct SubscriptionState {
    status: SubscriptionStatus,
    clients: Vec<Arc<dyn ClientSession>>,
    retired: bool,
    removed: bool,
}

impl SubscriptionState {
    fn position(&self, client: ClientId) -> Option<usize> {
        self.clients.iter().position(|c| c.id() == client)
    }

    /// Moves to `target`, returning `true` if the status changed.
    fn transition(&mut self, target: SubscriptionStatus) -> bool {
        if self.status == target {
            return false;
        }
        self.status = target;
        true
    }
}

/// Upstream subscription for a single pattern.
///
/// Owned by the [`SubscriptionRegistry`]; holds only a weak handle back to
/// it.
#[derive(Debug)]
pub struct Subscription {
    pattern: Pattern,
    state: Mutex<SubscriptionState>,
    released: Condvar,
    upstream: Arc<dyn UpstreamBroker>,
    registry: Weak<SubscriptionRegistry>,
}

impl Subscription {
    /// Creates an unsubscribed subscription with no clients.
    #[must_use]
    pub(crate) fn new(
        pattern: Pattern,
        upstream: Arc<dyn UpstreamBroker>,
        registry: Weak<SubscriptionRegistry>,
    ) -> Self {
        Self {
            pattern,
            state: Mutex::new(SubscriptionState {
                status: SubscriptionStatus::Unsubscribed,
                clients: Vec::new(),
                retired: false,
                removed: false,
            }),
            released: Condvar::new(),
            upstream,
            registry,
        }
    }

    /// The pattern this subscription serves.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Current upstream status.
    #[must_use]
    pub fn status(&self) -> SubscriptionStatus {
        self.lock().status
    }

    /// Number of bound clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Identities of the bound clients, in binding order.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.lock().clients.iter().map(|c| c.id()).collect()
    }

    /// Returns `true` once the last client has left.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }

    /// Ensures the upstream subscription is held. Idempotent.
    ///
    /// [`Self::bind_client`] makes this transition on the first client;
    /// calling it directly only forces the upstream state.
    pub fn subscribe(&self) -> &Self {
        let changed = self.lock().transition(SubscriptionStatus::Subscribed);
        if changed {
            self.notify_upstream(SubscriptionStatus::Subscribed);
        }
        self
    }

    /// Releases the upstream subscription. Idempotent.
    ///
    /// [`Self::unbind_client`] makes this transition on the last client.
    pub fn unsubscribe(&self) -> &Self {
        let changed = self.lock().transition(SubscriptionStatus::Unsubscribed);
        if changed {
            self.notify_upstream(SubscriptionStatus::Unsubscribed);
        }
        self
    }

    /// Binds `client` to this pattern.
    ///
    /// The first client moves the subscription to
    /// [`SubscriptionStatus::Subscribed`] and issues the upstream subscribe.
    /// Binding an already bound client is a no-op.
    pub fn bind_client(&self, client: Arc<dyn ClientSession>) -> Binding {
        let client_id = client.id();
        let subscribed = {
            let mut state = self.lock();
            if state.retired {
                return Binding::Retired;
            }
            if state.position(client_id).is_some() {
                return Binding::AlreadyBound;
            }
            state.clients.push(client);
            state.clients.len() == 1 && state.transition(SubscriptionStatus::Subscribed)
        };

        tracing::debug!(pattern = %self.pattern, %client_id, "client bound");
        if subscribed {
            self.notify_upstream(SubscriptionStatus::Subscribed);
        }
        Binding::Added
    }

    /// Unbinds `client` from this pattern.
    ///
    /// Returns `true` if the client was bound. Removing the last client
    /// issues the upstream unsubscribe and then removes this subscription
    /// from the registry; the subscription refuses further bindings.
    pub fn unbind_client(&self, client: ClientId) -> bool {
        let (emptied, unsubscribed) = {
            let mut state = self.lock();
            let Some(index) = state.position(client) else {
                return false;
            };
            state.clients.remove(index);
            if state.clients.is_empty() {
                state.retired = true;
                (true, state.transition(SubscriptionStatus::Unsubscribed))
            } else {
                (false, false)
            }
        };

        tracing::debug!(pattern = %self.pattern, client_id = %client, "client unbound");
        let _removal = if emptied { Some(RemoveOnDrop(self)) } else { None };
        if unsubscribed {
            self.notify_upstream(SubscriptionStatus::Unsubscribed);
        }
        true
    }

    /// Asks the owning registry to drop this subscription and wakes every
    /// thread blocked in [`Self::wait_removed`].
    ///
    /// Only called once the client list is empty.
    pub(crate) fn graceful_remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_instance(&self.pattern, self);
        }
        self.lock().removed = true;
        self.released.notify_all();
    }

    /// Blocks until a retired subscription has left the registry.
    ///
    /// Returns at once if the subscription is not retired. The wait lasts
    /// at most as long as the retiring thread's upstream unsubscribe.
    pub(crate) fn wait_removed(&self) {
        let mut state = self.lock();
        while state.retired && !state.removed {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Fans `message` out to every bound client, in binding order.
    ///
    /// A failed send is logged and skipped. Returns the number of clients
    /// that accepted the message.
    pub fn on_message(&self, message: &PatternMessage) -> usize {
        let clients = self.lock().clients.clone();

        let mut delivered: usize = 0;
        for client in &clients {
            match client.send(message) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        client_id = %client.id(),
                        error = %e,
                        "failed to deliver message"
                    );
                }
            }
        }
        delivered
    }

    fn notify_upstream(&self, status: SubscriptionStatus) {
        let result = match status {
            SubscriptionStatus::Subscribed => self.upstream.pattern_subscribe(&self.pattern),
            SubscriptionStatus::Unsubscribed => self.upstream.pattern_unsubscribe(&self.pattern),
        };
        match result {
            Ok(()) => tracing::info!(pattern = %self.pattern, ?status, "upstream updated"),
            Err(e) => {
                tracing::warn!(pattern = %self.pattern, ?status, error = %e, "upstream call failed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs [`Subscription::graceful_remove`] when dropped, including while
/// unwinding out of an upstream call.
struct RemoveOnDrop<'a>(&'a Subscription);

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        self.0.graceful_remove();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::domain::testing::{RecordingBroker, RecordingClient, UpstreamCall, pattern};

    fn detached(broker: &Arc<RecordingBroker>) -> Subscription {
        let upstream: Arc<dyn UpstreamBroker> = Arc::<RecordingBroker>::clone(broker);
        Subscription::new(pattern("p1"), upstream, Weak::new())
    }

    #[test]
    fn starts_unsubscribed_and_empty() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        assert_eq!(sub.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(sub.client_count(), 0);
        assert!(broker.calls().is_empty());
    }

    #[test]
    fn subscribe_is_idempotent() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);

        sub.subscribe().subscribe();
        assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        assert_eq!(broker.calls(), vec![UpstreamCall::Subscribe(pattern("p1"))]);
    }

    #[test]
    fn unsubscribe_moves_to_unsubscribed_once() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);

        sub.unsubscribe();
        assert!(broker.calls().is_empty());

        sub.subscribe().unsubscribe().unsubscribe();
        assert_eq!(sub.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(
            broker.calls(),
            vec![
                UpstreamCall::Subscribe(pattern("p1")),
                UpstreamCall::Unsubscribe(pattern("p1")),
            ]
        );
    }

    #[test]
    fn binding_same_client_twice_is_noop() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let client = RecordingClient::shared();

        assert_eq!(sub.bind_client(client.clone_session()), Binding::Added);
        assert_eq!(sub.bind_client(client.clone_session()), Binding::AlreadyBound);
        assert_eq!(sub.client_count(), 1);
        assert_eq!(broker.subscribe_count(), 1);
    }

    #[test]
    fn unbinding_unknown_client_is_noop() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let bound = RecordingClient::shared();
        sub.bind_client(bound.clone_session());

        assert!(!sub.unbind_client(ClientId::new()));
        assert_eq!(sub.client_count(), 1);
        assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        assert_eq!(broker.unsubscribe_count(), 0);
    }

    #[test]
    fn last_unbind_retires() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let client = RecordingClient::shared();

        sub.bind_client(client.clone_session());
        assert!(sub.unbind_client(client.id()));
        assert!(sub.is_retired());
        assert_eq!(sub.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(broker.unsubscribe_count(), 1);

        let again = RecordingClient::shared();
        assert_eq!(sub.bind_client(again.clone_session()), Binding::Retired);
        assert_eq!(broker.subscribe_count(), 1);
    }

    #[test]
    fn retired_subscription_is_released_after_unbind() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let client = RecordingClient::shared();

        sub.wait_removed();
        sub.bind_client(client.clone_session());
        sub.unbind_client(client.id());

        // returns immediately: removal ran before unbind_client returned
        sub.wait_removed();
        assert!(sub.is_retired());
    }

    #[test]
    fn panicking_unsubscribe_still_releases_waiters() {
        let broker = Arc::new(RecordingBroker::panicking_on_unsubscribe());
        let sub = detached(&broker);
        let client = RecordingClient::shared();
        sub.bind_client(client.clone_session());

        let unbound =
            std::panic::catch_unwind(AssertUnwindSafe(|| sub.unbind_client(client.id())));
        assert!(unbound.is_err());
        assert_eq!(broker.unsubscribe_count(), 1);

        sub.wait_removed();
        assert!(sub.is_retired());
    }

    #[test]
    fn status_tracks_membership() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let clients: Vec<_> = (0..4).map(|_| RecordingClient::shared()).collect();

        for client in &clients {
            sub.bind_client(client.clone_session());
            assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        }
        // remove out of insertion order
        for index in [2, 0, 3, 1] {
            let Some(client) = clients.get(index) else {
                panic!("client index in range");
            };
            sub.unbind_client(client.id());
            let expected = if sub.client_count() == 0 {
                SubscriptionStatus::Unsubscribed
            } else {
                SubscriptionStatus::Subscribed
            };
            assert_eq!(sub.status(), expected);
        }
        assert_eq!(broker.subscribe_count(), 1);
        assert_eq!(broker.unsubscribe_count(), 1);
    }

    #[test]
    fn fan_out_reaches_every_client_once() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let clients: Vec<_> = (0..3).map(|_| RecordingClient::shared()).collect();
        for client in &clients {
            sub.bind_client(client.clone_session());
        }

        let message = PatternMessage::new(pattern("p1"), "p1", Bytes::from_static(b"hello"));
        assert_eq!(sub.on_message(&message), 3);
        for client in &clients {
            assert_eq!(client.received(), vec![message.clone()]);
        }
    }

    #[test]
    fn failed_send_does_not_stop_fan_out() {
        let broker = Arc::new(RecordingBroker::default());
        let sub = detached(&broker);
        let a = RecordingClient::failing();
        let b = RecordingClient::shared();
        let c = RecordingClient::shared();
        for client in [&a, &b, &c] {
            sub.bind_client(client.clone_session());
        }

        let message = PatternMessage::new(pattern("p1"), "p1", Bytes::from_static(b"x"));
        assert_eq!(sub.on_message(&message), 2);
        assert!(a.received().is_empty());
        assert_eq!(b.received().len(), 1);
        assert_eq!(c.received().len(), 1);
    }

    #[test]
    fn upstream_failure_keeps_status() {
        let broker = Arc::new(RecordingBroker::failing());
        let sub = detached(&broker);
        let client = RecordingClient::shared();

        assert_eq!(sub.bind_client(client.clone_session()), Binding::Added);
        assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        assert_eq!(broker.subscribe_count(), 1);
    }
}
