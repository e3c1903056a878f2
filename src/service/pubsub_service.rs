//! Pub/sub service: wires the registry to the upstream broker.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::{
    ClientId, ClientSession, LocalBroker, Pattern, SubscriptionRegistry, UpstreamBroker,
};
use crate::error::GatewayError;

/// Orchestration layer between the transport and the subscription core.
///
/// Owns the [`SubscriptionRegistry`] and the [`LocalBroker`] it issues
/// upstream calls to. Inbound broker messages reach the registry through
/// the dispatch loop started by [`PubSubService::spawn_dispatcher`].
#[derive(Debug, Clone)]
pub struct PubSubService {
    registry: Arc<SubscriptionRegistry>,
    broker: Arc<LocalBroker>,
}

impl PubSubService {
    /// Creates a new `PubSubService` with an empty registry.
    #[must_use]
    pub fn new(broker: Arc<LocalBroker>) -> Self {
        let upstream: Arc<dyn UpstreamBroker> = Arc::<LocalBroker>::clone(&broker);
        Self {
            registry: Arc::new(SubscriptionRegistry::new(upstream)),
            broker,
        }
    }

    /// Returns a reference to the inner [`SubscriptionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns a reference to the upstream [`LocalBroker`].
    #[must_use]
    pub fn broker(&self) -> &Arc<LocalBroker> {
        &self.broker
    }

    /// Binds `client` to `pattern`.
    ///
    /// Returns `true` if the binding is new, `false` for a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPattern`] if the upstream broker would
    /// reject the pattern.
    pub fn join(
        &self,
        pattern: &Pattern,
        client: Arc<dyn ClientSession>,
    ) -> Result<bool, GatewayError> {
        self.broker.validate(pattern)?;
        Ok(self.registry.join(pattern, client))
    }

    /// Unbinds `client` from `pattern`. Returns `true` if it was bound.
    pub fn leave(&self, pattern: &Pattern, client: ClientId) -> bool {
        self.registry.leave(pattern, client)
    }

    /// Publishes `payload` on `channel` through the upstream broker.
    ///
    /// Returns the number of subscribed patterns that matched.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `channel` is empty.
    pub fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, GatewayError> {
        if channel.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "channel must not be empty".to_string(),
            ));
        }
        Ok(self.broker.publish(channel, payload))
    }

    /// Starts the task forwarding inbound broker messages to
    /// [`SubscriptionRegistry::dispatch`].
    ///
    /// The receiver is created before this returns, so messages published
    /// afterwards are not missed.
    #[must_use]
    pub fn spawn_dispatcher(&self) -> JoinHandle<()> {
        let mut rx = self.broker.bus().subscribe();
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        registry.dispatch(&message);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "dispatcher lagged behind upstream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("dispatcher stopped");
        })
    }

    /// Unbinds every client from every pattern, releasing all upstream
    /// subscriptions. Returns the number of bindings removed.
    pub fn shutdown(&self) -> usize {
        let mut removed: usize = 0;
        for summary in self.registry.snapshot() {
            let Some(subscription) = self.registry.get(&summary.pattern) else {
                continue;
            };
            for client in subscription.client_ids() {
                if subscription.unbind_client(client) {
                    removed = removed.saturating_add(1);
                }
            }
        }
        tracing::info!(bindings = removed, "subscriptions released");
        removed
    }
}
