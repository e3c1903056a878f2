//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::PubSubService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pub/sub service owning the subscription registry.
    pub pubsub: Arc<PubSubService>,
    /// Outbound frame queue capacity for each WebSocket connection.
    pub client_queue_capacity: usize,
}
