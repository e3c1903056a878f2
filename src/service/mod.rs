//! Service layer: orchestration between transport and domain.
//!
//! [`PubSubService`] owns the subscription registry and the upstream
//! broker, and runs the loop dispatching inbound messages to clients.

pub mod pubsub_service;

pub use pubsub_service::PubSubService;
