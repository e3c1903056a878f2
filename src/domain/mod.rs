//! Domain layer: pattern subscriptions, the registry, and upstream plumbing.
//!
//! This module contains the subscription lifecycle core ([`Subscription`]
//! and [`SubscriptionRegistry`]), the identities it works with, the
//! [`UpstreamBroker`] seam with its in-process [`LocalBroker`], and the
//! [`EventBus`] carrying inbound messages to the dispatcher.

pub mod client;
pub mod event_bus;
pub mod message;
pub mod pattern;
pub mod registry;
pub mod subscription;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ClientSession;
pub use event_bus::EventBus;
pub use message::PatternMessage;
pub use pattern::{ClientId, Pattern};
pub use registry::{SubscriptionRegistry, SubscriptionSummary};
pub use subscription::{Binding, Subscription, SubscriptionStatus};
pub use upstream::{LocalBroker, UpstreamBroker};
