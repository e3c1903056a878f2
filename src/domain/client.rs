//! The client-facing side of a subscription: anything that can receive
//! fanned-out messages.

use std::fmt;

use super::{ClientId, PatternMessage};
use crate::error::GatewayError;

/// A connected client that can be bound to a [`super::Subscription`].
///
/// Membership is decided by [`ClientSession::id`], never by value, so two
/// handles to the same session are the same client.
pub trait ClientSession: Send + Sync + fmt::Debug {
    /// Stable identity of this session.
    fn id(&self) -> ClientId;

    /// Delivers a message to the client.
    ///
    /// Must not block. Delivery is best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientClosed`] when the transport is gone and
    /// [`GatewayError::ClientLagged`] when the client cannot keep up.
    fn send(&self, message: &PatternMessage) -> Result<(), GatewayError>;
}
