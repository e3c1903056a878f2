//! Test doubles for the upstream broker and client sessions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{ClientId, ClientSession, Pattern, PatternMessage, UpstreamBroker};
use crate::error::GatewayError;

/// Builds a pattern, panicking on invalid input.
#[allow(clippy::panic)]
pub(crate) fn pattern(raw: &str) -> Pattern {
    let Ok(p) = Pattern::new(raw) else {
        panic!("invalid test pattern {raw:?}");
    };
    p
}

/// A recorded upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpstreamCall {
    Subscribe(Pattern),
    Unsubscribe(Pattern),
}

/// Broker that records every call in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingBroker {
    calls: Mutex<Vec<UpstreamCall>>,
    fail: bool,
    panic_on_unsubscribe: bool,
    unsubscribe_delay: Duration,
}

impl RecordingBroker {
    /// A broker that records calls and then rejects them.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A broker whose unsubscribe records the call and then panics.
    pub(crate) fn panicking_on_unsubscribe() -> Self {
        Self {
            panic_on_unsubscribe: true,
            ..Self::default()
        }
    }

    /// A broker whose unsubscribe blocks for `delay` before recording.
    pub(crate) fn slow_unsubscribe(delay: Duration) -> Self {
        Self {
            unsubscribe_delay: delay,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<UpstreamCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, UpstreamCall::Subscribe(_)))
            .count()
    }

    pub(crate) fn unsubscribe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, UpstreamCall::Unsubscribe(_)))
            .count()
    }

    fn record(&self, call: UpstreamCall) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.fail {
            return Err(GatewayError::Upstream("connection refused".to_string()));
        }
        Ok(())
    }
}

impl UpstreamBroker for RecordingBroker {
    fn pattern_subscribe(&self, pattern: &Pattern) -> Result<(), GatewayError> {
        self.record(UpstreamCall::Subscribe(pattern.clone()))
    }

    #[allow(clippy::panic)]
    fn pattern_unsubscribe(&self, pattern: &Pattern) -> Result<(), GatewayError> {
        if !self.unsubscribe_delay.is_zero() {
            std::thread::sleep(self.unsubscribe_delay);
        }
        let result = self.record(UpstreamCall::Unsubscribe(pattern.clone()));
        if self.panic_on_unsubscribe {
            panic!("upstream connection dropped during unsubscribe of {pattern}");
        }
        result
    }
}

/// Client that stores every message it is sent.
#[derive(Debug)]
pub(crate) struct RecordingClient {
    id: ClientId,
    received: Mutex<Vec<PatternMessage>>,
    closed: bool,
}

impl RecordingClient {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self {
            id: ClientId::new(),
            received: Mutex::new(Vec::new()),
            closed: false,
        })
    }

    /// A client whose transport is already closed.
    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            id: ClientId::new(),
            received: Mutex::new(Vec::new()),
            closed: true,
        })
    }

    pub(crate) fn clone_session(self: &Arc<Self>) -> Arc<dyn ClientSession> {
        Arc::<Self>::clone(self)
    }

    pub(crate) fn received(&self) -> Vec<PatternMessage> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientSession for RecordingClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send(&self, message: &PatternMessage) -> Result<(), GatewayError> {
        if self.closed {
            return Err(GatewayError::ClientClosed(self.id));
        }
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
