//! [`ClientSession`] backed by a WebSocket connection's outbound queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::messages::ServerFrame;
use crate::domain::{ClientId, ClientSession, PatternMessage};
use crate::error::GatewayError;

/// One WebSocket connection as seen by the subscription core.
///
/// `send` only enqueues: the connection loop owns the socket and drains the
/// queue, so fan-out never waits on the network.
#[derive(Debug)]
pub struct WsSession {
    id: ClientId,
    outbound: mpsc::Sender<ServerFrame>,
}

impl WsSession {
    /// Creates a session with a fresh [`ClientId`] and returns it with the
    /// receiving end of its outbound queue.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let session = Self {
            id: ClientId::new(),
            outbound,
        };
        (session, rx)
    }
}

impl ClientSession for WsSession {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send(&self, message: &PatternMessage) -> Result<(), GatewayError> {
        self.outbound
            .try_send(ServerFrame::from(message))
            .map_err(|e| match e {
                TrySendError::Full(_) => GatewayError::ClientLagged(self.id),
                TrySendError::Closed(_) => GatewayError::ClientClosed(self.id),
            })
    }
}
