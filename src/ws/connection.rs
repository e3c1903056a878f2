//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching subscribe/unsubscribe commands and forwarding fanned-out
//! messages from the connection's outbound queue.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;

use super::messages::{ClientFrame, ServerFrame};
use super::session::WsSession;
use super::subscription::JoinedPatterns;
use crate::domain::{ClientSession, Pattern};
use crate::error::GatewayError;
use crate::service::PubSubService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and acknowledges each one.
/// - Forwards frames queued by [`WsSession::send`] to the client.
/// - Leaves every joined pattern once the connection ends.
pub async fn run_connection(socket: WebSocket, pubsub: Arc<PubSubService>, queue_capacity: usize) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (session, mut outbound) = WsSession::new(queue_capacity);
    let session: Arc<dyn ClientSession> = Arc::new(session);
    let client_id = session.id();
    let mut joined = JoinedPatterns::new();

    tracing::debug!(%client_id, "ws connection opened");

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &pubsub, &session, &mut joined);
                        if send_frame(&mut ws_tx, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerFrame::from(&GatewayError::InvalidRequest(
                            "binary frames are not supported".to_string(),
                        ));
                        if send_frame(&mut ws_tx, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            // Frame fanned out by a subscription
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    let patterns = joined.drain();
    for pattern in &patterns {
        pubsub.leave(pattern, client_id);
    }
    tracing::debug!(%client_id, left = patterns.len(), "ws connection closed");
}

async fn send_frame<S>(ws_tx: &mut S, frame: &ServerFrame) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let Ok(json) = serde_json::to_string(frame) else {
        return Ok(());
    };
    ws_tx.send(Message::text(json)).await
}

/// Handles a text frame from the client, returning the reply frame.
///
/// Invalid JSON is answered with code 400, an unknown `action` with 404 and
/// a known action with missing or mistyped fields with
/// [`GatewayError::InvalidRequest`].
fn handle_text_message(
    text: &str,
    pubsub: &PubSubService,
    session: &Arc<dyn ClientSession>,
    joined: &mut JoinedPatterns,
) -> ServerFrame {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return ServerFrame::error(400, "malformed JSON");
    };
    let frame = match ClientFrame::deserialize(&value) {
        Ok(frame) => frame,
        Err(e) => {
            let known = value
                .get("action")
                .and_then(serde_json::Value::as_str)
                .is_some_and(ClientFrame::is_known_action);
            if !known {
                return ServerFrame::error(404, "unknown action");
            }
            return ServerFrame::from(&GatewayError::InvalidRequest(e.to_string()));
        }
    };

    match frame {
        ClientFrame::Subscribe { pattern } => {
            let result = Pattern::new(&pattern)
                .and_then(|p| pubsub.join(&p, Arc::clone(session)).map(|status| (p, status)));
            match result {
                Ok((p, status)) => {
                    joined.insert(p);
                    ServerFrame::Subscribe { pattern, status }
                }
                Err(e) => ServerFrame::from(&e),
            }
        }
        ClientFrame::Unsubscribe { pattern } => match Pattern::new(&pattern) {
            Ok(p) => {
                let status = pubsub.leave(&p, session.id());
                joined.remove(&p);
                ServerFrame::Unsubscribe { pattern, status }
            }
            Err(e) => ServerFrame::from(&e),
        },
    }
}
