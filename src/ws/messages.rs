//! WebSocket frame types: client commands and server replies.
//!
//! Frames are JSON objects discriminated by `action`:
//!
//! ```json
//! {"action": "subscribe", "pattern": "client:testing"}
//! {"action": "subscribe", "pattern": "client:testing", "status": true}
//! ```
//!
//! Message payloads are carried as text when they are valid UTF-8 and as
//! standard base64 otherwise; `encoding` says which.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PatternMessage;
use crate::error::GatewayError;

/// How a `payload` string encodes the message bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// The payload is the message text itself.
    #[default]
    Utf8,
    /// The payload is the standard base64 encoding of arbitrary bytes.
    Base64,
}

impl PayloadEncoding {
    /// Encodes `bytes` as text if possible, base64 otherwise.
    #[must_use]
    pub fn encode(bytes: &[u8]) -> (String, Self) {
        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_owned(), Self::Utf8),
            Err(_) => (STANDARD.encode(bytes), Self::Base64),
        }
    }

    /// Decodes `payload` according to this encoding.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if a base64 payload does not
    /// decode.
    pub fn decode(self, payload: String) -> Result<Bytes, GatewayError> {
        match self {
            Self::Utf8 => Ok(Bytes::from(payload)),
            Self::Base64 => STANDARD
                .decode(payload)
                .map(Bytes::from)
                .map_err(|e| GatewayError::InvalidRequest(format!("invalid base64 payload: {e}"))),
        }
    }
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Bind this connection to a pattern.
    Subscribe {
        /// Channel pattern, e.g. `"client:*"`.
        pattern: String,
    },
    /// Unbind this connection from a pattern.
    Unsubscribe {
        /// Channel pattern previously subscribed.
        pattern: String,
    },
}

impl ClientFrame {
    /// Every `action` a client may send.
    pub const ACTIONS: [&'static str; 2] = ["subscribe", "unsubscribe"];

    /// Returns `true` if `action` names a client command.
    #[must_use]
    pub fn is_known_action(action: &str) -> bool {
        Self::ACTIONS.contains(&action)
    }
}

/// Frames the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges a subscribe command.
    Subscribe {
        /// Pattern from the command.
        pattern: String,
        /// `true` if the connection was newly bound.
        status: bool,
    },
    /// Acknowledges an unsubscribe command.
    Unsubscribe {
        /// Pattern from the command.
        pattern: String,
        /// `true` if the connection was bound and has been unbound.
        status: bool,
    },
    /// A message delivered for a subscribed pattern.
    Message {
        /// The subscribed pattern that matched.
        pattern: String,
        /// The channel the message was published to.
        channel: String,
        /// Message body, encoded as `encoding` says.
        payload: String,
        /// Encoding of `payload`.
        encoding: PayloadEncoding,
        /// When the gateway received the message.
        timestamp: DateTime<Utc>,
    },
    /// A command could not be processed.
    Error {
        /// Numeric error code.
        code: u32,
        /// Human-readable message.
        message: String,
    },
}

impl ServerFrame {
    /// Builds an error frame.
    #[must_use]
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<&PatternMessage> for ServerFrame {
    fn from(message: &PatternMessage) -> Self {
        let (payload, encoding) = PayloadEncoding::encode(&message.payload);
        Self::Message {
            pattern: message.pattern.to_string(),
            channel: message.channel.clone(),
            payload,
            encoding,
            timestamp: message.received_at,
        }
    }
}

impl From<&GatewayError> for ServerFrame {
    fn from(err: &GatewayError) -> Self {
        Self::error(err.error_code(), err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_command() {
        let frame: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"action":"subscribe","pattern":"client:testing"}"#);
        assert_eq!(
            frame.ok(),
            Some(ClientFrame::Subscribe {
                pattern: "client:testing".to_string()
            })
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let frame: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"action":"publish","pattern":"x"}"#);
        assert!(frame.is_err());
    }

    #[test]
    fn ack_matches_wire_shape() {
        let frame = ServerFrame::Subscribe {
            pattern: "client:testing".to_string(),
            status: true,
        };
        let Ok(value) = serde_json::to_value(&frame) else {
            panic!("serialization failed");
        };
        assert_eq!(
            value,
            serde_json::json!({
                "action": "subscribe",
                "pattern": "client:testing",
                "status": true,
            })
        );
    }

    #[test]
    fn known_actions() {
        assert!(ClientFrame::is_known_action("subscribe"));
        assert!(ClientFrame::is_known_action("unsubscribe"));
        assert!(!ClientFrame::is_known_action("publish"));
    }

    #[test]
    fn binary_payload_survives_message_frame() {
        let Ok(pattern) = crate::domain::Pattern::new("bin:*") else {
            panic!("valid pattern");
        };
        let raw: &[u8] = &[0x00, 0xff, 0xfe, b'a'];
        let message = PatternMessage::new(pattern, "bin:1", Bytes::copy_from_slice(raw));

        let ServerFrame::Message {
            payload, encoding, ..
        } = ServerFrame::from(&message)
        else {
            panic!("expected message frame");
        };
        assert_eq!(encoding, PayloadEncoding::Base64);
        let Ok(decoded) = encoding.decode(payload) else {
            panic!("payload should decode");
        };
        assert_eq!(decoded.as_ref(), raw);
    }

    #[test]
    fn text_payload_stays_readable() {
        let Ok(pattern) = crate::domain::Pattern::new("client:*") else {
            panic!("valid pattern");
        };
        let message = PatternMessage::new(pattern, "client:1", Bytes::from_static(b"hello"));
        let Ok(value) = serde_json::to_value(ServerFrame::from(&message)) else {
            panic!("serialization failed");
        };
        assert_eq!(value["payload"], "hello");
        assert_eq!(value["encoding"], "utf8");
    }

    #[test]
    fn malformed_base64_is_invalid_request() {
        let Err(err) = PayloadEncoding::Base64.decode("not base64!".to_string()) else {
            panic!("expected decode failure");
        };
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn error_frame_carries_gateway_code() {
        let err = GatewayError::InvalidPattern("empty".to_string());
        let frame = ServerFrame::from(&err);
        assert_eq!(frame, ServerFrame::error(1002, "invalid pattern: empty"));
    }
}
