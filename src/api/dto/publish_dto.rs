//! Publish DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ws::messages::PayloadEncoding;

/// Request body for `POST /api/v1/publish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Concrete channel name, e.g. `"client:testing"`.
    pub channel: String,
    /// Message body, encoded as `encoding` says.
    #[serde(default)]
    pub payload: String,
    /// Encoding of `payload`; `utf8` when omitted.
    #[serde(default)]
    pub encoding: PayloadEncoding,
}

/// Response body for `POST /api/v1/publish`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Channel the message was published to.
    pub channel: String,
    /// Number of subscribed patterns that matched the channel.
    pub matched_patterns: usize,
}
