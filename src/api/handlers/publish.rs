//! Publish handler: injects a message into the upstream broker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishRequest, PublishResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /publish` — Publish a message on a channel.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the channel is empty or a
/// base64 payload does not decode.
#[utoipa::path(
    post,
    path = "/api/v1/publish",
    tag = "Publish",
    summary = "Publish a message",
    description = "Publishes the payload on the given channel. Every subscribed pattern matching the channel delivers it to its bound WebSocket clients.",
    request_body = PublishRequest,
    responses(
        (status = 202, description = "Message accepted", body = PublishResponse),
        (status = 400, description = "Invalid channel or payload", body = ErrorResponse),
    )
)]
pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let payload = req.encoding.decode(req.payload)?;
    let matched_patterns = state.pubsub.publish(&req.channel, payload)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            channel: req.channel,
            matched_patterns,
        }),
    ))
}

/// Publish routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/publish", post(publish))
}
