//! Subscription inspection handlers: list, get.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{SubscriptionDto, SubscriptionListResponse};
use crate::app_state::AppState;
use crate::domain::{Pattern, SubscriptionSummary};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /subscriptions` — List live pattern subscriptions.
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "Subscriptions",
    summary = "List subscriptions",
    description = "Returns every pattern with at least one bound client, sorted by pattern.",
    responses(
        (status = 200, description = "Subscription list", body = SubscriptionListResponse),
    )
)]
pub async fn list_subscriptions(State(state): State<AppState>) -> impl IntoResponse {
    let subscriptions: Vec<SubscriptionDto> = state
        .pubsub
        .registry()
        .snapshot()
        .into_iter()
        .map(SubscriptionDto::from)
        .collect();
    let total = subscriptions.len();
    (
        StatusCode::OK,
        Json(SubscriptionListResponse {
            subscriptions,
            total,
        }),
    )
}

/// `GET /subscriptions/{pattern}` — Inspect one pattern subscription.
///
/// # Errors
///
/// Returns [`GatewayError::PatternNotFound`] if no client is bound to the
/// pattern, or [`GatewayError::InvalidPattern`] for an empty pattern.
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/{pattern}",
    tag = "Subscriptions",
    summary = "Get subscription",
    description = "Returns status and client count for a single pattern.",
    params(("pattern" = String, Path, description = "Channel pattern (URL-encoded)")),
    responses(
        (status = 200, description = "Subscription found", body = SubscriptionDto),
        (status = 404, description = "No subscription for pattern", body = ErrorResponse),
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let pattern = Pattern::new(&raw)?;
    let subscription = state
        .pubsub
        .registry()
        .get(&pattern)
        .filter(|sub| !sub.is_retired())
        .ok_or_else(|| GatewayError::PatternNotFound(raw.clone()))?;

    let dto = SubscriptionDto::from(SubscriptionSummary::from(subscription.as_ref()));
    Ok((StatusCode::OK, Json(dto)))
}

/// Subscription routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_subscriptions))
        .route("/subscriptions/{*pattern}", get(get_subscription))
}
