//! REST API layer: route handlers, DTOs, router composition, OpenAPI.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` and the
//! OpenAPI document live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "pattern-gateway",
        description = "Pattern subscription gateway: WebSocket fan-out over a single upstream pub/sub connection"
    ),
    paths(
        handlers::system::health_handler,
        handlers::subscription::list_subscriptions,
        handlers::subscription::get_subscription,
        handlers::publish::publish,
    ),
    components(schemas(
        handlers::system::HealthResponse,
        dto::SubscriptionDto,
        dto::SubscriptionListResponse,
        dto::PublishRequest,
        dto::PublishResponse,
        crate::ws::messages::PayloadEncoding,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Subscriptions", description = "Pattern subscription registry"),
        (name = "Publish", description = "Message injection into the upstream broker"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .merge(docs_router())
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
