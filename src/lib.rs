//! # pattern-gateway
//!
//! WebSocket gateway that multiplexes many client interests in channel
//! patterns onto a single upstream publish/subscribe connection, and fans
//! inbound messages back out to the interested clients.
//!
//! The core is the pattern-subscription lifecycle: a registry of
//! per-pattern [`domain::Subscription`]s that reference-count client
//! bindings, issue upstream subscribe/unsubscribe exactly once per
//! transition, and remove themselves when their last client leaves.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler (ws/)          REST Handlers (api/)
//!     │
//!     ├── PubSubService (service/)
//!     │
//!     ├── SubscriptionRegistry ─┬─ Subscription (per pattern)
//!     │                         └─ ClientSession (per connection)
//!     │
//!     └── UpstreamBroker (LocalBroker) ──► EventBus ──► dispatch
//! ```

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

use app_state::AppState;
use ws::handler::ws_handler;

/// Builds the full HTTP application: REST routes, `/ws`, tracing and CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
