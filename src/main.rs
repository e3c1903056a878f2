//! pattern-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pattern_gateway::app_state::AppState;
use pattern_gateway::build_app;
use pattern_gateway::config::{GatewayConfig, LogFormat};
use pattern_gateway::domain::{EventBus, LocalBroker};
use pattern_gateway::service::PubSubService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting pattern-gateway");

    // Build domain layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let broker = Arc::new(LocalBroker::new(event_bus));

    // Build service layer
    let pubsub = Arc::new(PubSubService::new(broker));
    let dispatcher = pubsub.spawn_dispatcher();

    // Build application state
    let app_state = AppState {
        pubsub: Arc::clone(&pubsub),
        client_queue_capacity: config.client_queue_capacity,
    };

    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.abort();
    pubsub.shutdown();
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
