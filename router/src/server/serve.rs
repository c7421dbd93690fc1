//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::RouterError;
use crate::server::handlers::{
    generic_webhook_handler, health_handler, project_webhook_handler, status_handler,
    version_handler,
};
use crate::server::state::ServerState;

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Push notifications
        .route("/webhook", post(generic_webhook_handler))
        .route("/webhook/{project}", post(project_webhook_handler))
        // Health, status and version
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/version", get(version_handler))
        // State and middleware
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), RouterError>>, RouterError> {
    let app = build_router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RouterError::ServerError(format!("{addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| RouterError::ServerError(e.to_string()))
    });

    Ok(handle)
}
