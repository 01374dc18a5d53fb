//! HTTP Gateway
//!
//! Thin axum surface over [`RegistryCoordinator`](crate::registry::RegistryCoordinator).

pub mod handlers;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the registry router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        // Projects
        .route("/api/v1/projects", post(handlers::register_project))
        .route("/api/v1/projects/{project_id}", get(handlers::get_project))
        .route(
            "/api/v1/projects/{project_id}/batches",
            get(handlers::list_batches),
        )
        .route(
            "/api/v1/projects/{project_id}/issue",
            post(handlers::issue_credits),
        )
        .route(
            "/api/v1/projects/{project_id}/purchase",
            post(handlers::purchase_credits),
        )
        .route(
            "/api/v1/projects/{project_id}/retire",
            post(handlers::retire_credits),
        )
        .route(
            "/api/v1/projects/{project_id}/price",
            put(handlers::update_price),
        )
        .route(
            "/api/v1/projects/{project_id}/status",
            put(handlers::set_project_status),
        )
        .route(
            "/api/v1/projects/{project_id}/verify",
            get(handlers::verify_project),
        )
        // Holdings and ledger
        .route(
            "/api/v1/holdings/{buyer_id}/{project_id}",
            get(handlers::get_holding),
        )
        .route("/api/v1/ledger", get(handlers::list_ledger))
        .with_state(state)
}

/// Serve the gateway until `shutdown` resolves
pub async fn run_server(
    config: &GatewayConfig,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {} (port {} may already be in use): {}",
            addr,
            config.port,
            e
        )
    })?;

    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
