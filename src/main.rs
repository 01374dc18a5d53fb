//! Carbon Credit Registry service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │  Config  │───▶│ Logging  │───▶│    Store    │───▶│ Coordinator+Gateway │
//! │  (YAML)  │    │(tracing) │    │ (PG or RAM) │    │      (axum)         │
//! └──────────┘    └──────────┘    └─────────────┘    └─────────────────────┘
//! ```
//!
//! Usage: `carbon_registry [--env|-e <name>] [--port <port>]`

use std::sync::Arc;

use anyhow::Context;

use carbon_registry::config::AppConfig;
use carbon_registry::db::Database;
use carbon_registry::gateway::{self, state::AppState};
use carbon_registry::logging::init_logging;
use carbon_registry::registry::{
    BuyerDirectory, MemoryStore, OpenDirectory, PgBuyerDirectory, PgStore, RegistryCoordinator,
    RegistryStore,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

// ============================================================
// STORAGE
// ============================================================

async fn open_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn RegistryStore>, Arc<dyn BuyerDirectory>)> {
    match config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let store = PgStore::new(db.clone());
            store
                .init_schema()
                .await
                .context("Failed to initialize registry schema")?;
            tracing::info!("Using PostgreSQL registry store");
            Ok((Arc::new(store), Arc::new(PgBuyerDirectory::new(db))))
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory store (state is lost on exit)");
            Ok((Arc::new(MemoryStore::new()), Arc::new(OpenDirectory)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = init_logging(&app_config);

    tracing::info!(
        env = %env,
        build = env!("GIT_HASH"),
        "Starting carbon registry"
    );

    let (store, buyers) = open_store(&app_config).await?;
    let coordinator = Arc::new(RegistryCoordinator::new(
        store,
        buyers,
        app_config.registry.clone(),
    ));

    // Refuse to serve on top of corrupt state
    let failures = coordinator.audit_all().await?;
    if !failures.is_empty() {
        for (project_id, violation) in &failures {
            tracing::error!(project_id, %violation, "Startup audit failed");
        }
        coordinator.shutdown().await;
        anyhow::bail!(
            "{} project(s) violate registry invariants, refusing to start",
            failures.len()
        );
    }

    let state = Arc::new(AppState::new(coordinator.clone()));
    let served = gateway::run_server(&app_config.gateway, state, shutdown_signal()).await;

    coordinator.shutdown().await;
    served
}
