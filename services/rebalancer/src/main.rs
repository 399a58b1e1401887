//! Rebalancer service.
//!
//! Listens for container-instance state-change notifications and, when an
//! instance reconnects with no running or pending tasks, forces a new
//! deployment of every service in the target cluster so the scheduler can
//! spread tasks back onto it.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ecs_rebalancer::cluster::EcsClient;
use ecs_rebalancer::config::Config;
use ecs_rebalancer::rebalancer::Rebalancer;
use ecs_rebalancer::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to REBALANCER_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting rebalancer");
    info!(
        cluster = %config.cluster,
        cluster_api_url = %config.cluster_api_url,
        listen_addr = %config.listen_addr,
        "Configuration loaded"
    );

    let client = Arc::new(EcsClient::new(&config)?);
    let rebalancer = Arc::new(Rebalancer::new(client, config.cluster.as_str()));
    let state = AppState::new(rebalancer);

    let app = server::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for notifications");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    info!("Rebalancer shutdown complete");
    Ok(())
}
