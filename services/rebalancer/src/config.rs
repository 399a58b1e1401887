//! Configuration for the rebalancer service.

use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Service configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Cluster whose services are redeployed.
    pub cluster: String,

    /// Compute-cluster API base URL.
    pub cluster_api_url: String,

    /// Address the event-ingestion server listens on.
    pub listen_addr: SocketAddr,

    /// Per-request timeout for cluster API calls, in seconds.
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// The cluster name is required; every other value has a default.
    pub fn from_env() -> Result<Self> {
        let cluster = std::env::var("REBALANCER_CLUSTER")
            .ok()
            .filter(|v| !v.is_empty())
            .context("Missing cluster name. Set REBALANCER_CLUSTER.")?;

        let cluster_api_url = std::env::var("REBALANCER_CLUSTER_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let listen_addr = std::env::var("REBALANCER_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8780".to_string())
            .parse()
            .context("REBALANCER_LISTEN_ADDR must be a socket address.")?;

        let request_timeout_secs = std::env::var("REBALANCER_REQUEST_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("REBALANCER_REQUEST_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(30);

        let log_level =
            std::env::var("REBALANCER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            cluster,
            cluster_api_url,
            listen_addr,
            request_timeout_secs,
            log_level,
        })
    }
}
