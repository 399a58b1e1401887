//! HTTP surface for the rebalancer.
//!
//! The event bus delivers each notification as `POST /v1/events`; one
//! request is one invocation. The handler here is the single place that
//! turns an outcome or error into the invocation's final status.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::RebalanceError;
use crate::event::NotificationEnvelope;
use crate::rebalancer::{RebalanceOutcome, Rebalancer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    rebalancer: Arc<Rebalancer>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(rebalancer: Arc<Rebalancer>) -> Self {
        Self { rebalancer }
    }
}

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(handle_event))
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    timestamp: String,
}

/// Basic health check - is the service running?
async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "rebalancer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Liveness check - minimal body for probe efficiency.
async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Error body returned for failed invocations.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    /// Services updated before a mid-loop failure.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    updated_services: Vec<String>,
}

/// Ingest one notification and run the rebalance sequence.
async fn handle_event(
    State(state): State<AppState>,
    Json(envelope): Json<NotificationEnvelope>,
) -> Response {
    info!(
        id = envelope.id.as_deref().unwrap_or("-"),
        source = envelope.source.as_deref().unwrap_or("-"),
        detail_type = envelope.detail_type.as_deref().unwrap_or("-"),
        "Received notification"
    );

    match run(&state, &envelope).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn run(
    state: &AppState,
    envelope: &NotificationEnvelope,
) -> Result<RebalanceOutcome, RebalanceError> {
    let event = envelope.decode()?;
    state.rebalancer.handle_event(&event).await
}

/// Map a failed invocation to its final HTTP status.
fn error_response(err: RebalanceError) -> (StatusCode, Json<ErrorBody>) {
    match err {
        RebalanceError::Decode(e) => {
            warn!(error = %e, "Rejected undecodable notification");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    code: "invalid_event".to_string(),
                    message: e.to_string(),
                    updated_services: Vec::new(),
                }),
            )
        }
        RebalanceError::Query {
            operation,
            ref source,
        } => {
            error!(operation, error = %source, "Cluster API call failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    code: "upstream_error".to_string(),
                    message: err.to_string(),
                    updated_services: Vec::new(),
                }),
            )
        }
        RebalanceError::Update {
            updated,
            failed,
            source,
        } => {
            error!(
                failed = %failed,
                updated = updated.len(),
                error = %source,
                "Forced deployment loop aborted"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    code: "partial_update_failure".to_string(),
                    message: format!("forced deployment of {failed} failed: {source}"),
                    updated_services: updated.into_iter().map(|s| s.name).collect(),
                }),
            )
        }
    }
}
