// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP status surface.
//!
//! - `GET /` reports `active`/`inactive`, the last error and when the last
//!   message was relayed.
//! - `GET /health` answers 200 while the relay runs, 503 otherwise.
//! - `POST /start` respawns the relay task if it is not running.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use courier_config::model::HealthConfig;
use courier_core::RelayError;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::supervisor::RelaySupervisor;

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    error: Option<String>,
    last_message: Option<DateTime<Utc>>,
}

pub fn router(supervisor: Arc<RelaySupervisor>) -> Router {
    Router::new()
        .route("/", get(get_status))
        .route("/health", get(get_health))
        .route("/start", post(post_start))
        .with_state(supervisor)
}

async fn get_status(State(supervisor): State<Arc<RelaySupervisor>>) -> Json<StatusBody> {
    let snapshot = supervisor.status().snapshot();
    Json(StatusBody {
        status: if snapshot.running { "active" } else { "inactive" },
        error: snapshot.last_error,
        last_message: snapshot.last_relayed_at,
    })
}

async fn get_health(State(supervisor): State<Arc<RelaySupervisor>>) -> impl IntoResponse {
    let snapshot = supervisor.status().snapshot();
    if snapshot.running {
        (StatusCode::OK, Json(json!({ "status": "healthy" })))
    } else {
        let error = snapshot
            .last_error
            .unwrap_or_else(|| "relay is not running".to_string());
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": error })),
        )
    }
}

async fn post_start(State(supervisor): State<Arc<RelaySupervisor>>) -> impl IntoResponse {
    if supervisor.start_if_idle().await {
        (StatusCode::ACCEPTED, Json(json!({ "started": true })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "started": false, "reason": "relay already running or shutting down" })),
        )
    }
}

pub async fn bind(config: &HealthConfig) -> Result<TcpListener, RelayError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Backend {
            message: format!("failed to bind health server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    supervisor: Arc<RelaySupervisor>,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "health server listening");
    }
    axum::serve(listener, router(supervisor))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| RelayError::Backend {
            message: format!("health server error: {e}"),
            source: Some(Box::new(e)),
        })
}
