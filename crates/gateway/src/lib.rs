//! HTTP gateway for Alin.
//!
//! Serves the SSE chat endpoint, workspace lifecycle and a health check
//! carrying the reliability snapshot. A background task reaps idle
//! workspaces for as long as the server runs.

pub mod api_v1;
pub mod error;
pub mod runtime;

use std::sync::Arc;

use alin_telemetry::ReliabilitySnapshot;
use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use api_v1::SharedRuntime;
pub use error::ApiError;
pub use runtime::Runtime;

/// Request bodies carry whole transcripts.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build the router with every gateway route.
pub fn build_router(state: SharedRuntime) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway and serve until the process is stopped.
pub async fn start(config: alin_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    tokio::fs::create_dir_all(&config.sandbox.workspace_root).await?;

    let runtime = Arc::new(Runtime::from_config(config));
    let shutdown = CancellationToken::new();
    let reaper = runtime.spawn_reaper(shutdown.clone());

    let app = build_router(runtime);
    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app).await;

    shutdown.cancel();
    let _ = reaper.await;
    served?;
    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub providers: Vec<String>,
    pub tools: usize,
    pub reliability: ReliabilitySnapshot,
}

async fn health_handler(State(state): State<SharedRuntime>) -> Json<HealthResponse> {
    let uptime = chrono::Utc::now() - state.started_at();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime.num_seconds(),
        providers: state
            .providers()
            .kinds()
            .into_iter()
            .map(|k| k.to_string())
            .collect(),
        tools: state.tools().len(),
        reliability: state.tracker().snapshot(),
    })
}
