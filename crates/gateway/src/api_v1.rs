//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`: run one agent loop, streaming events as SSE
//! - `POST   /v1/workspaces`: create (or claim) a workspace
//! - `DELETE /v1/workspaces/{id}`: delete a workspace and its files

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use alin_agent::{LoopEvent, LoopRequest};
use alin_core::{ConversationTurn, ProviderKind};
use alin_tools::tool_context;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::runtime::Runtime;

pub type SharedRuntime = Arc<Runtime>;

/// Owner used when a request names none.
pub const DEFAULT_OWNER: &str = "default";

/// Loop events buffered ahead of a slow client.
const EVENT_BUFFER: usize = 256;

pub fn v1_router(state: SharedRuntime) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/workspaces", post(create_workspace_handler))
        .route("/workspaces/{id}", delete(delete_workspace_handler))
        .with_state(state)
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub transcript: Vec<ConversationTurn>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Restrict the loop to these tools.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub provider: Option<String>,
    pub workspace_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    /// Stream model output live; otherwise each round arrives whole.
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

fn sse_event(event: &LoopEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

/// `POST /v1/chat`: validate, then run the loop in a task feeding the SSE body.
///
/// Dropping the response body (client disconnect) cancels the loop and any
/// process it is running.
async fn chat_handler(
    State(state): State<SharedRuntime>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.transcript.is_empty() {
        return Err(ApiError::BadRequest("transcript must not be empty".into()));
    }

    let model = payload
        .model
        .unwrap_or_else(|| state.config().default_model.clone());
    let explicit = payload
        .provider
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()?;
    let provider = state.providers().resolve(explicit, &model)?;

    let owner = payload.owner.as_deref().unwrap_or(DEFAULT_OWNER);
    let workspace = state.workspaces().open(&payload.workspace_id, owner).await?;

    let agent = state.agent(provider, payload.tools.as_deref());
    let mut request = LoopRequest::new(model, payload.transcript).streaming(payload.stream);
    request.system_prompt = payload.system_prompt.or_else(|| state.system_prompt());

    info!(
        workspace = %workspace.id,
        model = %request.model,
        turns = request.transcript.len(),
        stream = request.stream,
        "v1/chat request"
    );

    let cancel = CancellationToken::new();
    let disconnect = cancel.clone().drop_guard();
    let ctx = tool_context(&workspace, cancel);
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        let run = agent.run(request, &ctx, Some(tx)).await;
        debug!(
            workspace = %ctx.workspace().display(),
            iterations = run.iterations,
            ok = run.is_complete(),
            "v1/chat loop finished"
        );
    });

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _disconnect = &disconnect;
        Ok::<_, Infallible>(sse_event(&event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── Workspaces ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    pub workspace_id: String,
    pub path: PathBuf,
}

async fn create_workspace_handler(
    State(state): State<SharedRuntime>,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<WorkspaceResponse>), ApiError> {
    if payload.owner.trim().is_empty() {
        return Err(ApiError::BadRequest("owner must not be empty".into()));
    }
    let entry = match payload.workspace_id.as_deref() {
        Some(id) => state.workspaces().open(id, &payload.owner).await?,
        None => state.workspaces().create(&payload.owner).await?,
    };
    Ok((
        StatusCode::CREATED,
        Json(WorkspaceResponse {
            workspace_id: entry.id,
            path: entry.root,
        }),
    ))
}

async fn delete_workspace_handler(
    State(state): State<SharedRuntime>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.workspaces().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
