//! HTTP handlers for the pdfdesk server
//!
//! Provides:
//! - the single-page panel at `/`
//! - tool listing and upload inspection
//! - command execution with a per-session result cache

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use pdfdesk_core::{
    execute_timed, inspect, InputFile, PdfCommand, PdfDeskError, PdfInfo, ProcessMetrics, Tool,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::error::ServerError;
use crate::AppState;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Build the application router
pub fn router(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/tools", get(handle_list_tools))
        .route("/api/inspect", post(handle_inspect))
        .route("/api/process", post(handle_process))
        .route("/api/session/:id/result", get(handle_get_result))
        .route("/api/session/:id", delete(handle_delete_session))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run a core operation off the async runtime.
///
/// A panic inside a PDF library becomes an internal error for this request.
async fn run_blocking<T, F>(operation: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PdfDeskError> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| ServerError::Internal(format!("operation aborted: {}", e)))?
        .map_err(ServerError::from)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServerError::InvalidRequest(rejection.body_text()))
}

/// Handler: GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfdesk-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Tool metadata for the menu
#[derive(Serialize)]
pub struct ToolInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct ToolListResponse {
    pub success: bool,
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

/// Handler: GET /api/tools
pub async fn handle_list_tools() -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = Tool::ALL
        .iter()
        .map(|tool| ToolInfo {
            id: tool.id(),
            label: tool.label(),
            description: tool.description(),
        })
        .collect();
    let count = tools.len();

    Json(ToolListResponse {
        success: true,
        tools,
        count,
    })
}

#[derive(Deserialize)]
pub struct InspectRequest {
    pub file: InputFile,
}

#[derive(Serialize)]
pub struct InspectResponse {
    pub success: bool,
    pub name: String,
    #[serde(flatten)]
    pub info: PdfInfo,
}

/// Handler: POST /api/inspect
pub async fn handle_inspect(
    payload: Result<Json<InspectRequest>, JsonRejection>,
) -> Result<Json<InspectResponse>, ServerError> {
    let InspectRequest { file } = json_body(payload)?;
    let name = file.name;
    let info = run_blocking(move || inspect(&file.data)).await?;

    Ok(Json(InspectResponse {
        success: true,
        name,
        info,
    }))
}

#[derive(Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub command: PdfCommand,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub tool: Tool,
    pub filename: String,
    pub mime_type: String,
    /// Base64-encoded output
    pub data: String,
    pub page_count: Option<u32>,
    pub preview: Option<String>,
    pub notes: Vec<String>,
    pub metrics: ProcessMetrics,
}

/// Handler: POST /api/process
pub async fn handle_process(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ServerError> {
    let ProcessRequest {
        session_id,
        command,
    } = json_body(payload)?;
    let tool = command.tool();

    let session_id = state.sessions.begin(session_id, tool).await;
    info!(session = %session_id, tool = tool.id(), "process request");

    let toolbox = state.toolbox.clone();
    let (artifact, metrics) = run_blocking(move || execute_timed(&command, &toolbox)).await?;

    let artifact = Arc::new(artifact);
    state
        .sessions
        .finish(session_id, tool, Arc::clone(&artifact))
        .await;

    Ok(Json(ProcessResponse {
        success: true,
        session_id,
        tool,
        filename: artifact.filename.clone(),
        mime_type: artifact.mime_type.clone(),
        data: STANDARD.encode(&artifact.bytes),
        page_count: artifact.page_count,
        preview: artifact.preview.clone(),
        notes: artifact.notes.clone(),
        metrics,
    }))
}

/// Handler: GET /api/session/:id/result
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServerError> {
    let artifact = state.sessions.result(id).await.ok_or(ServerError::NoResult)?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.mime_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename),
            ),
        ],
        artifact.bytes.clone(),
    )
        .into_response())
}

/// Handler: DELETE /api/session/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    if state.sessions.discard(id).await {
        info!(session = %id, "session discarded");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::UnknownSession)
    }
}
