//! HTTP API server with an in-process worker.
//!
//! Provides REST endpoints to submit videos and poll their jobs. Submitted jobs
//! are dispatched to the orchestrator running in the same process.

use super::open_store;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::{ErrorKind, VidscanError};
use crate::job::{JobId, JobStatus};
use crate::orchestrator::Orchestrator;
use crate::service::{JobService, JobSummary, ResultView};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    service: JobService,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Process) {
        Output::warning(&format!("{} (jobs will fail until this is fixed)", e));
    }

    let store = open_store(&settings)?;
    let orchestrator = Arc::new(Orchestrator::new(&settings, store.clone())?);

    let swept = orchestrator.sweep_stale(Utc::now()).await?;
    if !swept.is_empty() {
        Output::warning(&format!("Marked {} stale job(s) as failed", swept.len()));
    }

    let dispatcher = Arc::new(Dispatcher::start(orchestrator, &settings.worker));
    let service = JobService::new(store).with_dispatcher(dispatcher);
    let state = Arc::new(AppState { service });

    // The queue is bounded, so a large backlog is fed in while the server runs
    let requeue_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = requeue_state.service.requeue_pending().await {
            error!("Failed to resume pending jobs: {}", e);
        }
    });

    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("vidscan API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv(
        "Workers",
        &format!("{} concurrent job(s)", settings.worker.max_concurrent_jobs),
    );
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Submit", "POST /api/analyze");
    Output::kv("Status", "GET  /api/status/:job_id");
    Output::kv("Result", "GET  /api/result/:job_id");
    Output::kv("List", "GET  /api/jobs?limit=&status=");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/status/{job_id}", get(status))
        .route("/api/result/{job_id}", get(result))
        .route("/api/jobs", get(list_jobs))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    /// YouTube URL or video ID
    #[serde(alias = "youtube_url")]
    url: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    job_id: JobId,
    status: JobStatus,
    message: String,
}

#[derive(Serialize)]
struct NotReadyResponse {
    job_id: JobId,
    status: JobStatus,
    detail: String,
}

#[derive(Deserialize)]
struct JobsQuery {
    limit: Option<usize>,
    status: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A library error rendered as an HTTP response.
struct ApiError(VidscanError);

impl From<VidscanError> for ApiError {
    fn from(e: VidscanError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Config => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "vidscan video analysis API",
        "status": "running",
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let job_id = state.service.submit(&req.url).await?;
    Ok(Json(AnalyzeResponse {
        job_id,
        status: JobStatus::Pending,
        message: "Analysis job submitted. Use the job_id to check status.".to_string(),
    }))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<i64>,
) -> Result<Json<JobSummary>, ApiError> {
    Ok(Json(state.service.status(JobId(job_id)).await?))
}

async fn result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<i64>,
) -> Result<Response, ApiError> {
    let job_id = JobId(job_id);
    match state.service.result(job_id).await? {
        ResultView::NotReady(status) => Ok((
            StatusCode::ACCEPTED,
            Json(NotReadyResponse {
                job_id,
                status,
                detail: format!("Job is still {}. Please check back later.", status),
            }),
        )
            .into_response()),
        ResultView::Ready(job) => Ok(Json(job).into_response()),
    }
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;
    Ok(Json(state.service.list(query.limit, status).await?))
}
