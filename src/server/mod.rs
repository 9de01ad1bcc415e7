//! HTTP surface: `POST /api/transcribe` and `GET /api/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{OutputConfig, ServerConfig};
use crate::health::ServiceHealth;
use crate::output::save_artifacts;
use crate::pipeline::{PipelineController, PipelineError, ResultEnvelope, TranscribeRequest};

/// Shared application state.
pub struct AppState {
    pub controller: PipelineController,
    /// Bounds how many jobs run at once
    pub jobs: Arc<Semaphore>,
    pub output: OutputConfig,
}

impl AppState {
    pub fn new(controller: PipelineController, max_concurrent_jobs: usize, output: OutputConfig) -> Self {
        Self {
            controller,
            jobs: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            output,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "linkscribe listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server error")
}

/// POST /api/transcribe: run one job and return its envelope
///
/// 200 when the job succeeded (formatting may still have failed), 400 otherwise.
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TranscribeRequest>, JsonRejection>,
) -> (StatusCode, Json<ResultEnvelope>) {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection);
            let error = PipelineError::InvalidRequest(rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ResultEnvelope::failure("", error.to_string())),
            );
        }
    };
    let input_url = request.video_url.clone().unwrap_or_default();

    let permit = match state.jobs.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let error = PipelineError::Internal("job queue closed".into());
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ResultEnvelope::failure(input_url, error.to_string())),
            );
        }
    };

    // Dropping the guard (client went away) cancels the job at its next stage boundary
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let task_state = Arc::clone(&state);
    let job = tokio::spawn(async move {
        let _permit = permit;
        let envelope = task_state.controller.process_request(&request, cancel).await;

        if task_state.output.save_artifacts {
            let dir = task_state.output.dir.clone();
            let to_save = envelope.clone();
            let saved = tokio::task::spawn_blocking(move || save_artifacts(&to_save, &dir)).await;
            match saved {
                Ok(Ok(paths)) => {
                    tracing::debug!(result = %paths.result_json.display(), "Artifacts saved")
                }
                Ok(Err(e)) => tracing::warn!("Failed to save artifacts: {:#}", e),
                Err(e) => tracing::warn!("Artifact task failed: {}", e),
            }
        }

        envelope
    });

    let result = job.await;
    guard.disarm();

    match result {
        Ok(envelope) => {
            let status = if envelope.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(envelope))
        }
        Err(e) => {
            tracing::error!("Job task failed: {}", e);
            let error = PipelineError::Internal(e.to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResultEnvelope::failure(input_url, error.to_string())),
            )
        }
    }
}

/// GET /api/health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<ServiceHealth> {
    Json(state.controller.health().await)
}
