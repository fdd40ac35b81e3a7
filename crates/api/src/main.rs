use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use api::config::AppConfig;
use api::metrics::{Metrics, MetricsSnapshot, TimedOperation};
use api::tasks::{TaskRegistry, TaskView};
use extract::{CancellationToken, PipelineKind, PipelineReport, Progress, RunStatus};

struct AppState {
    config: AppConfig,
    tasks: TaskRegistry,
    metrics: Arc<Metrics>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    llm: String,
}

#[derive(Deserialize)]
struct RunRequest {
    /// Inline document text; wins over `path` when both are given
    text: Option<String>,
    /// .txt/.md file relative to the configured document root
    path: Option<String>,
    #[serde(default)]
    pipeline: PipelineKind,
}

#[derive(Serialize)]
struct StartTaskResponse {
    task_id: Uuid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    api::logging::init_tracing(config.server.log_format);

    let bind = config.server.bind.clone();
    let state = Arc::new(AppState {
        config,
        tasks: TaskRegistry::new(),
        metrics: Metrics::new(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/start_task", post(start_task))
        .route("/task_status/:task_id", get(task_status))
        .route("/cancel_task/:task_id", post(cancel_task))
        .route("/run", post(run_sync))
        .route("/stats", get(get_stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("Server listening on http://{}", bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let url = format!("{}/api/tags", state.config.llm.base_url);
    let llm_status = match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => "ok".to_string(),
        Ok(resp) => format!("error: status {}", resp.status()),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        llm: llm_status,
    })
}

async fn start_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<StartTaskResponse>, StatusCode> {
    let text = resolve_text(&state.config, &req).await?;
    let kind = req.pipeline;
    let (task_id, cancel) = state.tasks.create(kind);

    tracing::info!(%task_id, pipeline = ?kind, "task started");

    let task_state = state.clone();
    tokio::spawn(async move {
        let state = task_state;
        let (progress, mut lines) = Progress::channel();

        let forward = {
            let state = state.clone();
            tokio::spawn(async move {
                while let Some(line) = lines.recv().await {
                    state.tasks.append_log(task_id, line);
                }
            })
        };

        let outcome = execute(&state, &task_id.to_string(), kind, &text, &cancel, &progress).await;

        // Every progress line lands in the log before the status flips.
        drop(progress);
        let _ = forward.await;

        tracing::info!(%task_id, status = ?RunStatus::from_result(&outcome), "task finished");
        state.tasks.finish(task_id, outcome);
    });

    Ok(Json(StartTaskResponse { task_id }))
}

async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskView>, StatusCode> {
    state.tasks.view(task_id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    if state.tasks.cancel(task_id) {
        tracing::info!(%task_id, "cancellation requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Synchronous run. Dropping the connection drops this future, which ends
/// the run at its next await point.
async fn run_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let text = resolve_text(&state.config, &req).await?;
    let run_id = Uuid::new_v4().to_string();

    let outcome = execute(
        &state,
        &run_id,
        req.pipeline,
        &text,
        &CancellationToken::new(),
        &Progress::silent(),
    )
    .await;

    let response = match outcome {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "status": RunStatus::Completed, "run_id": run_id, "result": report })),
        ),
        Err(e) if e.is_cancelled() => (
            StatusCode::CONFLICT,
            Json(json!({ "status": RunStatus::Cancelled, "run_id": run_id })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": RunStatus::Failed, "run_id": run_id, "error": e.to_string() })),
        ),
    };
    Ok(response)
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Inline text, or the best-effort contents of `path` under the configured
/// document root. Paths outside it are a 403; empty input is a 400.
async fn resolve_text(config: &AppConfig, req: &RunRequest) -> Result<String, StatusCode> {
    let text = match (&req.text, &req.path) {
        (Some(text), _) if !text.trim().is_empty() => text.clone(),
        (_, Some(path)) => {
            let root = config.server.document_root.as_deref();
            let resolved = api::confine_document_path(root, path).await.map_err(|e| {
                tracing::warn!(path = %path, error = %e, "document path refused");
                StatusCode::FORBIDDEN
            })?;
            ingest::read_document_text(&resolved).await
        }
        _ => String::new(),
    };

    if text.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(text)
}

/// One pipeline run with metrics and, on completion, snapshot files.
async fn execute(
    state: &AppState,
    run_id: &str,
    kind: PipelineKind,
    text: &str,
    cancel: &CancellationToken,
    progress: &Progress,
) -> extract::Result<PipelineReport> {
    state.metrics.record_start();
    let timer = TimedOperation::start();

    let pipeline = api::build_pipeline(&state.config);
    let outcome = pipeline.run(kind, text, cancel, progress).await;

    if let Ok(report) = &outcome {
        match api::persist_report(&state.config.server.output_dir, run_id, report).await {
            Ok(files) => progress.emit(format!("saved {} snapshot files", files.len())),
            Err(e) => tracing::error!(run_id, error = %e, "snapshot not written"),
        }
    }

    state.metrics.record_finish(
        RunStatus::from_result(&outcome),
        timer.elapsed(),
        outcome.as_ref().ok(),
    );
    outcome
}
